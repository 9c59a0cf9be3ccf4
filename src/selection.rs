//! Selection helpers over the compute and database lists.
//!
//! Both lists are handled by the same generic functions; neither function
//! ever touches a list it was not given, which keeps the two lists independent.

use crate::model::{Instance, RdsInstance};

pub trait Selectable {
    fn id(&self) -> &str;
    fn is_selected(&self) -> bool;
    fn set_selected(&mut self, selected: bool);
}

impl Selectable for Instance {
    fn id(&self) -> &str { &self.id }
    fn is_selected(&self) -> bool { self.selected }
    fn set_selected(&mut self, selected: bool) { self.selected = selected; }
}

impl Selectable for RdsInstance {
    fn id(&self) -> &str { &self.id }
    fn is_selected(&self) -> bool { self.selected }
    fn set_selected(&mut self, selected: bool) { self.selected = selected; }
}

/// Flip the flag of the entry with `id`. Returns false when no entry matches.
pub fn toggle<T: Selectable>(items: &mut [T], id: &str) -> bool {
    match items.iter_mut().find(|item| item.id() == id) {
        Some(item) => {
            let next = !item.is_selected();
            item.set_selected(next);
            true
        }
        None => false,
    }
}

pub fn select_all<T: Selectable>(items: &mut [T], selected: bool) {
    for item in items.iter_mut() {
        item.set_selected(selected);
    }
}

/// State of a "select all" checkbox: true iff the list is non-empty and fully selected.
pub fn all_selected<T: Selectable>(items: &[T]) -> bool {
    !items.is_empty() && items.iter().all(Selectable::is_selected)
}

/// Selected entries in list order.
pub fn selected<T: Selectable>(items: &[T]) -> Vec<&T> {
    items.iter().filter(|item| item.is_selected()).collect()
}

pub fn selected_count<T: Selectable>(items: &[T]) -> usize {
    items.iter().filter(|item| item.is_selected()).count()
}

/// First id that occurs more than once, if any.
pub fn duplicate_id<T: Selectable>(items: &[T]) -> Option<&str> {
    let mut seen = std::collections::HashSet::new();
    items.iter().map(Selectable::id).find(|id| !seen.insert(*id))
}
