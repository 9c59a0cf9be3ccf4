use std::fmt;
use tracing::debug;

use crate::error::{InsightsError, Result};
use crate::model::ReportType;
use crate::store::ReportStore;

// ======================================================
// STEPS
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    SelectProvider,
    SelectReportType,
    EnterCredentials,
    SelectInstances,
    SelectBillingPeriod,
    GenerateReport,
}

const UTILIZATION_PATH: [Step; 5] = [
    Step::SelectProvider,
    Step::SelectReportType,
    Step::EnterCredentials,
    Step::SelectInstances,
    Step::GenerateReport,
];

const BILLING_PATH: [Step; 5] = [
    Step::SelectProvider,
    Step::SelectReportType,
    Step::EnterCredentials,
    Step::SelectBillingPeriod,
    Step::GenerateReport,
];

/// Before a report type is chosen only the common prefix is known.
const UNDECIDED_PATH: [Step; 3] = [
    Step::SelectProvider,
    Step::SelectReportType,
    Step::EnterCredentials,
];

/// The ordered steps visited for a report type.
pub fn path_for(report_type: Option<ReportType>) -> &'static [Step] {
    match report_type {
        Some(ReportType::Utilization) => &UTILIZATION_PATH,
        Some(ReportType::Billing)     => &BILLING_PATH,
        None                          => &UNDECIDED_PATH,
    }
}

impl Step {
    pub fn title(&self) -> &'static str {
        match self {
            Step::SelectProvider      => "Cloud Provider",
            Step::SelectReportType    => "Report Type",
            Step::EnterCredentials    => "Credentials",
            Step::SelectInstances     => "Instances",
            Step::SelectBillingPeriod => "Billing Period",
            Step::GenerateReport      => "Generate",
        }
    }

    /// Position within the active path (0-based), if the step is on it.
    pub fn position(&self, report_type: Option<ReportType>) -> Option<usize> {
        path_for(report_type).iter().position(|s| s == self)
    }

    pub fn next(&self, report_type: Option<ReportType>) -> Option<Step> {
        let path = path_for(report_type);
        let idx = path.iter().position(|s| s == self)?;
        path.get(idx + 1).copied()
    }

    pub fn previous(&self, report_type: Option<ReportType>) -> Option<Step> {
        let path = path_for(report_type);
        let idx = path.iter().position(|s| s == self)?;
        idx.checked_sub(1).and_then(|i| path.get(i).copied())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ======================================================
// GUARDS
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Allowed,
    Redirect(Step),
}

/// Entry precondition of `step`. Pure: reads the store, never mutates it.
///
/// Prerequisites are checked in path order, so the redirect always points at
/// the earliest step whose state is missing.
pub fn guard(step: Step, store: &ReportStore) -> Guard {
    if step == Step::SelectProvider {
        return Guard::Allowed;
    }
    if store.provider().is_none() {
        return Guard::Redirect(Step::SelectProvider);
    }
    if step == Step::SelectReportType {
        return Guard::Allowed;
    }

    let report_type = match store.report_type() {
        Some(t) => t,
        None => return Guard::Redirect(Step::SelectReportType),
    };
    if step == Step::EnterCredentials {
        return Guard::Allowed;
    }

    match (step, report_type) {
        (Step::SelectInstances, ReportType::Billing)
        | (Step::SelectBillingPeriod, ReportType::Utilization) => {
            return Guard::Redirect(Step::SelectReportType);
        }
        _ => {}
    }

    if store.credentials().is_none() {
        return Guard::Redirect(Step::EnterCredentials);
    }

    if step != Step::GenerateReport {
        return Guard::Allowed;
    }

    match report_type {
        ReportType::Utilization if !store.has_selection() => {
            Guard::Redirect(Step::SelectInstances)
        }
        ReportType::Billing if store.billing_period().is_none() => {
            Guard::Redirect(Step::SelectBillingPeriod)
        }
        _ => Guard::Allowed,
    }
}

// ======================================================
// TRANSITIONS
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved(Step),
    Redirected { requested: Step, landed: Step },
    /// Forward or back was requested at either end of the path.
    Stayed(Step),
}

impl Transition {
    pub fn landed(&self) -> Step {
        match self {
            Transition::Moved(s) | Transition::Stayed(s) => *s,
            Transition::Redirected { landed, .. } => *landed,
        }
    }
}

// ======================================================
// IN-FLIGHT ACTIONS
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ValidateCredentials,
    FetchInventory,
    GenerateReport,
}

/// Handle of a pending asynchronous action.
/// Carries the store generation current when the request was issued.
#[derive(Debug, PartialEq, Eq)]
pub struct Ticket {
    pub action:     Action,
    pub generation: u64,
}

// ======================================================
// WIZARD
// ======================================================

/// Owns the session store and the current step.
pub struct Wizard {
    store:   ReportStore,
    current: Step,
    pending: Option<Action>,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new(ReportStore::new())
    }
}

impl Wizard {
    pub fn new(store: ReportStore) -> Self {
        Wizard { store, current: Step::SelectProvider, pending: None }
    }

    pub fn current(&self) -> Step { self.current }
    pub fn store(&self) -> &ReportStore { &self.store }
    pub fn store_mut(&mut self) -> &mut ReportStore { &mut self.store }
    pub fn pending(&self) -> Option<Action> { self.pending }

    /// Try to enter `target`, following redirects until a step admits us.
    pub fn enter(&mut self, target: Step) -> Transition {
        let mut step = target;
        // Every redirect points strictly earlier in the path, and the first step
        // always admits, so this terminates within the path length.
        for _ in 0..UTILIZATION_PATH.len() + 1 {
            match guard(step, &self.store) {
                Guard::Allowed => break,
                Guard::Redirect(earlier) => {
                    debug!(requested = %step, redirect = %earlier, "step guard redirected");
                    step = earlier;
                }
            }
        }

        self.current = step;
        if step == target {
            Transition::Moved(step)
        } else {
            Transition::Redirected { requested: target, landed: step }
        }
    }

    /// "Next": enter the following step of the active path.
    pub fn advance(&mut self) -> Transition {
        match self.current.next(self.store.report_type()) {
            Some(next) => self.enter(next),
            None => Transition::Stayed(self.current),
        }
    }

    /// "Back": the preceding step of the active path, without re-validating.
    pub fn back(&mut self) -> Transition {
        match self.current.previous(self.store.report_type()) {
            Some(prev) => {
                self.current = prev;
                Transition::Moved(prev)
            }
            None => Transition::Stayed(self.current),
        }
    }

    /// "Start Over": reset everything and return to the first step.
    pub fn start_over(&mut self) -> Transition {
        self.store.reset_report();
        self.pending = None;
        self.current = Step::SelectProvider;
        Transition::Moved(Step::SelectProvider)
    }

    /// Mark `action` as in flight. A second trigger while pending is refused.
    pub fn begin(&mut self, action: Action) -> Result<Ticket> {
        if self.pending.is_some() {
            return Err(InsightsError::Busy);
        }
        self.pending = Some(action);
        Ok(Ticket { action, generation: self.store.generation() })
    }

    /// Release the in-flight slot. Returns whether the ticket is still current.
    pub fn finish(&mut self, ticket: Ticket) -> bool {
        if self.pending == Some(ticket.action) {
            self.pending = None;
        }
        ticket.generation == self.store.generation()
    }
}
