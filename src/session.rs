use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{InsightsError, Result};
use crate::model::{
    BillingPeriod, CloudProvider, Instance, RdsInstance, ReportFrequency, ReportType,
};
use crate::report::write_atomic;
use crate::store::ReportStore;

const SCHEMA_VERSION: u32 = 1;

// ======================================================
// DATA STRUCTURE
// ======================================================

/// Reload cache of an unfinished wizard run.
///
/// The secret access key is never part of it. The access key id is kept
/// only to prefill the credentials prompt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionCache {
    pub schema_version: u32,
    pub saved_at:       String,
    pub provider:       Option<CloudProvider>,
    pub report_type:    Option<ReportType>,
    pub access_key_id:  Option<String>,
    pub account_id:     Option<String>,
    pub instances:      Vec<Instance>,
    pub rds_instances:  Vec<RdsInstance>,
    pub frequency:      ReportFrequency,
    pub billing_period: Option<BillingPeriod>,
    pub hash:           Option<String>,
}

impl SessionCache {
    pub fn from_store(store: &ReportStore) -> Self {
        let credentials = store.credentials();
        SessionCache {
            schema_version: SCHEMA_VERSION,
            saved_at:       Utc::now().to_rfc3339(),
            provider:       store.provider(),
            report_type:    store.report_type(),
            access_key_id:  credentials.map(|c| c.access_key_id.clone()),
            account_id:     credentials.and_then(|c| c.account_id.clone()),
            instances:      store.instances().to_vec(),
            rds_instances:  store.rds_instances().to_vec(),
            frequency:      store.frequency(),
            billing_period: store.billing_period(),
            hash:           None,
        }
    }

    /// Nothing worth restoring.
    pub fn is_blank(&self) -> bool {
        self.provider.is_none()
    }

    /// Copy the cached choices into a fresh store. Credentials stay empty, so
    /// the wizard lands on the credentials step at the latest.
    pub fn restore_into(&self, store: &mut ReportStore) -> Result<()> {
        if let Some(provider) = self.provider {
            store.set_provider(provider);
        }
        if let Some(report_type) = self.report_type {
            store.set_report_type(report_type);
        }
        store.set_instances(self.instances.clone())?;
        store.set_rds_instances(self.rds_instances.clone())?;
        store.set_frequency(self.frequency);
        if let Some(period) = self.billing_period {
            store.set_billing_period(period);
        }
        Ok(())
    }

    pub fn selected_instance_ids(&self) -> Vec<String> {
        self.instances.iter().filter(|i| i.selected).map(|i| i.id.clone()).collect()
    }

    pub fn selected_rds_ids(&self) -> Vec<String> {
        self.rds_instances.iter().filter(|i| i.selected).map(|i| i.id.clone()).collect()
    }
}

// ======================================================
// HASH
// ======================================================

fn compute_hash(cache: &SessionCache) -> Result<String> {
    let mut temp = cache.clone();
    temp.hash = None;

    let json = serde_json::to_string(&temp)?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());

    Ok(format!("{:x}", hasher.finalize()))
}

// ======================================================
// PERSIST
// ======================================================

pub fn save(path: &Path, store: &ReportStore) -> Result<()> {
    let mut cache = SessionCache::from_store(store);
    cache.hash = Some(compute_hash(&cache)?);

    let json = serde_json::to_string_pretty(&cache)?;
    write_atomic(path, json.as_bytes())?;
    debug!(path = %path.display(), "session cache saved");
    Ok(())
}

/// Load a cache written by `save`. Missing, unreadable, outdated or tampered
/// caches yield `None`; the last three with a warning.
pub fn load(path: &Path) -> Option<SessionCache> {
    let content = fs::read_to_string(path).ok()?;

    let cache: SessionCache = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable session cache");
            return None;
        }
    };

    if cache.schema_version != SCHEMA_VERSION {
        warn!(version = cache.schema_version, "ignoring session cache from another version");
        return None;
    }

    let stored = cache.hash.clone()?;
    match compute_hash(&cache) {
        Ok(calculated) if calculated == stored => Some(cache),
        _ => {
            warn!(path = %path.display(), "session cache failed its integrity check, ignoring it");
            None
        }
    }
}

/// Returns whether a cache file existed.
pub fn clear(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(InsightsError::Io(e)),
    }
}

// ======================================================
// DISPLAY
// ======================================================

pub fn print_summary(cache: &SessionCache) {
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());

    println!();
    println!("Saved Wizard Session");
    println!("{}", "─".repeat(50));
    println!("  saved at        : {}", cache.saved_at);
    println!("  provider        : {}", or_dash(cache.provider.map(|p| p.display_name().to_string())));
    println!("  report type     : {}", or_dash(cache.report_type.map(|t| t.category_label().to_string())));
    println!("  access key id   : {}", or_dash(cache.access_key_id.clone()));
    println!("  account id      : {}", or_dash(cache.account_id.clone()));
    println!(
        "  instances       : {} selected of {}",
        cache.selected_instance_ids().len(),
        cache.instances.len()
    );
    println!(
        "  databases       : {} selected of {}",
        cache.selected_rds_ids().len(),
        cache.rds_instances.len()
    );
    println!("  frequency       : {}", cache.frequency.label());
    println!("  billing period  : {}", or_dash(cache.billing_period.map(|p| p.to_string())));
    println!();
}
