use tracing::{debug, info};

use crate::catalog::Inventory;
use crate::error::{InsightsError, Result};
use crate::model::{
    BillingPeriod, CloudProvider, Credentials, Instance, RdsInstance, ReportConfig,
    ReportFrequency, ReportType,
};
use crate::selection;

// ======================================================
// APPLY OUTCOME
// ======================================================

/// Result of applying an asynchronous response to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// The response belongs to an earlier generation of the session and was dropped.
    Discarded,
}

// ======================================================
// REPORT STORE
// ======================================================

/// Session state of one wizard run.
///
/// Mutation goes through the methods below only. The store is owned by the
/// `Wizard` driving the session; there is no global instance.
#[derive(Debug, Clone, Default)]
pub struct ReportStore {
    provider:       Option<CloudProvider>,
    report_type:    Option<ReportType>,
    credentials:    Option<Credentials>,
    instances:      Vec<Instance>,
    rds_instances:  Vec<RdsInstance>,
    frequency:      ReportFrequency,
    billing_period: Option<BillingPeriod>,
    /// Bumped whenever in-flight responses must no longer apply.
    generation:     u64,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ──────────────────────────────────────────────
    // Reads
    // ──────────────────────────────────────────────

    pub fn provider(&self) -> Option<CloudProvider> { self.provider }
    pub fn report_type(&self) -> Option<ReportType> { self.report_type }
    pub fn credentials(&self) -> Option<&Credentials> { self.credentials.as_ref() }
    pub fn instances(&self) -> &[Instance] { &self.instances }
    pub fn rds_instances(&self) -> &[RdsInstance] { &self.rds_instances }
    pub fn frequency(&self) -> ReportFrequency { self.frequency }
    pub fn billing_period(&self) -> Option<BillingPeriod> { self.billing_period }
    pub fn generation(&self) -> u64 { self.generation }

    pub fn selected_instances(&self) -> Vec<&Instance> {
        selection::selected(&self.instances)
    }

    pub fn selected_rds_instances(&self) -> Vec<&RdsInstance> {
        selection::selected(&self.rds_instances)
    }

    pub fn has_selection(&self) -> bool {
        selection::selected_count(&self.instances) > 0
            || selection::selected_count(&self.rds_instances) > 0
    }

    pub fn all_instances_selected(&self) -> bool {
        selection::all_selected(&self.instances)
    }

    pub fn all_rds_instances_selected(&self) -> bool {
        selection::all_selected(&self.rds_instances)
    }

    /// Snapshot for the document assembler.
    /// `None` until both a provider and credentials are set.
    pub fn report_config(&self) -> Option<ReportConfig> {
        let provider = self.provider?;
        let credentials = self.credentials.clone()?;
        Some(ReportConfig {
            provider,
            report_type:    self.report_type,
            credentials,
            instances:      self.instances.clone(),
            rds_instances:  self.rds_instances.clone(),
            frequency:      self.frequency,
            billing_period: self.billing_period,
        })
    }

    /// Preconditions of document generation, checked before any work starts.
    pub fn check_ready_for_generation(&self) -> Result<ReportConfig> {
        let config = self.report_config().ok_or_else(|| {
            InsightsError::validation("Choose a cloud provider and enter credentials first")
        })?;

        match config.report_type {
            None => Err(InsightsError::validation("Choose a report type first")),
            Some(ReportType::Billing) if config.billing_period.is_none() => Err(
                InsightsError::validation("Select a billing period (year and month) first"),
            ),
            Some(ReportType::Utilization) if !self.has_selection() => Err(
                InsightsError::validation("Select at least one instance or database"),
            ),
            Some(_) => Ok(config),
        }
    }

    // ──────────────────────────────────────────────
    // Mutations
    // ──────────────────────────────────────────────

    /// Other fields are kept, so leftovers of an earlier choice survive.
    /// In-flight responses issued for the previous provider are invalidated.
    pub fn set_provider(&mut self, provider: CloudProvider) {
        if self.provider != Some(provider) {
            self.generation += 1;
        }
        debug!(%provider, "provider set");
        self.provider = Some(provider);
    }

    pub fn set_report_type(&mut self, report_type: ReportType) {
        debug!(%report_type, "report type set");
        self.report_type = Some(report_type);
    }

    pub fn set_credentials(&mut self, credentials: Credentials) -> Result<()> {
        if credentials.access_key_id.trim().is_empty() {
            return Err(InsightsError::validation("Access key ID is required"));
        }
        if credentials.secret_access_key.is_empty() {
            return Err(InsightsError::validation("Secret access key is required"));
        }
        debug!(access_key_id = %credentials.access_key_id, "credentials set");
        self.generation += 1;
        self.credentials = Some(credentials);
        Ok(())
    }

    pub fn set_instances(&mut self, instances: Vec<Instance>) -> Result<()> {
        if let Some(dup) = selection::duplicate_id(&instances) {
            return Err(InsightsError::validation(format!("Duplicate instance id '{}'", dup)));
        }
        self.instances = instances;
        Ok(())
    }

    pub fn set_rds_instances(&mut self, rds_instances: Vec<RdsInstance>) -> Result<()> {
        if let Some(dup) = selection::duplicate_id(&rds_instances) {
            return Err(InsightsError::validation(format!("Duplicate database id '{}'", dup)));
        }
        self.rds_instances = rds_instances;
        Ok(())
    }

    /// Drop both lists, used after a failed fetch.
    pub fn clear_inventory(&mut self) {
        self.instances.clear();
        self.rds_instances.clear();
    }

    /// Apply a fetched inventory if it was requested in the current generation.
    pub fn apply_inventory(&mut self, requested_in: u64, inventory: Inventory) -> Result<Applied> {
        if requested_in != self.generation {
            info!(
                requested_in,
                current = self.generation,
                "discarding stale inventory response"
            );
            return Ok(Applied::Discarded);
        }

        // Validate both lists before touching either.
        if let Some(dup) = selection::duplicate_id(&inventory.instances) {
            return Err(InsightsError::validation(format!("Duplicate instance id '{}'", dup)));
        }
        if let Some(dup) = selection::duplicate_id(&inventory.rds_instances) {
            return Err(InsightsError::validation(format!("Duplicate database id '{}'", dup)));
        }

        self.instances = inventory.instances;
        self.rds_instances = inventory.rds_instances;
        Ok(Applied::Applied)
    }

    pub fn toggle_instance_selection(&mut self, id: &str) -> Result<()> {
        if selection::toggle(&mut self.instances, id) {
            Ok(())
        } else {
            Err(InsightsError::NotFound { kind: "instance", id: id.to_string() })
        }
    }

    pub fn toggle_rds_instance_selection(&mut self, id: &str) -> Result<()> {
        if selection::toggle(&mut self.rds_instances, id) {
            Ok(())
        } else {
            Err(InsightsError::NotFound { kind: "database", id: id.to_string() })
        }
    }

    pub fn select_all_instances(&mut self, selected: bool) {
        selection::select_all(&mut self.instances, selected);
    }

    pub fn select_all_rds_instances(&mut self, selected: bool) {
        selection::select_all(&mut self.rds_instances, selected);
    }

    pub fn set_frequency(&mut self, frequency: ReportFrequency) {
        self.frequency = frequency;
    }

    pub fn set_billing_period(&mut self, period: BillingPeriod) {
        self.billing_period = Some(period);
    }

    /// Restore every field to its initial value in one assignment.
    pub fn reset_report(&mut self) {
        let next_generation = self.generation + 1;
        *self = ReportStore { generation: next_generation, ..ReportStore::default() };
        info!("session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatabaseState, InstanceState};

    fn instance(id: &str, selected: bool) -> Instance {
        Instance {
            id:            id.to_string(),
            name:          id.to_uppercase(),
            instance_type: "t3.medium".to_string(),
            region:        "us-west-2".to_string(),
            state:         InstanceState::Running,
            selected,
        }
    }

    fn database(id: &str, selected: bool) -> RdsInstance {
        RdsInstance {
            id:       id.to_string(),
            name:     id.to_uppercase(),
            engine:   "PostgreSQL".to_string(),
            region:   "us-west-2".to_string(),
            state:    DatabaseState::Available,
            selected,
        }
    }

    fn creds() -> Credentials {
        Credentials::new("AKIA123", "secret", None)
    }

    #[test]
    fn report_config_requires_provider_and_credentials() {
        let mut store = ReportStore::new();
        assert!(store.report_config().is_none());

        store.set_provider(CloudProvider::Aws);
        assert!(store.report_config().is_none());

        store.set_credentials(creds()).unwrap();
        let config = store.report_config().expect("ready once both are set");
        assert!(config.instances.is_empty());
        assert_eq!(config.provider, CloudProvider::Aws);
    }

    #[test]
    fn credentials_without_key_or_secret_are_rejected() {
        let mut store = ReportStore::new();
        let err = store.set_credentials(Credentials::new("", "secret", None)).unwrap_err();
        assert!(matches!(err, InsightsError::Validation(_)));
        assert!(store.set_credentials(Credentials::new("AKIA", "", None)).is_err());
        assert!(store.credentials().is_none());
    }

    #[test]
    fn toggle_changes_only_matching_instance() {
        let mut store = ReportStore::new();
        store.set_instances(vec![instance("i-1", false), instance("i-2", false)]).unwrap();
        store.toggle_instance_selection("i-2").unwrap();
        assert!(!store.instances()[0].selected);
        assert!(store.instances()[1].selected);
    }

    #[test]
    fn toggle_unknown_id_is_not_found() {
        let mut store = ReportStore::new();
        store.set_instances(vec![instance("i-1", false)]).unwrap();
        let err = store.toggle_instance_selection("i-9").unwrap_err();
        assert!(matches!(err, InsightsError::NotFound { kind: "instance", .. }));
    }

    #[test]
    fn select_all_does_not_cross_lists() {
        let mut store = ReportStore::new();
        store.set_instances(vec![instance("i-1", false), instance("i-2", false)]).unwrap();
        store.set_rds_instances(vec![database("db-1", false)]).unwrap();

        store.select_all_instances(true);
        assert!(store.all_instances_selected());
        assert!(!store.all_rds_instances_selected());

        store.select_all_instances(false);
        assert!(store.selected_instances().is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = ReportStore::new();
        let err = store
            .set_instances(vec![instance("i-1", false), instance("i-1", true)])
            .unwrap_err();
        assert!(matches!(err, InsightsError::Validation(_)));
        assert!(store.instances().is_empty());
    }

    #[test]
    fn reset_restores_initial_values() {
        let mut store = ReportStore::new();
        store.set_provider(CloudProvider::Azure);
        store.set_report_type(ReportType::Billing);
        store.set_credentials(creds()).unwrap();
        store.set_instances(vec![instance("i-1", true)]).unwrap();
        store.set_rds_instances(vec![database("db-1", true)]).unwrap();
        store.set_frequency(ReportFrequency::Monthly);
        store.set_billing_period(BillingPeriod::new(2025, 3).unwrap());

        store.reset_report();

        assert_eq!(store.provider(), None);
        assert_eq!(store.report_type(), None);
        assert!(store.credentials().is_none());
        assert!(store.instances().is_empty());
        assert!(store.rds_instances().is_empty());
        assert_eq!(store.frequency(), ReportFrequency::Daily);
        assert_eq!(store.billing_period(), None);
        assert!(store.report_config().is_none());
        assert!(!store.has_selection());
    }

    #[test]
    fn stale_inventory_is_discarded_after_reset() {
        let mut store = ReportStore::new();
        store.set_provider(CloudProvider::Aws);
        store.set_credentials(creds()).unwrap();
        let issued_at = store.generation();

        store.reset_report();

        let inventory = Inventory {
            instances:     vec![instance("i-1", false)],
            rds_instances: vec![],
        };
        assert_eq!(store.apply_inventory(issued_at, inventory).unwrap(), Applied::Discarded);
        assert!(store.instances().is_empty());
    }

    #[test]
    fn current_inventory_is_applied() {
        let mut store = ReportStore::new();
        store.set_provider(CloudProvider::Aws);
        store.set_credentials(creds()).unwrap();
        let inventory = Inventory {
            instances:     vec![instance("i-1", false)],
            rds_instances: vec![database("db-1", false)],
        };
        let issued_at = store.generation();
        assert_eq!(store.apply_inventory(issued_at, inventory).unwrap(), Applied::Applied);
        assert_eq!(store.instances().len(), 1);
        assert_eq!(store.rds_instances().len(), 1);
    }

    #[test]
    fn generation_readiness_per_report_type() {
        let mut store = ReportStore::new();
        store.set_provider(CloudProvider::Aws);
        store.set_credentials(creds()).unwrap();
        store.set_report_type(ReportType::Utilization);
        store.set_instances(vec![instance("i-1", false)]).unwrap();
        assert!(store.check_ready_for_generation().is_err());

        store.toggle_instance_selection("i-1").unwrap();
        assert!(store.check_ready_for_generation().is_ok());

        store.set_report_type(ReportType::Billing);
        assert!(store.check_ready_for_generation().is_err());
        store.set_billing_period(BillingPeriod::new(2025, 3).unwrap());
        assert!(store.check_ready_for_generation().is_ok());
    }
}
