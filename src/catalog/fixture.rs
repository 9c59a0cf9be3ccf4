use async_trait::async_trait;
use tracing::debug;

use super::{Inventory, InstanceSource};
use crate::error::{InsightsError, Result};
use crate::model::{
    CloudProvider, Credentials, DataOrigin, DatabaseState, Instance, InstanceState, RdsInstance,
};

// ======================================================
// FIXTURE SOURCE
// ======================================================

/// Deterministic sample inventory. Accepts any non-empty credentials.
#[derive(Debug, Default, Clone)]
pub struct FixtureSource;

impl FixtureSource {
    pub fn new() -> Self {
        FixtureSource
    }
}

#[async_trait]
impl InstanceSource for FixtureSource {
    fn origin(&self) -> DataOrigin {
        DataOrigin::Sample
    }

    fn describe(&self) -> String {
        "built-in sample inventory".to_string()
    }

    async fn validate_credentials(
        &self,
        provider: CloudProvider,
        credentials: &Credentials,
    ) -> Result<()> {
        if credentials.access_key_id.trim().is_empty() || credentials.secret_access_key.is_empty() {
            return Err(InsightsError::validation(
                "Access key ID and secret access key are required",
            ));
        }
        debug!(%provider, "sample source accepted credentials");
        Ok(())
    }

    async fn fetch_inventory(
        &self,
        provider: CloudProvider,
        _credentials: &Credentials,
    ) -> Result<Inventory> {
        Ok(sample_inventory(provider))
    }
}

// ======================================================
// SAMPLE DATA
// ======================================================

fn vm(id: &str, name: &str, kind: &str, region: &str, state: InstanceState) -> Instance {
    Instance {
        id:            id.to_string(),
        name:          name.to_string(),
        instance_type: kind.to_string(),
        region:        region.to_string(),
        state,
        selected:      false,
    }
}

fn db(id: &str, name: &str, engine: &str, region: &str, state: DatabaseState) -> RdsInstance {
    RdsInstance {
        id:       id.to_string(),
        name:     name.to_string(),
        engine:   engine.to_string(),
        region:   region.to_string(),
        state,
        selected: false,
    }
}

pub fn sample_inventory(provider: CloudProvider) -> Inventory {
    use DatabaseState::{Available, Stopped as DbStopped};
    use InstanceState::{Running, Stopped};

    match provider {
        CloudProvider::Aws => Inventory {
            instances: vec![
                vm("i-0123456789abcdef0", "Production Web Server", "t3.medium", "us-west-2", Running),
                vm("i-0123456789abcdef1", "Development Server", "t2.micro", "us-east-1", Running),
                vm("i-0123456789abcdef2", "Staging Environment", "t3.large", "eu-west-1", Stopped),
                vm("i-0123456789abcdef3", "Database Backup Server", "m5.large", "ap-southeast-1", Running),
            ],
            rds_instances: vec![
                db("db-0123456789abcdef0", "Production Database", "PostgreSQL", "us-west-2", Available),
                db("db-0123456789abcdef1", "Development Database", "MySQL", "us-east-1", Available),
                db("db-0123456789abcdef2", "Reporting Database", "Aurora", "eu-west-1", DbStopped),
            ],
        },
        CloudProvider::Azure => Inventory {
            instances: vec![
                vm("vm-0123456789abcdef0", "Azure Production Server", "Standard_D2s_v3", "westus2", Running),
                vm("vm-0123456789abcdef1", "Azure Development VM", "Standard_B2s", "eastus", Running),
                vm("vm-0123456789abcdef2", "Azure Test Environment", "Standard_D4s_v3", "northeurope", Stopped),
            ],
            rds_instances: vec![
                db("sqldb-0123456789abcdef0", "Azure SQL Production", "SQL Server", "westus2", Available),
                db("sqldb-0123456789abcdef1", "Azure SQL Development", "SQL Server", "eastus", Available),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::duplicate_id;

    #[tokio::test]
    async fn sample_inventory_is_unselected_and_unique() {
        let source = FixtureSource::new();
        let creds = Credentials::new("AKIA", "secret", None);
        for provider in [CloudProvider::Aws, CloudProvider::Azure] {
            let inv = source.fetch_inventory(provider, &creds).await.unwrap();
            assert!(!inv.is_empty());
            assert!(inv.instances.iter().all(|i| !i.selected));
            assert!(inv.rds_instances.iter().all(|i| !i.selected));
            assert_eq!(duplicate_id(&inv.instances), None);
            assert_eq!(duplicate_id(&inv.rds_instances), None);
        }
    }

    #[tokio::test]
    async fn empty_secret_fails_validation() {
        let source = FixtureSource::new();
        let creds = Credentials::new("AKIA", "", None);
        let err = source.validate_credentials(CloudProvider::Aws, &creds).await.unwrap_err();
        assert!(matches!(err, InsightsError::Validation(_)));
    }

    #[test]
    fn fixture_is_labelled_as_sample() {
        assert_eq!(FixtureSource::new().origin(), DataOrigin::Sample);
    }
}
