//! Instance discovery and credential validation.
//!
//! The wizard talks to one `InstanceSource`. `FixtureSource` serves a fixed
//! sample inventory; `ApiSource` calls the report backend. The active source
//! reports its `DataOrigin` so sample data is never presented as live.

pub mod api;
pub mod fixture;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ResolvedConfig;
use crate::error::Result;
use crate::model::{CloudProvider, Credentials, DataOrigin, Instance, RdsInstance};

pub use api::ApiSource;
pub use fixture::FixtureSource;

// ======================================================
// INVENTORY
// ======================================================

/// Resources available to an account, every entry unselected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub instances:     Vec<Instance>,
    pub rds_instances: Vec<RdsInstance>,
}

impl Inventory {
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.rds_instances.is_empty()
    }

    /// Force every selection flag off, as discovery results start unselected.
    pub fn unselected(mut self) -> Self {
        crate::selection::select_all(&mut self.instances, false);
        crate::selection::select_all(&mut self.rds_instances, false);
        self
    }
}

// ======================================================
// SOURCE TRAIT
// ======================================================

#[async_trait]
pub trait InstanceSource: Send + Sync {
    fn origin(&self) -> DataOrigin;

    /// Human readable description, e.g. the backend URL.
    fn describe(&self) -> String;

    async fn validate_credentials(
        &self,
        provider: CloudProvider,
        credentials: &Credentials,
    ) -> Result<()>;

    async fn fetch_inventory(
        &self,
        provider: CloudProvider,
        credentials: &Credentials,
    ) -> Result<Inventory>;
}

/// Build the source selected by configuration.
pub fn source_for(config: &ResolvedConfig) -> Result<Box<dyn InstanceSource>> {
    match config.data_source {
        DataOrigin::Sample => Ok(Box::new(FixtureSource::new())),
        DataOrigin::Live   => Ok(Box::new(ApiSource::new(&config.api_url, config.api_timeout)?)),
    }
}
