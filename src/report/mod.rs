//! Report document assembly.
//!
//! `build_document` turns a finalized `ReportConfig` into a `ReportDocument`.
//! The JSON and PDF renderers both walk that same structure.

pub mod billing;
pub mod metrics;
pub mod output;
pub mod pdf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InsightsError, Result};
use crate::model::{DataOrigin, ReportConfig, ReportType};

pub use billing::BillingSection;
pub use metrics::MetricsSection;
pub use output::{report_filename, write_atomic};
pub use pdf::render_pdf;

// ======================================================
// REPORT DATA MODEL
// ======================================================

/// Sections in the order they are rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub cover:     Cover,
    pub compute:   ResourceTable,
    /// Present only when at least one database is selected.
    pub databases: Option<ResourceTable>,
    pub billing:   Option<BillingSection>,
    pub metrics:   Option<MetricsSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cover {
    pub provider:           String,
    pub category:           String,
    pub report_type:        ReportType,
    pub generated_at:       String,
    pub generated_at_human: String,
    pub account_id:         Option<String>,
    /// "Frequency: Weekly" or "Billing period: 2025-03"
    pub scope:              String,
    pub inventory_origin:   DataOrigin,
    pub origin_note:        String,
    pub report_id:          String,
    pub app_version:        String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTable {
    pub title:      String,
    pub columns:    Vec<String>,
    pub rows:       Vec<Vec<String>>,
    /// Shown in place of the rows when there are none.
    pub empty_note: String,
}

impl ResourceTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of every row.
    pub fn ids(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|r| r.first().map(String::as_str))
            .collect()
    }
}

/// Values fixed at the moment generation starts.
#[derive(Debug, Clone)]
pub struct AssemblyContext {
    pub generated_at: DateTime<Utc>,
    /// Where the resource lists came from.
    pub origin:       DataOrigin,
    pub report_id:    String,
}

impl AssemblyContext {
    pub fn new(origin: DataOrigin) -> Self {
        AssemblyContext {
            generated_at: Utc::now(),
            origin,
            report_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

// ======================================================
// BUILD
// ======================================================

pub fn build_document(config: &ReportConfig, ctx: &AssemblyContext) -> Result<ReportDocument> {
    let report_type = config
        .report_type
        .ok_or_else(|| InsightsError::validation("Select a report type first"))?;

    let scope = match report_type {
        ReportType::Utilization => format!("Frequency: {}", config.frequency.label()),
        ReportType::Billing => {
            let period = config.billing_period.ok_or_else(|| {
                InsightsError::validation("Select a billing period before generating the report")
            })?;
            format!("Billing period: {} {}", period.month_name(), period)
        }
    };

    let cover = Cover {
        provider:           config.provider.display_name().to_string(),
        category:           report_type.category_label().to_string(),
        report_type,
        generated_at:       ctx.generated_at.to_rfc3339(),
        generated_at_human: ctx.generated_at.format("%d %B %Y, %H:%M UTC").to_string(),
        account_id:         config.credentials.account_id.clone(),
        scope,
        inventory_origin:   ctx.origin,
        origin_note:        match ctx.origin {
            DataOrigin::Sample => "Resource lists come from the built-in sample inventory.".to_string(),
            DataOrigin::Live   => "Resource lists come from the report service.".to_string(),
        },
        report_id:          ctx.report_id.clone(),
        app_version:        env!("CARGO_PKG_VERSION").to_string(),
    };

    let compute = ResourceTable {
        title:      config.provider.compute_label().to_string(),
        columns:    columns(&["Instance ID", "Name", "Type", "Region", "State"]),
        rows:       config
            .selected_instances()
            .into_iter()
            .map(|i| {
                vec![
                    i.id.clone(),
                    i.name.clone(),
                    i.instance_type.clone(),
                    i.region.clone(),
                    i.state.to_string(),
                ]
            })
            .collect(),
        empty_note: format!("No {} selected.", config.provider.compute_label().to_lowercase()),
    };

    let selected_dbs = config.selected_rds_instances();
    let databases = if selected_dbs.is_empty() {
        None
    } else {
        Some(ResourceTable {
            title:      config.provider.database_label().to_string(),
            columns:    columns(&["Instance ID", "Name", "Engine", "Region", "State"]),
            rows:       selected_dbs
                .into_iter()
                .map(|d| {
                    vec![
                        d.id.clone(),
                        d.name.clone(),
                        d.engine.clone(),
                        d.region.clone(),
                        d.state.to_string(),
                    ]
                })
                .collect(),
            empty_note: String::new(),
        })
    };

    let (billing, metrics) = match report_type {
        ReportType::Billing => (
            config
                .billing_period
                .map(|p| billing::sample_billing(config.provider, p)),
            None,
        ),
        ReportType::Utilization => (None, Some(metrics::sample_metrics(config.frequency))),
    };

    Ok(ReportDocument { cover, compute, databases, billing, metrics })
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// ======================================================
// JSON OUTPUT
// ======================================================

pub fn render_json(document: &ReportDocument) -> Result<String> {
    serde_json::to_string_pretty(document)
        .map_err(|e| InsightsError::Render(format!("JSON serialisation failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BillingPeriod, CloudProvider, Credentials, DatabaseState, Instance, InstanceState,
        RdsInstance, ReportFrequency,
    };

    fn config(report_type: ReportType) -> ReportConfig {
        ReportConfig {
            provider:       CloudProvider::Aws,
            report_type:    Some(report_type),
            credentials:    Credentials::new("AKIA...", "secret", None),
            instances:      Vec::new(),
            rds_instances:  Vec::new(),
            frequency:      ReportFrequency::Daily,
            billing_period: None,
        }
    }

    fn instance(id: &str, selected: bool) -> Instance {
        Instance {
            id:            id.into(),
            name:          format!("{}-name", id),
            instance_type: "t3.micro".into(),
            region:        "us-east-1".into(),
            state:         InstanceState::Running,
            selected,
        }
    }

    fn ctx() -> AssemblyContext {
        AssemblyContext::new(DataOrigin::Sample)
    }

    #[test]
    fn billing_scenario_shows_period_and_exact_total() {
        let mut cfg = config(ReportType::Billing);
        cfg.billing_period = Some(BillingPeriod::parse("2025", "03").unwrap());

        let doc = build_document(&cfg, &ctx()).unwrap();
        let billing = doc.billing.expect("billing section");
        assert_eq!(billing.year, "2025");
        assert_eq!(billing.month, "03");
        assert_eq!(billing.total_cents, billing.items_sum());
        assert!(doc.metrics.is_none());
        assert_eq!(doc.cover.category, "Billing Summary");
    }

    #[test]
    fn single_selected_instance_and_no_database_table() {
        let mut cfg = config(ReportType::Utilization);
        cfg.instances = vec![instance("i-1", true)];

        let doc = build_document(&cfg, &ctx()).unwrap();
        assert_eq!(doc.compute.ids(), vec!["i-1"]);
        assert!(doc.databases.is_none());
        assert!(doc.billing.is_none());
        assert_eq!(doc.metrics.unwrap().charts.len(), 3);
    }

    #[test]
    fn rows_follow_store_order_and_skip_unselected() {
        let mut cfg = config(ReportType::Utilization);
        cfg.instances = vec![instance("i-c", true), instance("i-a", false), instance("i-b", true)];
        cfg.rds_instances = vec![RdsInstance {
            id:       "db-1".into(),
            name:     "orders".into(),
            engine:   "PostgreSQL".into(),
            region:   "us-east-1".into(),
            state:    DatabaseState::Available,
            selected: true,
        }];

        let doc = build_document(&cfg, &ctx()).unwrap();
        assert_eq!(doc.compute.ids(), vec!["i-c", "i-b"]);
        let dbs = doc.databases.unwrap();
        assert_eq!(dbs.columns[2], "Engine");
        assert_eq!(dbs.ids(), vec!["db-1"]);
    }

    #[test]
    fn billing_without_period_is_a_validation_error() {
        let err = build_document(&config(ReportType::Billing), &ctx()).unwrap_err();
        assert!(matches!(err, InsightsError::Validation(_)));
    }

    #[test]
    fn cover_carries_account_and_origin() {
        let mut cfg = config(ReportType::Utilization);
        cfg.credentials = Credentials::new("AKIA", "secret", Some("123456789012"));
        cfg.instances = vec![instance("i-1", true)];

        let doc = build_document(&cfg, &AssemblyContext::new(DataOrigin::Live)).unwrap();
        assert_eq!(doc.cover.account_id.as_deref(), Some("123456789012"));
        assert_eq!(doc.cover.inventory_origin, DataOrigin::Live);
        assert_eq!(doc.cover.scope, "Frequency: Daily");
        assert_eq!(doc.cover.report_id.len(), 36);
    }

    #[test]
    fn json_output_never_contains_the_secret() {
        let mut cfg = config(ReportType::Utilization);
        cfg.credentials = Credentials::new("AKIA", "hunter2-secret", None);
        cfg.instances = vec![instance("i-1", true)];

        let json = render_json(&build_document(&cfg, &ctx()).unwrap()).unwrap();
        assert!(json.contains("\"i-1\""));
        assert!(!json.contains("hunter2-secret"));
    }
}
