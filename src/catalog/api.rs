use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{Inventory, InstanceSource};
use crate::error::{InsightsError, Result};
use crate::model::{
    CloudProvider, Credentials, DataOrigin, Instance, RdsInstance, ReportConfig, ReportFrequency,
};

// ======================================================
// WIRE TYPES
// ======================================================

#[derive(Serialize)]
struct ValidateRequest<'a> {
    provider: CloudProvider,
    #[serde(flatten)]
    credentials: &'a Credentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstancesResponse {
    #[serde(alias = "instances", default)]
    ec2_instances: Vec<Instance>,
    #[serde(default)]
    rds_instances: Vec<RdsInstance>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct SelectedResource {
    pub id:     String,
    pub name:   String,
    #[serde(rename = "type")]
    pub kind:   String,
    pub state:  String,
    pub region: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    provider:           CloudProvider,
    credentials:        &'a Credentials,
    selected_instances: Vec<SelectedResource>,
    frequency:          ReportFrequency,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

// ======================================================
// API SOURCE
// ======================================================

/// Client of the report backend (`/validate-credentials`, `/instances`,
/// `/generate-report`). Every call is bounded by the configured timeout.
pub struct ApiSource {
    base_url: String,
    client:   reqwest::Client,
}

impl ApiSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| InsightsError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(ApiSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = self.endpoint(path);
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(%url, status = status.as_u16(), "backend returned failure status");
        Err(api_error(status.as_u16(), &body))
    }

    /// Ask the backend to render the report itself. The response is the PDF.
    pub async fn generate_report(&self, config: &ReportConfig) -> Result<Vec<u8>> {
        let selected = selected_resources(config);
        if selected.is_empty() {
            return Err(InsightsError::validation("No instances selected"));
        }

        let request = GenerateRequest {
            provider:           config.provider,
            credentials:        &config.credentials,
            selected_instances: selected,
            frequency:          config.frequency,
        };

        let response = self.post("/generate-report", &request).await?;
        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        let bytes = response.bytes().await.map_err(transport_error)?;

        if is_json {
            let body = String::from_utf8_lossy(&bytes);
            return Err(api_error(status, &body));
        }
        if bytes.is_empty() {
            return Err(InsightsError::Api {
                status,
                detail: "The report service returned an empty document".to_string(),
            });
        }

        info!(bytes = bytes.len(), "remote report received");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl InstanceSource for ApiSource {
    fn origin(&self) -> DataOrigin {
        DataOrigin::Live
    }

    fn describe(&self) -> String {
        format!("report service at {}", self.base_url)
    }

    async fn validate_credentials(
        &self,
        provider: CloudProvider,
        credentials: &Credentials,
    ) -> Result<()> {
        let request = ValidateRequest { provider, credentials };
        self.post("/validate-credentials", &request).await?;
        info!(%provider, "credentials validated by backend");
        Ok(())
    }

    async fn fetch_inventory(
        &self,
        provider: CloudProvider,
        credentials: &Credentials,
    ) -> Result<Inventory> {
        let request = ValidateRequest { provider, credentials };
        let response = self.post("/instances", &request).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;

        let parsed: InstancesResponse = serde_json::from_str(&body).map_err(|e| {
            InsightsError::Api {
                status,
                detail: format!("Unexpected instance list from the report service: {}", e),
            }
        })?;

        let inventory = Inventory {
            instances:     parsed.ec2_instances,
            rds_instances: parsed.rds_instances,
        }
        .unselected();

        info!(
            instances = inventory.instances.len(),
            databases = inventory.rds_instances.len(),
            "inventory fetched"
        );
        Ok(inventory)
    }
}

// ======================================================
// HELPERS
// ======================================================

/// Selected compute and database resources in the shape the backend expects.
/// Database engines travel in the `type` column.
pub fn selected_resources(config: &ReportConfig) -> Vec<SelectedResource> {
    let compute = config.selected_instances().into_iter().map(|i| SelectedResource {
        id:     i.id.clone(),
        name:   i.name.clone(),
        kind:   i.instance_type.clone(),
        state:  i.state.to_string(),
        region: i.region.clone(),
    });
    let databases = config.selected_rds_instances().into_iter().map(|d| SelectedResource {
        id:     d.id.clone(),
        name:   d.name.clone(),
        kind:   d.engine.clone(),
        state:  d.state.to_string(),
        region: d.region.clone(),
    });
    compute.chain(databases).collect()
}

fn transport_error(err: reqwest::Error) -> InsightsError {
    if err.is_timeout() {
        InsightsError::Network(format!("request timed out: {}", err))
    } else if err.is_connect() {
        InsightsError::Network(format!("connection failed: {}", err))
    } else {
        InsightsError::Network(err.to_string())
    }
}

/// Build an API error from a failure body, preferring its `detail` field.
fn api_error(status: u16, body: &str) -> InsightsError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or_default();

    InsightsError::Api { status, detail }
}
