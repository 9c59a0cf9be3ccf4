use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InsightsError;

// ======================================================
// PROVIDER
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Azure,
}

impl CloudProvider {
    pub fn display_name(&self) -> &'static str {
        match self {
            CloudProvider::Aws   => "Amazon Web Services",
            CloudProvider::Azure => "Microsoft Azure",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            CloudProvider::Aws   => "AWS",
            CloudProvider::Azure => "Azure",
        }
    }

    /// Heading for the compute list in this provider's vocabulary.
    pub fn compute_label(&self) -> &'static str {
        match self {
            CloudProvider::Aws   => "EC2 Instances",
            CloudProvider::Azure => "Virtual Machines",
        }
    }

    pub fn database_label(&self) -> &'static str {
        match self {
            CloudProvider::Aws   => "RDS Instances",
            CloudProvider::Azure => "Databases",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudProvider::Aws   => write!(f, "aws"),
            CloudProvider::Azure => write!(f, "azure"),
        }
    }
}

impl FromStr for CloudProvider {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws"   => Ok(CloudProvider::Aws),
            "azure" => Ok(CloudProvider::Azure),
            other   => Err(InsightsError::validation(format!(
                "Unknown cloud provider '{}'. Supported: aws, azure",
                other
            ))),
        }
    }
}

// ======================================================
// REPORT TYPE / FREQUENCY
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Utilization,
    Billing,
}

impl ReportType {
    pub fn category_label(&self) -> &'static str {
        match self {
            ReportType::Utilization => "Resource Utilization",
            ReportType::Billing     => "Billing Summary",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportType::Utilization => write!(f, "utilization"),
            ReportType::Billing     => write!(f, "billing"),
        }
    }
}

impl FromStr for ReportType {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utilization" => Ok(ReportType::Utilization),
            "billing"     => Ok(ReportType::Billing),
            other         => Err(InsightsError::validation(format!(
                "Unknown report type '{}'. Supported: utilization, billing",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl ReportFrequency {
    pub fn label(&self) -> &'static str {
        match self {
            ReportFrequency::Daily   => "Daily",
            ReportFrequency::Weekly  => "Weekly",
            ReportFrequency::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for ReportFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFrequency::Daily   => write!(f, "daily"),
            ReportFrequency::Weekly  => write!(f, "weekly"),
            ReportFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for ReportFrequency {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily"   => Ok(ReportFrequency::Daily),
            "weekly"  => Ok(ReportFrequency::Weekly),
            "monthly" => Ok(ReportFrequency::Monthly),
            other     => Err(InsightsError::validation(format!(
                "Unknown frequency '{}'. Supported: daily, weekly, monthly",
                other
            ))),
        }
    }
}

// ======================================================
// BILLING PERIOD
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub year:  u16,
    pub month: u8,
}

impl BillingPeriod {
    pub fn new(year: u16, month: u8) -> Result<Self, InsightsError> {
        if !(1..=12).contains(&month) {
            return Err(InsightsError::validation(format!(
                "Month must be between 01 and 12, got {}",
                month
            )));
        }
        if !(2000..=9999).contains(&year) {
            return Err(InsightsError::validation(format!(
                "Year must be a four digit year, got {}",
                year
            )));
        }
        Ok(BillingPeriod { year, month })
    }

    /// Parse the form values as typed, e.g. ("2025", "03").
    pub fn parse(year: &str, month: &str) -> Result<Self, InsightsError> {
        let y = year.trim().parse::<u16>().map_err(|_| {
            InsightsError::validation(format!("Invalid year '{}'", year.trim()))
        })?;
        let m = month.trim().parse::<u8>().map_err(|_| {
            InsightsError::validation(format!("Invalid month '{}'", month.trim()))
        })?;
        BillingPeriod::new(y, m)
    }

    pub fn year_label(&self) -> String {
        format!("{:04}", self.year)
    }

    pub fn month_label(&self) -> String {
        format!("{:02}", self.month)
    }

    pub fn month_name(&self) -> &'static str {
        const NAMES: [&str; 12] = [
            "January", "February", "March", "April", "May", "June",
            "July", "August", "September", "October", "November", "December",
        ];
        NAMES[(self.month as usize).saturating_sub(1) % 12]
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ======================================================
// CREDENTIALS
// ======================================================

/// Cloud credentials as entered by the user. Held in memory only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_key_id:     String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id:        Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: &str, secret_access_key: &str, account_id: Option<&str>) -> Self {
        Credentials {
            access_key_id:     access_key_id.trim().to_owned(),
            secret_access_key: secret_access_key.to_owned(),
            account_id:        account_id
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_owned),
        }
    }
}

// The secret never reaches a log line or a panic message.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"****")
            .field("account_id", &self.account_id)
            .finish()
    }
}

// ======================================================
// RESOURCES
// ======================================================

/// Lifecycle state of a compute resource. States outside the tracked set
/// (`stopping`, `shutting-down`, `deallocated`, ...) become `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Running,
    Stopped,
    Terminated,
    Pending,
    Unknown,
}

impl InstanceState {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "running"    => InstanceState::Running,
            "stopped"    => InstanceState::Stopped,
            "terminated" => InstanceState::Terminated,
            "pending"    => InstanceState::Pending,
            _            => InstanceState::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for InstanceState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(InstanceState::from_label(&label))
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Running    => write!(f, "running"),
            InstanceState::Stopped    => write!(f, "stopped"),
            InstanceState::Terminated => write!(f, "terminated"),
            InstanceState::Pending    => write!(f, "pending"),
            InstanceState::Unknown    => write!(f, "unknown"),
        }
    }
}

/// Lifecycle state of a managed database; unrecognised states become `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseState {
    Available,
    Stopped,
    Creating,
    Deleting,
    Unknown,
}

impl DatabaseState {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "available" => DatabaseState::Available,
            "stopped"   => DatabaseState::Stopped,
            "creating"  => DatabaseState::Creating,
            "deleting"  => DatabaseState::Deleting,
            _           => DatabaseState::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for DatabaseState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(DatabaseState::from_label(&label))
    }
}

impl fmt::Display for DatabaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseState::Available => write!(f, "available"),
            DatabaseState::Stopped   => write!(f, "stopped"),
            DatabaseState::Creating  => write!(f, "creating"),
            DatabaseState::Deleting  => write!(f, "deleting"),
            DatabaseState::Unknown   => write!(f, "unknown"),
        }
    }
}

/// A compute resource (EC2 instance, Azure VM).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id:            String,
    pub name:          String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub region:        String,
    pub state:         InstanceState,
    #[serde(default)]
    pub selected:      bool,
}

/// A managed database resource (RDS instance, Azure SQL database).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdsInstance {
    pub id:       String,
    pub name:     String,
    pub engine:   String,
    pub region:   String,
    pub state:    DatabaseState,
    #[serde(default)]
    pub selected: bool,
}

// ======================================================
// DATA ORIGIN
// ======================================================

/// Where a list or a metric series came from. Sample data is always labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Sample,
    Live,
}

impl DataOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            DataOrigin::Sample => "SAMPLE DATA (not real telemetry)",
            DataOrigin::Live   => "Live data",
        }
    }
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Sample => write!(f, "sample"),
            DataOrigin::Live   => write!(f, "live"),
        }
    }
}

impl FromStr for DataOrigin {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sample" | "mock" | "fixture" => Ok(DataOrigin::Sample),
            "live" | "api"                => Ok(DataOrigin::Live),
            other => Err(InsightsError::validation(format!(
                "Unknown data source '{}'. Supported: sample, live",
                other
            ))),
        }
    }
}

// ======================================================
// REPORT CONFIG (read-only snapshot)
// ======================================================

/// Finalized snapshot of a session, handed to the document assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    pub provider:       CloudProvider,
    pub report_type:    Option<ReportType>,
    pub credentials:    Credentials,
    pub instances:      Vec<Instance>,
    pub rds_instances:  Vec<RdsInstance>,
    pub frequency:      ReportFrequency,
    pub billing_period: Option<BillingPeriod>,
}

impl ReportConfig {
    pub fn selected_instances(&self) -> Vec<&Instance> {
        crate::selection::selected(&self.instances)
    }

    pub fn selected_rds_instances(&self) -> Vec<&RdsInstance> {
        crate::selection::selected(&self.rds_instances)
    }

    /// Account id when given, provider short name otherwise.
    pub fn owner_label(&self) -> String {
        self.credentials
            .account_id
            .clone()
            .unwrap_or_else(|| self.provider.to_string())
    }
}
