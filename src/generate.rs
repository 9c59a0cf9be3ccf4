use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::{ApiSource, InstanceSource};
use crate::error::{InsightsError, Result};
use crate::model::{
    BillingPeriod, CloudProvider, Credentials, DataOrigin, ReportConfig, ReportFrequency,
    ReportType,
};
use crate::report::{
    build_document, render_json, render_pdf, report_filename, write_atomic, AssemblyContext,
};
use crate::wizard::{Action, Step, Ticket, Transition, Wizard};

// ======================================================
// OPTIONS
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Pdf,
    Json,
    Both,
}

impl OutputFormat {
    pub fn wants_pdf(&self) -> bool {
        matches!(self, OutputFormat::Pdf | OutputFormat::Both)
    }

    pub fn wants_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Pdf  => write!(f, "pdf"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Both => write!(f, "both"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf"  => Ok(OutputFormat::Pdf),
            "json" => Ok(OutputFormat::Json),
            "both" => Ok(OutputFormat::Both),
            other  => Err(InsightsError::validation(format!(
                "Unknown format '{}'. Supported: pdf, json, both",
                other
            ))),
        }
    }
}

/// Where the PDF comes from.
pub enum Renderer {
    Local,
    /// `POST /generate-report` on the report service.
    Remote(ApiSource),
}

pub struct GenerateOptions {
    pub output_dir: PathBuf,
    pub format:     OutputFormat,
    /// Simulated processing time before rendering starts.
    pub delay:      Duration,
    pub renderer:   Renderer,
    /// Origin of the resource lists, printed on the cover.
    pub origin:     DataOrigin,
}

// ======================================================
// RESULTS
// ======================================================

pub struct Artifact {
    pub file_name: String,
    pub bytes:     Vec<u8>,
}

/// Fully rendered output, not yet written.
pub struct RenderedReport {
    pub report_id: String,
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReport {
    pub report_id: String,
    pub paths:     Vec<PathBuf>,
}

// ======================================================
// PHASES
// ======================================================

/// Check the generation preconditions and claim the in-flight slot.
pub fn prepare(wizard: &mut Wizard) -> Result<(Ticket, ReportConfig)> {
    let config = wizard.store().check_ready_for_generation()?;
    let ticket = wizard.begin(Action::GenerateReport)?;
    Ok((ticket, config))
}

/// Render every requested artifact from an immutable snapshot.
/// Nothing touches the filesystem here.
pub async fn render(config: ReportConfig, options: &GenerateOptions) -> Result<RenderedReport> {
    tokio::time::sleep(options.delay).await;

    let ctx = AssemblyContext::new(options.origin);
    let report_id = ctx.report_id.clone();

    let remote_pdf = match &options.renderer {
        Renderer::Remote(api) if options.format.wants_pdf() => {
            if config.report_type == Some(ReportType::Billing) {
                return Err(InsightsError::validation(
                    "The report service only generates utilization reports; render billing reports locally",
                ));
            }
            info!(url = %api.base_url(), "requesting remote report");
            Some(api.generate_report(&config).await?)
        }
        _ => None,
    };

    let format = options.format;
    let artifacts = tokio::task::spawn_blocking(move || -> Result<Vec<Artifact>> {
        let document = build_document(&config, &ctx)?;
        let mut artifacts = Vec::new();

        if format.wants_pdf() {
            let bytes = match remote_pdf {
                Some(bytes) => bytes,
                None        => render_pdf(&document)?,
            };
            artifacts.push(Artifact {
                file_name: report_filename(&config, &ctx.generated_at, "pdf"),
                bytes,
            });
        }
        if format.wants_json() {
            artifacts.push(Artifact {
                file_name: report_filename(&config, &ctx.generated_at, "json"),
                bytes:     render_json(&document)?.into_bytes(),
            });
        }
        Ok(artifacts)
    })
    .await
    .map_err(|e| InsightsError::Render(format!("Rendering task failed: {}", e)))??;

    Ok(RenderedReport { report_id, artifacts })
}

/// Release the in-flight slot and write the artifacts if the session is
/// still the one that requested them. `Ok(None)` means the result was stale.
pub fn complete(
    wizard: &mut Wizard,
    ticket: Ticket,
    rendered: Result<RenderedReport>,
    output_dir: &Path,
) -> Result<Option<GeneratedReport>> {
    let current = wizard.finish(ticket);
    let rendered = rendered?;

    if !current {
        info!(report_id = %rendered.report_id, "discarding report of a reset session");
        return Ok(None);
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for artifact in &rendered.artifacts {
        let path = output_dir.join(&artifact.file_name);
        if let Err(e) = write_atomic(&path, &artifact.bytes) {
            for written in &paths {
                if let Err(cleanup) = fs::remove_file(written) {
                    warn!(path = %written.display(), error = %cleanup, "could not remove partial output");
                }
            }
            return Err(e);
        }
        paths.push(path);
    }

    info!(report_id = %rendered.report_id, files = paths.len(), "report generated");
    Ok(Some(GeneratedReport { report_id: rendered.report_id, paths }))
}

/// Run all three phases against a wizard that is not shared with anyone else.
pub async fn run(wizard: &mut Wizard, options: &GenerateOptions) -> Result<Option<GeneratedReport>> {
    let (ticket, config) = prepare(wizard)?;
    let rendered = render(config, options).await;
    complete(wizard, ticket, rendered, &options.output_dir)
}

// ======================================================
// NON-INTERACTIVE RUN
// ======================================================

/// Everything the wizard would ask for, given up front.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub provider:       CloudProvider,
    pub report_type:    ReportType,
    pub credentials:    Credentials,
    pub frequency:      ReportFrequency,
    pub billing_period: Option<BillingPeriod>,
    pub instance_ids:   Vec<String>,
    pub database_ids:   Vec<String>,
    /// Select every discovered resource instead of listing ids.
    pub select_all:     bool,
}

/// Drive a wizard through the same steps and guards as an interactive session.
pub async fn run_batch(
    request: BatchRequest,
    source: &dyn InstanceSource,
    options: &GenerateOptions,
) -> Result<Option<GeneratedReport>> {
    if request.report_type == ReportType::Billing
        && (request.select_all || !request.instance_ids.is_empty() || !request.database_ids.is_empty())
    {
        return Err(InsightsError::validation(
            "--instance, --database and --all only apply to utilization reports",
        ));
    }

    let mut wizard = Wizard::default();
    let provider = request.provider;
    wizard.store_mut().set_provider(provider);
    wizard.store_mut().set_report_type(request.report_type);
    wizard.enter(Step::EnterCredentials);

    source.validate_credentials(provider, &request.credentials).await?;
    wizard.store_mut().set_credentials(request.credentials.clone())?;

    match request.report_type {
        ReportType::Utilization => {
            let ticket = wizard.begin(Action::FetchInventory)?;
            let requested_in = ticket.generation;
            let fetched = source.fetch_inventory(provider, &request.credentials).await;
            wizard.finish(ticket);
            wizard.store_mut().apply_inventory(requested_in, fetched?)?;

            let store = wizard.store_mut();
            if request.select_all {
                store.select_all_instances(true);
                store.select_all_rds_instances(true);
            }
            for id in &request.instance_ids {
                if !store.instances().iter().any(|i| &i.id == id && i.selected) {
                    store.toggle_instance_selection(id)?;
                }
            }
            for id in &request.database_ids {
                if !store.rds_instances().iter().any(|d| &d.id == id && d.selected) {
                    store.toggle_rds_instance_selection(id)?;
                }
            }
            store.set_frequency(request.frequency);
        }
        ReportType::Billing => {
            if let Some(period) = request.billing_period {
                wizard.store_mut().set_billing_period(period);
            }
        }
    }

    if let Transition::Redirected { landed, .. } = wizard.enter(Step::GenerateReport) {
        return Err(InsightsError::validation(match landed {
            Step::SelectInstances => {
                "Select at least one resource with --instance, --database or --all".to_string()
            }
            Step::SelectBillingPeriod => "Billing reports need --year and --month".to_string(),
            other => format!("Cannot generate yet: '{}' is incomplete", other),
        }));
    }

    run(&mut wizard, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FixtureSource;
    use crate::model::{Instance, InstanceState};
    use crate::store::ReportStore;

    fn options(dir: &Path, format: OutputFormat) -> GenerateOptions {
        GenerateOptions {
            output_dir: dir.to_path_buf(),
            format,
            delay:      Duration::from_millis(0),
            renderer:   Renderer::Local,
            origin:     DataOrigin::Sample,
        }
    }

    fn utilization_wizard(selected: bool) -> Wizard {
        let mut store = ReportStore::new();
        store.set_provider(CloudProvider::Aws);
        store.set_report_type(ReportType::Utilization);
        store.set_credentials(Credentials::new("AKIA", "secret", None)).unwrap();
        store
            .set_instances(vec![Instance {
                id:            "i-1".into(),
                name:          "web".into(),
                instance_type: "t3.micro".into(),
                region:        "us-east-1".into(),
                state:         InstanceState::Running,
                selected,
            }])
            .unwrap();
        Wizard::new(store)
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn both_formats_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut wizard = utilization_wizard(true);

        let report = run(&mut wizard, &options(dir.path(), OutputFormat::Both))
            .await
            .unwrap()
            .expect("current session");

        assert_eq!(report.paths.len(), 2);
        let pdf = fs::read(&report.paths[0]).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(report.paths[1].extension().unwrap() == "json");
        assert!(wizard.pending().is_none());
    }

    #[tokio::test]
    async fn billing_report_is_generated_locally() {
        let dir = tempfile::tempdir().unwrap();
        let mut wizard = utilization_wizard(false);
        wizard.store_mut().set_report_type(ReportType::Billing);
        wizard.store_mut().set_billing_period(BillingPeriod::new(2025, 3).unwrap());

        let report = run(&mut wizard, &options(dir.path(), OutputFormat::Pdf))
            .await
            .unwrap()
            .unwrap();
        let name = report.paths[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("aws-billing-2025-03-"));
    }

    #[tokio::test]
    async fn unmet_preconditions_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut wizard = utilization_wizard(false);

        let err = run(&mut wizard, &options(dir.path(), OutputFormat::Both)).await.unwrap_err();
        assert!(matches!(err, InsightsError::Validation(_)));
        assert!(files_in(dir.path()).is_empty());
        assert!(wizard.pending().is_none());
    }

    #[tokio::test]
    async fn second_trigger_while_pending_is_busy() {
        let mut wizard = utilization_wizard(true);
        let (_ticket, _config) = prepare(&mut wizard).unwrap();
        assert!(matches!(prepare(&mut wizard), Err(InsightsError::Busy)));
    }

    #[tokio::test]
    async fn result_for_a_reset_session_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut wizard = utilization_wizard(true);
        let opts = options(dir.path(), OutputFormat::Pdf);

        let (ticket, config) = prepare(&mut wizard).unwrap();
        let rendered = render(config, &opts).await;
        wizard.start_over();

        let outcome = complete(&mut wizard, ticket, rendered, dir.path()).unwrap();
        assert!(outcome.is_none());
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn render_failure_releases_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut wizard = utilization_wizard(true);
        let (ticket, _config) = prepare(&mut wizard).unwrap();

        let failed: Result<RenderedReport> = Err(InsightsError::Render("boom".into()));
        assert!(complete(&mut wizard, ticket, failed, dir.path()).is_err());
        assert!(wizard.pending().is_none());
        assert!(files_in(dir.path()).is_empty());
    }

    fn batch(report_type: ReportType) -> BatchRequest {
        BatchRequest {
            provider:       CloudProvider::Aws,
            report_type,
            credentials:    Credentials::new("AKIA", "secret", None),
            frequency:      ReportFrequency::Monthly,
            billing_period: None,
            instance_ids:   Vec::new(),
            database_ids:   Vec::new(),
            select_all:     false,
        }
    }

    #[tokio::test]
    async fn batch_selects_listed_resources() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = batch(ReportType::Utilization);
        request.instance_ids = vec!["i-0123456789abcdef0".into(), "i-0123456789abcdef0".into()];
        request.database_ids = vec!["db-0123456789abcdef1".into()];

        let report = run_batch(request, &FixtureSource::new(), &options(dir.path(), OutputFormat::Json))
            .await
            .unwrap()
            .unwrap();
        let json = fs::read_to_string(&report.paths[0]).unwrap();
        assert!(json.contains("i-0123456789abcdef0"));
        assert!(json.contains("db-0123456789abcdef1"));
        assert!(!json.contains("i-0123456789abcdef1"));
    }

    #[tokio::test]
    async fn batch_rejects_unknown_ids_and_empty_selection() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixtureSource::new();
        let opts = options(dir.path(), OutputFormat::Pdf);

        let mut unknown = batch(ReportType::Utilization);
        unknown.instance_ids = vec!["i-missing".into()];
        let err = run_batch(unknown, &source, &opts).await.unwrap_err();
        assert!(matches!(err, InsightsError::NotFound { .. }));

        let err = run_batch(batch(ReportType::Utilization), &source, &opts).await.unwrap_err();
        assert!(err.user_message().contains("--all"));

        let err = run_batch(batch(ReportType::Billing), &source, &opts).await.unwrap_err();
        assert!(err.user_message().contains("--year"));
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn batch_billing_rejects_resource_selection() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixtureSource::new();
        let opts = options(dir.path(), OutputFormat::Pdf);

        let mut with_all = batch(ReportType::Billing);
        with_all.billing_period = Some(BillingPeriod::new(2025, 3).unwrap());
        with_all.select_all = true;
        let err = run_batch(with_all, &source, &opts).await.unwrap_err();
        assert!(matches!(err, InsightsError::Validation(_)));
        assert!(err.user_message().contains("utilization"));

        let mut with_ids = batch(ReportType::Billing);
        with_ids.billing_period = Some(BillingPeriod::new(2025, 3).unwrap());
        with_ids.database_ids = vec!["db-0123456789abcdef1".into()];
        assert!(matches!(
            run_batch(with_ids, &source, &opts).await.unwrap_err(),
            InsightsError::Validation(_)
        ));
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn batch_select_all_covers_both_lists() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = batch(ReportType::Utilization);
        request.provider = CloudProvider::Azure;
        request.select_all = true;

        let report = run_batch(request, &FixtureSource::new(), &options(dir.path(), OutputFormat::Json))
            .await
            .unwrap()
            .unwrap();
        let json = fs::read_to_string(&report.paths[0]).unwrap();
        assert!(json.contains("vm-0123456789abcdef2"));
        assert!(json.contains("sqldb-0123456789abcdef1"));
    }

    #[test]
    fn formats_parse() {
        assert_eq!("PDF".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert!("both".parse::<OutputFormat>().unwrap().wants_json());
        assert!("docx".parse::<OutputFormat>().is_err());
    }
}
