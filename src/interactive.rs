//! Line-oriented driver of the report wizard.
//!
//! Reads answers from any `BufRead` and writes prompts to any `Write`, so a
//! whole session can be scripted. Failures are printed at the step that
//! caused them; entered values and selections stay in place for a retry.

use chrono::{Datelike, Utc};
use colored::*;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::catalog::InstanceSource;
use crate::error::{InsightsError, Result};
use crate::generate::{self, GenerateOptions, GeneratedReport};
use crate::model::{BillingPeriod, CloudProvider, Credentials, DataOrigin, ReportType};
use crate::session::{self, SessionCache};
use crate::store::Applied;
use crate::wizard::{path_for, Action, Step, Transition, Wizard};

// ======================================================
// OUTCOME
// ======================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Generated(GeneratedReport),
    /// Input ended or the user quit before a report was written.
    Abandoned,
}

enum Flow {
    Stay,
    Quit,
    Finished(GeneratedReport),
}

// ======================================================
// DRIVER
// ======================================================

pub struct Interactive<R, W> {
    input:        R,
    out:          W,
    wizard:       Wizard,
    source:       Box<dyn InstanceSource>,
    options:      GenerateOptions,
    cache_path:   Option<PathBuf>,
    key_hint:     Option<String>,
    account_hint: Option<String>,
    /// Selections of a resumed session, re-applied after the next fetch.
    carried:      Option<(Vec<String>, Vec<String>)>,
}

impl<R: BufRead, W: Write> Interactive<R, W> {
    pub fn new(input: R, out: W, source: Box<dyn InstanceSource>, options: GenerateOptions) -> Self {
        Interactive {
            input,
            out,
            wizard: Wizard::default(),
            source,
            options,
            cache_path: None,
            key_hint: None,
            account_hint: None,
            carried: None,
        }
    }

    /// Keep the session cache at `path` up to date while the wizard runs.
    pub fn with_session_cache(mut self, path: PathBuf) -> Self {
        self.cache_path = Some(path);
        self
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Continue a cached session from the furthest step it still qualifies for.
    pub fn resume(&mut self, cache: &SessionCache) -> Result<()> {
        cache.restore_into(self.wizard.store_mut())?;
        self.key_hint = cache.access_key_id.clone();
        self.account_hint = cache.account_id.clone();

        let (instances, databases) = (cache.selected_instance_ids(), cache.selected_rds_ids());
        if !instances.is_empty() || !databases.is_empty() {
            self.carried = Some((instances, databases));
        }

        let landed = self.wizard.enter(Step::GenerateReport).landed();
        writeln!(
            self.out,
            "{} saved session from {} (continuing at {})",
            "Resuming".cyan().bold(),
            cache.saved_at,
            landed
        )?;
        Ok(())
    }

    pub async fn run(&mut self) -> Result<Outcome> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", "Cloud Insights Report Wizard".bold())?;
        writeln!(self.out, "{}", "─".repeat(50))?;
        writeln!(
            self.out,
            "Inventory source: {} ({})",
            self.source.describe(),
            origin_text(self.source.origin())
        )?;
        writeln!(self.out, "Type b to go back, s to start over, q to quit.")?;

        loop {
            self.persist();

            let step = self.wizard.current();
            self.print_header(step)?;

            let flow = match step {
                Step::SelectProvider      => self.select_provider()?,
                Step::SelectReportType    => self.select_report_type()?,
                Step::EnterCredentials    => self.enter_credentials().await?,
                Step::SelectInstances     => self.select_instances()?,
                Step::SelectBillingPeriod => self.select_billing_period()?,
                Step::GenerateReport      => self.generate_report().await?,
            };

            match flow {
                Flow::Stay => {}
                Flow::Quit => {
                    writeln!(self.out, "Session abandoned. Nothing was generated.")?;
                    return Ok(Outcome::Abandoned);
                }
                Flow::Finished(report) => return Ok(Outcome::Generated(report)),
            }
        }
    }

    // ──────────────────────────────────────────────
    // Steps
    // ──────────────────────────────────────────────

    fn select_provider(&mut self) -> Result<Flow> {
        writeln!(self.out, "  [1] Amazon Web Services (aws)")?;
        writeln!(self.out, "  [2] Microsoft Azure (azure)")?;

        let line = match self.prompt("Provider")? {
            Some(l) => l,
            None => return Ok(Flow::Quit),
        };
        if let Some(flow) = self.navigation(&line)? {
            return Ok(flow);
        }

        let choice = match line.as_str() {
            "1" => Ok(CloudProvider::Aws),
            "2" => Ok(CloudProvider::Azure),
            other => other.parse::<CloudProvider>(),
        };
        match choice {
            Ok(provider) => {
                self.wizard.store_mut().set_provider(provider);
                let t = self.wizard.advance();
                self.announce(t)?;
            }
            Err(e) => self.report_error(&e)?,
        }
        Ok(Flow::Stay)
    }

    fn select_report_type(&mut self) -> Result<Flow> {
        writeln!(self.out, "  [1] Resource Utilization (utilization)")?;
        writeln!(self.out, "  [2] Billing Summary (billing)")?;

        let line = match self.prompt("Report type")? {
            Some(l) => l,
            None => return Ok(Flow::Quit),
        };
        if let Some(flow) = self.navigation(&line)? {
            return Ok(flow);
        }

        let choice = match line.as_str() {
            "1" => Ok(ReportType::Utilization),
            "2" => Ok(ReportType::Billing),
            other => other.parse::<ReportType>(),
        };
        match choice {
            Ok(report_type) => {
                self.wizard.store_mut().set_report_type(report_type);
                let t = self.wizard.advance();
                self.announce(t)?;
            }
            Err(e) => self.report_error(&e)?,
        }
        Ok(Flow::Stay)
    }

    async fn enter_credentials(&mut self) -> Result<Flow> {
        let key_label = match &self.key_hint {
            Some(hint) => format!("Access key ID [{}]", hint),
            None => "Access key ID".to_string(),
        };
        let key = match self.prompt(&key_label)? {
            Some(l) => l,
            None => return Ok(Flow::Quit),
        };
        if let Some(flow) = self.navigation(&key)? {
            return Ok(flow);
        }
        let key = if key.is_empty() { self.key_hint.clone().unwrap_or_default() } else { key };

        let secret = match self.prompt("Secret access key")? {
            Some(l) => l,
            None => return Ok(Flow::Quit),
        };
        if let Some(flow) = self.navigation(&secret)? {
            return Ok(flow);
        }

        let account_label = match &self.account_hint {
            Some(hint) => format!("Account ID (optional) [{}]", hint),
            None => "Account ID (optional)".to_string(),
        };
        let account = match self.prompt(&account_label)? {
            Some(l) => l,
            None => return Ok(Flow::Quit),
        };
        if let Some(flow) = self.navigation(&account)? {
            return Ok(flow);
        }
        let account = if account.is_empty() { self.account_hint.clone() } else { Some(account) };

        let credentials = Credentials::new(&key, &secret, account.as_deref());
        self.key_hint = Some(credentials.access_key_id.clone()).filter(|k| !k.is_empty());
        self.account_hint = credentials.account_id.clone();

        if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
            self.report_error(&InsightsError::validation(
                "Access key ID and secret access key are required",
            ))?;
            return Ok(Flow::Stay);
        }

        let provider = match self.wizard.store().provider() {
            Some(p) => p,
            None => {
                self.wizard.enter(Step::SelectProvider);
                return Ok(Flow::Stay);
            }
        };

        writeln!(self.out, "Validating credentials with {}...", self.source.describe())?;
        let ticket = match self.wizard.begin(Action::ValidateCredentials) {
            Ok(t) => t,
            Err(e) => {
                self.report_error(&e)?;
                return Ok(Flow::Stay);
            }
        };
        let validated = self.source.validate_credentials(provider, &credentials).await;
        self.wizard.finish(ticket);
        if let Err(e) = validated {
            self.report_error(&e)?;
            return Ok(Flow::Stay);
        }

        if let Err(e) = self.wizard.store_mut().set_credentials(credentials.clone()) {
            self.report_error(&e)?;
            return Ok(Flow::Stay);
        }

        // Billing reports do not list resources.
        if self.wizard.store().report_type() == Some(ReportType::Utilization) {
            writeln!(self.out, "Fetching {}...", provider.compute_label().to_lowercase())?;
            let ticket = match self.wizard.begin(Action::FetchInventory) {
                Ok(t) => t,
                Err(e) => {
                    self.report_error(&e)?;
                    return Ok(Flow::Stay);
                }
            };
            let requested_in = ticket.generation;
            let fetched = self.source.fetch_inventory(provider, &credentials).await;
            self.wizard.finish(ticket);

            let applied = fetched
                .and_then(|inventory| self.wizard.store_mut().apply_inventory(requested_in, inventory));
            match applied {
                Ok(Applied::Applied) => self.reapply_carried_selection(),
                Ok(Applied::Discarded) => {
                    debug!("inventory response arrived for an outdated session");
                    return Ok(Flow::Stay);
                }
                Err(e) => {
                    self.wizard.store_mut().clear_inventory();
                    self.report_error(&e)?;
                    return Ok(Flow::Stay);
                }
            }
        }

        let t = self.wizard.advance();
        self.announce(t)?;
        Ok(Flow::Stay)
    }

    fn select_instances(&mut self) -> Result<Flow> {
        self.print_inventory()?;
        writeln!(
            self.out,
            "Commands: c <n> / r <n> toggle, c all|none, r all|none, f daily|weekly|monthly, n next"
        )?;

        let line = match self.prompt("Selection")? {
            Some(l) => l,
            None => return Ok(Flow::Quit),
        };
        if let Some(flow) = self.navigation(&line)? {
            return Ok(flow);
        }

        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("n").to_ascii_lowercase();
        let argument = words.next().map(str::to_ascii_lowercase);

        let result = match (command.as_str(), argument.as_deref()) {
            ("n" | "next", _) => {
                let t = self.wizard.advance();
                if let Transition::Redirected { .. } = t {
                    self.report_error(&InsightsError::validation(
                        "Select at least one instance or database before continuing",
                    ))?;
                } else {
                    self.announce(t)?;
                }
                Ok(())
            }
            ("c", Some("all"))  => { self.wizard.store_mut().select_all_instances(true); Ok(()) }
            ("c", Some("none")) => { self.wizard.store_mut().select_all_instances(false); Ok(()) }
            ("r", Some("all"))  => { self.wizard.store_mut().select_all_rds_instances(true); Ok(()) }
            ("r", Some("none")) => { self.wizard.store_mut().select_all_rds_instances(false); Ok(()) }
            ("c", Some(n)) => self.toggle_compute(n),
            ("r", Some(n)) => self.toggle_database(n),
            ("f", Some(freq)) => freq.parse().map(|f| self.wizard.store_mut().set_frequency(f)),
            _ => Err(InsightsError::validation(format!("Unrecognised command '{}'", line))),
        };

        if let Err(e) = result {
            self.report_error(&e)?;
        }
        Ok(Flow::Stay)
    }

    fn select_billing_period(&mut self) -> Result<Flow> {
        let default = self.wizard.store().billing_period().unwrap_or_else(current_period);

        let line = match self.prompt(&format!("Billing period YYYY-MM [{}]", default))? {
            Some(l) => l,
            None => return Ok(Flow::Quit),
        };
        if let Some(flow) = self.navigation(&line)? {
            return Ok(flow);
        }

        let period = if line.is_empty() { Ok(default) } else { parse_period(&line) };
        match period {
            Ok(period) => {
                self.wizard.store_mut().set_billing_period(period);
                let t = self.wizard.advance();
                self.announce(t)?;
            }
            Err(e) => self.report_error(&e)?,
        }
        Ok(Flow::Stay)
    }

    async fn generate_report(&mut self) -> Result<Flow> {
        self.print_summary()?;

        let line = match self.prompt("Generate report? [Y/b/s/q]")? {
            Some(l) => l,
            None => return Ok(Flow::Quit),
        };
        if let Some(flow) = self.navigation(&line)? {
            return Ok(flow);
        }
        if !matches!(line.to_ascii_lowercase().as_str(), "" | "y" | "yes") {
            self.report_error(&InsightsError::validation(format!("Unrecognised answer '{}'", line)))?;
            return Ok(Flow::Stay);
        }

        let (ticket, config) = match generate::prepare(&mut self.wizard) {
            Ok(v) => v,
            Err(e) => {
                self.report_error(&e)?;
                return Ok(Flow::Stay);
            }
        };

        writeln!(self.out, "Gathering metrics and generating your report...")?;
        self.out.flush()?;
        let rendered = generate::render(config, &self.options).await;

        match generate::complete(&mut self.wizard, ticket, rendered, &self.options.output_dir) {
            Ok(Some(report)) => {
                writeln!(self.out, "{} report {}", "Generated".green().bold(), report.report_id)?;
                for path in &report.paths {
                    writeln!(self.out, "  {}", path.display())?;
                }
                Ok(Flow::Finished(report))
            }
            Ok(None) => {
                writeln!(self.out, "The session changed while generating; the result was discarded.")?;
                Ok(Flow::Stay)
            }
            Err(e) => {
                self.report_error(&e)?;
                writeln!(self.out, "No file was written.")?;
                Ok(Flow::Stay)
            }
        }
    }

    // ──────────────────────────────────────────────
    // Selection helpers
    // ──────────────────────────────────────────────

    fn toggle_compute(&mut self, number: &str) -> Result<()> {
        let id = nth_id(self.wizard.store().instances().iter().map(|i| i.id.as_str()), number, "instance")?;
        self.wizard.store_mut().toggle_instance_selection(&id)
    }

    fn toggle_database(&mut self, number: &str) -> Result<()> {
        let id = nth_id(self.wizard.store().rds_instances().iter().map(|i| i.id.as_str()), number, "database")?;
        self.wizard.store_mut().toggle_rds_instance_selection(&id)
    }

    fn reapply_carried_selection(&mut self) {
        let Some((instances, databases)) = self.carried.take() else {
            return;
        };
        let store = self.wizard.store_mut();
        for id in instances {
            if store.instances().iter().any(|i| i.id == id && !i.selected) {
                let _ = store.toggle_instance_selection(&id);
            }
        }
        for id in databases {
            if store.rds_instances().iter().any(|i| i.id == id && !i.selected) {
                let _ = store.toggle_rds_instance_selection(&id);
            }
        }
    }

    // ──────────────────────────────────────────────
    // Navigation and I/O
    // ──────────────────────────────────────────────

    /// Commands accepted at every prompt.
    fn navigation(&mut self, line: &str) -> Result<Option<Flow>> {
        match line.to_ascii_lowercase().as_str() {
            "b" | "back" => {
                let t = self.wizard.back();
                if let Transition::Stayed(_) = t {
                    writeln!(self.out, "Already at the first step.")?;
                }
                Ok(Some(Flow::Stay))
            }
            "s" | "start over" | "restart" => {
                self.wizard.start_over();
                self.key_hint = None;
                self.account_hint = None;
                self.carried = None;
                if let Some(path) = &self.cache_path {
                    if let Err(e) = session::clear(path) {
                        warn!(error = %e, "could not clear session cache");
                    }
                }
                writeln!(self.out, "Starting over.")?;
                Ok(Some(Flow::Stay))
            }
            "q" | "quit" | "exit" => Ok(Some(Flow::Quit)),
            _ => Ok(None),
        }
    }

    /// `None` once input is exhausted.
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.out, "{}> ", label)?;
        self.out.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.out)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn persist(&self) {
        let Some(path) = &self.cache_path else {
            return;
        };
        if self.wizard.store().provider().is_none() {
            return;
        }
        if let Err(e) = session::save(path, self.wizard.store()) {
            warn!(error = %e, "could not update session cache");
        }
    }

    fn announce(&mut self, transition: Transition) -> Result<()> {
        if let Transition::Redirected { requested, landed } = transition {
            writeln!(
                self.out,
                "{} '{}' needs '{}' to be completed first.",
                "Note:".yellow().bold(),
                requested,
                landed
            )?;
        }
        Ok(())
    }

    fn report_error(&mut self, error: &InsightsError) -> Result<()> {
        debug!(error = %error, "step failed");
        writeln!(self.out, "{} {}", "Error:".red().bold(), error.user_message())?;
        if error.is_retryable() {
            writeln!(self.out, "You can retry this step.")?;
        }
        Ok(())
    }

    fn print_header(&mut self, step: Step) -> Result<()> {
        let report_type = self.wizard.store().report_type();
        let total = match report_type {
            Some(_) => path_for(report_type).len(),
            None => path_for(Some(ReportType::Utilization)).len(),
        };
        let position = step.position(report_type).map(|p| p + 1).unwrap_or(1);

        writeln!(self.out)?;
        writeln!(
            self.out,
            "{}",
            format!("Step {} of {}: {}", position, total, step.title()).bold()
        )?;
        Ok(())
    }

    fn print_inventory(&mut self) -> Result<()> {
        let store = self.wizard.store();
        let provider = store.provider().unwrap_or(CloudProvider::Aws);
        let mut lines = Vec::new();

        lines.push(format!(
            "{} ({} of {} selected)  [{}]",
            provider.compute_label(),
            crate::selection::selected_count(store.instances()),
            store.instances().len(),
            origin_text(self.source.origin())
        ));
        if store.instances().is_empty() {
            lines.push("  none found".to_string());
        }
        for (n, i) in store.instances().iter().enumerate() {
            lines.push(format!(
                "  c{:<3} [{}] {:<22} {:<26} {:<16} {:<15} {}",
                n + 1,
                if i.selected { "x" } else { " " },
                i.id,
                i.name,
                i.instance_type,
                i.region,
                i.state
            ));
        }

        lines.push(format!(
            "{} ({} of {} selected)",
            provider.database_label(),
            crate::selection::selected_count(store.rds_instances()),
            store.rds_instances().len()
        ));
        if store.rds_instances().is_empty() {
            lines.push("  none found".to_string());
        }
        for (n, d) in store.rds_instances().iter().enumerate() {
            lines.push(format!(
                "  r{:<3} [{}] {:<22} {:<26} {:<16} {:<15} {}",
                n + 1,
                if d.selected { "x" } else { " " },
                d.id,
                d.name,
                d.engine,
                d.region,
                d.state
            ));
        }
        lines.push(format!("Frequency: {}", store.frequency().label()));

        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    fn print_summary(&mut self) -> Result<()> {
        let store = self.wizard.store();
        let mut lines = Vec::new();

        if let Some(provider) = store.provider() {
            lines.push(format!("  Provider    : {}", provider.display_name()));
        }
        if let Some(report_type) = store.report_type() {
            lines.push(format!("  Report      : {}", report_type.category_label()));
        }
        if let Some(creds) = store.credentials() {
            lines.push(format!("  Access key  : {}", creds.access_key_id));
            if let Some(account) = &creds.account_id {
                lines.push(format!("  Account     : {}", account));
            }
        }
        match store.report_type() {
            Some(ReportType::Billing) => {
                if let Some(period) = store.billing_period() {
                    lines.push(format!("  Period      : {} {}", period.month_name(), period));
                }
                lines.push(format!("  Costs       : {}", origin_text(DataOrigin::Sample)));
            }
            _ => {
                lines.push(format!("  Instances   : {}", store.selected_instances().len()));
                lines.push(format!("  Databases   : {}", store.selected_rds_instances().len()));
                lines.push(format!("  Frequency   : {}", store.frequency().label()));
                lines.push(format!("  Metrics     : {}", origin_text(DataOrigin::Sample)));
            }
        }
        lines.push(format!(
            "  Output      : {} ({})",
            self.options.output_dir.display(),
            self.options.format
        ));

        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }
}

// ======================================================
// HELPERS
// ======================================================

fn origin_text(origin: DataOrigin) -> String {
    match origin {
        DataOrigin::Sample => origin.label().yellow().bold().to_string(),
        DataOrigin::Live   => origin.label().green().to_string(),
    }
}

fn nth_id<'a>(
    ids: impl Iterator<Item = &'a str>,
    number: &str,
    kind: &'static str,
) -> Result<String> {
    let index = number
        .parse::<usize>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| InsightsError::validation(format!("'{}' is not a {} number", number, kind)))?;
    ids.into_iter()
        .nth(index - 1)
        .map(str::to_string)
        .ok_or_else(|| InsightsError::validation(format!("There is no {} number {}", kind, index)))
}

fn current_period() -> BillingPeriod {
    let today = Utc::now().date_naive();
    BillingPeriod { year: today.year() as u16, month: today.month() as u8 }
}

/// Accepts `2025-03`, `2025/03` and `2025 3`.
fn parse_period(raw: &str) -> Result<BillingPeriod> {
    let parts: Vec<&str> = raw
        .split(|c: char| c == '-' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    match parts.as_slice() {
        [year, month] => BillingPeriod::parse(year, month),
        _ => Err(InsightsError::validation(format!(
            "Enter the billing period as YYYY-MM, got '{}'",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FixtureSource, Inventory};
    use crate::generate::{OutputFormat, Renderer};
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::time::Duration;

    fn options(dir: &std::path::Path) -> GenerateOptions {
        GenerateOptions {
            output_dir: dir.to_path_buf(),
            format:     OutputFormat::Pdf,
            delay:      Duration::from_millis(0),
            renderer:   Renderer::Local,
            origin:     DataOrigin::Sample,
        }
    }

    fn driver(script: &str, dir: &std::path::Path) -> Interactive<Cursor<Vec<u8>>, Vec<u8>> {
        colored::control::set_override(false);
        Interactive::new(
            Cursor::new(script.as_bytes().to_vec()),
            Vec::new(),
            Box::new(FixtureSource::new()),
            options(dir),
        )
    }

    fn transcript<R: BufRead>(d: &Interactive<R, Vec<u8>>) -> String {
        String::from_utf8_lossy(d.output()).into_owned()
    }

    /// Fails every request with the given error.
    struct FailingSource(fn() -> InsightsError);

    #[async_trait]
    impl InstanceSource for FailingSource {
        fn origin(&self) -> DataOrigin { DataOrigin::Live }
        fn describe(&self) -> String { "failing backend".to_string() }
        async fn validate_credentials(&self, _: CloudProvider, _: &Credentials) -> Result<()> {
            Err((self.0)())
        }
        async fn fetch_inventory(&self, _: CloudProvider, _: &Credentials) -> Result<Inventory> {
            Err((self.0)())
        }
    }

    #[tokio::test]
    async fn utilization_session_produces_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let script = "aws\nutilization\nAKIAEXAMPLE\nsecret\n\nc 1\nr 2\nf weekly\nn\ny\n";
        let mut d = driver(script, dir.path());

        let outcome = d.run().await.unwrap();
        let Outcome::Generated(report) = outcome else {
            panic!("expected a report: {}", transcript(&d));
        };
        assert!(std::fs::read(&report.paths[0]).unwrap().starts_with(b"%PDF"));

        let store = d.wizard().store();
        assert_eq!(store.selected_instances().len(), 1);
        assert_eq!(store.selected_rds_instances().len(), 1);
        assert!(transcript(&d).contains("SAMPLE DATA"));
    }

    #[tokio::test]
    async fn billing_session_skips_instance_selection() {
        let dir = tempfile::tempdir().unwrap();
        let script = "2\n2\nkey\nsecret\n123456789012\n2025-03\n\n";
        let mut d = driver(script, dir.path());

        let Outcome::Generated(report) = d.run().await.unwrap() else {
            panic!("expected a report: {}", transcript(&d));
        };
        let name = report.paths[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("123456789012-billing-2025-03-"), "{}", name);
        assert!(!transcript(&d).contains("Step 4 of 5: Instances"));
    }

    #[tokio::test]
    async fn next_without_selection_stays_on_instances() {
        let dir = tempfile::tempdir().unwrap();
        let script = "aws\nutilization\nkey\nsecret\n\nn\n";
        let mut d = driver(script, dir.path());

        assert_eq!(d.run().await.unwrap(), Outcome::Abandoned);
        assert_eq!(d.wizard().current(), Step::SelectInstances);
        assert!(transcript(&d).contains("Select at least one instance or database"));
    }

    #[tokio::test]
    async fn invalid_input_keeps_earlier_values() {
        let dir = tempfile::tempdir().unwrap();
        let script = "gcp\naws\nweekly\nbilling\nkey\nsecret\n\n2025-13\n";
        let mut d = driver(script, dir.path());

        assert_eq!(d.run().await.unwrap(), Outcome::Abandoned);
        let out = transcript(&d);
        assert!(out.contains("Unknown cloud provider 'gcp'"));
        assert!(out.contains("Unknown report type 'weekly'"));
        assert!(out.contains("Month must be between 01 and 12"));
        assert_eq!(d.wizard().current(), Step::SelectBillingPeriod);
        assert_eq!(d.wizard().store().provider(), Some(CloudProvider::Aws));
    }

    #[tokio::test]
    async fn failed_validation_shows_the_api_detail_and_stays() {
        let dir = tempfile::tempdir().unwrap();
        colored::control::set_override(false);
        let mut d = Interactive::new(
            Cursor::new(b"aws\nutilization\nkey\nwrong\n\n".to_vec()),
            Vec::new(),
            Box::new(FailingSource(|| InsightsError::Api {
                status: 401,
                detail: "Invalid AWS credentials".into(),
            })),
            options(dir.path()),
        );

        assert_eq!(d.run().await.unwrap(), Outcome::Abandoned);
        let out = transcript(&d);
        assert!(out.contains("Invalid AWS credentials"));
        assert!(out.contains("You can retry this step."));
        assert_eq!(d.wizard().current(), Step::EnterCredentials);
        assert!(d.wizard().store().credentials().is_none());
        assert!(d.wizard().pending().is_none());
    }

    #[tokio::test]
    async fn back_and_start_over() {
        let dir = tempfile::tempdir().unwrap();
        let script = "azure\nb\nb\nazure\nbilling\ns\n";
        let mut d = driver(script, dir.path());

        assert_eq!(d.run().await.unwrap(), Outcome::Abandoned);
        let out = transcript(&d);
        assert!(out.contains("Already at the first step."));
        assert!(out.contains("Starting over."));
        assert_eq!(d.wizard().current(), Step::SelectProvider);
        assert_eq!(d.wizard().store().provider(), None);
    }

    #[tokio::test]
    async fn back_at_secret_prompt_discards_typed_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = driver("aws\nutilization\nAKIA\nb\n", dir.path());

        assert_eq!(d.run().await.unwrap(), Outcome::Abandoned);
        assert_eq!(d.wizard().current(), Step::SelectReportType);
        assert!(d.wizard().store().credentials().is_none());
        assert!(!transcript(&d).contains("Validating credentials"));
    }

    #[tokio::test]
    async fn quit_at_account_prompt_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = driver("aws\nutilization\nAKIA\nsecret\nq\n", dir.path());

        assert_eq!(d.run().await.unwrap(), Outcome::Abandoned);
        assert_eq!(d.wizard().current(), Step::EnterCredentials);
        assert!(d.wizard().store().credentials().is_none());
    }

    #[tokio::test]
    async fn resumed_session_lands_on_credentials_and_keeps_selection() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("session.json");

        // First run: choose two instances, then quit before generating.
        let mut first = driver("aws\nutilization\nAKIAFIRST\nsecret\n\nc 1\nc 3\nq\n", dir.path())
            .with_session_cache(cache_path.clone());
        assert_eq!(first.run().await.unwrap(), Outcome::Abandoned);

        let cache = session::load(&cache_path).expect("cache written");
        assert!(!std::fs::read_to_string(&cache_path).unwrap().contains("\"secret\""));

        // Second run: only the secret has to be typed again.
        let mut second = driver("\nsecret\n\nn\ny\n", dir.path()).with_session_cache(cache_path);
        second.resume(&cache).unwrap();
        assert_eq!(second.wizard().current(), Step::EnterCredentials);

        let Outcome::Generated(_) = second.run().await.unwrap() else {
            panic!("expected a report: {}", transcript(&second));
        };
        let store = second.wizard().store();
        assert_eq!(store.credentials().unwrap().access_key_id, "AKIAFIRST");
        assert_eq!(store.selected_instances().len(), 2);
    }

    #[test]
    fn periods_parse_in_several_shapes() {
        assert_eq!(parse_period("2025-03").unwrap(), BillingPeriod::new(2025, 3).unwrap());
        assert_eq!(parse_period("2025/3").unwrap(), BillingPeriod::new(2025, 3).unwrap());
        assert_eq!(parse_period("2025 12").unwrap(), BillingPeriod::new(2025, 12).unwrap());
        assert!(parse_period("March").is_err());
    }

    #[test]
    fn numbered_ids_are_one_based() {
        let ids = ["a", "b", "c"];
        assert_eq!(nth_id(ids.iter().copied(), "2", "instance").unwrap(), "b");
        assert!(nth_id(ids.iter().copied(), "0", "instance").is_err());
        assert!(nth_id(ids.iter().copied(), "4", "instance").is_err());
    }
}
