use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::exit;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cloud_insights::catalog::{self, ApiSource, FixtureSource, InstanceSource};
use cloud_insights::config::{self, Overrides, ResolvedConfig};
use cloud_insights::generate::{self, BatchRequest, GenerateOptions, OutputFormat, Renderer};
use cloud_insights::interactive::{Interactive, Outcome};
use cloud_insights::model::{
    BillingPeriod, CloudProvider, Credentials, DataOrigin, ReportFrequency, ReportType,
};
use cloud_insights::session;

// ======================================================
// CLI
// ======================================================

#[derive(Parser)]
#[command(name = "cloud-insights")]
#[command(about = "Guided utilization and billing reports for AWS and Azure")]
struct Cli {
    /// Report service base URL. Overrides CLOUD_INSIGHTS_API_URL and the config file.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Report service timeout in seconds.
    #[arg(long, global = true)]
    api_timeout: Option<u64>,

    /// Debug logging on stderr (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through the report wizard interactively.
    Wizard {
        /// sample | live
        #[arg(long)]
        data_source: Option<String>,

        /// Directory the report is written to.
        #[arg(long)]
        output: Option<String>,

        /// pdf | json | both
        #[arg(long, default_value = "pdf")]
        format: String,

        /// Let the report service render the PDF.
        #[arg(long)]
        remote: bool,

        /// Ignore any saved session and start from the first step.
        #[arg(long)]
        fresh: bool,
    },
    /// Generate a report without prompts.
    Generate {
        /// aws | azure
        #[arg(long)]
        provider: String,

        /// utilization | billing
        #[arg(long)]
        report_type: String,

        #[arg(long)]
        access_key_id: String,

        /// Prefer --secret-env: command lines end up in shell history.
        #[arg(long, conflicts_with = "secret_env")]
        secret_access_key: Option<String>,

        /// Name of the environment variable holding the secret access key.
        #[arg(long)]
        secret_env: Option<String>,

        #[arg(long)]
        account_id: Option<String>,

        /// daily | weekly | monthly
        #[arg(long, default_value = "daily")]
        frequency: String,

        /// Billing year, e.g. 2025.
        #[arg(long)]
        year: Option<String>,

        /// Billing month, 1-12.
        #[arg(long)]
        month: Option<String>,

        /// Instance id to include (utilization only). Repeatable.
        #[arg(long = "instance")]
        instances: Vec<String>,

        /// Database id to include (utilization only). Repeatable.
        #[arg(long = "database")]
        databases: Vec<String>,

        /// Include every discovered resource (utilization only).
        #[arg(long)]
        all: bool,

        #[arg(long)]
        remote: bool,

        #[arg(long)]
        data_source: Option<String>,

        #[arg(long)]
        output: Option<String>,

        #[arg(long, default_value = "pdf")]
        format: String,
    },
    /// List the resources available to an account.
    Inventory {
        #[arg(long)]
        provider: String,

        #[arg(long)]
        data_source: Option<String>,

        /// Required for live data.
        #[arg(long)]
        access_key_id: Option<String>,

        #[arg(long)]
        secret_env: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Version,
}

#[derive(Subcommand)]
enum SessionCommands {
    Show,
    Clear,
}

#[derive(Subcommand)]
enum ConfigCommands {
    Show,
    Set {
        key: String,
        value: String,
    },
}

// ======================================================
// MAIN
// ======================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = Overrides {
        api_url:          cli.api_url.clone(),
        api_timeout_secs: cli.api_timeout,
        ..Overrides::default()
    };

    match cli.command {

        // ==================================================
        // WIZARD
        // ==================================================

        Commands::Wizard { data_source, output, format, remote, fresh } => {
            let result = run_wizard(overrides, data_source, output, &format, remote, fresh).await;
            match result {
                Ok(Outcome::Generated(_)) => {}
                Ok(Outcome::Abandoned) => exit(2),
                Err(e) => {
                    eprintln!("Wizard error: {:#}", e);
                    exit(1);
                }
            }
        }

        // ==================================================
        // GENERATE
        // ==================================================

        Commands::Generate {
            provider, report_type, access_key_id,
            secret_access_key, secret_env, account_id,
            frequency, year, month,
            instances, databases, all,
            remote, data_source, output, format,
        } => {
            let args = GenerateArgs {
                provider, report_type, access_key_id,
                secret_access_key, secret_env, account_id,
                frequency, year, month,
                instances, databases, all,
                remote, format,
            };
            let result = match with_data_source(overrides, data_source) {
                Ok(o) => run_generate(Overrides { output_dir: output, ..o }, args).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                eprintln!("Generate error: {:#}", e);
                exit(1);
            }
        }

        // ==================================================
        // INVENTORY
        // ==================================================

        Commands::Inventory { provider, data_source, access_key_id, secret_env, json } => {
            let result = match with_data_source(overrides, data_source) {
                Ok(o) => run_inventory(o, &provider, access_key_id, secret_env, json).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                eprintln!("Inventory error: {:#}", e);
                exit(1);
            }
        }

        // ==================================================
        // SESSION
        // ==================================================

        Commands::Session { command } => {
            let path = match config::session_path() {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Session error: {}", e);
                    exit(1);
                }
            };
            match command {
                SessionCommands::Show => match session::load(&path) {
                    Some(cache) => session::print_summary(&cache),
                    None => println!("No saved session."),
                },
                SessionCommands::Clear => match session::clear(&path) {
                    Ok(true) => println!("Saved session cleared."),
                    Ok(false) => println!("No saved session."),
                    Err(e) => {
                        eprintln!("Session error: {}", e);
                        exit(1);
                    }
                },
            }
        }

        // ==================================================
        // CONFIG
        // ==================================================

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let shown = config::resolve_from_environment(&overrides)
                    .and_then(|resolved| config::show_config(&resolved));
                if let Err(e) = shown {
                    eprintln!("Config error: {}", e);
                    exit(1);
                }
            }
            ConfigCommands::Set { key, value } => {
                if let Err(e) = set_config(&key, &value) {
                    eprintln!("Config error: {}", e);
                    exit(1);
                }
                println!("{} = {}", key, value);
            }
        },

        // ==================================================
        // VERSION
        // ==================================================

        Commands::Version => {
            println!("cloud-insights {}", env!("CARGO_PKG_VERSION"));
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "cloud_insights=debug"
    } else if cfg!(debug_assertions) {
        "cloud_insights=info"
    } else {
        "cloud_insights=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

// ======================================================
// COMMANDS
// ======================================================

fn with_data_source(overrides: Overrides, data_source: Option<String>) -> anyhow::Result<Overrides> {
    let data_source = match data_source {
        Some(raw) => Some(raw.parse::<DataOrigin>()?),
        None => overrides.data_source,
    };
    Ok(Overrides { data_source, ..overrides })
}

fn generate_options(
    resolved: &ResolvedConfig,
    format: &str,
    remote: bool,
) -> anyhow::Result<GenerateOptions> {
    let renderer = if remote {
        Renderer::Remote(ApiSource::new(&resolved.api_url, resolved.api_timeout)?)
    } else {
        Renderer::Local
    };
    Ok(GenerateOptions {
        output_dir: resolved.output_dir.clone(),
        format:     format.parse::<OutputFormat>()?,
        delay:      resolved.generation_delay,
        renderer,
        origin:     resolved.data_source,
    })
}

async fn run_wizard(
    overrides: Overrides,
    data_source: Option<String>,
    output: Option<String>,
    format: &str,
    remote: bool,
    fresh: bool,
) -> anyhow::Result<Outcome> {
    let overrides = Overrides { output_dir: output, ..with_data_source(overrides, data_source)? };

    let resolved = config::resolve_from_environment(&overrides)?;
    let options = generate_options(&resolved, format, remote)?;
    let source = catalog::source_for(&resolved)?;

    let stdin = io::stdin();
    let mut wizard = Interactive::new(stdin.lock(), io::stdout(), source, options);

    if resolved.session_cache {
        let path = config::session_path()?;
        if fresh {
            session::clear(&path)?;
        } else if let Some(cache) = session::load(&path).filter(|c| !c.is_blank()) {
            wizard.resume(&cache)?;
        }
        wizard = wizard.with_session_cache(path);
    }

    Ok(wizard.run().await?)
}

struct GenerateArgs {
    provider:          String,
    report_type:       String,
    access_key_id:     String,
    secret_access_key: Option<String>,
    secret_env:        Option<String>,
    account_id:        Option<String>,
    frequency:         String,
    year:              Option<String>,
    month:             Option<String>,
    instances:         Vec<String>,
    databases:         Vec<String>,
    all:               bool,
    remote:            bool,
    format:            String,
}

fn read_secret(inline: Option<String>, env_var: Option<String>) -> anyhow::Result<String> {
    match (inline, env_var) {
        (Some(secret), _) => Ok(secret),
        (None, Some(var)) => std::env::var(&var)
            .with_context(|| format!("environment variable {} is not set", var)),
        (None, None) => bail!("provide --secret-access-key or --secret-env"),
    }
}

async fn run_generate(overrides: Overrides, args: GenerateArgs) -> anyhow::Result<()> {
    let resolved = config::resolve_from_environment(&overrides)?;
    let options = generate_options(&resolved, &args.format, args.remote)?;
    let source = catalog::source_for(&resolved)?;

    let billing_period = match (&args.year, &args.month) {
        (Some(year), Some(month)) => Some(BillingPeriod::parse(year, month)?),
        (None, None) => None,
        _ => bail!("--year and --month must be given together"),
    };
    let secret = read_secret(args.secret_access_key, args.secret_env)?;

    let request = BatchRequest {
        provider:       args.provider.parse::<CloudProvider>()?,
        report_type:    args.report_type.parse::<ReportType>()?,
        credentials:    Credentials::new(&args.access_key_id, &secret, args.account_id.as_deref()),
        frequency:      args.frequency.parse::<ReportFrequency>()?,
        billing_period,
        instance_ids:   args.instances,
        database_ids:   args.databases,
        select_all:     args.all,
    };

    println!("Inventory source: {} ({})", source.describe(), source.origin().label());
    let report = generate::run_batch(request, source.as_ref(), &options)
        .await
        .map_err(|e| anyhow!(e.user_message()))?
        .ok_or_else(|| anyhow!("report was discarded"))?;

    println!("Report generated: {}", report.report_id);
    for path in &report.paths {
        println!("  {}", path.display());
    }
    Ok(())
}

async fn run_inventory(
    overrides: Overrides,
    provider: &str,
    access_key_id: Option<String>,
    secret_env: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let resolved = config::resolve_from_environment(&overrides)?;
    let provider = provider.parse::<CloudProvider>()?;

    let (source, credentials): (Box<dyn InstanceSource>, Credentials) = match resolved.data_source {
        DataOrigin::Sample => (
            Box::new(FixtureSource::new()),
            Credentials::new("sample", "sample", None),
        ),
        DataOrigin::Live => {
            let key = access_key_id.context("--access-key-id is required for live data")?;
            let secret = read_secret(None, secret_env)?;
            (catalog::source_for(&resolved)?, Credentials::new(&key, &secret, None))
        }
    };

    let inventory = source
        .fetch_inventory(provider, &credentials)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(());
    }

    println!();
    println!("{} ({})", provider.display_name(), source.origin().label());
    println!("{}", "─".repeat(80));
    println!("{}", provider.compute_label());
    for i in &inventory.instances {
        println!("  {:<24} {:<28} {:<16} {:<15} {}", i.id, i.name, i.instance_type, i.region, i.state);
    }
    println!("{}", provider.database_label());
    for d in &inventory.rds_instances {
        println!("  {:<24} {:<28} {:<16} {:<15} {}", d.id, d.name, d.engine, d.region, d.state);
    }
    println!();
    Ok(())
}

fn set_config(key: &str, value: &str) -> anyhow::Result<()> {
    let path: PathBuf = config::config_path()?;
    let mut file = config::load_config(&path);
    config::set_value(&mut file, key, value)?;
    config::save_config(&path, &file)?;
    Ok(())
}
