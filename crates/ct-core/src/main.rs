//! Cloudtally - Multi-Cloud Compute Inventory
//!
//! The main entry point for ct-core, handling:
//! - Cross-provider orchestration (`all`)
//! - Single-provider scanning as an independently executable unit (`scan`)
//! - Console, JSON, and CSV output

use clap::{Args, Parser, Subcommand};
use ct_common::{format_error_human, CloudProvider, Error, OutputFormat};
use ct_core::aggregate::build_summary;
use ct_core::collect::{
    collectors_for, enumerate_scopes, resource_tags, validate_resource_filter, CliRunner,
    ResourceFilter,
};
use ct_core::exit_codes::ExitCode;
use ct_core::export::{self, Style};
use ct_core::logging::init_logging;
use ct_core::orchestrate::{
    handoff, Orchestrator, OrchestratorOptions, ScopeOverrides, DEFAULT_DEADLINE_SECS,
};
use ct_core::scan::{run_scan, ScanOptions, ScanPlan, DEFAULT_MAX_PARALLEL};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Cloudtally - count compute resources across cloud providers
#[derive(Parser)]
#[command(name = "ct-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Timeout per cloud API call (seconds)
    #[arg(long, global = true, env = "CT_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Scopes scanned concurrently within one resource kind
    #[arg(long, global = true, env = "CT_MAX_PARALLEL", default_value_t = DEFAULT_MAX_PARALLEL)]
    max_parallel: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Count compute resources across all selected providers
    All(AllArgs),

    /// Scan a single provider (the unit `all` invokes per provider)
    Scan(ScanArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct AllArgs {
    /// Providers to query
    #[arg(long, value_delimiter = ',', default_value = "aws,azure,gcp")]
    providers: Vec<CloudProvider>,

    /// AWS regions to scan instead of discovering them
    #[arg(long, env = "CT_AWS_REGIONS", value_delimiter = ',')]
    aws_regions: Option<Vec<String>>,

    /// Azure subscription ID
    #[arg(long, env = "CT_AZURE_SUBSCRIPTION")]
    azure_subscription: Option<String>,

    /// GCP project ID
    #[arg(long, env = "CT_GCP_PROJECT")]
    gcp_project: Option<String>,

    /// Resource kinds to count (e.g. ec2,aks,gke)
    #[arg(long, value_delimiter = ',')]
    resources: Option<Vec<String>>,

    /// Deadline per provider scan (seconds)
    #[arg(long, env = "CT_DEADLINE", default_value_t = DEFAULT_DEADLINE_SECS)]
    deadline: u64,

    /// Output format
    #[arg(short = 'f', long, default_value = "table")]
    format: OutputFormat,

    /// Output file path (stdout when omitted)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Provider to scan
    #[arg(long)]
    provider: CloudProvider,

    /// Explicit scopes (regions/subscriptions/projects), skipping discovery
    #[arg(long, value_delimiter = ',')]
    scopes: Option<Vec<String>>,

    /// Resource kinds to count
    #[arg(long, value_delimiter = ',')]
    resources: Option<Vec<String>>,

    /// Output format
    #[arg(short = 'f', long, default_value = "table")]
    format: OutputFormat,

    /// Output file path (stdout when omitted)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn main() {
    install_interrupt_handler();
    let cli = Cli::parse();
    init_logging(cli.global.verbose, cli.global.quiet);

    let use_color = !cli.global.no_color && std::io::stderr().is_terminal();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format_error_human(&e, use_color));
            ExitCode::Failure
        }
    };
    std::process::exit(code.as_i32());
}

fn run(cli: Cli) -> Result<ExitCode, Error> {
    match cli.command {
        Commands::All(args) => run_all(&cli.global, args),
        Commands::Scan(args) => run_provider_scan(&cli.global, args),
        Commands::Version => {
            println!("ct-core {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::Success)
        }
    }
}

fn run_all(global: &GlobalOpts, args: AllArgs) -> Result<ExitCode, Error> {
    if args.providers.is_empty() {
        return Err(Error::InvalidSelection("no providers selected".into()));
    }
    if let Some(resources) = &args.resources {
        // Every tag must belong to at least one selected provider.
        for tag in resources {
            let known = args
                .providers
                .iter()
                .any(|&p| resource_tags(p).contains(&tag.as_str()));
            if !known {
                return Err(Error::InvalidSelection(format!(
                    "unknown resource '{}' for providers {}",
                    tag,
                    args.providers
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(",")
                )));
            }
        }
    }

    let overrides = ScopeOverrides {
        aws_regions: args.aws_regions,
        azure_subscription: args.azure_subscription,
        gcp_project: args.gcp_project,
    };
    let options = OrchestratorOptions {
        deadline: Duration::from_secs(args.deadline),
        timeout_secs: global.timeout,
        max_parallel: global.max_parallel,
        resources: args.resources,
        verbose: global.verbose,
    };

    let orchestrator = Orchestrator::from_current_exe(&args.providers, &overrides, &options)?;
    let outcome = orchestrator.run();
    let summary = build_summary(&outcome.reports);

    let style = Style {
        color: !global.no_color && std::io::stdout().is_terminal(),
    };
    match args.format {
        OutputFormat::Table => {
            let mut payload = String::from("Multi-Cloud Compute Node Summary\n\n");
            payload.push_str(&export::render_summary(&summary, &outcome.errors, style));
            payload.push_str(&export::render_failures(&outcome.reports, style));
            export::write_payload(args.output.as_deref(), &payload)
                .map_err(|e| Error::Export(e.to_string()))?;
        }
        OutputFormat::Json => {
            let doc = export::summary_json(&summary, &outcome.reports, &outcome.errors);
            let payload = serde_json::to_string_pretty(&doc)?;
            export::write_payload(args.output.as_deref(), &payload)
                .map_err(|e| Error::Export(e.to_string()))?;
        }
        OutputFormat::Csv => {
            let payload =
                export::summary_csv(&summary).map_err(|e| Error::Export(e.to_string()))?;
            export::write_payload(args.output.as_deref(), &payload)
                .map_err(|e| Error::Export(e.to_string()))?;
        }
    }

    if outcome.all_failed() {
        eprintln!("All providers failed. Please check credentials and try again.");
        return Ok(ExitCode::Failure);
    }
    Ok(ExitCode::Success)
}

fn run_provider_scan(global: &GlobalOpts, args: ScanArgs) -> Result<ExitCode, Error> {
    let provider = args.provider;
    let filter = match &args.resources {
        Some(tags) => {
            validate_resource_filter(provider, tags)?;
            ResourceFilter::only(tags.iter().cloned())
        }
        None => ResourceFilter::all(),
    };

    let runner = Arc::new(CliRunner::with_timeout(Duration::from_secs(global.timeout)));
    let scopes = enumerate_scopes(provider, &runner, args.scopes.as_deref())?;
    let collectors = collectors_for(provider, &runner, &filter);
    let plan = ScanPlan {
        provider,
        scopes,
        collectors,
    };
    let report = run_scan(
        &plan,
        &ScanOptions {
            max_parallel: global.max_parallel,
        },
    )?;

    let style = Style {
        color: !global.no_color && std::io::stdout().is_terminal(),
    };
    match args.format {
        OutputFormat::Table => {
            let payload = export::render_provider(&report, style);
            export::write_payload(args.output.as_deref(), &payload)
                .map_err(|e| Error::Export(e.to_string()))?;
        }
        OutputFormat::Json => match args.output.as_deref() {
            // The file path is the handoff location; the write must be
            // atomic so the orchestrator never sees a partial artifact.
            Some(path) => {
                handoff::write_report(path, &report).map_err(|e| Error::Handoff(e.to_string()))?
            }
            None => {
                let payload = serde_json::to_string_pretty(&report)?;
                export::write_payload(None, &payload)
                    .map_err(|e| Error::Export(e.to_string()))?;
            }
        },
        OutputFormat::Csv => {
            let payload =
                export::provider_csv(&report).map_err(|e| Error::Export(e.to_string()))?;
            export::write_payload(args.output.as_deref(), &payload)
                .map_err(|e| Error::Export(e.to_string()))?;
        }
    }

    Ok(ExitCode::Success)
}

/// Exit 1 on Ctrl-C, matching the documented exit code contract.
fn install_interrupt_handler() {
    #[cfg(unix)]
    {
        extern "C" fn on_interrupt(_: libc::c_int) {
            unsafe { libc::_exit(1) }
        }
        let handler = on_interrupt as extern "C" fn(libc::c_int);
        unsafe {
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        }
    }
}
