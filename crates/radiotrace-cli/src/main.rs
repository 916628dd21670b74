use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use glob::glob;
use radiotrace_core::{AnalysisOptions, CpuSample, RadioFamily, RadioProfile, Report, UserEvent};
use serde::de::DeserializeOwned;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::Config;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("RADIOTRACE_BUILD_COMMIT"),
    " ",
    env!("RADIOTRACE_BUILD_DATE"),
    ")"
);

const EXAMPLES: &str = "Examples:\n  radiotrace trace analyse capture.pcapng -o report.json\n  radiotrace trace analyze capture.pcap --family lte --stdout --pretty\n  radiotrace trace analyse capture.pcapng --config radio.toml --user-events events.json -o report.json\n  radiotrace config default > radio.toml";

#[derive(Parser, Debug)]
#[command(name = "radiotrace")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Offline analyzer for mobile packet traces: sessions, radio states, bursts and energy.",
    long_about = None,
    after_help = EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Operations on PCAP/PCAPNG traces.
    Trace {
        #[command(subcommand)]
        command: TraceCommands,
    },
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TraceCommands {
    /// Analyse a trace and generate a versioned JSON report.
    #[command(alias = "analyze")]
    #[command(after_help = EXAMPLES)]
    Analyse(AnalyseArgs),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the default configuration as TOML.
    Default,
}

#[derive(Args, Debug)]
struct AnalyseArgs {
    /// Path to a .pcap or .pcapng file
    input: PathBuf,

    /// Output report path (JSON)
    #[arg(short = 'o', long, required_unless_present = "stdout")]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Radio family; replaces the configured profile when it differs
    #[arg(long, value_enum)]
    family: Option<FamilyArg>,

    /// Device address (repeatable); inferred from the trace when omitted
    #[arg(long = "local-ip", value_name = "IP")]
    local_ips: Vec<IpAddr>,

    /// Trace duration in seconds (defaults to the last packet)
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// JSON file with user input events
    #[arg(long, value_name = "PATH")]
    user_events: Option<PathBuf>,

    /// JSON file with CPU usage samples
    #[arg(long, value_name = "PATH")]
    cpu: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Compact JSON output (default)
    #[arg(long)]
    compact: bool,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FamilyArg {
    Umts,
    Lte,
    Wifi,
}

impl From<FamilyArg> for RadioFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Umts => RadioFamily::Umts,
            FamilyArg::Lte => RadioFamily::Lte,
            FamilyArg::Wifi => RadioFamily::Wifi,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Trace { command } => match command {
            TraceCommands::Analyse(args) => cmd_trace_analyse(args),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Default => cmd_config_default(),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn cmd_config_default() -> Result<(), CliError> {
    let text = Config::generate_default()?;
    print!("{}", text);
    Ok(())
}

fn cmd_trace_analyse(args: AnalyseArgs) -> Result<(), CliError> {
    init_logging(args.verbose, args.quiet)?;

    let resolved_input = resolve_input_path(&args.input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;
    let report = if args.stdout {
        None
    } else {
        let path = args.report.clone().ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?;
        ensure_distinct_output(&path, &input_abs)?;
        Some(path)
    };

    let meta = fs::metadata(&resolved_input)
        .with_context(|| format!("Failed to read input file: {}", resolved_input.display()))?;
    if !meta.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", args.input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }

    let options = build_options(&args)?;
    debug!(
        family = ?options.profile.family(),
        local = options.local_addresses.len(),
        user_events = options.user_events.len(),
        cpu_samples = options.cpu_samples.len(),
        "analysis options"
    );

    let rep = radiotrace_core::analyze_pcap_file(&resolved_input, &options)
        .context("trace analysis failed")?;
    let json = serialize_report(&rep, args.pretty, args.compact)?;

    let Some(report) = report else {
        print!("{}", json);
        return Ok(());
    };

    if let Some(parent) = report.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(&report, json)
        .with_context(|| format!("Failed to write report: {}", report.display()))?;

    if !args.quiet {
        print_summary(&rep);
        eprintln!("OK: report written -> {}", report.display());
    }
    Ok(())
}

/// Merge the config file (if any) with command-line overrides.
fn build_options(args: &AnalyseArgs) -> Result<AnalysisOptions, CliError> {
    let mut config = match args.config.as_deref() {
        Some(path) => Config::load(path).map_err(|err| {
            CliError::new(
                format!("{err:#}"),
                Some("run `radiotrace config default` for a starting point".to_string()),
            )
        })?,
        None => Config::default(),
    };

    if let Some(family) = args.family.map(RadioFamily::from) {
        if config.radio.family() != family {
            config.radio = RadioProfile::for_family(family);
        }
    }
    if !args.local_ips.is_empty() {
        config.trace.local_addresses = args.local_ips.clone();
    }
    if args.duration.is_some() {
        config.trace.duration = args.duration;
    }
    config.validate()?;

    let user_events: Vec<UserEvent> = match args.user_events.as_deref() {
        Some(path) => load_json(path, "user events")?,
        None => Vec::new(),
    };
    let cpu_samples: Vec<CpuSample> = match args.cpu.as_deref() {
        Some(path) => load_json(path, "CPU samples")?,
        None => Vec::new(),
    };

    Ok(AnalysisOptions {
        profile: config.radio,
        params: config.analysis,
        local_addresses: config.trace.local_addresses,
        duration: config.trace.duration,
        user_events,
        cpu_samples,
        ..AnalysisOptions::default()
    })
}

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>, CliError> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what}: {}", path.display()))?;
    serde_json::from_str(&content).map_err(|err| {
        CliError::new(
            format!("invalid {what} file '{}': {err}", path.display()),
            Some("expected a JSON array".to_string()),
        )
    })
}

fn ensure_distinct_output(report_path: &Path, input_abs: &Path) -> Result<(), CliError> {
    let report_abs = report_path
        .parent()
        .map(|parent| {
            if parent.as_os_str().is_empty() {
                fs::canonicalize(".")
            } else {
                fs::canonicalize(parent)
            }
        })
        .transpose()
        .with_context(|| format!("Failed to resolve output path: {}", report_path.display()))?;
    if let Some(report_dir) = report_abs {
        let report_target = report_dir.join(
            report_path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid report path"))?,
        );
        if report_target == input_abs {
            return Err(CliError::new(
                format!(
                    "report path must differ from input: {}",
                    report_path.display()
                ),
                Some("choose a different output path".to_string()),
            ));
        }
    }
    Ok(())
}

fn serialize_report(rep: &Report, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn print_summary(rep: &Report) {
    let energy = rep
        .radio
        .as_ref()
        .map(|radio| radio.stats.total_energy)
        .unwrap_or(0.0);
    eprintln!(
        "Sessions: {}  Bursts: {}  Radio energy: {:.2} J",
        rep.sessions.len(),
        rep.bursts.len(),
        energy
    );
    if let Some(periodicity) = rep.periodicity.as_ref() {
        if periodicity.periodic_bursts > 0 {
            eprintln!(
                "Periodic bursts: {} ({} targets)",
                periodicity.periodic_bursts, periodicity.distinct_targets
            );
        }
    }
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        count => {
            let mut listed = matches
                .iter()
                .take(3)
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            if count > 3 {
                listed.push_str(", ...");
            }
            Err(CliError::new(
                format!("multiple files match pattern '{pattern}' ({count} matches); matches: {listed}"),
                Some("pass a single trace, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
