//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, NaiveDate, TimeZone};
use clap::{Parser, Subcommand};
use color_eyre::Section;
use color_eyre::eyre::{Report, Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use texcal_core::pipeline::evaluate;
use texcal_core::{
    Clock, Extraction, ExtractionPipeline, FixedClock, ProgressReporter, SystemClock,
};
use texcal_gateway::OpenAiGateway;
use texcal_shared::{
    AppConfig, ExtractionPayload, GatewayConfig, GatewayError, TexcalError, init_config,
    load_config, resolve_api_key,
};
use tracing::info;

use crate::render::{self, OutputFormat};

/// Exit code when the gate rejects the extraction.
const EXIT_REJECTED: u8 = 2;

/// Exit code when the user interrupts a pending request.
const EXIT_INTERRUPTED: u8 = 130;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// TexCal — turn shared text into a calendar event.
#[derive(Parser)]
#[command(
    name = "texcal",
    version,
    about = "Extract a single calendar event from free-form text.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Options shared by commands that resolve dates.
#[derive(clap::Args, Clone, Debug)]
pub(crate) struct ResolveArgs {
    /// Output format.
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Reference date (YYYY-MM-DD) for relative expressions. Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// IANA time zone (e.g. Asia/Seoul). Defaults to config, then the system zone.
    #[arg(long, env = "TEXCAL_TIMEZONE")]
    pub timezone: Option<String>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract an event from text using the language model.
    Extract {
        /// Text to read. Reads stdin when omitted or "-".
        text: Option<String>,

        #[command(flatten)]
        args: ResolveArgs,
    },

    /// Resolve a saved extraction payload offline (no network).
    Resolve {
        /// Path to a JSON file holding the model's extraction object.
        payload: PathBuf,

        /// Original text, used as the fallback description.
        #[arg(long, default_value = "")]
        text: String,

        #[command(flatten)]
        args: ResolveArgs,
    },

    /// Print the instruction sent to the model.
    Prompt {
        /// Reference date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "warn",
        1 => "warn,texcal_core=info,texcal_gateway=info,texcal_cli=info",
        2 => "info,texcal_core=debug,texcal_gateway=debug,texcal_shared=debug,texcal_cli=debug",
        _ => "debug,texcal_core=trace,texcal_gateway=trace,texcal_shared=trace,texcal_cli=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Extract { text, args } => cmd_extract(text.as_deref(), &args).await,
        Command::Resolve {
            payload,
            text,
            args,
        } => cmd_resolve(&payload, &text, &args),
        Command::Prompt { date } => cmd_prompt(date),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// extract
// ---------------------------------------------------------------------------

async fn cmd_extract(text: Option<&str>, args: &ResolveArgs) -> Result<ExitCode> {
    let config = load_config()?;
    let credential = resolve_api_key(&config)?;
    let gateway = OpenAiGateway::new(&GatewayConfig::try_from(&config)?)?;
    let text = read_input(text)?;

    info!(
        endpoint = %gateway.endpoint(),
        model = %config.openai.model,
        "extracting schedule"
    );

    match time_zone(args, &config)? {
        Some(tz) => {
            let pipeline = ExtractionPipeline::new(gateway, clock_for(args.date, tz), credential);
            extract_with(&pipeline, &text, args.format, &config).await
        }
        None => {
            let pipeline =
                ExtractionPipeline::new(gateway, clock_for(args.date, Local), credential);
            extract_with(&pipeline, &text, args.format, &config).await
        }
    }
}

async fn extract_with<C: Clock>(
    pipeline: &ExtractionPipeline<OpenAiGateway, C>,
    text: &str,
    format: OutputFormat,
    config: &AppConfig,
) -> Result<ExitCode> {
    let reporter = CliProgress::new();

    let outcome = until_interrupted(pipeline.run(text, &reporter), tokio::signal::ctrl_c()).await;
    reporter.clear();
    let Some(outcome) = outcome else {
        info!("interrupted; request cancelled");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    };

    match outcome {
        Ok(extraction) => emit(&extraction, format),
        Err(TexcalError::Gateway(e)) => {
            let hint = gateway_hint(&e, &config.openai.api_key_env);
            Err(Report::new(e)
                .wrap_err("extraction request failed")
                .suggestion(hint))
        }
        Err(e) => Err(e.into()),
    }
}

/// Drive `work` to completion unless `interrupt` fires first, in which case
/// `work` is dropped. An interrupt source that fails to install is ignored.
async fn until_interrupted<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future<Output = std::io::Result<()>>,
) -> Option<T> {
    tokio::select! {
        out = work => Some(out),
        Ok(()) = interrupt => None,
    }
}

/// Actionable next step for a gateway failure.
fn gateway_hint(err: &GatewayError, key_env: &str) -> String {
    match err {
        GatewayError::RequestRejected { status: 401, .. } => {
            format!("The API key was rejected. Check the value of {key_env}.")
        }
        GatewayError::RequestRejected { status: 429, .. } => {
            "The service is rate limiting this key or its quota is used up. Try again later."
                .into()
        }
        GatewayError::RequestRejected { status, .. } if *status >= 500 => {
            "The service had an internal error. Try again later.".into()
        }
        GatewayError::RequestRejected { .. } => {
            "Check openai.model and openai.base_url in the config (texcal config show).".into()
        }
        GatewayError::Transport(_) => {
            "Check the network connection, or raise openai.timeout_secs.".into()
        }
        GatewayError::EmptyResponse | GatewayError::EnvelopeParse(_) => {
            "The model did not return a usable answer. Try again, or rephrase the text.".into()
        }
    }
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

fn cmd_resolve(path: &Path, text: &str, args: &ResolveArgs) -> Result<ExitCode> {
    let config = load_config()?;
    let content = std::fs::read_to_string(path).map_err(|e| TexcalError::io(path, e))?;
    let payload = ExtractionPayload::from_json(&content)
        .map_err(|e| eyre!("{} is not an extraction object: {e}", path.display()))?;

    let extraction = match time_zone(args, &config)? {
        Some(tz) => evaluate(&payload, text, &clock_for(args.date, tz).reference()),
        None => evaluate(&payload, text, &clock_for(args.date, Local).reference()),
    };

    emit(&extraction, args.format)
}

// ---------------------------------------------------------------------------
// prompt / config
// ---------------------------------------------------------------------------

fn cmd_prompt(date: Option<NaiveDate>) -> Result<ExitCode> {
    let date = date.unwrap_or_else(|| SystemClock::local().reference().date);
    println!("{}", texcal_core::prompt::build_instruction(date));
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_init() -> Result<ExitCode> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show() -> Result<ExitCode> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Print an extraction and map the gate decision to an exit code.
fn emit(extraction: &Extraction, format: OutputFormat) -> Result<ExitCode> {
    if let Some(out) = render::render(extraction, format)? {
        print!("{out}");
    }

    if extraction.decision.is_accepted() {
        Ok(ExitCode::SUCCESS)
    } else {
        if format != OutputFormat::Text {
            eprintln!("{}", texcal_core::REJECTION_MESSAGE);
        }
        Ok(ExitCode::from(EXIT_REJECTED))
    }
}

/// Text from the argument, or stdin when absent or "-".
fn read_input(text: Option<&str>) -> Result<String> {
    match text {
        Some(t) if t != "-" => Ok(t.to_string()),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| eyre!("failed to read stdin: {e}"))?;
            Ok(buf)
        }
    }
}

/// Zone from the flag or config; `None` means the system zone.
fn time_zone(args: &ResolveArgs, config: &AppConfig) -> Result<Option<chrono_tz::Tz>> {
    let Some(name) = args
        .timezone
        .as_deref()
        .or(config.resolution.timezone.as_deref())
    else {
        return Ok(None);
    };

    let tz = name
        .parse::<chrono_tz::Tz>()
        .map_err(|e| TexcalError::validation(format!("unknown time zone '{name}': {e}")))?;
    Ok(Some(tz))
}

/// Pinned clock when a date was given, wall clock otherwise.
fn clock_for<Tz>(date: Option<NaiveDate>, zone: Tz) -> Box<dyn Clock<Zone = Tz>>
where
    Tz: TimeZone + Send + Sync + 'static,
{
    match date {
        Some(date) => Box::new(FixedClock::new(date, zone)),
        None => Box::new(SystemClock::new(zone)),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner on stderr while the request is in flight.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _extraction: &Extraction) {
        self.spinner.finish_and_clear();
    }
}
