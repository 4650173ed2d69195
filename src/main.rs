// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use narrasync::app_config::{self, Config, SynthesisProviderKind};
use narrasync::app_controller::Controller;

/// CLI Wrapper for SynthesisProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliSynthesisProvider {
    Http,
    Mock,
}

impl From<CliSynthesisProvider> for SynthesisProviderKind {
    fn from(cli_provider: CliSynthesisProvider) -> Self {
        match cli_provider {
            CliSynthesisProvider::Http => SynthesisProviderKind::Http,
            CliSynthesisProvider::Mock => SynthesisProviderKind::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize narration audio and timed subtitles (default command)
    #[command(alias = "sync")]
    Run(RunArgs),

    /// Print the caption segments of a script without calling any provider
    Segment {
        /// Script document to segment
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        /// Maximum characters per caption
        #[arg(short, long)]
        max_chunk_chars: Option<usize>,

        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config_path: String,
    },

    /// Print block count and total span of an SRT file
    Inspect {
        /// Subtitle file to read
        #[arg(value_name = "SRT")]
        srt_path: PathBuf,
    },

    /// Generate shell completions for narrasync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Script document or directory of script documents
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Overwrite existing audio and subtitle files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Synthesis provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliSynthesisProvider>,

    /// Voice used for both synthesis jobs
    #[arg(short, long)]
    voice: Option<String>,

    /// Maximum characters per caption
    #[arg(short, long)]
    max_chunk_chars: Option<usize>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Give up on an attempt after this many seconds
    #[arg(short, long)]
    timeout_secs: Option<u64>,
}

/// narrasync - narration audio with timed subtitles
///
/// Splits a narration script into caption-sized segments, renders speech and
/// speech marks with a synthesis provider, and writes the audio next to an SRT
/// file whose captions follow the voice.
#[derive(Parser, Debug)]
#[command(name = "narrasync")]
#[command(version)]
#[command(about = "Narration audio with synchronized subtitles")]
#[command(long_about = "narrasync turns narration scripts into audio and timed SRT subtitles.

EXAMPLES:
    narrasync intro.json                        # Synthesize using default config
    narrasync -f intro.json                     # Overwrite existing artifacts
    narrasync -p mock scripts/                  # Dry run every script in a folder
    narrasync -v Joanna -m 20 intro.json        # Other voice, longer captions
    narrasync segment intro.json                # Preview caption segments
    narrasync inspect audio/subtitles/intro.srt # Summarize a subtitle file
    narrasync completions bash > narrasync.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    http - Task-based synthesis REST API (requires endpoint and bucket)
    mock - In-process provider producing placeholder audio and simulated marks")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script document or directory of script documents
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Overwrite existing audio and subtitle files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Synthesis provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliSynthesisProvider>,

    /// Voice used for both synthesis jobs
    #[arg(short, long)]
    voice: Option<String>,

    /// Maximum characters per caption
    #[arg(short, long)]
    max_chunk_chars: Option<usize>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Give up on an attempt after this many seconds
    #[arg(short, long)]
    timeout_secs: Option<u64>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour and emoji for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "❌"),
            Level::Warn => ("1;33", "🚧"),
            Level::Info => ("1;32", ""),
            Level::Debug => ("1;36", "🔍"),
            Level::Trace => ("1;35", "📋"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, emoji) = Self::style_for_level(record.level());
            let _ = writeln!(std::io::stderr(), "\x1B[{}m{} {} {}\x1B[0m", colour, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace is the ceiling; the effective level is lowered once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "narrasync", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Inspect { srt_path }) => run_inspect(srt_path),
        Some(Commands::Segment {
            input_path,
            max_chunk_chars,
            config_path,
        }) => run_segment(input_path, max_chunk_chars, &config_path),
        Some(Commands::Run(args)) => run_sync(args).await,
        None => {
            let input_path = cli
                .input_path
                .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

            run_sync(RunArgs {
                input_path,
                force_overwrite: cli.force_overwrite,
                provider: cli.provider,
                voice: cli.voice,
                max_chunk_chars: cli.max_chunk_chars,
                config_path: cli.config_path,
                log_level: cli.log_level,
                timeout_secs: cli.timeout_secs,
            })
            .await
        }
    }
}

async fn run_sync(options: RunArgs) -> Result<()> {
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&options.config_path)?;

    if let Some(provider) = &options.provider {
        config.synthesis.provider = provider.clone().into();
    }
    if let Some(voice) = &options.voice {
        config.synthesis.voice_id = voice.clone();
    }
    if let Some(max_chunk_chars) = options.max_chunk_chars {
        config.segmentation.max_chunk_chars = max_chunk_chars;
    }
    if let Some(timeout_secs) = options.timeout_secs {
        config.synthesis.timeout_secs = Some(timeout_secs);
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    if !options.input_path.exists() {
        return Err(anyhow!("Input path does not exist: {:?}", options.input_path));
    }

    let controller = Controller::with_config(config)?.with_config_path(&options.config_path);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the running synthesis");
            ctrl_c_token.cancel();
        }
    });

    let summary = controller
        .run(options.input_path.clone(), options.force_overwrite, &cancel)
        .await?;

    if summary.failed > 0 {
        error!("Completed with errors: {}", summary);
        return Err(anyhow!("{} script(s) failed", summary.failed));
    }

    info!("Done: {}", summary);
    Ok(())
}

fn run_segment(input_path: PathBuf, max_chunk_chars: Option<usize>, config_path: &str) -> Result<()> {
    let mut config = Config::load_or_create(config_path)?;
    if let Some(max_chunk_chars) = max_chunk_chars {
        config.segmentation.max_chunk_chars = max_chunk_chars;
    }
    // Segmenting never contacts the provider
    config.synthesis.provider = SynthesisProviderKind::Mock;

    let controller = Controller::with_config(config)?;
    let segments = controller.segment_preview(&input_path)?;

    let mut stdout = std::io::stdout();
    for segment in &segments {
        writeln!(stdout, "{:>4}  {}", segment.index, segment.text)?;
    }
    Ok(())
}

fn run_inspect(srt_path: PathBuf) -> Result<()> {
    let subtitles = Controller::inspect(&srt_path)?;
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", subtitles)?;
    Ok(())
}
