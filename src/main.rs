// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::app_controller::Controller;
use crate::event_log::EventLog;
use crate::translation::prompts::{DEFAULT_JUDGE_PROMPT, DEFAULT_TRANSLATION_PROMPT};

mod app_config;
mod app_controller;
mod errors;
mod event_log;
mod file_utils;
mod language_utils;
mod markdown_processor;
mod providers;
mod translation;

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

fn to_level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions for md-translate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// md-translate - markdown translation via LLM completion services
///
/// Translates markdown documents between natural languages while preserving
/// structure exactly: code blocks, inline code, raw HTML, frontmatter and
/// math are never touched.
#[derive(Parser, Debug)]
#[command(name = "md-translate")]
#[command(version = "1.0.0")]
#[command(about = "LLM-powered markdown translation tool")]
#[command(long_about = "md-translate sends the text of a markdown document to an OpenAI-compatible
completion service segment by segment, enforcing a terminology glossary and
leaving the document structure untouched.

EXAMPLES:
    md-translate guide.md                       # Translate to guide.zh.md
    md-translate guide.md -o out/guide.md       # Explicit output path
    md-translate guide.md -o -                  # Write to stdout
    md-translate docs/ -o translated/           # Translate a directory tree
    md-translate -c conf.json guide.md          # Use a specific config file
    md-translate completions bash               # Generate bash completions

CONFIGURATION:
    Configuration is read from config.json in the working directory by
    default. OPENAI_API_KEY and OPENAI_BASE_URL override the file values.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input markdown file or directory to translate
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Output path, output directory, or '-' for stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config_path: String,

    /// Also translate markdown found inside fenced code blocks
    #[arg(long)]
    translate_code_blocks: bool,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
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
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let color = Self::color_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:5} {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Load the glossary: optional file entries with inline entries on top.
/// Values are stringified; entries with empty keys or values are dropped.
fn load_glossary(config: &Config) -> Result<BTreeMap<String, String>> {
    let mut glossary: BTreeMap<String, String> = BTreeMap::new();

    if let Some(path) = &config.glossary_path {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read glossary file: {path}"))?;
        let parsed: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse glossary file: {path}"))?;
        let object = parsed
            .as_object()
            .ok_or_else(|| anyhow!("Glossary must be a JSON object: {path}"))?;
        for (key, value) in object {
            match value {
                Value::String(s) => {
                    glossary.insert(key.clone(), s.clone());
                }
                Value::Null => {}
                other => {
                    glossary.insert(key.clone(), other.to_string());
                }
            }
        }
    }

    for (key, value) in &config.glossary {
        glossary.insert(key.clone(), value.clone());
    }

    glossary.retain(|key, value| !key.is_empty() && !value.is_empty());
    Ok(glossary)
}

/// Load a prompt file, falling back to the embedded default.
fn load_prompt(path: Option<&String>, default: &str) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file: {path}")),
        None => Ok(default.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default; the level is
    // updated after loading the config
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "md-translate", &mut std::io::stdout());
        return Ok(());
    }

    let input_path = cli
        .input_path
        .clone()
        .ok_or_else(|| anyhow!("INPUT_PATH is required"))?;

    run_translate(cli, input_path).await
}

async fn run_translate(options: CommandLineOptions, input_path: PathBuf) -> Result<()> {
    // Load or default the configuration
    let mut config = if Path::new(&options.config_path).exists() {
        let config = Config::load(&options.config_path)?;
        info!("Using config: {}", options.config_path);
        config
    } else {
        warn!(
            "Config file not found at '{}', using defaults.",
            options.config_path
        );
        Config::default()
    };

    config.apply_env_overrides();

    if let Some(cli_level) = options.log_level {
        config.log_level = cli_level.into();
    }
    log::set_max_level(to_level_filter(&config.log_level));

    if options.translate_code_blocks {
        config.translation.translate_markdown_code_blocks = true;
    }

    let glossary = load_glossary(&config)?;
    let translation_prompt =
        load_prompt(config.prompt_path.as_ref(), DEFAULT_TRANSLATION_PROMPT)?;
    let judge_prompt = load_prompt(config.judge_prompt_path.as_ref(), DEFAULT_JUDGE_PROMPT)?;

    let events = Arc::new(match &config.log_path {
        Some(path) => EventLog::to_file(path)?,
        None => EventLog::disabled(),
    });

    let controller = Controller::new(
        config,
        glossary,
        translation_prompt,
        Some(judge_prompt),
        events,
    )?;
    controller.run(&input_path, options.output.as_deref()).await
}
