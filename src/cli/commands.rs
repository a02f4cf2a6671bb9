//! CLI command implementations
//!
//! Every command boots the same way: load configuration, set the log level,
//! load every definition set, compile. A definition error stops the command
//! before anything else happens.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::schema::{DefinitionLoader, RecordValidator, Registry, ValidateOptions};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Definition files or directories (required, non-empty)
    pub definitions: Vec<PathBuf>,

    /// Minimum log severity (optional, default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Drop undeclared record attributes instead of rejecting them
    #[serde(default)]
    pub ignore_extra: bool,

    /// Directory relative definition paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("definitions", &config.definitions.len().to_string()),
                ("log_level", &config.log_level),
            ],
        );

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.definitions.is_empty() {
            return Err(CliError::config_error("definitions must name at least one path"));
        }

        if Severity::parse(&self.log_level).is_none() {
            return Err(CliError::config_error(format!(
                "Invalid log_level: '{}'. Must be one of trace, info, warn, error, fatal.",
                self.log_level
            )));
        }

        Ok(())
    }

    pub fn severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }

    /// Definition paths, relative ones resolved against the config file's directory
    pub fn definition_paths(&self) -> Vec<PathBuf> {
        self.definitions
            .iter()
            .map(|path| {
                if path.is_absolute() {
                    path.clone()
                } else {
                    self.base_dir.join(path)
                }
            })
            .collect()
    }

    pub fn validate_options(&self, update: bool) -> ValidateOptions {
        let options = if update {
            ValidateOptions::update()
        } else {
            ValidateOptions::create()
        };
        options.ignore_extra(self.ignore_extra)
    }
}

/// Main CLI entry point
///
/// Parses arguments, dispatches, and writes the error response on failure.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();

    // stdout carries command responses only
    Logger::set_stderr_only(true);

    let result = run_command(cli.command);
    if let Err(e) = &result {
        write_error(e)?;
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Check { config } => check(&config),
        Command::Describe { config, class } => describe(&config, &class),
        Command::Validate {
            config,
            class,
            update,
        } => validate(&config, &class, update),
    }
}

/// Compile every definition set and report the hierarchy
pub fn check(config_path: &Path) -> CliResult<()> {
    let (_config, registry) = boot(config_path)?;
    write_response(summarize(&registry))
}

/// Print the compiled model of one class
pub fn describe(config_path: &Path, class: &str) -> CliResult<()> {
    let (_config, registry) = boot(config_path)?;
    let description = registry
        .describe(class)
        .ok_or_else(|| CliError::unknown_class(class))?;
    write_response(description)
}

/// Validate one record read from stdin
pub fn validate(config_path: &Path, class: &str, update: bool) -> CliResult<()> {
    let (config, registry) = boot(config_path)?;
    if !registry.contains(class) {
        return Err(CliError::unknown_class(class));
    }

    let record = read_request()?;
    let validated = RecordValidator::new(&registry)
        .validate(class, &record, config.validate_options(update))
        .map_err(|errors| CliError::validation_failed(&errors))?;

    write_response(Value::Object(validated))
}

/// Load config and definitions, then compile.
fn boot(config_path: &Path) -> CliResult<(Config, Registry)> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.severity());

    let mut loader = DefinitionLoader::new();
    for path in config.definition_paths() {
        loader.load_path(&path)?;
    }
    if loader.set_count() == 0 {
        return Err(CliError::config_error("definitions contain no definition files"));
    }

    let registry = loader.compile()?;
    Ok((config, registry))
}

fn summarize(registry: &Registry) -> Value {
    let hierarchy: serde_json::Map<String, Value> = registry
        .iter()
        .map(|class| {
            let ancestors: Vec<&str> = registry.ancestors(class).iter().map(|a| a.name()).collect();
            (class.name().to_string(), json!(ancestors))
        })
        .collect();

    json!({
        "classes": registry.len(),
        "queryable": registry.queryable_classes().map(|c| c.name()).collect::<Vec<_>>(),
        "indices": registry.indices().count(),
        "hierarchy": hierarchy,
    })
}
