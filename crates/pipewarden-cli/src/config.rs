//! Run configuration loading

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use pipewarden_process::ProcessConfig;
use serde::Deserialize;

use crate::error::{CliError, CliResult};

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pipewarden.toml";

/// Variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "PIPEWARDEN_CONFIG";

/// Prefix of environment overrides (`PIPEWARDEN_COMMAND`, `PIPEWARDEN_LOG_LEVEL`, ...)
pub const ENV_PREFIX: &str = "PIPEWARDEN";

/// What to run and how to present it
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Executable command
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Complete child environment
    pub env: HashMap<String, String>,
    /// Caller variables passed through when set
    pub inherit: Vec<String>,
    /// Working directory for the child
    pub working_dir: Option<PathBuf>,
    /// Written to the child's input, which is then closed
    pub input: Option<String>,
    /// Terminate the child after this many milliseconds
    pub timeout_ms: Option<u64>,
    /// trace, debug, info, warn or error
    pub log_level: String,
    /// Force colors on or off (None = only on a terminal)
    pub color: Option<bool>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            command: "/bin/bash".to_string(),
            args: vec!["-c".to_string(), "./test.sh".to_string()],
            env: HashMap::from([("MYKEY".to_string(), "MYVALUE".to_string())]),
            inherit: vec![],
            working_dir: None,
            input: Some("a\nb\nc\n".to_string()),
            timeout_ms: None,
            log_level: "info".to_string(),
            color: None,
        }
    }
}

/// Layered settings as read, before defaults are applied
///
/// The child environment is a list of `KEY=VALUE` entries: the `config`
/// crate lowercases table keys, while list values keep their case.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunConfigFile {
    command: Option<String>,
    args: Option<Vec<String>>,
    env: Option<Vec<String>>,
    inherit: Vec<String>,
    working_dir: Option<PathBuf>,
    input: Option<String>,
    timeout_ms: Option<u64>,
    log_level: Option<String>,
    color: Option<bool>,
}

impl TryFrom<RunConfigFile> for RunConfig {
    type Error = CliError;

    fn try_from(file: RunConfigFile) -> CliResult<Self> {
        let defaults = RunConfig::default();

        // The default program's args, env and input only go with the default command
        let (command, args, env, input) = match file.command {
            Some(command) => (
                command,
                file.args.unwrap_or_default(),
                parse_env(&file.env.unwrap_or_default())?,
                file.input,
            ),
            None => (
                defaults.command,
                file.args.unwrap_or(defaults.args),
                match file.env {
                    Some(entries) => parse_env(&entries)?,
                    None => defaults.env,
                },
                file.input.or(defaults.input),
            ),
        };

        Ok(Self {
            command,
            args,
            env,
            inherit: file.inherit,
            working_dir: file.working_dir,
            input,
            timeout_ms: file.timeout_ms,
            log_level: file.log_level.unwrap_or(defaults.log_level),
            color: file.color,
        })
    }
}

/// Parse `KEY=VALUE` entries; the value may itself contain `=`
pub fn parse_env(entries: &[String]) -> CliResult<HashMap<String, String>> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CliError::Config(format!(
                "env entry '{}' is not KEY=VALUE",
                entry
            ))),
        })
        .collect()
}

impl RunConfig {
    /// Load from `PIPEWARDEN_CONFIG` or `./pipewarden.toml`, then environment overrides
    pub fn load() -> CliResult<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path, ENV_PREFIX)
    }

    /// Load from an optional file layered under variables with `env_prefix`
    pub fn load_from(path: &Path, env_prefix: &str) -> CliResult<Self> {
        let config = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix(env_prefix))
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let file: RunConfigFile = config
            .try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))?;
        let run = RunConfig::try_from(file)?;
        run.validate()?;
        Ok(run)
    }

    /// Reject configurations that cannot be run
    pub fn validate(&self) -> CliResult<()> {
        if self.command.trim().is_empty() {
            return Err(CliError::Config("command must not be empty".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(CliError::Config(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the supervisor configuration
    pub fn process_config(&self) -> ProcessConfig {
        let mut config = ProcessConfig::new(&self.command)
            .args(&self.args)
            .envs(self.env.clone())
            .pipe_stdin(self.input.is_some());

        for key in &self.inherit {
            config = config.inherit(key);
        }
        if let Some(ref dir) = self.working_dir {
            config = config.working_dir(dir);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.timeout(Duration::from_millis(ms));
        }
        config
    }
}
