use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 8080;

/// Placeholder replaced by the job's source file path in toolchain commands
pub const INPUT_PLACEHOLDER: &str = "%INPUT%";

#[derive(Parser)]
#[command(name = "gorun", version = "0.1", about, long_about = None)]
pub struct CliArgs {
    /// Path to an optional JSON configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,
}

impl CliArgs {
    /// Load the configuration from the specified file, or fall back to defaults
    pub fn to_config(&self) -> anyhow::Result<Config> {
        let Some(path) = &self.config_path else {
            return Ok(Config::default());
        };
        let file =
            std::fs::File::open(path).with_context(|| format!("unable to open config {path}"))?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).with_context(|| format!("invalid config {path}"))
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub toolchain: ToolchainConfig,
    pub upload: UploadConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        self.bind_address
            .clone()
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Source file suffix, without the dot
    pub extension: String,
    /// Dependency resolution command, run inside the job's directory
    pub tidy_command: Vec<String>,
    /// Run command; `%INPUT%` expands to the source file path
    pub run_command: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            extension: "go".to_string(),
            tidy_command: vec!["go".into(), "mod".into(), "tidy".into()],
            run_command: vec!["go".into(), "run".into(), INPUT_PLACEHOLDER.into()],
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct UploadConfig {
    pub max_size: ByteSize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size: ByteSize(32 << 20),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

/// Picks the listen port: a non-empty `PORT` wins, then the config file, then 8080.
pub fn resolve_port(env_port: Option<&str>, configured: Option<u16>) -> anyhow::Result<u16> {
    match env_port.map(str::trim).filter(|p| !p.is_empty()) {
        Some(port) => port
            .parse()
            .with_context(|| format!("PORT is not a valid port number: {port}")),
        None => Ok(configured.unwrap_or_else(|| {
            log::info!("Set default port {DEFAULT_PORT}");
            DEFAULT_PORT
        })),
    }
}
