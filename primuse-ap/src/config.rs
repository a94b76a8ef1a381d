//! Configuration for primuse-ap
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (`--port`, `--device`)
//! 2. Environment variables (`PRIMUSE_AP_PORT`, `PRIMUSE_AUDIO_DEVICE`)
//! 3. TOML file (`--config`, `PRIMUSE_CONFIG`, or the per-user config dir)
//! 4. Built-in defaults
//!
//! The file is bootstrap only; changes need a restart.

use crate::backend::FetchLimits;
use crate::error::{Error, Result};
use crate::playback::CoordinatorSettings;
use clap::Parser;
use primuse_common::config::{load_toml, resolve_config_path};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "PRIMUSE_CONFIG";

const APP_NAME: &str = "primuse";
const MIN_POLL_INTERVAL_MS: u64 = 50;

/// Command-line arguments for primuse-ap
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "primuse-ap")]
#[command(about = "Single-session audio player for PriMuse")]
#[command(version)]
pub struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PRIMUSE_AP_PORT")]
    pub port: Option<u16>,

    /// Output device name (system default when omitted)
    #[arg(short, long, env = "PRIMUSE_AUDIO_DEVICE")]
    pub device: Option<String>,

    /// Print available output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

/// TOML file layout
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub playback: PlaybackSection,

    #[serde(default)]
    pub audio: AudioSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            playback: PlaybackSection::default(),
            audio: AudioSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PlaybackSection {
    /// Position poll period while playing
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Step for skip forward / backward
    #[serde(default = "default_skip_step_ms")]
    pub skip_step_ms: u64,
}

impl Default for PlaybackSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            skip_step_ms: default_skip_step_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AudioSection {
    /// Output device name
    #[serde(default)]
    pub device: Option<String>,

    /// Timeout for fetching remote audio
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Largest audio file accepted from a locator
    #[serde(default = "default_max_fetch_bytes")]
    pub max_fetch_bytes: u64,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            device: None,
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_fetch_bytes: default_max_fetch_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingSection {
    /// Default level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    5780
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_skip_step_ms() -> u64 {
    15_000
}

fn default_fetch_timeout_ms() -> u64 {
    20_000
}

fn default_max_fetch_bytes() -> u64 {
    FetchLimits::default().max_bytes
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolved runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub poll_interval: Duration,
    pub skip_step_ms: u64,
    pub device: Option<String>,
    pub fetch_timeout: Duration,
    pub max_fetch_bytes: u64,
    pub log_level: String,
    /// File the settings came from (None when running on defaults)
    pub source: Option<PathBuf>,
}

impl Config {
    /// Discover, read, override, and validate
    pub fn load(args: &Args) -> Result<Self> {
        let source = resolve_config_path(args.config.as_deref(), CONFIG_ENV, APP_NAME)?;
        let file = match &source {
            Some(path) => load_toml(path)?,
            None => TomlConfig::default(),
        };

        let config = Self::from_parts(file, args, source)?;
        if let Some(path) = &config.source {
            info!("Loaded config from {}", path.display());
        }
        Ok(config)
    }

    /// Apply CLI overrides to a parsed file and validate the result
    pub fn from_parts(file: TomlConfig, args: &Args, source: Option<PathBuf>) -> Result<Self> {
        if file.playback.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(Error::Config(format!(
                "playback.poll_interval_ms must be at least {}, got {}",
                MIN_POLL_INTERVAL_MS, file.playback.poll_interval_ms
            )));
        }
        if file.playback.skip_step_ms == 0 {
            return Err(Error::Config("playback.skip_step_ms must be positive".to_string()));
        }
        if file.audio.fetch_timeout_ms == 0 {
            return Err(Error::Config("audio.fetch_timeout_ms must be positive".to_string()));
        }
        if file.audio.max_fetch_bytes == 0 {
            return Err(Error::Config("audio.max_fetch_bytes must be positive".to_string()));
        }

        Ok(Self {
            port: args.port.unwrap_or(file.port),
            poll_interval: Duration::from_millis(file.playback.poll_interval_ms),
            skip_step_ms: file.playback.skip_step_ms,
            device: args.device.clone().or(file.audio.device),
            fetch_timeout: Duration::from_millis(file.audio.fetch_timeout_ms),
            max_fetch_bytes: file.audio.max_fetch_bytes,
            log_level: file.logging.level,
            source,
        })
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            poll_interval: self.poll_interval,
            skip_step_ms: self.skip_step_ms,
        }
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            timeout: self.fetch_timeout,
            max_bytes: self.max_fetch_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let parsed: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(parsed, TomlConfig::default());

        let config = Config::from_parts(parsed, &Args::default(), None).unwrap();
        assert_eq!(config.port, 5780);
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.skip_step_ms, 15_000);
        assert_eq!(config.fetch_timeout, Duration::from_secs(20));
        assert_eq!(config.max_fetch_bytes, 100 * 1024 * 1024);
        assert_eq!(config.fetch_limits(), FetchLimits::default());
        assert_eq!(config.device, None);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_sections_parse() {
        let parsed: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [playback]
            poll_interval_ms = 250
            skip_step_ms = 10000

            [audio]
            device = "USB DAC"
            max_fetch_bytes = 1048576

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let config = Config::from_parts(parsed, &Args::default(), None).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.skip_step_ms, 10_000);
        assert_eq!(config.device.as_deref(), Some("USB DAC"));
        assert_eq!(config.fetch_timeout, Duration::from_millis(20_000));
        assert_eq!(config.fetch_limits().max_bytes, 1_048_576);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_cli_overrides_file() {
        let parsed: TomlConfig = toml::from_str("port = 6000\n[audio]\ndevice = \"A\"").unwrap();
        let args = Args {
            port: Some(7000),
            device: Some("B".to_string()),
            ..Args::default()
        };

        let config = Config::from_parts(parsed, &args, None).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.device.as_deref(), Some("B"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let too_fast: TomlConfig = toml::from_str("[playback]\npoll_interval_ms = 10").unwrap();
        assert!(matches!(
            Config::from_parts(too_fast, &Args::default(), None),
            Err(Error::Config(_))
        ));

        let no_step: TomlConfig = toml::from_str("[playback]\nskip_step_ms = 0").unwrap();
        assert!(matches!(
            Config::from_parts(no_step, &Args::default(), None),
            Err(Error::Config(_))
        ));

        let no_timeout: TomlConfig = toml::from_str("[audio]\nfetch_timeout_ms = 0").unwrap();
        assert!(matches!(
            Config::from_parts(no_timeout, &Args::default(), None),
            Err(Error::Config(_))
        ));

        let no_cap: TomlConfig = toml::from_str("[audio]\nmax_fetch_bytes = 0").unwrap();
        assert!(matches!(
            Config::from_parts(no_cap, &Args::default(), None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "primuse-ap",
            "--port",
            "5999",
            "--device",
            "Speakers",
            "--list-devices",
        ])
        .unwrap();
        assert_eq!(args.port, Some(5999));
        assert_eq!(args.device.as_deref(), Some("Speakers"));
        assert!(args.list_devices);
    }

    #[test]
    #[serial]
    fn test_load_from_explicit_path() {
        let file = write_config("port = 6100\n[playback]\nskip_step_ms = 5000\n");
        let args = Args {
            config: Some(file.path().to_path_buf()),
            ..Args::default()
        };

        let config = Config::load(&args).unwrap();
        assert_eq!(config.port, 6100);
        assert_eq!(config.skip_step_ms, 5000);
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    #[serial]
    fn test_load_from_env_path() {
        let file = write_config("port = 6200\n");
        std::env::set_var(CONFIG_ENV, file.path());

        let config = Config::load(&Args::default());
        std::env::remove_var(CONFIG_ENV);

        assert_eq!(config.unwrap().port, 6200);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_error() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/primuse/config.toml")),
            ..Args::default()
        };
        assert!(matches!(Config::load(&args), Err(Error::Common(_))));
    }

    #[test]
    #[serial]
    fn test_malformed_file_is_error() {
        let file = write_config("port = \"not a number\"");
        let args = Args {
            config: Some(file.path().to_path_buf()),
            ..Args::default()
        };
        assert!(Config::load(&args).is_err());
    }
}
