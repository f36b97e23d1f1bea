//! Kiosk Configuration
//!
//! Loaded from `kiosk.yaml` (or `--config <path>`). Every field has a default,
//! so an empty file or no file at all yields a runnable kiosk.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`KIOSK_EXECUTABLE`, `KIOSK_SCRIPT`)
//! 2. Config file
//! 3. Defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KioskError, Result};

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "kiosk.yaml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KioskConfig {
    pub process: ProcessConfig,
    pub flow: FlowConfig,
    pub router: RouterConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    /// Host tick period in milliseconds (~60fps)
    pub tick_ms: u64,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            process: ProcessConfig::default(),
            flow: FlowConfig::default(),
            router: RouterConfig::default(),
            capture: CaptureConfig::default(),
            storage: StorageConfig::default(),
            tick_ms: 16,
        }
    }
}

/// External analysis process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessConfig {
    /// Interpreter or binary to run
    pub executable: String,
    /// Script passed as the first argument (omitted when empty)
    pub script: Option<PathBuf>,
    /// Extra arguments after the script
    pub args: Vec<String>,
    /// Working directory for the process
    pub working_dir: Option<PathBuf>,
    /// How long `QUIT` gets before the process is killed
    pub grace_period_ms: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            executable: "python3".to_string(),
            script: Some(PathBuf::from("main_vision_voice.py")),
            args: Vec::new(),
            working_dir: None,
            grace_period_ms: 2000,
        }
    }
}

impl ProcessConfig {
    /// Full argument list: script first, then extra args
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        if let Some(script) = &self.script {
            argv.push(script.to_string_lossy().into_owned());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Phase timings and skip switches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlowConfig {
    /// Message phase length when no audio duration was reported
    pub message_secs: f64,
    /// End phase length
    pub end_secs: f64,
    /// Added to every reported audio duration
    pub message_padding_secs: f64,
    /// Stay in Scanning instead of showing the scan-complete view
    pub skip_scan_complete: bool,
    /// Return to Waiting on the next tick instead of showing the end view
    pub skip_end: bool,
    /// Return to Waiting if scanning stalls this long (disabled when unset)
    pub scan_timeout_secs: Option<f64>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            message_secs: 10.0,
            end_secs: 5.0,
            message_padding_secs: 2.0,
            skip_scan_complete: false,
            skip_end: false,
            scan_timeout_secs: None,
        }
    }
}

/// Protocol routing options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Host whose HTTP responses mark scan completion or failure
    pub api_host: String,
    /// Debug fan-out: every raw line also goes to the rune feed
    pub broadcast_all_lines: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            api_host: "api.deepseek.com".to_string(),
            broadcast_all_lines: false,
        }
    }
}

/// Capture trigger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub camera_index: u32,
    /// Minimum spacing between two accepted capture requests
    pub cooldown_secs: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            cooldown_secs: 3.0,
        }
    }
}

/// Files the kiosk reads and writes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Append-only message archive
    pub message_log: PathBuf,
    /// Captured images (purged by `kiosk purge`)
    pub capture_dir: PathBuf,
    /// Generated voice files (purged by `kiosk purge`)
    pub voice_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            message_log: PathBuf::from("Message.txt"),
            capture_dir: PathBuf::from("capture"),
            voice_dir: PathBuf::from("voice"),
        }
    }
}

impl KioskConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(KioskError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML text; an empty document yields the defaults
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load `path` if given, else `kiosk.yaml` when present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        let config = config.with_env();
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Self {
        if let Ok(exe) = std::env::var("KIOSK_EXECUTABLE") {
            if !exe.is_empty() {
                self.process.executable = exe;
            }
        }
        if let Ok(script) = std::env::var("KIOSK_SCRIPT") {
            if !script.is_empty() {
                self.process.script = Some(PathBuf::from(script));
            }
        }
        self
    }

    /// Reject values the state machine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.process.executable.trim().is_empty() {
            return Err(KioskError::InvalidConfig {
                reason: "process.executable is empty".to_string(),
            });
        }

        let durations = [
            ("flow.message_secs", self.flow.message_secs),
            ("flow.end_secs", self.flow.end_secs),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value <= 0.0 {
                return Err(KioskError::InvalidConfig {
                    reason: format!("{} must be positive, got {}", name, value),
                });
            }
        }

        if !self.flow.message_padding_secs.is_finite() || self.flow.message_padding_secs < 0.0 {
            return Err(KioskError::InvalidConfig {
                reason: "flow.message_padding_secs must not be negative".to_string(),
            });
        }

        if let Some(timeout) = self.flow.scan_timeout_secs {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(KioskError::InvalidConfig {
                    reason: format!("flow.scan_timeout_secs must be positive, got {}", timeout),
                });
            }
        }

        if !self.capture.cooldown_secs.is_finite() || self.capture.cooldown_secs < 0.0 {
            return Err(KioskError::InvalidConfig {
                reason: "capture.cooldown_secs must not be negative".to_string(),
            });
        }

        if self.tick_ms == 0 {
            return Err(KioskError::InvalidConfig {
                reason: "tick_ms must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = KioskConfig::from_yaml("").unwrap();
        assert_eq!(config, KioskConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
flow:
  skip_scan_complete: true
router:
  api_host: api.example.com
"#;
        let config = KioskConfig::from_yaml(yaml).unwrap();
        assert!(config.flow.skip_scan_complete);
        assert_eq!(config.flow.message_secs, 10.0);
        assert_eq!(config.router.api_host, "api.example.com");
        assert_eq!(config.process.grace_period_ms, 2000);
    }

    #[test]
    fn test_argv_puts_script_first() {
        let process = ProcessConfig {
            script: Some(PathBuf::from("main.py")),
            args: vec!["--verbose".into()],
            ..ProcessConfig::default()
        };
        assert_eq!(process.argv(), vec!["main.py", "--verbose"]);
    }

    #[test]
    fn test_validate_rejects_zero_message_secs() {
        let mut config = KioskConfig::default();
        config.flow.message_secs = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flow.message_secs"));
    }

    #[test]
    fn test_validate_rejects_empty_executable() {
        let mut config = KioskConfig::default();
        config.process.executable = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(KioskError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = KioskConfig::from_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, KioskError::ConfigNotFound { .. }));
    }
}
