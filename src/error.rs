//! Error types with fix suggestions

use thiserror::Error;

pub type Result<T> = std::result::Result<T, KioskError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All failures the kiosk core can report.
///
/// Protocol anomalies and illegal transitions are not errors: the
/// router classifies the former as `Other` and the state machine drops the
/// latter with a debug log.
#[derive(Error, Debug)]
pub enum KioskError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Process lifecycle (KIOSK-010 to KIOSK-012)
    // ─────────────────────────────────────────────────────────────

    #[error("KIOSK-010: Failed to launch '{executable}': {reason}")]
    LaunchFailed { executable: String, reason: String },

    #[error("KIOSK-011: Analysis process already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("KIOSK-012: Failed to capture {stream} of the analysis process")]
    StreamUnavailable { stream: &'static str },

    // ─────────────────────────────────────────────────────────────
    // Configuration (KIOSK-020 to KIOSK-021)
    // ─────────────────────────────────────────────────────────────

    #[error("KIOSK-020: Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("KIOSK-021: Config file not found: {path}")]
    ConfigNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // Replay transcripts (KIOSK-030)
    // ─────────────────────────────────────────────────────────────

    #[error("KIOSK-030: Bad directive at line {line}: {details}")]
    BadDirective { line: usize, details: String },
}

impl FixSuggestion for KioskError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            KioskError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            KioskError::Io(_) => Some("Check file path and permissions"),
            KioskError::LaunchFailed { .. } => {
                Some("Set process.executable in kiosk.yaml or KIOSK_EXECUTABLE to a valid interpreter")
            }
            KioskError::AlreadyRunning { .. } => {
                Some("Shut the running process down before starting a new one")
            }
            KioskError::StreamUnavailable { .. } => None,
            KioskError::InvalidConfig { .. } => Some("Durations must be positive numbers of seconds"),
            KioskError::ConfigNotFound { .. } => {
                Some("Pass --config <path> or create kiosk.yaml in the working directory")
            }
            KioskError::BadDirective { .. } => {
                Some("Supported directives: #wait <secs>, #duration <secs>, #capture, #error <reason>")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_failed_message() {
        let err = KioskError::LaunchFailed {
            executable: "/opt/python3".into(),
            reason: "No such file or directory".into(),
        };
        assert_eq!(
            err.to_string(),
            "KIOSK-010: Failed to launch '/opt/python3': No such file or directory"
        );
        assert!(err.fix_suggestion().is_some());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: KioskError = io.into();
        assert!(matches!(err, KioskError::Io(_)));
    }
}
