//! Line protocol spoken by the analysis process
//!
//! Every stdout line carries at most one meaningful directive, identified by a
//! literal bracketed marker anywhere in the line. Classification is a fixed
//! priority chain because markers co-occur: the oracle logs through Python's
//! `logging` with a `[[%(levelname)s]]` prefix, so most lines also contain
//! `[[INFO]]`.
//!
//! ```text
//! CAPTURE_DONE > start markers > OLLAMA_START > OLLAMA_PROGRESS > Ollama done
//!   > vendor markers > CHARACTER > CREDIT > MESSAGE > ITEM_IDENTIFIED
//!   > API response (host + HTTP status) > Other
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

// ─────────────────────────────────────────────────────────────────────────────
// Markers
// ─────────────────────────────────────────────────────────────────────────────

pub const CAPTURE_DONE: &str = "[[CAPTURE_DONE]]";
pub const STATE_START: &str = "[[STATE_START]]";
pub const OLLAMA_ANALYZING: &str = "Analyzing image (Local Ollama):";
pub const OLLAMA_START: &str = "[[OLLAMA_START]]";
pub const OLLAMA_PROGRESS: &str = "[[OLLAMA_PROGRESS]]";
pub const OLLAMA_DONE: &str = "[[OLLAMA_DONE]]";
pub const OLLAMA_ANALYSIS: &str = "[[OLLAMA ANALYSIS]]";
pub const VENDOR_PREFIX: &str = "[[DEEPSEEK";
pub const CHARACTER: &str = "[[CHARACTER]]";
pub const CREDIT: &str = "[[CREDIT]]";
pub const MESSAGE: &str = "[[MESSAGE]]";
pub const ITEM_IDENTIFIED: &str = "[[ITEM_IDENTIFIED]]";
pub const INFO: &str = "[[INFO]]";

/// Separator between character name and credit body
pub const CREDIT_SEPARATOR: char = '｜';

/// Stdin command asking the process to shoot a frame
pub fn capture_command(camera_index: u32) -> String {
    format!("CAPTURE {}", camera_index)
}

/// Stdin command asking the process to exit
pub const QUIT_COMMAND: &str = "QUIT";

static ROLE_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(Role:\s*[^)]*\)").unwrap());

/// `HTTP/1.1 200 OK`, `"HTTP/2 404"`, `HTTP 500`
static HTTP_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"HTTP(?:/\d(?:\.\d)?)?\s+(\d{3})\b").unwrap());

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

// ─────────────────────────────────────────────────────────────────────────────
// Tags
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of one protocol line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolTag {
    CaptureDone,
    ScanStart,
    OllamaStart,
    OllamaProgress,
    OllamaDone,
    /// `[[DEEPSEEK ...]]` diagnostics from the text-generation stage
    VendorProgress,
    Character,
    Credit,
    Message,
    ItemIdentified,
    ExternalApiResponse { status: u16 },
    Other,
}

impl ProtocolTag {
    /// API response with a 2xx status
    pub fn is_api_success(&self) -> bool {
        matches!(self, Self::ExternalApiResponse { status } if (200..300).contains(status))
    }

    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::ExternalApiResponse { .. }) && !self.is_api_success()
    }
}

impl std::fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CaptureDone => write!(f, "CAPTURE_DONE"),
            Self::ScanStart => write!(f, "SCAN_START"),
            Self::OllamaStart => write!(f, "OLLAMA_START"),
            Self::OllamaProgress => write!(f, "OLLAMA_PROGRESS"),
            Self::OllamaDone => write!(f, "OLLAMA_DONE"),
            Self::VendorProgress => write!(f, "VENDOR"),
            Self::Character => write!(f, "CHARACTER"),
            Self::Credit => write!(f, "CREDIT"),
            Self::Message => write!(f, "MESSAGE"),
            Self::ItemIdentified => write!(f, "ITEM_IDENTIFIED"),
            Self::ExternalApiResponse { status } => write!(f, "API_RESPONSE({})", status),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// Assign exactly one tag to `line`, first match wins.
///
/// `api_host` is matched as a plain substring; an empty host disables API
/// response detection.
pub fn classify(line: &str, api_host: &str) -> ProtocolTag {
    if line.contains(CAPTURE_DONE) {
        ProtocolTag::CaptureDone
    } else if line.contains(STATE_START) || line.contains(OLLAMA_ANALYZING) {
        ProtocolTag::ScanStart
    } else if line.contains(OLLAMA_START) {
        ProtocolTag::OllamaStart
    } else if line.contains(OLLAMA_PROGRESS) {
        ProtocolTag::OllamaProgress
    } else if line.contains(OLLAMA_DONE) || line.contains(OLLAMA_ANALYSIS) {
        ProtocolTag::OllamaDone
    } else if line.contains(VENDOR_PREFIX) {
        ProtocolTag::VendorProgress
    } else if line.contains(CHARACTER) {
        ProtocolTag::Character
    } else if line.contains(CREDIT) {
        ProtocolTag::Credit
    } else if line.contains(MESSAGE) {
        ProtocolTag::Message
    } else if line.contains(ITEM_IDENTIFIED) {
        ProtocolTag::ItemIdentified
    } else if let Some(status) = api_status(line, api_host) {
        ProtocolTag::ExternalApiResponse { status }
    } else {
        ProtocolTag::Other
    }
}

/// HTTP status of a response line mentioning `api_host`
pub fn api_status(line: &str, api_host: &str) -> Option<u16> {
    if api_host.is_empty() || !line.contains(api_host) {
        return None;
    }
    HTTP_STATUS
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Bodies
// ─────────────────────────────────────────────────────────────────────────────

/// Remove `marker` and `[[INFO]]`, then trim. Nothing else is touched.
pub fn strip_markers(line: &str, marker: &str) -> String {
    line.replace(marker, "").replace(INFO, "").trim().to_string()
}

pub fn message_body(line: &str) -> String {
    strip_markers(line, MESSAGE)
}

pub fn character_body(line: &str) -> String {
    strip_markers(line, CHARACTER)
}

pub fn item_body(line: &str) -> String {
    strip_markers(line, ITEM_IDENTIFIED)
}

/// Credit text with the `(Role: ...)` annotation removed
pub fn credit_body(line: &str) -> String {
    let body = strip_markers(line, CREDIT);
    ROLE_ANNOTATION.replace_all(&body, "").trim().to_string()
}

/// Token count reported by `[[OLLAMA_PROGRESS]] <n>`
pub fn progress_tokens(line: &str) -> Option<u32> {
    let body = strip_markers(line, OLLAMA_PROGRESS);
    FIRST_NUMBER
        .find(&body)
        .and_then(|m| m.as_str().parse().ok())
}

/// Compose the displayed credit.
///
/// Pure function of its inputs: `by {character}｜{body}` when a character is
/// known, otherwise `body` verbatim.
pub fn compose_credit(character: Option<&str>, body: &str) -> String {
    match character.map(str::trim) {
        Some(name) if !name.is_empty() => format!("by {}{}{}", name, CREDIT_SEPARATOR, body),
        _ => body.to_string(),
    }
}
