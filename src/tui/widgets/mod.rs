//! TUI Widgets - UI Components
//!
//! Panels are rendered inline in app.rs; shared helpers live here.

/// Common widget utilities
pub mod utils {
    use super::super::theme::icons;

    /// Format duration as HH:MM:SS
    pub fn format_duration(secs: u64) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    }

    /// Truncate string with ellipsis, counting characters
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else if max_len <= 3 {
            s.chars().take(max_len).collect()
        } else {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        }
    }

    /// `[███░░░]` for `done` out of `total`
    pub fn progress_bar(done: usize, total: usize, width: usize) -> String {
        let filled = if total == 0 {
            0
        } else {
            (done.min(total) * width) / total
        };
        format!(
            "[{}{}]",
            icons::BAR_FULL.to_string().repeat(filled),
            icons::BAR_EMPTY.to_string().repeat(width - filled)
        )
    }
}
