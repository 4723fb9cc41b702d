use serde::{Deserialize, Serialize};

const BAR_CELLS: i64 = 50;
const MIN_WIDTH_FOR_BAR: u16 = 110;
const MIN_WIDTH_FOR_ETA: u16 = 50;
const NANOS_PER_SEC: i128 = 1_000_000_000;
const SIZE_UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Byte counters attached to a progress message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonProgress {
    #[serde(default)]
    pub current: i64,
    #[serde(default)]
    pub total: i64,
    /// Unix timestamp (seconds) at which the transfer started
    #[serde(default)]
    pub start: i64,
}

impl JsonProgress {
    /// Renders `[===>   ] current/total eta` for a terminal `width` cells wide.
    ///
    /// `now` is the current unix time in seconds and only feeds the ETA.
    pub fn render(&self, width: u16, now: i64) -> String {
        if self.current <= 0 && self.total <= 0 {
            return String::new();
        }
        let current = human_size(self.current as f64);
        if self.total <= 0 {
            return format!("{current:>8}");
        }
        let total = human_size(self.total as f64);

        let percentage = ((self.current as f64 / self.total as f64 * 100.0) as i64 / 2)
            .clamp(0, BAR_CELLS);

        let mut bar = String::new();
        if width > MIN_WIDTH_FOR_BAR {
            bar = format!(
                "[{}>{}] ",
                "=".repeat(percentage as usize),
                " ".repeat((BAR_CELLS - percentage) as usize)
            );
        }

        let numbers = if self.current > self.total {
            String::new()
        } else {
            format!("{current:>8}/{total}")
        };

        let mut eta = String::new();
        if self.current > 0 && self.start > 0 && percentage < BAR_CELLS && width > MIN_WIDTH_FOR_ETA
        {
            let elapsed_nanos = i128::from((now - self.start).max(0)) * NANOS_PER_SEC;
            let per_byte = elapsed_nanos / i128::from(self.current);
            let left = i128::from(self.total - self.current) * per_byte / NANOS_PER_SEC;
            eta = format!(" {}", format_duration(left as i64));
        }

        format!("{bar}{numbers}{eta}")
    }
}

/// Formats a byte count with decimal units and four significant digits,
/// e.g. `1.5kB`, `23.46MB`.
pub fn human_size(size: f64) -> String {
    let mut value = size;
    let mut unit = 0;
    while value >= 1000.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{}{}", significant_digits(value, 4), SIZE_UNITS[unit])
}

fn significant_digits(value: f64, digits: i32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (digits - 1 - magnitude).max(0) as usize;
    let mut text = format!("{value:.decimals$}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    text
}

/// `1h2m3s` style duration, whole seconds.
fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, minutes, secs) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{secs}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, "0B")]
    #[case(999.0, "999B")]
    #[case(1000.0, "1kB")]
    #[case(1500.0, "1.5kB")]
    #[case(23_456_789.0, "23.46MB")]
    #[case(999_950.0, "1000kB")]
    #[case(3_000_000_000.0, "3GB")]
    fn formats_human_sizes(#[case] size: f64, #[case] expected: &str) {
        assert_eq!(human_size(size), expected);
    }

    #[rstest]
    #[case(0, "0s")]
    #[case(45, "45s")]
    #[case(90, "1m30s")]
    #[case(3605, "1h0m5s")]
    fn formats_durations(#[case] seconds: i64, #[case] expected: &str) {
        assert_eq!(format_duration(seconds), expected);
    }

    #[test]
    fn empty_progress_renders_nothing() {
        assert_eq!(JsonProgress::default().render(200, 0), "");
    }

    #[test]
    fn unknown_total_shows_current_only() {
        let progress = JsonProgress {
            current: 1500,
            ..JsonProgress::default()
        };
        assert_eq!(progress.render(200, 0), "   1.5kB");
    }

    #[test]
    fn wide_terminal_draws_bar_and_eta() {
        let progress = JsonProgress {
            current: 500,
            total: 1000,
            start: 100,
        };
        let expected = format!("[{}>{}]     500B/1kB 10s", "=".repeat(25), " ".repeat(25));
        assert_eq!(progress.render(200, 110), expected);
    }

    #[test]
    fn narrow_terminal_drops_bar_and_eta() {
        let progress = JsonProgress {
            current: 500,
            total: 1000,
            start: 100,
        };
        assert_eq!(progress.render(40, 110), "    500B/1kB");
    }

    #[test]
    fn overshoot_hides_numbers() {
        let progress = JsonProgress {
            current: 2000,
            total: 1000,
            start: 0,
        };
        let rendered = progress.render(200, 0);
        assert_eq!(rendered, format!("[{}>] ", "=".repeat(50)));
    }
}
