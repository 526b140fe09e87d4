//! Small formatting helpers for the terminal report.

pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", n, UNITS[0])
    } else if value < 10.0 {
        format!("{:.1} {}", value, UNITS[unit])
    } else {
        format!("{:.0} {}", value, UNITS[unit])
    }
}

/// Pads to `width` chars, truncating with an ellipsis when too long.
pub fn pad_plain(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len > width {
        let keep = width.saturating_sub(1).max(1);
        let mut out: String = s.chars().take(keep).collect();
        out.push('…');
        out
    } else {
        format!("{:<width$}", s, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(1023), "1023 B");
        assert_eq!(human_bytes(1024), "1.0 KB");
        assert_eq!(human_bytes(1536), "1.5 KB");
        assert_eq!(human_bytes(600_000), "586 KB");
    }

    #[test]
    fn test_pad_plain() {
        assert_eq!(pad_plain("hi", 5), "hi   ");
        assert_eq!(pad_plain("hello", 4), "hel…");
    }
}
