use std::fs;
use std::path::Path;

/// Create an OSC8 hyperlink for terminal output
pub fn osc8_link(url: &str, text: &str) -> String {
    format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
}

/// Create an OSC8 file:// hyperlink for terminal output
pub fn osc8_file_link(path: &Path, text: &str) -> String {
    let abs_path = fs::canonicalize(path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string());
    osc8_link(&format!("file://{}", abs_path), text)
}

/// Format an integer with comma thousands separators ("12500" -> "12,500")
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Shorten `s` to at most `max` characters, marking the cut with an ellipsis
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(12500), "12,500");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("Dakar", 10), "Dakar");
        assert_eq!(truncate_chars("Thiès région", 6), "Thiès…");
    }

    #[test]
    fn test_osc8_link() {
        assert_eq!(
            osc8_link("https://example.com", "x"),
            "\x1b]8;;https://example.com\x1b\\x\x1b]8;;\x1b\\"
        );
    }
}
