//! Parsing of abbreviated engagement counts as rendered in the feed.

/// Parse a display count such as `"45"`, `"1,234"`, `"1.2K"` or `"3M"`.
///
/// Suffixes are case-sensitive. Fractional results are truncated toward
/// zero. Anything unparseable yields 0.
#[must_use]
pub fn parse_count(text: &str) -> u64 {
    let text = text.trim();
    if text.is_empty() {
        return 0;
    }

    if let Some(number) = text.strip_suffix('K') {
        return scaled(number, 1_000.0);
    }
    if let Some(number) = text.strip_suffix('M') {
        return scaled(number, 1_000_000.0);
    }

    text.replace(',', "").parse().unwrap_or(0)
}

fn scaled(number: &str, factor: f64) -> u64 {
    match number.trim().parse::<f64>() {
        // Saturating float-to-int cast truncates toward zero
        Ok(value) if value.is_finite() && value >= 0.0 => (value * factor) as u64,
        _ => 0,
    }
}
