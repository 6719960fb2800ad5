// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lenient parsing helpers for model output and user-typed values.

/// Returns the first balanced span of `text` that parses as a JSON object.
///
/// Braces inside string literals (including escaped quotes) are ignored, so
/// replies wrapped in prose or Markdown fences still yield their payload.
/// Balanced spans that are not JSON, such as a `{nombre}` placeholder in the
/// prose, are skipped. Returns `None` when no span qualifies.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        if let Some(close) = matching_brace(bytes, open) {
            let span = &text[open..=close];
            if serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(span).is_ok() {
                return Some(span);
            }
        }
        start = open + 1;
    }
    None
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses a money or quantity value as typed by a person.
///
/// Accepts currency symbols, spaces, `k`/`mil` suffixes and both Spanish
/// (`50.000`, `19,99`) and English (`50,000`, `19.99`) separators. When a
/// single separator is followed by exactly three digits it is read as a
/// thousands separator.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let lowered = raw.trim().to_lowercase();
    let (body, multiplier) = if let Some(rest) = lowered.strip_suffix("mil") {
        (rest.trim_end(), 1000.0)
    } else if let Some(rest) = lowered.strip_suffix('k') {
        (rest.trim_end(), 1000.0)
    } else {
        (lowered.as_str(), 1.0)
    };

    let negative = body.trim_start().starts_with('-');
    let cleaned: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = normalize_separators(&cleaned);
    let value: f64 = normalized.parse().ok()?;
    let value = value * multiplier;
    Some(if negative { -value } else { value })
}

fn normalize_separators(s: &str) -> String {
    let dots = s.matches('.').count();
    let commas = s.matches(',').count();

    match (dots, commas) {
        (0, 0) => s.to_string(),
        (_, 0) | (0, _) => {
            let sep = if dots > 0 { '.' } else { ',' };
            let count = dots + commas;
            if count > 1 {
                return s.replace(sep, "");
            }
            let (before, after) = s.split_once(sep).unwrap_or((s, ""));
            if after.len() == 3 && (1..=3).contains(&before.len()) {
                format!("{before}{after}")
            } else {
                format!("{before}.{after}")
            }
        }
        _ => {
            let last_dot = s.rfind('.').unwrap_or(0);
            let last_comma = s.rfind(',').unwrap_or(0);
            let (decimal, thousands) = if last_comma > last_dot {
                (',', '.')
            } else {
                ('.', ',')
            };
            s.replace(thousands, "").replace(decimal, ".")
        }
    }
}

/// Formats a price the way the store shows it: `$50.000` or `$19,99`.
pub fn format_price(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let whole = cents / 100;
    let frac = (cents % 100).abs();

    let digits = whole.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if whole < 0 { "-" } else { "" };
    if frac == 0 {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped},{frac:02}")
    }
}
