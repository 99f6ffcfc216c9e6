//! Field checks shared by the domain services.
//!
//! Each helper returns the normalized value or a human-readable message that
//! the calling service wraps in its own `Invalid` error variant.

use time::Date;

/// Trim `raw` and require `1..=max_chars` characters.
pub fn required_text(raw: &str, field: &str, max_chars: usize) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(format!("{field} must be at most {max_chars} characters"));
    }
    Ok(trimmed.to_owned())
}

/// Trim `raw` and allow empty, up to `max_chars` characters.
pub fn optional_text(raw: &str, field: &str, max_chars: usize) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.chars().count() > max_chars {
        return Err(format!("{field} must be at most {max_chars} characters"));
    }
    Ok(trimmed.to_owned())
}

/// Largest single amount accepted anywhere: one trillion in major units.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000_000;

pub fn positive_cents(value: i64, field: &str) -> Result<i64, String> {
    if value <= 0 {
        return Err(format!("{field} must be greater than zero"));
    }
    if value > MAX_AMOUNT_CENTS {
        return Err(format!("{field} must be at most {MAX_AMOUNT_CENTS} cents"));
    }
    Ok(value)
}

/// Deadlines must fall strictly after `today`.
pub fn future_date(value: Date, today: Date, field: &str) -> Result<Date, String> {
    if value <= today {
        return Err(format!("{field} must be in the future"));
    }
    Ok(value)
}

/// Accept `#RRGGBB` (case-insensitive), returned uppercase.
pub fn hex_color(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    let valid = trimmed.len() == 7
        && trimmed.starts_with('#')
        && trimmed[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err("color must look like #RRGGBB".to_owned());
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Three ASCII letters, returned uppercase.
pub fn currency_code(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err("currency must be a three-letter ISO code".to_owned());
    }
    Ok(trimmed.to_ascii_uppercase())
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
