use time::macros::date;

use super::*;

#[test]
fn required_text_trims_and_bounds() {
    assert_eq!(required_text("  Rent  ", "name", 10), Ok("Rent".to_owned()));
    assert_eq!(required_text("   ", "name", 10), Err("name must not be empty".to_owned()));
    assert_eq!(required_text("abcdefghijk", "name", 10), Err("name must be at most 10 characters".to_owned()));
}

#[test]
fn required_text_counts_characters_not_bytes() {
    assert!(required_text("ééééé", "name", 5).is_ok());
}

#[test]
fn optional_text_allows_empty() {
    assert_eq!(optional_text("  ", "description", 5), Ok(String::new()));
    assert!(optional_text("toolong", "description", 5).is_err());
}

#[test]
fn positive_cents_rejects_zero_and_negative() {
    assert_eq!(positive_cents(1, "amount"), Ok(1));
    assert!(positive_cents(0, "amount").is_err());
    assert!(positive_cents(-500, "amount").is_err());
}

#[test]
fn positive_cents_caps_large_amounts() {
    assert_eq!(positive_cents(MAX_AMOUNT_CENTS, "amount"), Ok(MAX_AMOUNT_CENTS));
    assert!(positive_cents(MAX_AMOUNT_CENTS + 1, "amount").is_err());
    assert!(positive_cents(i64::MAX, "amount").is_err());
}

#[test]
fn future_date_is_strict() {
    let today = date!(2026 - 10 - 18);
    assert!(future_date(date!(2026 - 10 - 19), today, "deadline").is_ok());
    assert_eq!(future_date(today, today, "deadline"), Err("deadline must be in the future".to_owned()));
    assert!(future_date(date!(2025 - 01 - 01), today, "deadline").is_err());
}

#[test]
fn hex_color_normalizes_case() {
    assert_eq!(hex_color("#ff8800"), Ok("#FF8800".to_owned()));
    assert!(hex_color("ff8800").is_err());
    assert!(hex_color("#ff880").is_err());
    assert!(hex_color("#gg8800").is_err());
}

#[test]
fn currency_code_requires_three_letters() {
    assert_eq!(currency_code(" eur "), Ok("EUR".to_owned()));
    assert!(currency_code("EURO").is_err());
    assert!(currency_code("E1R").is_err());
}
