// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number normalisation for the gateway's `number` field.

use missive_core::MissiveError;

/// Keep digits only; national-format numbers (10 or 11 digits) get the
/// default country code prefixed.
pub fn normalize_destination(
    destination: &str,
    default_country_code: Option<&str>,
) -> Result<String, MissiveError> {
    let digits: String = destination.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(MissiveError::channel(format!(
            "invalid destination `{destination}`: no digits"
        )));
    }

    let country: String = default_country_code
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if !country.is_empty() && matches!(digits.len(), 10 | 11) {
        return Ok(format!("{country}{digits}"));
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting() {
        assert_eq!(
            normalize_destination("+55 (11) 98765-4321", None).unwrap(),
            "5511987654321"
        );
    }

    #[test]
    fn prefixes_national_numbers() {
        assert_eq!(
            normalize_destination("11 98765-4321", Some("55")).unwrap(),
            "5511987654321"
        );
        assert_eq!(
            normalize_destination("1133334444", Some("+55")).unwrap(),
            "551133334444"
        );
    }

    #[test]
    fn leaves_international_numbers_alone() {
        assert_eq!(
            normalize_destination("5511987654321", Some("55")).unwrap(),
            "5511987654321"
        );
        assert_eq!(normalize_destination("12345", Some("55")).unwrap(), "12345");
    }

    #[test]
    fn rejects_digitless_input() {
        assert!(normalize_destination("unknown", Some("55")).is_err());
        assert!(normalize_destination("", None).is_err());
    }
}
