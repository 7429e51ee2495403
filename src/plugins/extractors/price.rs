use rust_decimal::Decimal;
use std::str::FromStr;

use crate::utils::error::ExtractionFailure;

/// Strips currency symbols and thousands separators and parses a positive decimal.
///
/// When both `.` and `,` appear the last one is the decimal separator. A lone `,`
/// is a decimal separator only when exactly two digits follow it (`19,99`).
pub fn normalize_price(text: &str) -> Result<Decimal, ExtractionFailure> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let cleaned = cleaned.trim_end_matches(['.', ',']);

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(ExtractionFailure::ParseError(format!(
            "no digits in '{}'",
            text.trim()
        )));
    }

    let canonical = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(comma)) => {
            let decimals = cleaned.len() - comma - 1;
            if decimals == 2 && cleaned.matches(',').count() == 1 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned.to_string(),
    };

    if canonical.matches('.').count() > 1 {
        return Err(ExtractionFailure::ParseError(format!(
            "ambiguous separators in '{}'",
            text.trim()
        )));
    }

    let value = Decimal::from_str(&canonical).map_err(|e| {
        ExtractionFailure::ParseError(format!("'{}' is not a number: {}", text.trim(), e))
    })?;

    if value <= Decimal::ZERO {
        return Err(ExtractionFailure::ParseError(format!(
            "'{}' is not a positive price",
            text.trim()
        )));
    }

    Ok(value.normalize())
}
