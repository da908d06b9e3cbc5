// Number formatting for tables and summaries. Rounding happens here only.

/// Groups the integer part with commas, e.g. `-12345.6` -> `-12,345.60` for two decimals.
pub fn format_grouped(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer_part, decimal_part) = match formatted.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (formatted.as_str(), None),
    };

    let grouped = integer_part
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(",");

    // -0.00 after rounding is shown as 0.00
    let negative = value < 0.0 && formatted.bytes().any(|b| matches!(b, b'1'..=b'9'));
    let sign = if negative { "-" } else { "" };

    match decimal_part {
        Some(d) => format!("{sign}{grouped}.{d}"),
        None => format!("{sign}{grouped}"),
    }
}

/// A forecast rounded to the nearest whole tweet.
pub fn format_forecast(value: f64) -> String {
    format_grouped(value.round(), 0)
}

/// Money with two decimals and an explicit `+` on gains.
pub fn format_signed(value: f64) -> String {
    let body = format_grouped(value, 2);
    if body.starts_with('-') {
        body
    } else {
        format!("+{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_grouped() {
        assert_eq!(format_grouped(0.0, 2), "0.00");
        assert_eq!(format_grouped(999.0, 0), "999");
        assert_eq!(format_grouped(1000.0, 0), "1,000");
        assert_eq!(format_grouped(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_grouped(-12345.6, 2), "-12,345.60");
        assert_eq!(format_grouped(-0.001, 2), "0.00");
    }

    #[test]
    fn test_format_forecast_rounds() {
        assert_eq!(format_forecast(1234.5), "1,235");
        assert_eq!(format_forecast(1234.49), "1,234");
        assert_eq!(format_forecast(-2.6), "-3");
    }

    #[test]
    fn test_format_signed() {
        assert_eq!(format_signed(150.0), "+150.00");
        assert_eq!(format_signed(0.0), "+0.00");
        assert_eq!(format_signed(-1500.5), "-1,500.50");
    }
}
