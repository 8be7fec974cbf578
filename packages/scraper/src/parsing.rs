//! Lossy field parsers for product pages.
//!
//! These never fail: a value that cannot be parsed is logged and replaced
//! by zero so one bad field does not cost the whole record.

/// Parses a currency string such as `"£51.77"` into a number.
///
/// Every character other than ASCII digits and `.` is dropped before
/// parsing. Returns `0.0` (and logs) when nothing parseable remains.
#[must_use]
pub fn clean_price(price: &str) -> f64 {
    let cleaned: String = price
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    cleaned.parse::<f64>().unwrap_or_else(|_| {
        log::error!("Error cleaning price: {price:?}");
        0.0
    })
}

/// Returns the first run of ASCII digits in `text` as an integer.
///
/// `"In stock (22 available)"` yields `Some(22)`. Returns `None` when the
/// text holds no digits or the number does not fit in a `u32`.
#[must_use]
pub fn first_integer(text: &str) -> Option<u32> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|run| !run.is_empty())
        .and_then(|run| run.parse().ok())
}

/// Parses a whole-number field, defaulting to `0` (and logging) on failure.
#[must_use]
pub fn parse_count(value: &str, field: &str) -> u32 {
    value.trim().parse().unwrap_or_else(|_| {
        log::error!("Error parsing {field}: {value:?}");
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_pound_price() {
        assert!((clean_price("£51.77") - 51.77).abs() < f64::EPSILON);
    }

    #[test]
    fn cleans_mis_encoded_price() {
        assert!((clean_price("Â£13.99") - 13.99).abs() < f64::EPSILON);
    }

    #[test]
    fn price_without_digits_is_zero() {
        assert!(clean_price("N/A").abs() < f64::EPSILON);
        assert!(clean_price("").abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_price_is_zero() {
        assert!(clean_price("1.2.3").abs() < f64::EPSILON);
    }

    #[test]
    fn finds_first_integer() {
        assert_eq!(first_integer("In stock (22 available)"), Some(22));
        assert_eq!(first_integer("3 of 10"), Some(3));
        assert_eq!(first_integer("Out of stock"), None);
    }

    #[test]
    fn counts_default_to_zero() {
        assert_eq!(parse_count(" 7 ", "num_reviews"), 7);
        assert_eq!(parse_count("many", "num_reviews"), 0);
    }
}
