/// Parses a score written with either `.` or `,` as the decimal separator.
///
/// Empty, unparseable and non-finite input yields `None`; callers treat that
/// as missing data, never as zero.
pub fn parse_score(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = trimmed.replacen(',', ".", 1);
    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_both_decimal_separators() {
        assert_eq!(parse_score("7.5"), Some(7.5));
        assert_eq!(parse_score("7,5"), Some(7.5));
        assert_eq!(parse_score(" 10 "), Some(10.0));
    }

    #[test]
    fn unparseable_input_is_missing() {
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("   "), None);
        assert_eq!(parse_score("n/a"), None);
        assert_eq!(parse_score("7,5,1"), None);
        assert_eq!(parse_score("NaN"), None);
        assert_eq!(parse_score("inf"), None);
    }

    #[test]
    fn mean_of_nothing_is_undefined() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[4.0, 8.0]), Some(6.0));
    }

    proptest! {
        #[test]
        fn comma_and_dot_parse_alike(whole in 0u32..=10, frac in 0u32..100) {
            let dotted = format!("{whole}.{frac:02}");
            let commaed = format!("{whole},{frac:02}");
            prop_assert_eq!(parse_score(&dotted), parse_score(&commaed));
            prop_assert!(parse_score(&dotted).is_some());
        }
    }
}
