/// Strips the currency symbol and thousands separators: `"$1,234.56"` -> `1234.56`.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Mean of every sample that parses. No parseable samples gives exactly 0.0.
pub fn average_prices<S: AsRef<str>>(samples: &[S]) -> f64 {
    let prices: Vec<f64> = samples
        .iter()
        .filter_map(|s| {
            let parsed = parse_price(s.as_ref());
            if parsed.is_none() {
                log::warn!("Skipping unparseable price {:?}", s.as_ref());
            }
            parsed
        })
        .collect();

    if prices.is_empty() {
        return 0.0;
    }
    prices.iter().sum::<f64>() / prices.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_symbol_and_separators() {
        assert_eq!(parse_price("$1,234.56"), Some(1234.56));
        assert_eq!(parse_price(" $12 "), Some(12.0));
        assert_eq!(parse_price("$1,000,000"), Some(1_000_000.0));
    }

    #[test]
    fn rejects_non_numeric_text() {
        assert_eq!(parse_price("Price not found"), None);
        assert_eq!(parse_price("$24.99/mo."), None);
    }

    #[test]
    fn averages_three_listing_prices() {
        let avg = average_prices(&["$449.99", "$459.00", "$439.50"]);
        assert!((avg - 449.496_666_666).abs() < 1e-6);
    }

    #[test]
    fn average_of_nothing_is_zero() {
        let empty: [&str; 0] = [];
        assert_eq!(average_prices(&empty), 0.0);
    }

    #[test]
    fn partial_samples_average_over_what_parsed() {
        assert_eq!(average_prices(&["$10.00", "n/a"]), 10.0);
        assert_eq!(average_prices(&["$10.00", "$20.00"]), 15.0);
    }
}
