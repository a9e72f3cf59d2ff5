/// Format an amount with thousands separators and its currency code: -1,234.56 EUR
pub fn amount(val: f64, currency: &str) -> String {
    let negative = val < 0.0;
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();
    let sign = if negative { "-" } else { "" };

    format!("{sign}{with_commas}.{dec_part} {currency}")
}

/// Cut to `width` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(1234.56, "EUR"), "1,234.56 EUR");
        assert_eq!(amount(-4.5, "USD"), "-4.50 USD");
        assert_eq!(amount(0.0, "EUR"), "0.00 EUR");
        assert_eq!(amount(1000000.99, "GBP"), "1,000,000.99 GBP");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("coffee", 10), "coffee");
        assert_eq!(truncate("coffee shop downtown", 8), "coffee …");
    }
}
