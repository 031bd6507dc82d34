// Prices in USD per million tokens: (model prefix, prompt, completion).
const PRICES: [(&str, f64, f64); 8] = [
    ("gemini-1.5-flash", 0.075, 0.30),
    ("gemini-1.5-pro", 1.25, 5.0),
    ("claude-3-5-haiku", 0.80, 4.0),
    ("claude-3-5-sonnet", 3.0, 15.0),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.0),
    ("o1", 15.0, 60.0),
    ("dall-e-3", 0.0, 0.0),
];

pub fn cost_usd(model: &str, prompt_tokens: i64, completion_tokens: i64) -> f64 {
    let price = PRICES
        .iter()
        .filter(|(prefix, _, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _, _)| prefix.len());

    match price {
        Some((_, prompt_price, completion_price)) => {
            (prompt_tokens as f64 * prompt_price + completion_tokens as f64 * completion_price)
                / 1_000_000.0
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn longest_prefix_wins() {
        // gpt-4o-mini must not be priced as gpt-4o.
        let mini = super::cost_usd("gpt-4o-mini", 1_000_000, 0);
        let full = super::cost_usd("gpt-4o", 1_000_000, 0);

        assert_eq!(mini, 0.15);
        assert_eq!(full, 2.50);
    }

    #[test]
    fn unknown_models_cost_nothing() {
        assert_eq!(super::cost_usd("mystery-model", 1_000_000, 1_000_000), 0.0);
    }
}
