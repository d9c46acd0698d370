use super::types::Bias;

pub fn price(value: Option<f64>) -> String {
    value.map_or_else(|| "—".to_string(), |v| format!("{v:.4}"))
}

pub fn bias_class(bias: Bias) -> &'static str {
    match bias {
        Bias::Long => "bias bias--long",
        Bias::Short => "bias bias--short",
        Bias::Neutral => "bias bias--neutral",
    }
}

pub fn bias_badge(bias: Bias) -> &'static str {
    match bias {
        Bias::Long => "🟢",
        Bias::Short => "🔴",
        Bias::Neutral => "⚪",
    }
}

/// Width of a score bar as a CSS percentage.
pub fn score_width(score: u32) -> String {
    format!("{}%", score.min(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_is_stable() {
        assert_eq!(price(Some(1.23456)), "1.2346");
        assert_eq!(price(None), "—");
        assert_eq!(score_width(130), "100%");
        assert_eq!(bias_class(Bias::Short), "bias bias--short");
    }
}
