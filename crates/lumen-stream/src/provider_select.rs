//! Provider selection from a model name prefix (spec §4.7 step 1).

/// Map a model name to its provider identifier by prefix match. Anything
/// unmatched falls back to a local/ollama provider.
pub fn select_provider(model: &str) -> &'static str {
    if model.starts_with("gpt-") || model.starts_with("o1-") {
        "openai"
    } else if model.starts_with("claude-") {
        "anthropic"
    } else if model.starts_with("deepseek-") {
        "deepseek"
    } else {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_prefixes_match() {
        assert_eq!(select_provider("gpt-4o"), "openai");
        assert_eq!(select_provider("o1-preview"), "openai");
    }

    #[test]
    fn anthropic_and_deepseek_prefixes_match() {
        assert_eq!(select_provider("claude-3-opus"), "anthropic");
        assert_eq!(select_provider("deepseek-coder"), "deepseek");
    }

    #[test]
    fn unknown_prefix_falls_back_to_local() {
        assert_eq!(select_provider("llama3"), "ollama");
    }
}
