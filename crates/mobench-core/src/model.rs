use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identifies the model under test plus the on-device artifacts needed to
/// load it. Tokenizer path is unused by runtimes that bundle their own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSpec {
    pub model_id: String,
    pub model_path: Option<PathBuf>,
    pub tokenizer_path: Option<PathBuf>,
}

impl ModelSpec {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            model_path: None,
            tokenizer_path: None,
        }
    }

    pub fn family(&self) -> String {
        extract_family(&self.model_id)
    }
}

fn family_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)Llama[_-](\d+\.\d+)[_-](\d+)B").unwrap())
}

/// Model family grouping used by the collection backend, e.g.
/// "Llama_3.2_1B_Q4.gguf" -> "Llama 3.2 1B".
pub fn extract_family(model_id: &str) -> String {
    if !model_id.to_lowercase().contains("llama") {
        return "Unknown".to_string();
    }
    match family_pattern().captures(model_id) {
        Some(caps) => format!("Llama {} {}B", &caps[1], &caps[2]),
        None => "Llama".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_version_and_size() {
        assert_eq!(extract_family("Llama_3.2_1B_Q4_0.pte"), "Llama 3.2 1B");
        assert_eq!(extract_family("llama-3.1-8B-instruct"), "Llama 3.1 8B");
    }

    #[test]
    fn bare_llama_and_unknown_families() {
        assert_eq!(extract_family("llama-guard"), "Llama");
        assert_eq!(extract_family("qwen2.5-0.5b"), "Unknown");
    }
}
