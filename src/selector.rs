//! Keyword-driven choice between the fast and the deep model.
//!
//! Exam-style questions ("NCLEX", "priority intervention", ...) go to the
//! slower, more accurate model; everything else goes to the fast one. The
//! decision only looks at the latest user message.

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Fast,
    Deep,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    /// Stored lower-cased.
    keywords: Vec<String>,
    fast_model: String,
    deep_model: String,
}

impl ModelSelector {
    pub fn new<I, S>(keywords: I, fast_model: impl Into<String>, deep_model: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            fast_model: fast_model.into(),
            deep_model: deep_model.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.selector.deep_keywords,
            config.provider.fast_model.clone(),
            config.provider.deep_model.clone(),
        )
    }

    pub fn tier(&self, latest_user_text: &str) -> ModelTier {
        let text = latest_user_text.to_lowercase();
        if self.keywords.iter().any(|k| text.contains(k.as_str())) {
            ModelTier::Deep
        } else {
            ModelTier::Fast
        }
    }

    /// Model id to use for a question.
    pub fn select_model(&self, latest_user_text: &str) -> &str {
        match self.tier(latest_user_text) {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Deep => &self.deep_model,
        }
    }
}
