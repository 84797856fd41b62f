use std::sync::Arc;

use xq_core::config::AiConfig;
use xq_core::{Error, Result, TextGenerator};

pub mod dummy;
pub mod openai;

pub use dummy::DummyModel;
pub use openai::OpenAiCompatModel;

/// Build the configured generator, failing when no credential is set.
pub fn create_model(config: &AiConfig) -> Result<Arc<dyn TextGenerator>> {
    if config.credential().is_none() {
        return Err(Error::Config(
            "SILICONFLOW_API_KEY is not configured".to_string(),
        ));
    }
    let model = OpenAiCompatModel::new(config)?;
    tracing::debug!("🧠 Using {} model {}", model.name(), model.model_id());
    Ok(Arc::new(model))
}

/// Like [`create_model`], but absence of a credential is not an error.
pub fn try_create_model(config: &AiConfig) -> Option<Arc<dyn TextGenerator>> {
    create_model(config).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_model_fails_fast_without_key() {
        let err = create_model(&AiConfig::default()).unwrap_err();
        assert!(err.to_string().contains("SILICONFLOW_API_KEY"));
        assert!(try_create_model(&AiConfig::default()).is_none());
    }

    #[test]
    fn test_create_model_reports_configured_model() {
        let config = AiConfig {
            api_key: Some("sk-test".to_string()),
            model: "Qwen/Qwen2.5-7B-Instruct".to_string(),
            ..AiConfig::default()
        };
        let model = create_model(&config).unwrap();
        assert_eq!(model.model_id(), "Qwen/Qwen2.5-7B-Instruct");
    }
}
