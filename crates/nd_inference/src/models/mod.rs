use std::str::FromStr;
use std::sync::Arc;

use nd_core::{Error, Result, Summarizer};
use tracing::info;

pub mod extractive;
pub mod openai;

pub use extractive::ExtractiveSummarizer;
pub use openai::OpenAiSummarizer;

use crate::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    OpenAi,
    Extractive,
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ModelKind::OpenAi),
            "extractive" | "offline" => Ok(ModelKind::Extractive),
            other => Err(Error::InvalidConfig(format!(
                "unknown model {:?}, expected openai or extractive",
                other
            ))),
        }
    }
}

pub fn create_summarizer(config: &Config) -> Result<Arc<dyn Summarizer>> {
    let summarizer: Arc<dyn Summarizer> = match config.model {
        ModelKind::OpenAi => {
            let mut model = OpenAiSummarizer::new(config.api_key.clone())?;
            if let Some(name) = &config.model_name {
                model = model.with_model(name.clone());
            }
            if let Some(url) = &config.base_url {
                model = model.with_base_url(url.clone());
            }
            Arc::new(model)
        }
        ModelKind::Extractive => Arc::new(ExtractiveSummarizer::new()),
    };
    info!(model = summarizer.name(), "Summarizer initialized");
    Ok(summarizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("OpenAI".parse::<ModelKind>().unwrap(), ModelKind::OpenAi);
        assert_eq!("extractive".parse::<ModelKind>().unwrap(), ModelKind::Extractive);
        assert!("ollama".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_create_extractive_without_key() {
        let config = Config {
            model: ModelKind::Extractive,
            ..Config::default()
        };
        assert_eq!(create_summarizer(&config).unwrap().name(), "Extractive");
    }

    #[test]
    fn test_openai_requires_key() {
        let config = Config {
            model: ModelKind::OpenAi,
            api_key: None,
            ..Config::default()
        };
        assert!(create_summarizer(&config).is_err());
    }
}
