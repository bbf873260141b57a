//! Translation client (LibreTranslate-style API).
//!
//! Translation is a POST on the wire but side-effect-free, so the client
//! marks it cacheable; repeated lookups of the same phrase resolve from the
//! cache.

use std::sync::Arc;

use serde_json::{json, Value};

use wordlens_commons::ApiError;

use crate::config::constants::{env_vars, urls};
use crate::config::PipelineConfig;
use crate::pipeline::{ApiOperation, RequestPipeline};
use crate::services::{resolve_api_key, resolve_base_url};
use crate::transport::{HttpTransport, Transport};

const SERVICE_NAME: &str = "translate";

/// A translated phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    /// Source language the server detected, when `source` was "auto".
    pub detected_source: Option<String>,
}

pub struct TranslationClient {
    api_key: Option<String>,
    base_url: String,
    pipeline: RequestPipeline,
}

impl TranslationClient {
    pub fn new() -> Self {
        Self::from_config(None, None, None)
    }

    pub fn from_config(
        api_key: Option<String>,
        base_url: Option<String>,
        config: Option<PipelineConfig>,
    ) -> Self {
        Self::with_transport(api_key, base_url, Arc::new(HttpTransport::new()), config)
    }

    pub fn with_transport(
        api_key: Option<String>,
        base_url: Option<String>,
        transport: Arc<dyn Transport>,
        config: Option<PipelineConfig>,
    ) -> Self {
        let api_key = resolve_api_key(api_key, env_vars::TRANSLATE_API_KEY);
        let base_url = resolve_base_url(
            urls::TRANSLATE_API_BASE,
            base_url,
            env_vars::TRANSLATE_BASE_URL,
        );
        let config = config.unwrap_or_default();
        Self {
            api_key,
            base_url,
            pipeline: RequestPipeline::new(SERVICE_NAME, transport, &config),
        }
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Translate `text` from `source` (language code or "auto") into
    /// `target`.
    pub async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<Translation, ApiError> {
        let payload = self.build_payload(text, source, target);
        let operation = ApiOperation::post(format!("{}/translate", self.base_url), payload)
            .cacheable(true);

        let response = self.pipeline.execute(operation).await?;
        parse_translation(&response.json()?)
    }

    fn build_payload(&self, text: &str, source: &str, target: &str) -> Value {
        let mut payload = json!({
            "q": text,
            "source": source,
            "target": target,
            "format": "text",
        });
        if let Some(api_key) = &self.api_key {
            payload["api_key"] = Value::String(api_key.clone());
        }
        payload
    }
}

impl Default for TranslationClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_translation(value: &Value) -> Result<Translation, ApiError> {
    let text = value
        .get("translatedText")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Decode {
            message: "translation payload missing 'translatedText'".to_owned(),
            metadata: None,
        })?
        .to_owned();

    Ok(Translation {
        text,
        detected_source: value
            .get("detectedLanguage")
            .and_then(|detected| detected.get("language"))
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}
