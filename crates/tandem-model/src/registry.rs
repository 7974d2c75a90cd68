// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Driver registry: static metadata for every supported model provider,
//! plus the single construction entry point [`from_config`].

use std::sync::Arc;

use anyhow::bail;

use tandem_config::ModelConfig;

use crate::openai::{AuthStyle, OpenAiCompatProvider};
use crate::{AnthropicProvider, ModelProvider, ScriptedProvider};

/// Metadata describing a registered model driver.
#[derive(Debug, Clone)]
pub struct DriverMeta {
    /// Unique provider id used in the `model.provider` config field.
    pub id: &'static str,
    /// Human-readable display name.
    pub name: &'static str,
    /// One-line description shown by `tandem list-providers`.
    pub description: &'static str,
    /// Default environment variable that holds the API key.  `None` for
    /// providers that need no key (local servers, the mock).
    pub default_api_key_env: Option<&'static str>,
    /// Default base URL when the user does not set `model.base_url`.
    pub default_base_url: Option<&'static str>,
    /// Whether an explicit API key is required.
    pub requires_api_key: bool,
}

/// Complete registry of supported drivers.
pub static DRIVERS: &[DriverMeta] = &[
    DriverMeta {
        id: "anthropic",
        name: "Anthropic",
        description: "Anthropic Claude models",
        default_api_key_env: Some("ANTHROPIC_API_KEY"),
        default_base_url: Some("https://api.anthropic.com"),
        requires_api_key: true,
    },
    DriverMeta {
        id: "openai",
        name: "OpenAI",
        description: "OpenAI GPT and o-series models",
        default_api_key_env: Some("OPENAI_API_KEY"),
        default_base_url: Some("https://api.openai.com/v1"),
        requires_api_key: true,
    },
    DriverMeta {
        id: "ollama",
        name: "Ollama",
        description: "Local models via the Ollama OpenAI-compatible endpoint",
        default_api_key_env: None,
        default_base_url: Some("http://localhost:11434/v1"),
        requires_api_key: false,
    },
    DriverMeta {
        id: "mock",
        name: "Mock",
        description: "Deterministic offline provider for tests and smoke runs",
        default_api_key_env: None,
        default_base_url: None,
        requires_api_key: false,
    },
];

/// Look up a driver's metadata by id.
pub fn get_driver(id: &str) -> Option<&'static DriverMeta> {
    DRIVERS.iter().find(|d| d.id == id)
}

/// Build a provider from the model configuration.
///
/// Key resolution order: explicit `api_key`, then the configured
/// `api_key_env` variable, then the driver's canonical variable.
pub fn from_config(config: &ModelConfig) -> anyhow::Result<Arc<dyn ModelProvider>> {
    let meta = match get_driver(&config.provider) {
        Some(m) => m,
        None => {
            let known: Vec<&str> = DRIVERS.iter().map(|d| d.id).collect();
            bail!(
                "unknown model provider '{}' (known: {})",
                config.provider,
                known.join(", ")
            );
        }
    };

    let api_key = resolve_api_key(config, meta);
    if meta.requires_api_key && api_key.is_none() {
        match meta.default_api_key_env {
            Some(var) => bail!("missing API key for provider '{}' (set {var})", meta.id),
            None => bail!("missing API key for provider '{}'", meta.id),
        }
    }

    let base_url = config
        .base_url
        .clone()
        .or_else(|| meta.default_base_url.map(str::to_string));

    match meta.id {
        "anthropic" => Ok(Arc::new(AnthropicProvider::new(
            config.name.clone(),
            api_key,
            base_url,
            config.max_tokens,
            config.temperature,
        ))),
        "openai" | "ollama" => {
            let base = match base_url {
                Some(b) => b,
                None => bail!("provider '{}' needs a base_url", meta.id),
            };
            let auth = if meta.requires_api_key {
                AuthStyle::Bearer
            } else {
                AuthStyle::None
            };
            Ok(Arc::new(OpenAiCompatProvider::new(
                meta.id,
                config.name.clone(),
                api_key,
                &base,
                config.max_tokens,
                config.temperature,
                auth,
            )))
        }
        "mock" => Ok(Arc::new(ScriptedProvider::always_text(
            "mock provider reply",
        ))),
        other => bail!("driver '{other}' is registered but not constructible"),
    }
}

fn resolve_api_key(config: &ModelConfig, meta: &DriverMeta) -> Option<String> {
    if let Some(key) = &config.api_key {
        return Some(key.clone());
    }
    if let Some(var) = &config.api_key_env {
        if let Ok(key) = std::env::var(var) {
            return Some(key);
        }
    }
    meta.default_api_key_env
        .and_then(|var| std::env::var(var).ok())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_driver_id_is_unique() {
        let mut ids: Vec<&str> = DRIVERS.iter().map(|d| d.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), DRIVERS.len());
    }

    #[test]
    fn get_driver_finds_known_ids() {
        assert!(get_driver("anthropic").is_some());
        assert!(get_driver("openai").is_some());
        assert!(get_driver("nope").is_none());
    }

    #[test]
    fn unknown_provider_errors_with_known_list() {
        let config = ModelConfig {
            provider: "galaxybrain".into(),
            ..Default::default()
        };
        let err = from_config(&config).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("galaxybrain"));
        assert!(msg.contains("anthropic"));
    }

    #[test]
    fn explicit_api_key_satisfies_required_key() {
        let config = ModelConfig {
            provider: "openai".into(),
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let provider = from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn local_driver_needs_no_key() {
        let config = ModelConfig {
            provider: "ollama".into(),
            name: "llama3".into(),
            ..Default::default()
        };
        let provider = from_config(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model_name(), "llama3");
    }

    #[test]
    fn mock_driver_always_constructs() {
        let config = ModelConfig {
            provider: "mock".into(),
            ..Default::default()
        };
        assert!(from_config(&config).is_ok());
    }
}
