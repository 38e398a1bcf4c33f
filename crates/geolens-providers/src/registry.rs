use std::sync::Arc;

use geolens_core::AppConfig;

use crate::adapter::{AdapterLimits, ProviderAdapter};
use crate::error::ProviderError;
use crate::types::ProviderKind;

/// The set of adapters known to this process, one per provider kind.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    adapters: Vec<Arc<ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Builds an adapter for every provider, available or not.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let limits = AdapterLimits::from_config(config);
        let adapters = ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let settings = match kind {
                    ProviderKind::OpenAi => &config.openai,
                    ProviderKind::Anthropic => &config.anthropic,
                    ProviderKind::Gemini => &config.gemini,
                    ProviderKind::Perplexity => &config.perplexity,
                };
                ProviderAdapter::new(kind, settings, limits).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { adapters })
    }

    #[must_use]
    pub fn from_adapters(adapters: Vec<Arc<ProviderAdapter>>) -> Self {
        Self { adapters }
    }

    #[must_use]
    pub fn all(&self) -> &[Arc<ProviderAdapter>] {
        &self.adapters
    }

    #[must_use]
    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<ProviderAdapter>> {
        self.adapters.iter().find(|a| a.kind() == kind)
    }

    #[must_use]
    pub fn available(&self) -> Vec<Arc<ProviderAdapter>> {
        self.adapters
            .iter()
            .filter(|a| a.is_available())
            .cloned()
            .collect()
    }

    /// Resolves project model names to available adapters.
    ///
    /// An empty list selects every available adapter. Unknown or
    /// unavailable names are logged and skipped.
    #[must_use]
    pub fn select(&self, names: &[String]) -> Vec<Arc<ProviderAdapter>> {
        if names.is_empty() {
            return self.available();
        }

        let mut selected: Vec<Arc<ProviderAdapter>> = Vec::new();
        for name in names {
            let kind = match name.parse::<ProviderKind>() {
                Ok(kind) => kind,
                Err(reason) => {
                    tracing::warn!(model = %name, %reason, "skipping unknown provider");
                    continue;
                }
            };
            match self.get(kind) {
                Some(adapter) if adapter.is_available() => {
                    if !selected.iter().any(|a| a.kind() == kind) {
                        selected.push(Arc::clone(adapter));
                    }
                }
                _ => tracing::warn!(provider = %kind, "skipping provider without credentials"),
            }
        }
        selected
    }
}
