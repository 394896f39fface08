use serde::Serialize;

use semgraph_core::error::{Result, SemgraphError};
use semgraph_core::store::{keys, KeyValueStore};

use crate::providers::{ProviderInfo, ProviderRegistry};

/// Provider, model and credential for one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub provider: String,
    pub model: String,
    #[serde(skip)]
    pub credential: String,
}

/// Pick the provider to call.
///
/// The stored `active_provider` wins when it has a non-empty key; otherwise
/// the first registered provider with a key is used. The model is the
/// stored `model:<provider>` or the provider's first model.
pub fn resolve_selection(registry: &ProviderRegistry, store: &dyn KeyValueStore) -> Result<Selection> {
    if let Some(active) = store.get_non_empty(keys::ACTIVE_PROVIDER) {
        if let Some(info) = registry.info(active.trim()) {
            if let Some(selection) = select(info, store) {
                return Ok(selection);
            }
        }
    }

    registry
        .providers()
        .find_map(|info| select(info, store))
        .ok_or(SemgraphError::NoProviderConfigured)
}

fn select(info: &ProviderInfo, store: &dyn KeyValueStore) -> Option<Selection> {
    let credential = store.get_non_empty(&keys::api_key(&info.id))?;
    let model = store
        .get_non_empty(&keys::model(&info.id))
        .or_else(|| info.models.first().cloned())?;
    Some(Selection {
        provider: info.id.clone(),
        model,
        credential,
    })
}
