//! Declarative per-entity configuration and the hook trait entities
//! implement to customize source construction, presentation, and linking.

use crate::row::Row;
use hybrid_search_core::identity::EntityId;
use hybrid_search_core::model::{EntityConfig, Link, Presenter};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-entity hooks. All methods have permissive defaults so an entity that
/// only needs one customization doesn't have to implement the rest.
pub trait EntityHooks: Send + Sync {
    /// Builds the field map handed to the field-policy projector. Default
    /// uses the row's fields verbatim.
    fn build_source(&self, row: &Row) -> BTreeMap<String, Value> {
        row.fields.clone()
    }

    fn format_result(&self, _row: &Row) -> Option<Presenter> {
        None
    }

    fn resolve_url(&self, _row: &Row) -> Option<String> {
        None
    }

    fn resolve_links(&self, _row: &Row) -> Vec<Link> {
        Vec::new()
    }
}

/// Used for entities that declare no custom hooks.
pub struct DefaultHooks;
impl EntityHooks for DefaultHooks {}

pub struct EntityConfigEntry {
    pub config: EntityConfig,
    pub hooks: Arc<dyn EntityHooks>,
}

/// Registry of every entity participating in search, keyed by `entity_id`.
#[derive(Default)]
pub struct EntityConfigRegistry {
    entries: BTreeMap<EntityId, EntityConfigEntry>,
}

impl EntityConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, config: EntityConfig, hooks: Arc<dyn EntityHooks>) {
        self.entries.insert(config.entity_id.clone(), EntityConfigEntry { config, hooks });
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&EntityConfigEntry> {
        self.entries.get(entity_id)
    }

    pub fn enabled_entities(&self) -> impl Iterator<Item = &EntityConfigEntry> {
        self.entries.values().filter(|entry| entry.config.enabled)
    }
}
