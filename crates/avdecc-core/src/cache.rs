// ── Entity model cache ──
//
// Static models keyed by entity model ID, so a second entity of the same
// model can skip READ_DESCRIPTOR enumeration. Lock-free reads via
// `DashMap`; trees are shared as `Arc` and copied only when adopted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::config::TrackerConfig;
use crate::model::{
    CachedModelDocument, ConfigurationIndex, ConfigurationTree, EntityTree, UniqueIdentifier,
};

#[derive(Debug)]
pub struct EntityModelCache {
    enabled: AtomicBool,
    trees: DashMap<UniqueIdentifier, Arc<EntityTree>>,
}

impl Default for EntityModelCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl EntityModelCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            trees: DashMap::new(),
        }
    }

    /// Enabled or not per the tracker's `model_cache_enabled` switch.
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.model_cache_enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Disabling also drops every cached tree.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        if !enabled {
            self.clear();
        }
    }

    /// Store a tree. A tree with fewer complete configurations never
    /// replaces a better one already cached for the same model.
    pub fn cache_entity_tree(&self, entity_model_id: UniqueIdentifier, tree: &EntityTree) {
        if !self.is_enabled() || !entity_model_id.is_valid() || tree.is_empty() {
            return;
        }

        let complete = complete_configurations(tree);
        if complete == 0 {
            return;
        }
        if self
            .trees
            .get(&entity_model_id)
            .is_some_and(|cached| complete_configurations(&cached) > complete)
        {
            return;
        }

        debug!(
            entity_model_id = %entity_model_id,
            complete_configurations = complete,
            "caching entity model"
        );
        self.trees.insert(entity_model_id, Arc::new(tree.clone()));
    }

    /// A cached tree usable for `configuration_index`, or for every
    /// configuration when `for_all_configurations` is set.
    pub fn get_entity_tree(
        &self,
        entity_model_id: UniqueIdentifier,
        configuration_index: ConfigurationIndex,
        for_all_configurations: bool,
    ) -> Option<Arc<EntityTree>> {
        if !self.is_enabled() {
            return None;
        }
        let tree = self.trees.get(&entity_model_id)?;
        let usable = if for_all_configurations {
            tree.configuration_trees
                .values()
                .all(ConfigurationTree::is_complete)
        } else {
            tree.configuration_trees
                .get(&configuration_index)
                .is_some_and(ConfigurationTree::is_complete)
        };
        usable.then(|| Arc::clone(&tree))
    }

    pub fn remove(&self, entity_model_id: UniqueIdentifier) -> Option<Arc<EntityTree>> {
        self.trees.remove(&entity_model_id).map(|(_, tree)| tree)
    }

    pub fn clear(&self) {
        self.trees.clear();
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Export a cached tree for writing to disk.
    pub fn document(&self, entity_model_id: UniqueIdentifier) -> Option<CachedModelDocument> {
        self.trees
            .get(&entity_model_id)
            .map(|tree| CachedModelDocument::new(entity_model_id, EntityTree::clone(&tree)))
    }

    /// Import a previously exported tree.
    pub fn load_document(&self, document: &CachedModelDocument) {
        self.cache_entity_tree(document.entity_model_id, &document.tree);
    }
}

fn complete_configurations(tree: &EntityTree) -> usize {
    tree.configuration_trees
        .values()
        .filter(|configuration| configuration.is_complete())
        .count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{DescriptorType, NodeModels};

    const MODEL: UniqueIdentifier = UniqueIdentifier(0x001B_9200_0000_0001);

    fn configuration(inputs: u16, present: u16) -> ConfigurationTree {
        let mut configuration = ConfigurationTree::default();
        configuration
            .static_model
            .descriptor_counts
            .insert(DescriptorType::StreamInput, inputs);
        for index in 0..present {
            configuration
                .stream_input_models
                .insert(index, NodeModels::default());
        }
        configuration
    }

    fn tree(configurations: &[(u16, u16)]) -> EntityTree {
        let mut tree = EntityTree::default();
        for (index, &(declared, present)) in (0u16..).zip(configurations) {
            tree.configuration_trees
                .insert(index, configuration(declared, present));
        }
        tree
    }

    #[test]
    fn returns_tree_complete_for_requested_configuration() {
        let cache = EntityModelCache::default();
        cache.cache_entity_tree(MODEL, &tree(&[(2, 2), (2, 1)]));

        assert!(cache.get_entity_tree(MODEL, 0, false).is_some());
        assert!(cache.get_entity_tree(MODEL, 1, false).is_none());
        assert!(cache.get_entity_tree(MODEL, 0, true).is_none());
    }

    #[test]
    fn tracker_config_switch_disables_caching() {
        let disabled = EntityModelCache::from_config(&TrackerConfig {
            model_cache_enabled: false,
            ..TrackerConfig::default()
        });
        assert!(!disabled.is_enabled());
        disabled.cache_entity_tree(MODEL, &tree(&[(1, 1)]));
        assert!(disabled.is_empty());

        let enabled = EntityModelCache::from_config(&TrackerConfig::default());
        assert!(enabled.is_enabled());
        enabled.cache_entity_tree(MODEL, &tree(&[(1, 1)]));
        assert_eq!(enabled.len(), 1);
    }

    #[test]
    fn partial_tree_never_replaces_full_one() {
        let cache = EntityModelCache::default();
        cache.cache_entity_tree(MODEL, &tree(&[(2, 2), (1, 1)]));
        cache.cache_entity_tree(MODEL, &tree(&[(2, 2), (1, 0)]));

        assert!(cache.get_entity_tree(MODEL, 1, true).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn ignores_incomplete_trees_and_null_model_ids() {
        let cache = EntityModelCache::default();
        cache.cache_entity_tree(MODEL, &tree(&[(2, 1)]));
        cache.cache_entity_tree(UniqueIdentifier::NULL, &tree(&[(1, 1)]));
        cache.cache_entity_tree(MODEL, &EntityTree::default());

        assert!(cache.is_empty());
    }

    #[test]
    fn disabled_cache_stores_and_returns_nothing() {
        let cache = EntityModelCache::default();
        cache.cache_entity_tree(MODEL, &tree(&[(1, 1)]));
        cache.set_enabled(false);

        assert!(cache.is_empty());
        cache.cache_entity_tree(MODEL, &tree(&[(1, 1)]));
        assert!(cache.get_entity_tree(MODEL, 0, false).is_none());
    }

    #[test]
    fn document_survives_json() {
        let cache = EntityModelCache::default();
        cache.cache_entity_tree(MODEL, &tree(&[(1, 1)]));

        let json = cache.document(MODEL).unwrap().to_json().unwrap();
        let restored = EntityModelCache::default();
        restored.load_document(&CachedModelDocument::from_json(&json).unwrap());

        assert_eq!(
            *restored.get_entity_tree(MODEL, 0, true).unwrap(),
            tree(&[(1, 1)])
        );
    }
}
