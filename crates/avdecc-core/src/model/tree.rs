// ── Entity model tree ──
//
// The learned model of one entity: per configuration, one map per
// descriptor category from descriptor index to its (static, dynamic)
// pair. A pair is always created and stored together, so a dynamic model
// never exists without its static counterpart.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::descriptors::{
    AudioClusterDynamicModel, AudioClusterStaticModel, AudioMapStaticModel, AudioUnitDynamicModel,
    AudioUnitStaticModel, AvbInterfaceDynamicModel, AvbInterfaceStaticModel,
    ClockDomainDynamicModel, ClockDomainStaticModel, ClockSourceDynamicModel,
    ClockSourceStaticModel, ConfigurationDynamicModel, ConfigurationStaticModel,
    ControlDynamicModel, ControlStaticModel, EntityDynamicModel, EntityStaticModel,
    LocaleStaticModel, MemoryObjectDynamicModel, MemoryObjectStaticModel,
    StreamInputDynamicModel, StreamOutputDynamicModel, StreamPortDynamicModel,
    StreamPortStaticModel, StreamStaticModel, StringsStaticModel,
};
use super::ids::{ConfigurationIndex, DescriptorIndex, DescriptorType, UniqueIdentifier};
use crate::error::CoreError;

/// Static and dynamic halves of one descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeModels<S, D> {
    pub static_model: S,
    pub dynamic_model: D,
}

pub type ModelMap<S, D> = BTreeMap<DescriptorIndex, NodeModels<S, D>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationTree {
    pub static_model: ConfigurationStaticModel,
    pub dynamic_model: ConfigurationDynamicModel,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub audio_unit_models: ModelMap<AudioUnitStaticModel, AudioUnitDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stream_input_models: ModelMap<StreamStaticModel, StreamInputDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stream_output_models: ModelMap<StreamStaticModel, StreamOutputDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub avb_interface_models: ModelMap<AvbInterfaceStaticModel, AvbInterfaceDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub clock_source_models: ModelMap<ClockSourceStaticModel, ClockSourceDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub memory_object_models: ModelMap<MemoryObjectStaticModel, MemoryObjectDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub locale_models: ModelMap<LocaleStaticModel, ()>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub strings_models: ModelMap<StringsStaticModel, ()>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stream_port_input_models: ModelMap<StreamPortStaticModel, StreamPortDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stream_port_output_models: ModelMap<StreamPortStaticModel, StreamPortDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub audio_cluster_models: ModelMap<AudioClusterStaticModel, AudioClusterDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub audio_map_models: ModelMap<AudioMapStaticModel, ()>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub control_models: ModelMap<ControlStaticModel, ControlDynamicModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub clock_domain_models: ModelMap<ClockDomainStaticModel, ClockDomainDynamicModel>,
}

impl ConfigurationTree {
    /// Number of descriptors of each type actually present in the tree.
    pub fn model_counts(&self) -> BTreeMap<DescriptorType, usize> {
        [
            (DescriptorType::AudioUnit, self.audio_unit_models.len()),
            (DescriptorType::StreamInput, self.stream_input_models.len()),
            (DescriptorType::StreamOutput, self.stream_output_models.len()),
            (DescriptorType::AvbInterface, self.avb_interface_models.len()),
            (DescriptorType::ClockSource, self.clock_source_models.len()),
            (DescriptorType::MemoryObject, self.memory_object_models.len()),
            (DescriptorType::Locale, self.locale_models.len()),
            (DescriptorType::Strings, self.strings_models.len()),
            (DescriptorType::StreamPortInput, self.stream_port_input_models.len()),
            (DescriptorType::StreamPortOutput, self.stream_port_output_models.len()),
            (DescriptorType::AudioCluster, self.audio_cluster_models.len()),
            (DescriptorType::AudioMap, self.audio_map_models.len()),
            (DescriptorType::Control, self.control_models.len()),
            (DescriptorType::ClockDomain, self.clock_domain_models.len()),
        ]
        .into_iter()
        .collect()
    }

    /// Whether every category holds exactly as many descriptors as the
    /// configuration declares in its descriptor counts.
    pub fn is_complete(&self) -> bool {
        self.model_counts().into_iter().all(|(descriptor_type, count)| {
            let declared = self
                .static_model
                .descriptor_counts
                .get(&descriptor_type)
                .copied()
                .unwrap_or(0);
            usize::from(declared) == count
        })
    }
}

/// Root of the learned model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTree {
    pub static_model: EntityStaticModel,
    pub dynamic_model: EntityDynamicModel,
    #[serde(default)]
    pub configuration_trees: BTreeMap<ConfigurationIndex, ConfigurationTree>,
}

impl EntityTree {
    pub fn is_empty(&self) -> bool {
        self.configuration_trees.is_empty()
    }

    /// All `configurations_count` configurations are present and complete.
    pub fn is_complete(&self, configurations_count: u16) -> bool {
        usize::from(configurations_count) == self.configuration_trees.len()
            && self
                .configuration_trees
                .values()
                .all(ConfigurationTree::is_complete)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a tree. Nothing is mutated on failure, so callers can parse
    /// first and swap the result in afterwards.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let tree: Self = serde_json::from_str(json)?;
        debug!(
            configurations = tree.configuration_trees.len(),
            "parsed entity model tree"
        );
        Ok(tree)
    }
}

/// A tree persisted for reuse by every entity sharing the same model ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedModelDocument {
    pub entity_model_id: UniqueIdentifier,
    pub cached_at: DateTime<Utc>,
    pub tree: EntityTree,
}

impl CachedModelDocument {
    pub fn new(entity_model_id: UniqueIdentifier, tree: EntityTree) -> Self {
        Self {
            entity_model_id,
            cached_at: Utc::now(),
            tree,
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn configuration_with_counts(counts: &[(DescriptorType, u16)]) -> ConfigurationTree {
        let mut tree = ConfigurationTree::default();
        tree.static_model.descriptor_counts = counts.iter().copied().collect();
        tree
    }

    #[test]
    fn empty_configuration_without_counts_is_complete() {
        assert!(ConfigurationTree::default().is_complete());
    }

    #[test]
    fn configuration_is_incomplete_until_every_declared_descriptor_is_present() {
        let mut tree = configuration_with_counts(&[(DescriptorType::StreamInput, 2)]);
        tree.stream_input_models.insert(0, NodeModels::default());
        assert!(!tree.is_complete());

        tree.stream_input_models.insert(1, NodeModels::default());
        assert!(tree.is_complete());
    }

    #[test]
    fn undeclared_descriptors_make_configuration_incomplete() {
        let mut tree = configuration_with_counts(&[]);
        tree.control_models.insert(0, NodeModels::default());
        assert!(!tree.is_complete());
    }

    #[test]
    fn entity_tree_completeness_checks_configuration_count() {
        let mut tree = EntityTree::default();
        tree.configuration_trees.insert(0, ConfigurationTree::default());
        assert!(tree.is_complete(1));
        assert!(!tree.is_complete(2));
    }

    #[test]
    fn entity_tree_survives_json() {
        let mut tree = EntityTree::default();
        tree.dynamic_model.entity_name = "Stage Box".into();
        let mut config = configuration_with_counts(&[(DescriptorType::AudioUnit, 1)]);
        config.audio_unit_models.insert(0, NodeModels::default());
        tree.configuration_trees.insert(0, config);

        let json = tree.to_json().unwrap();
        let parsed = EntityTree::from_json(&json).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = EntityTree::from_json("{ \"configuration_trees\": 42 }").unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }
}
