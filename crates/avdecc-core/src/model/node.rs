// ── Entity model graph ──
//
// Materialized, cross-referenced view of an `EntityTree`, built in one
// pass once the static model is complete. Nodes hold descriptor indices
// only; the models themselves stay in the tree and are looked up through
// the owning entity.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use super::descriptors::{StreamPortDynamicModel, StreamPortStaticModel};
use super::ids::{
    AudioUnitIndex, AvbInterfaceIndex, ClockDomainIndex, ClockSourceIndex, ClusterIndex,
    ConfigurationIndex, ControlIndex, DescriptorType, LocaleIndex, MapIndex, MemoryObjectIndex,
    StreamIndex, StreamPortIndex, StringsIndex, UniqueIdentifier,
};
use super::tree::{ConfigurationTree, EntityTree, ModelMap};
use crate::redundancy::{self, RedundancyClassification};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityNode {
    pub entity_id: UniqueIdentifier,
    pub configurations: BTreeMap<ConfigurationIndex, ConfigurationNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigurationNode {
    pub descriptor_index: ConfigurationIndex,
    pub audio_units: BTreeMap<AudioUnitIndex, AudioUnitNode>,
    pub stream_inputs: BTreeMap<StreamIndex, StreamNode>,
    pub stream_outputs: BTreeMap<StreamIndex, StreamNode>,
    pub avb_interfaces: BTreeSet<AvbInterfaceIndex>,
    pub clock_sources: BTreeSet<ClockSourceIndex>,
    pub memory_objects: BTreeSet<MemoryObjectIndex>,
    pub locales: BTreeMap<LocaleIndex, LocaleNode>,
    pub controls: BTreeSet<ControlIndex>,
    pub clock_domains: BTreeMap<ClockDomainIndex, ClockDomainNode>,
    pub redundant_stream_inputs: RedundancyClassification,
    pub redundant_stream_outputs: RedundancyClassification,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioUnitNode {
    pub descriptor_index: AudioUnitIndex,
    pub stream_port_inputs: BTreeMap<StreamPortIndex, StreamPortNode>,
    pub stream_port_outputs: BTreeMap<StreamPortIndex, StreamPortNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamPortNode {
    pub descriptor_index: StreamPortIndex,
    pub audio_clusters: BTreeSet<ClusterIndex>,
    pub audio_maps: BTreeSet<MapIndex>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamNode {
    pub descriptor_index: StreamIndex,
    /// Member of a valid redundant association.
    pub is_redundant: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocaleNode {
    pub descriptor_index: LocaleIndex,
    /// Only the STRINGS descriptors that were actually loaded.
    pub strings: BTreeSet<StringsIndex>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClockDomainNode {
    pub descriptor_index: ClockDomainIndex,
    /// Clock sources of the domain that exist in the configuration.
    pub clock_sources: Vec<ClockSourceIndex>,
}

impl EntityNode {
    /// Build the whole graph from a tree.
    pub fn build(entity_id: UniqueIdentifier, tree: &EntityTree) -> Self {
        let configurations = tree
            .configuration_trees
            .iter()
            .map(|(&index, config)| (index, ConfigurationNode::build(entity_id, index, config)))
            .collect();
        debug!(entity_id = %entity_id, "built entity model graph");
        Self {
            entity_id,
            configurations,
        }
    }
}

impl ConfigurationNode {
    fn build(
        entity_id: UniqueIdentifier,
        descriptor_index: ConfigurationIndex,
        config: &ConfigurationTree,
    ) -> Self {
        let audio_units = config
            .audio_unit_models
            .iter()
            .map(|(&index, unit)| {
                let model = &unit.static_model;
                let node = AudioUnitNode {
                    descriptor_index: index,
                    stream_port_inputs: stream_port_nodes(
                        config,
                        &config.stream_port_input_models,
                        model.base_stream_input_port,
                        model.number_of_stream_input_ports,
                    ),
                    stream_port_outputs: stream_port_nodes(
                        config,
                        &config.stream_port_output_models,
                        model.base_stream_output_port,
                        model.number_of_stream_output_ports,
                    ),
                };
                (index, node)
            })
            .collect();

        let locales = config
            .locale_models
            .iter()
            .map(|(&index, locale)| {
                let model = &locale.static_model;
                let strings = index_range(
                    model.base_string_descriptor_index,
                    model.number_of_string_descriptors,
                )
                .filter(|strings_index| config.strings_models.contains_key(strings_index))
                .collect();
                (
                    index,
                    LocaleNode {
                        descriptor_index: index,
                        strings,
                    },
                )
            })
            .collect();

        let clock_domains = config
            .clock_domain_models
            .iter()
            .map(|(&index, domain)| {
                let clock_sources = domain
                    .static_model
                    .clock_sources
                    .iter()
                    .copied()
                    .filter(|source| config.clock_source_models.contains_key(source))
                    .collect();
                (
                    index,
                    ClockDomainNode {
                        descriptor_index: index,
                        clock_sources,
                    },
                )
            })
            .collect();

        let redundant_stream_inputs = redundancy::classify(
            entity_id,
            DescriptorType::StreamInput,
            config
                .stream_input_models
                .iter()
                .map(|(&index, node)| (index, &node.static_model)),
        );
        let redundant_stream_outputs = redundancy::classify(
            entity_id,
            DescriptorType::StreamOutput,
            config
                .stream_output_models
                .iter()
                .map(|(&index, node)| (index, &node.static_model)),
        );

        let stream_inputs =
            stream_nodes(config.stream_input_models.keys(), &redundant_stream_inputs);
        let stream_outputs =
            stream_nodes(config.stream_output_models.keys(), &redundant_stream_outputs);

        Self {
            descriptor_index,
            audio_units,
            stream_inputs,
            stream_outputs,
            avb_interfaces: config.avb_interface_models.keys().copied().collect(),
            clock_sources: config.clock_source_models.keys().copied().collect(),
            memory_objects: config.memory_object_models.keys().copied().collect(),
            locales,
            controls: config.control_models.keys().copied().collect(),
            clock_domains,
            redundant_stream_inputs,
            redundant_stream_outputs,
        }
    }
}

fn index_range(base: u16, count: u16) -> impl Iterator<Item = u16> {
    (0..count).map_while(move |offset| base.checked_add(offset))
}

fn stream_port_nodes(
    config: &ConfigurationTree,
    ports: &ModelMap<StreamPortStaticModel, StreamPortDynamicModel>,
    base: StreamPortIndex,
    count: u16,
) -> BTreeMap<StreamPortIndex, StreamPortNode> {
    index_range(base, count)
        .filter_map(|port_index| {
            let model = &ports.get(&port_index)?.static_model;
            let node = StreamPortNode {
                descriptor_index: port_index,
                audio_clusters: index_range(model.base_cluster, model.number_of_clusters)
                    .filter(|cluster| config.audio_cluster_models.contains_key(cluster))
                    .collect(),
                audio_maps: index_range(model.base_map, model.number_of_maps)
                    .filter(|map| config.audio_map_models.contains_key(map))
                    .collect(),
            };
            Some((port_index, node))
        })
        .collect()
}

fn stream_nodes<'a>(
    indices: impl Iterator<Item = &'a StreamIndex>,
    classification: &RedundancyClassification,
) -> BTreeMap<StreamIndex, StreamNode> {
    indices
        .map(|&index| {
            (
                index,
                StreamNode {
                    descriptor_index: index,
                    is_redundant: classification.is_redundant(index),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{
        AudioUnitStaticModel, ClockDomainStaticModel, LocaleStaticModel, NodeModels,
        StreamStaticModel,
    };

    fn sample_tree() -> EntityTree {
        let mut config = ConfigurationTree::default();
        config.audio_unit_models.insert(
            0,
            NodeModels {
                static_model: AudioUnitStaticModel {
                    number_of_stream_input_ports: 1,
                    base_stream_input_port: 0,
                    ..AudioUnitStaticModel::default()
                },
                dynamic_model: Default::default(),
            },
        );
        config.stream_port_input_models.insert(
            0,
            NodeModels {
                static_model: StreamPortStaticModel {
                    number_of_clusters: 2,
                    base_cluster: 0,
                    ..StreamPortStaticModel::default()
                },
                dynamic_model: StreamPortDynamicModel::default(),
            },
        );
        config.audio_cluster_models.insert(0, NodeModels::default());
        config.audio_cluster_models.insert(1, NodeModels::default());
        config.locale_models.insert(
            0,
            NodeModels {
                static_model: LocaleStaticModel {
                    locale_id: "en-US".into(),
                    number_of_string_descriptors: 3,
                    base_string_descriptor_index: 0,
                },
                dynamic_model: (),
            },
        );
        config.strings_models.insert(0, NodeModels::default());
        config.strings_models.insert(2, NodeModels::default());
        config.clock_source_models.insert(0, NodeModels::default());
        config.clock_domain_models.insert(
            0,
            NodeModels {
                static_model: ClockDomainStaticModel {
                    clock_sources: vec![0, 7],
                    ..ClockDomainStaticModel::default()
                },
                dynamic_model: Default::default(),
            },
        );
        for (index, interface, peer) in [(0u16, 0u16, 1u16), (1, 1, 0)] {
            config.stream_input_models.insert(
                index,
                NodeModels {
                    static_model: StreamStaticModel {
                        avb_interface_index: interface,
                        redundant_streams: BTreeSet::from([peer]),
                        ..StreamStaticModel::default()
                    },
                    dynamic_model: Default::default(),
                },
            );
        }

        let mut tree = EntityTree::default();
        tree.configuration_trees.insert(0, config);
        tree
    }

    #[test]
    fn graph_links_ports_to_their_audio_unit() {
        let node = EntityNode::build(UniqueIdentifier(1), &sample_tree());
        let unit = &node.configurations[&0].audio_units[&0];

        assert_eq!(unit.stream_port_inputs.len(), 1);
        assert!(unit.stream_port_outputs.is_empty());
        assert_eq!(
            unit.stream_port_inputs[&0].audio_clusters,
            BTreeSet::from([0, 1])
        );
    }

    #[test]
    fn graph_skips_strings_and_clock_sources_that_were_not_loaded() {
        let node = EntityNode::build(UniqueIdentifier(1), &sample_tree());
        let config = &node.configurations[&0];

        assert_eq!(config.locales[&0].strings, BTreeSet::from([0, 2]));
        assert_eq!(config.clock_domains[&0].clock_sources, vec![0]);
    }

    #[test]
    fn graph_marks_redundant_streams() {
        let node = EntityNode::build(UniqueIdentifier(1), &sample_tree());
        let config = &node.configurations[&0];

        assert!(config.stream_inputs[&0].is_redundant);
        assert!(config.stream_inputs[&1].is_redundant);
        assert!(config.redundant_stream_inputs.is_primary(0));
        assert!(config.redundant_stream_outputs.nodes.is_empty());
    }
}
