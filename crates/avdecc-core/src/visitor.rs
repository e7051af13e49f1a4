// ── Entity model visitor ──
//
// Depth-first walk of an entity's model graph. Every callback has an
// empty default, so visitors only override what they care about. Nodes
// carry indices; visitors read models back through the entity.

use crate::entity::ControlledEntity;
use crate::model::{
    AudioUnitNode, AvbInterfaceIndex, ClockDomainNode, ClockSourceIndex, ClusterIndex,
    ConfigurationNode, ControlIndex, DescriptorType, EntityNode, LocaleNode, MapIndex,
    MemoryObjectIndex, StreamNode, StreamPortNode, StringsIndex,
};
use crate::redundancy::RedundantStreamNode;

#[allow(unused_variables)]
pub trait EntityModelVisitor {
    fn visit_entity(&mut self, entity: &ControlledEntity, node: &EntityNode) {}

    fn visit_configuration(&mut self, entity: &ControlledEntity, node: &ConfigurationNode) {}

    fn visit_audio_unit(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        node: &AudioUnitNode,
    ) {
    }

    fn visit_stream_input(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        node: &StreamNode,
    ) {
    }

    fn visit_stream_output(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        node: &StreamNode,
    ) {
    }

    fn visit_avb_interface(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        avb_interface_index: AvbInterfaceIndex,
    ) {
    }

    fn visit_clock_source(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        clock_source_index: ClockSourceIndex,
    ) {
    }

    fn visit_memory_object(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        memory_object_index: MemoryObjectIndex,
    ) {
    }

    fn visit_locale(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        node: &LocaleNode,
    ) {
    }

    fn visit_strings(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        locale: &LocaleNode,
        strings_index: StringsIndex,
    ) {
    }

    fn visit_stream_port_input(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        audio_unit: &AudioUnitNode,
        node: &StreamPortNode,
    ) {
    }

    fn visit_stream_port_output(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        audio_unit: &AudioUnitNode,
        node: &StreamPortNode,
    ) {
    }

    /// `port_type` tells input ports from output ports.
    fn visit_audio_cluster(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        port_type: DescriptorType,
        stream_port: &StreamPortNode,
        cluster_index: ClusterIndex,
    ) {
    }

    /// `port_type` tells input ports from output ports.
    fn visit_audio_map(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        port_type: DescriptorType,
        stream_port: &StreamPortNode,
        map_index: MapIndex,
    ) {
    }

    fn visit_control(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        control_index: ControlIndex,
    ) {
    }

    fn visit_clock_domain(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        node: &ClockDomainNode,
    ) {
    }

    fn visit_clock_domain_clock_source(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        clock_domain: &ClockDomainNode,
        clock_source_index: ClockSourceIndex,
    ) {
    }

    fn visit_redundant_stream_input(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        node: &RedundantStreamNode,
    ) {
    }

    fn visit_redundant_stream_output(
        &mut self,
        entity: &ControlledEntity,
        configuration: &ConfigurationNode,
        node: &RedundantStreamNode,
    ) {
    }
}

pub(crate) fn walk(
    entity: &ControlledEntity,
    node: &EntityNode,
    visitor: &mut dyn EntityModelVisitor,
    visit_all_configurations: bool,
) {
    visitor.visit_entity(entity, node);

    let current = entity.current_configuration_index();
    for (&index, configuration) in &node.configurations {
        visitor.visit_configuration(entity, configuration);
        if visit_all_configurations || index == current {
            walk_configuration(entity, configuration, visitor);
        }
    }
}

fn walk_configuration(
    entity: &ControlledEntity,
    configuration: &ConfigurationNode,
    visitor: &mut dyn EntityModelVisitor,
) {
    for audio_unit in configuration.audio_units.values() {
        visitor.visit_audio_unit(entity, configuration, audio_unit);
        for port in audio_unit.stream_port_inputs.values() {
            visitor.visit_stream_port_input(entity, configuration, audio_unit, port);
            walk_stream_port(entity, configuration, DescriptorType::StreamPortInput, port, visitor);
        }
        for port in audio_unit.stream_port_outputs.values() {
            visitor.visit_stream_port_output(entity, configuration, audio_unit, port);
            walk_stream_port(
                entity,
                configuration,
                DescriptorType::StreamPortOutput,
                port,
                visitor,
            );
        }
    }

    for stream in configuration.stream_inputs.values() {
        visitor.visit_stream_input(entity, configuration, stream);
    }
    for stream in configuration.stream_outputs.values() {
        visitor.visit_stream_output(entity, configuration, stream);
    }
    for &index in &configuration.avb_interfaces {
        visitor.visit_avb_interface(entity, configuration, index);
    }
    for &index in &configuration.clock_sources {
        visitor.visit_clock_source(entity, configuration, index);
    }
    for &index in &configuration.memory_objects {
        visitor.visit_memory_object(entity, configuration, index);
    }
    for locale in configuration.locales.values() {
        visitor.visit_locale(entity, configuration, locale);
        for &strings in &locale.strings {
            visitor.visit_strings(entity, configuration, locale, strings);
        }
    }
    for &index in &configuration.controls {
        visitor.visit_control(entity, configuration, index);
    }
    for domain in configuration.clock_domains.values() {
        visitor.visit_clock_domain(entity, configuration, domain);
        for &source in &domain.clock_sources {
            visitor.visit_clock_domain_clock_source(entity, configuration, domain, source);
        }
    }
    for redundant in configuration.redundant_stream_inputs.nodes.values() {
        visitor.visit_redundant_stream_input(entity, configuration, redundant);
    }
    for redundant in configuration.redundant_stream_outputs.nodes.values() {
        visitor.visit_redundant_stream_output(entity, configuration, redundant);
    }
}

fn walk_stream_port(
    entity: &ControlledEntity,
    configuration: &ConfigurationNode,
    port_type: DescriptorType,
    port: &StreamPortNode,
    visitor: &mut dyn EntityModelVisitor,
) {
    for &cluster in &port.audio_clusters {
        visitor.visit_audio_cluster(entity, configuration, port_type, port, cluster);
    }
    for &map in &port.audio_maps {
        visitor.visit_audio_map(entity, configuration, port_type, port, map);
    }
}
