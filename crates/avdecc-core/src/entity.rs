// ── Controlled entity ──
//
// Everything a controller tracks about one remote entity: its identity,
// the learned model tree and the graph derived from it, which queries
// are still outstanding in each category, and statistics.
//
// The type itself does no locking: reads take `&self`, writes `&mut self`.
// Trackers that share an entity across threads wrap it in `SharedEntity`,
// which only hands the state out while its `EntityLock` is held.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::config::TrackerConfig;
use crate::enumeration::{
    DescriptorDynamicInfoKey, DescriptorDynamicInfoType, DescriptorKey, DynamicInfoKey,
    DynamicInfoType, EnumerationSteps, MilanInfoType,
};
use crate::error::CoreError;
use crate::model::category::{
    ApplyDescriptor, AudioUnit, AvbInterface, ClockDomain, ClockSource, Control,
    DescriptorCategory, MemoryObject, ObjectNamed, StreamInput, StreamOutput, StreamPortInput,
    StreamPortOutput, Strings,
};
use crate::model::{
    AcquireState, AsPath, AudioMapping, AudioUnitIndex, AvbInterfaceIndex, AvbInterfaceInfo,
    ClockDomainIndex, ClockSourceIndex, CompatibilityFlags, ConfigurationDescriptor,
    ConfigurationIndex, ConfigurationNode, ConfigurationTree, ControlIndex, ControlValues,
    DescriptorCounters, DescriptorIndex, DescriptorType, Entity, EntityDescriptor, EntityNode,
    EntityTree, InterfaceLinkStatus, LocaleIndex, LocaleStaticModel, LocalizedStringReference,
    LockState, MemoryObjectIndex, MilanInfo, ModelMap, NodeModels, SamplingRate, StreamFormat,
    StreamIdentification, StreamIndex, StreamInfo, StreamInputConnectionInfo,
    StreamPortDynamicModel, StreamPortIndex, StreamPortStaticModel, StringsIndex,
    StringsStaticModel, UniqueIdentifier,
};
use crate::pending::{PendingQueryTracker, RetryDecision};
use crate::statistics::EntityStatistics;
use crate::visitor::EntityModelVisitor;

/// Current value of an IDENTIFY control while identification is running.
const IDENTIFY_ACTIVE_VALUE: u64 = 255;

#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ControlledEntity {
    entity: Entity,
    compatibility_flags: CompatibilityFlags,
    milan_info: Option<MilanInfo>,
    advertised: bool,
    ignore_cached_entity_model: bool,
    subscribed_to_unsolicited: bool,
    acquire_state: AcquireState,
    owning_controller_id: UniqueIdentifier,
    lock_state: LockState,
    locking_controller_id: UniqueIdentifier,
    avb_interface_link_status: BTreeMap<AvbInterfaceIndex, InterfaceLinkStatus>,

    // ── Enumeration ──
    enumeration_steps: EnumerationSteps,
    fatal_enumeration_error: bool,
    register_unsol_queries: PendingQueryTracker<()>,
    milan_info_queries: PendingQueryTracker<MilanInfoType>,
    descriptor_queries: PendingQueryTracker<(ConfigurationIndex, DescriptorKey)>,
    dynamic_info_queries: PendingQueryTracker<(ConfigurationIndex, DynamicInfoKey)>,
    descriptor_dynamic_info_queries:
        PendingQueryTracker<(ConfigurationIndex, DescriptorDynamicInfoKey)>,

    statistics: EntityStatistics,
    entity_tree: EntityTree,
    entity_node: Option<EntityNode>,
}

impl ControlledEntity {
    /// Track a newly discovered entity. Enumeration timing starts now.
    pub fn new(entity: Entity, config: &TrackerConfig) -> Self {
        let mut statistics = EntityStatistics::new();
        statistics.set_start_enumeration_time(Instant::now());
        Self {
            entity,
            compatibility_flags: CompatibilityFlags::default(),
            milan_info: None,
            advertised: false,
            ignore_cached_entity_model: false,
            subscribed_to_unsolicited: false,
            acquire_state: AcquireState::default(),
            owning_controller_id: UniqueIdentifier::NULL,
            lock_state: LockState::default(),
            locking_controller_id: UniqueIdentifier::NULL,
            avb_interface_link_status: BTreeMap::new(),
            enumeration_steps: EnumerationSteps::empty(),
            fatal_enumeration_error: false,
            register_unsol_queries: PendingQueryTracker::new(config.register_unsol),
            milan_info_queries: PendingQueryTracker::new(config.milan_info),
            descriptor_queries: PendingQueryTracker::new(config.descriptor),
            dynamic_info_queries: PendingQueryTracker::new(config.dynamic_info),
            descriptor_dynamic_info_queries: PendingQueryTracker::new(
                config.descriptor_dynamic_info,
            ),
            statistics,
            entity_tree: EntityTree::default(),
            entity_node: None,
        }
    }

    // ── Global state ─────────────────────────────────────────────────

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn entity_id(&self) -> UniqueIdentifier {
        self.entity.entity_id
    }

    /// Replace the advertised identity wholesale.
    pub fn set_entity(&mut self, entity: Entity) {
        self.entity = entity;
    }

    pub fn compatibility_flags(&self) -> CompatibilityFlags {
        self.compatibility_flags
    }

    pub fn set_compatibility_flags(&mut self, flags: CompatibilityFlags) {
        self.compatibility_flags = flags;
    }

    pub fn milan_info(&self) -> Option<&MilanInfo> {
        self.milan_info.as_ref()
    }

    pub fn set_milan_info(&mut self, info: MilanInfo) {
        self.milan_info = Some(info);
    }

    pub fn is_advertised(&self) -> bool {
        self.advertised
    }

    pub fn set_advertised(&mut self, advertised: bool) {
        self.advertised = advertised;
    }

    pub fn ignore_cached_entity_model(&self) -> bool {
        self.ignore_cached_entity_model
    }

    pub fn set_ignore_cached_entity_model(&mut self) {
        self.ignore_cached_entity_model = true;
    }

    pub fn is_subscribed_to_unsolicited_notifications(&self) -> bool {
        self.subscribed_to_unsolicited
    }

    pub fn set_subscribed_to_unsolicited_notifications(&mut self, subscribed: bool) {
        self.subscribed_to_unsolicited = subscribed;
    }

    pub fn acquire_state(&self) -> AcquireState {
        self.acquire_state
    }

    pub fn set_acquire_state(&mut self, state: AcquireState) {
        self.acquire_state = state;
    }

    pub fn owning_controller_id(&self) -> UniqueIdentifier {
        self.owning_controller_id
    }

    pub fn set_owning_controller(&mut self, controller_id: UniqueIdentifier) {
        self.owning_controller_id = controller_id;
    }

    pub fn lock_state(&self) -> LockState {
        self.lock_state
    }

    pub fn set_lock_state(&mut self, state: LockState) {
        self.lock_state = state;
    }

    pub fn locking_controller_id(&self) -> UniqueIdentifier {
        self.locking_controller_id
    }

    pub fn set_locking_controller(&mut self, controller_id: UniqueIdentifier) {
        self.locking_controller_id = controller_id;
    }

    pub fn identify_control_index(&self) -> Option<ControlIndex> {
        self.entity.identify_control_index
    }

    pub fn set_identify_control_index(&mut self, index: ControlIndex) {
        self.entity.identify_control_index = Some(index);
    }

    /// Whether the IDENTIFY control of the current configuration is on.
    pub fn is_identifying(&self) -> bool {
        let Some(index) = self.identify_control_index() else {
            return false;
        };
        self.dynamic_model::<Control>(self.current_configuration_index(), index)
            .is_ok_and(|model| model.values.current() == Some(IDENTIFY_ACTIVE_VALUE))
    }

    // ── Enumeration steps ────────────────────────────────────────────

    pub fn enumeration_steps(&self) -> EnumerationSteps {
        self.enumeration_steps
    }

    /// Initial set of phases. Expected to be called once, on an empty set.
    pub fn set_enumeration_steps(&mut self, steps: EnumerationSteps) {
        if !self.enumeration_steps.is_empty() {
            warn!(
                entity_id = %self.entity_id(),
                previous = ?self.enumeration_steps,
                "enumeration steps overwritten before completion"
            );
        }
        self.enumeration_steps = steps;
    }

    pub fn add_enumeration_step(&mut self, step: EnumerationSteps) {
        self.enumeration_steps.insert(step);
    }

    pub fn clear_enumeration_step(&mut self, step: EnumerationSteps) {
        self.enumeration_steps.remove(step);
    }

    /// First pending phase in enumeration order.
    pub fn next_enumeration_step(&self) -> Option<EnumerationSteps> {
        self.enumeration_steps.next_step()
    }

    pub fn got_fatal_enumeration_error(&self) -> bool {
        self.fatal_enumeration_error
    }

    /// Permanently exclude the model from use until re-enumerated from scratch.
    pub fn set_fatal_enumeration_error(&mut self) {
        error!(entity_id = %self.entity_id(), "fatal enumeration error");
        self.fatal_enumeration_error = true;
    }

    // ── Expected queries: REGISTER_UNSOL ─────────────────────────────

    pub fn set_register_unsol_expected(&mut self) {
        self.register_unsol_queries.mark_expected(());
    }

    pub fn check_and_clear_expected_register_unsol(&mut self) -> bool {
        !self.fatal_enumeration_error && self.register_unsol_queries.check_and_clear(&())
    }

    pub fn got_expected_register_unsol(&self) -> bool {
        self.register_unsol_queries.all_satisfied()
    }

    pub fn register_unsol_retry_timer(&mut self) -> RetryDecision {
        self.register_unsol_queries.retry_timer()
    }

    // ── Expected queries: Milan info ─────────────────────────────────

    pub fn set_milan_info_expected(&mut self, info_type: MilanInfoType) {
        self.milan_info_queries.mark_expected(info_type);
    }

    pub fn check_and_clear_expected_milan_info(&mut self, info_type: MilanInfoType) -> bool {
        !self.fatal_enumeration_error && self.milan_info_queries.check_and_clear(&info_type)
    }

    pub fn got_all_expected_milan_info(&self) -> bool {
        self.milan_info_queries.all_satisfied()
    }

    pub fn milan_info_retry_timer(&mut self) -> RetryDecision {
        self.milan_info_queries.retry_timer()
    }

    // ── Expected queries: descriptors ────────────────────────────────

    pub fn set_descriptor_expected(
        &mut self,
        configuration_index: ConfigurationIndex,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
    ) {
        let key = DescriptorKey::new(descriptor_type, descriptor_index);
        self.descriptor_queries
            .mark_expected((configuration_index, key));
    }

    pub fn check_and_clear_expected_descriptor(
        &mut self,
        configuration_index: ConfigurationIndex,
        descriptor_type: DescriptorType,
        descriptor_index: DescriptorIndex,
    ) -> bool {
        let key = DescriptorKey::new(descriptor_type, descriptor_index);
        !self.fatal_enumeration_error
            && self
                .descriptor_queries
                .check_and_clear(&(configuration_index, key))
    }

    pub fn got_all_expected_descriptors(&self) -> bool {
        self.descriptor_queries.all_satisfied()
    }

    pub fn descriptor_retry_timer(&mut self) -> RetryDecision {
        self.descriptor_queries.retry_timer()
    }

    // ── Expected queries: dynamic info ───────────────────────────────

    pub fn set_dynamic_info_expected(
        &mut self,
        configuration_index: ConfigurationIndex,
        info_type: DynamicInfoType,
        descriptor_index: DescriptorIndex,
        sub_index: u16,
    ) {
        let key = DynamicInfoKey::new(info_type, descriptor_index, sub_index);
        self.dynamic_info_queries
            .mark_expected((configuration_index, key));
    }

    pub fn check_and_clear_expected_dynamic_info(
        &mut self,
        configuration_index: ConfigurationIndex,
        info_type: DynamicInfoType,
        descriptor_index: DescriptorIndex,
        sub_index: u16,
    ) -> bool {
        let key = DynamicInfoKey::new(info_type, descriptor_index, sub_index);
        !self.fatal_enumeration_error
            && self
                .dynamic_info_queries
                .check_and_clear(&(configuration_index, key))
    }

    pub fn got_all_expected_dynamic_info(&self) -> bool {
        self.dynamic_info_queries.all_satisfied()
    }

    pub fn dynamic_info_retry_timer(&mut self) -> RetryDecision {
        self.dynamic_info_queries.retry_timer()
    }

    // ── Expected queries: descriptor dynamic info ────────────────────

    pub fn set_descriptor_dynamic_info_expected(
        &mut self,
        configuration_index: ConfigurationIndex,
        info_type: DescriptorDynamicInfoType,
        descriptor_index: DescriptorIndex,
    ) {
        let key = DescriptorDynamicInfoKey::new(info_type, descriptor_index);
        self.descriptor_dynamic_info_queries
            .mark_expected((configuration_index, key));
    }

    pub fn check_and_clear_expected_descriptor_dynamic_info(
        &mut self,
        configuration_index: ConfigurationIndex,
        info_type: DescriptorDynamicInfoType,
        descriptor_index: DescriptorIndex,
    ) -> bool {
        let key = DescriptorDynamicInfoKey::new(info_type, descriptor_index);
        !self.fatal_enumeration_error
            && self
                .descriptor_dynamic_info_queries
                .check_and_clear(&(configuration_index, key))
    }

    pub fn got_all_expected_descriptor_dynamic_info(&self) -> bool {
        self.descriptor_dynamic_info_queries.all_satisfied()
    }

    /// Give up on every outstanding descriptor dynamic info query, e.g.
    /// when falling back to a full static enumeration.
    pub fn clear_all_expected_descriptor_dynamic_info(&mut self) {
        self.descriptor_dynamic_info_queries.clear_all();
    }

    pub fn descriptor_dynamic_info_retry_timer(&mut self) -> RetryDecision {
        self.descriptor_dynamic_info_queries.retry_timer()
    }

    // ── Statistics ───────────────────────────────────────────────────

    pub fn statistics(&self) -> &EntityStatistics {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut EntityStatistics {
        &mut self.statistics
    }

    // ── Model: reads ─────────────────────────────────────────────────

    pub fn has_any_configuration_tree(&self) -> bool {
        !self.entity_tree.configuration_trees.is_empty()
    }

    pub fn has_configuration_tree(&self, configuration_index: ConfigurationIndex) -> bool {
        self.entity_tree
            .configuration_trees
            .contains_key(&configuration_index)
    }

    pub fn current_configuration_index(&self) -> ConfigurationIndex {
        self.entity_tree.dynamic_model.current_configuration
    }

    pub fn entity_tree(&self) -> Result<&EntityTree, CoreError> {
        if self.fatal_enumeration_error {
            return Err(CoreError::EnumerationError {
                entity_id: self.entity_id(),
            });
        }
        if !self.entity.is_aem_supported() {
            return Err(CoreError::aem_not_supported("entity model access"));
        }
        Ok(&self.entity_tree)
    }

    pub fn configuration_tree(
        &self,
        configuration_index: ConfigurationIndex,
    ) -> Result<&ConfigurationTree, CoreError> {
        self.entity_tree()?
            .configuration_trees
            .get(&configuration_index)
            .ok_or(CoreError::InvalidConfigurationIndex {
                configuration_index,
            })
    }

    /// Every descriptor of category `C` in a configuration. An absent
    /// configuration yields an empty map, never an error.
    pub fn models<C: DescriptorCategory>(
        &self,
        configuration_index: ConfigurationIndex,
    ) -> &ModelMap<C::Static, C::Dynamic> {
        self.entity_tree
            .configuration_trees
            .get(&configuration_index)
            .map_or(C::empty(), C::models)
    }

    pub fn node_models<C: DescriptorCategory>(
        &self,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
    ) -> Result<&NodeModels<C::Static, C::Dynamic>, CoreError> {
        C::models(self.configuration_tree(configuration_index)?)
            .get(&descriptor_index)
            .ok_or(CoreError::InvalidDescriptorIndex {
                descriptor_type: C::DESCRIPTOR_TYPE,
                configuration_index,
                descriptor_index,
            })
    }

    pub fn static_model<C: DescriptorCategory>(
        &self,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
    ) -> Result<&C::Static, CoreError> {
        self.node_models::<C>(configuration_index, descriptor_index)
            .map(|node| &node.static_model)
    }

    pub fn dynamic_model<C: DescriptorCategory>(
        &self,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
    ) -> Result<&C::Dynamic, CoreError> {
        self.node_models::<C>(configuration_index, descriptor_index)
            .map(|node| &node.dynamic_model)
    }

    /// Whether a descriptor is present, without raising.
    pub fn has_tree_model<C: DescriptorCategory>(
        &self,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
    ) -> bool {
        self.node_models::<C>(configuration_index, descriptor_index)
            .is_ok()
    }

    /// Text for a localized string reference, empty when unresolvable.
    pub fn localized_string(
        &self,
        configuration_index: ConfigurationIndex,
        reference: LocalizedStringReference,
    ) -> String {
        if reference.is_null() {
            return String::new();
        }
        self.configuration_tree(configuration_index)
            .ok()
            .and_then(|tree| {
                tree.dynamic_model
                    .localized_strings
                    .get(&reference.global_offset())
                    .cloned()
            })
            .unwrap_or_default()
    }

    pub fn localized_string_for_current_configuration(
        &self,
        reference: LocalizedStringReference,
    ) -> String {
        self.localized_string(self.current_configuration_index(), reference)
    }

    /// The locale named `locale`, or the first one if none matches.
    pub fn find_locale(
        &self,
        configuration_index: ConfigurationIndex,
        locale: &str,
    ) -> Result<(LocaleIndex, &LocaleStaticModel), CoreError> {
        let locales = &self.configuration_tree(configuration_index)?.locale_models;
        locales
            .iter()
            .find(|(_, node)| node.static_model.locale_id.eq_ignore_ascii_case(locale))
            .or_else(|| locales.iter().next())
            .map(|(&index, node)| (index, &node.static_model))
            .ok_or_else(|| CoreError::InvalidLocaleName {
                locale: locale.into(),
            })
    }

    pub fn stream_input_connection_information(
        &self,
        stream_index: StreamIndex,
    ) -> Result<&StreamInputConnectionInfo, CoreError> {
        self.dynamic_model::<StreamInput>(self.current_configuration_index(), stream_index)
            .map(|model| &model.connection_info)
    }

    pub fn stream_output_connections(
        &self,
        stream_index: StreamIndex,
    ) -> Result<&BTreeSet<StreamIdentification>, CoreError> {
        self.dynamic_model::<StreamOutput>(self.current_configuration_index(), stream_index)
            .map(|model| &model.connections)
    }

    /// Running unless the entity said otherwise.
    pub fn is_stream_input_running(&self, stream_index: StreamIndex) -> bool {
        self.dynamic_model::<StreamInput>(self.current_configuration_index(), stream_index)
            .ok()
            .and_then(|model| model.is_stream_running)
            .unwrap_or(true)
    }

    /// Running unless the entity said otherwise.
    pub fn is_stream_output_running(&self, stream_index: StreamIndex) -> bool {
        self.dynamic_model::<StreamOutput>(self.current_configuration_index(), stream_index)
            .ok()
            .and_then(|model| model.is_stream_running)
            .unwrap_or(true)
    }

    pub fn avb_interface_link_status(
        &self,
        avb_interface_index: AvbInterfaceIndex,
    ) -> InterfaceLinkStatus {
        if !self.entity.is_aem_supported() {
            return InterfaceLinkStatus::Unknown;
        }
        self.avb_interface_link_status
            .get(&avb_interface_index)
            .copied()
            .unwrap_or_default()
    }

    pub fn stream_port_input_audio_mappings(
        &self,
        stream_port_index: StreamPortIndex,
    ) -> Result<&[AudioMapping], CoreError> {
        self.dynamic_audio_map::<StreamPortInput>(stream_port_index)
    }

    pub fn stream_port_output_audio_mappings(
        &self,
        stream_port_index: StreamPortIndex,
    ) -> Result<&[AudioMapping], CoreError> {
        self.dynamic_audio_map::<StreamPortOutput>(stream_port_index)
    }

    /// Input mappings without the ones targeting redundant secondary streams.
    pub fn stream_port_input_non_redundant_audio_mappings(
        &self,
        stream_port_index: StreamPortIndex,
    ) -> Result<Vec<AudioMapping>, CoreError> {
        Ok(self
            .stream_port_input_audio_mappings(stream_port_index)?
            .iter()
            .filter(|mapping| !self.is_redundant_secondary_stream_input(mapping.stream_index))
            .copied()
            .collect())
    }

    /// Output mappings without the ones targeting redundant secondary streams.
    pub fn stream_port_output_non_redundant_audio_mappings(
        &self,
        stream_port_index: StreamPortIndex,
    ) -> Result<Vec<AudioMapping>, CoreError> {
        Ok(self
            .stream_port_output_audio_mappings(stream_port_index)?
            .iter()
            .filter(|mapping| !self.is_redundant_secondary_stream_output(mapping.stream_index))
            .copied()
            .collect())
    }

    fn dynamic_audio_map<C>(
        &self,
        stream_port_index: StreamPortIndex,
    ) -> Result<&[AudioMapping], CoreError>
    where
        C: DescriptorCategory<Static = StreamPortStaticModel, Dynamic = StreamPortDynamicModel>,
    {
        let node = self.node_models::<C>(self.current_configuration_index(), stream_port_index)?;
        if !node.static_model.has_dynamic_audio_map {
            return Err(CoreError::Unsupported {
                operation: format!("{} {stream_port_index} audio mappings", C::DESCRIPTOR_TYPE),
                required: "dynamic audio map".into(),
            });
        }
        Ok(&node.dynamic_model.dynamic_audio_map)
    }

    /// The model can be stored in the cache for reuse by other entities
    /// sharing its entity model ID.
    pub fn is_entity_model_valid_for_caching(&self) -> bool {
        if self.fatal_enumeration_error || self.entity_tree.is_empty() {
            return false;
        }
        self.entity_tree.configuration_trees.values().all(ConfigurationTree::is_complete)
    }

    // ── Model graph ──────────────────────────────────────────────────

    pub fn entity_node(&self) -> Result<&EntityNode, CoreError> {
        self.entity_tree()?;
        self.entity_node.as_ref().ok_or_else(|| CoreError::NotFound {
            entity_type: "entity model graph".into(),
            identifier: self.entity_id().to_string(),
        })
    }

    pub fn configuration_node(
        &self,
        configuration_index: ConfigurationIndex,
    ) -> Result<&ConfigurationNode, CoreError> {
        self.entity_node()?
            .configurations
            .get(&configuration_index)
            .ok_or(CoreError::InvalidConfigurationIndex {
                configuration_index,
            })
    }

    pub fn current_configuration_node(&self) -> Result<&ConfigurationNode, CoreError> {
        self.configuration_node(self.current_configuration_index())
    }

    pub fn is_redundant_primary_stream_input(&self, stream_index: StreamIndex) -> bool {
        self.current_configuration_node()
            .is_ok_and(|node| node.redundant_stream_inputs.is_primary(stream_index))
    }

    pub fn is_redundant_primary_stream_output(&self, stream_index: StreamIndex) -> bool {
        self.current_configuration_node()
            .is_ok_and(|node| node.redundant_stream_outputs.is_primary(stream_index))
    }

    pub fn is_redundant_secondary_stream_input(&self, stream_index: StreamIndex) -> bool {
        self.current_configuration_node()
            .is_ok_and(|node| node.redundant_stream_inputs.is_secondary(stream_index))
    }

    pub fn is_redundant_secondary_stream_output(&self, stream_index: StreamIndex) -> bool {
        self.current_configuration_node()
            .is_ok_and(|node| node.redundant_stream_outputs.is_secondary(stream_index))
    }

    /// Rebuild the graph (and redundancy classification) from the
    /// current tree. Only meant for a complete model.
    pub fn build_entity_model_graph(&mut self) {
        self.entity_node = Some(EntityNode::build(self.entity_id(), &self.entity_tree));
    }

    /// All enumeration phases are done.
    pub fn on_entity_fully_loaded(&mut self) {
        self.statistics.set_end_enumeration_time(Instant::now());
        if self.entity.is_aem_supported() {
            self.build_entity_model_graph();
        }
        debug!(
            entity_id = %self.entity_id(),
            enumeration_time = ?self.statistics.enumeration_time(),
            "entity fully loaded"
        );
    }

    /// Walk the graph: every configuration if `visit_all_configurations`,
    /// otherwise only the active one.
    pub fn accept(&self, visitor: &mut dyn EntityModelVisitor, visit_all_configurations: bool) {
        let Ok(entity_node) = self.entity_node() else {
            return;
        };
        crate::visitor::walk(self, entity_node, visitor, visit_all_configurations);
    }

    // ── Model: whole tree ────────────────────────────────────────────

    /// Replace the tree, e.g. when restoring a serialized entity.
    pub fn set_entity_tree(&mut self, tree: EntityTree) {
        self.entity_tree = tree;
        self.entity_node = None;
    }

    /// Try to reuse a cached static model. Returns `false`, leaving the
    /// current tree untouched, if the cached model does not match what
    /// the entity declared.
    pub fn set_cached_entity_tree(
        &mut self,
        cached: &EntityTree,
        descriptor: &EntityDescriptor,
        for_all_configurations: bool,
    ) -> bool {
        let entity_id = self.entity_id();

        if cached.static_model.vendor_name_string != descriptor.vendor_name_string
            || cached.static_model.model_name_string != descriptor.model_name_string
        {
            warn!(
                entity_id = %entity_id,
                "cached model has different vendor or model name, not using it"
            );
            return false;
        }

        if for_all_configurations {
            if !cached.is_complete(descriptor.configurations_count) {
                warn!(
                    entity_id = %entity_id,
                    configurations_count = descriptor.configurations_count,
                    "cached model is incomplete, not using it"
                );
                return false;
            }
        } else {
            let current = descriptor.current_configuration;
            if !cached
                .configuration_trees
                .get(&current)
                .is_some_and(ConfigurationTree::is_complete)
            {
                warn!(
                    entity_id = %entity_id,
                    configuration_index = current,
                    "cached model has no complete tree for the current configuration, not using it"
                );
                return false;
            }
        }

        // Descriptor counts already learned from the entity must match.
        let mismatch = self.entity_tree.configuration_trees.iter().find(|(index, own)| {
            !own.static_model.descriptor_counts.is_empty()
                && cached.configuration_trees.get(*index).is_some_and(|other| {
                    other.static_model.descriptor_counts != own.static_model.descriptor_counts
                })
        });
        if let Some((configuration_index, _)) = mismatch {
            warn!(
                entity_id = %entity_id,
                configuration_index,
                "cached model descriptor counts differ from the entity's, not using it"
            );
            return false;
        }

        self.entity_tree = cached.clone();
        self.entity_node = None;
        self.set_entity_descriptor(descriptor);
        debug!(entity_id = %entity_id, "using cached entity model");
        true
    }

    // ── Model: descriptors ───────────────────────────────────────────

    pub fn set_entity_descriptor(&mut self, descriptor: &EntityDescriptor) {
        if self.advertised {
            error!(
                entity_id = %self.entity_id(),
                "ENTITY descriptor set on an advertised entity, dropping its model"
            );
            self.entity_tree = EntityTree::default();
            self.entity_node = None;
            self.fatal_enumeration_error = true;
            return;
        }

        let tree = &mut self.entity_tree;
        tree.static_model.vendor_name_string = descriptor.vendor_name_string;
        tree.static_model.model_name_string = descriptor.model_name_string;

        let dynamic = &mut tree.dynamic_model;
        dynamic.firmware_version.clone_from(&descriptor.firmware_version);
        dynamic.serial_number.clone_from(&descriptor.serial_number);
        dynamic.entity_name.clone_from(&descriptor.entity_name);
        dynamic.group_name.clone_from(&descriptor.group_name);
        dynamic.current_configuration = descriptor.current_configuration;
    }

    pub fn set_configuration_descriptor(
        &mut self,
        configuration_index: ConfigurationIndex,
        descriptor: &ConfigurationDescriptor,
    ) {
        let is_active = configuration_index == self.current_configuration_index();
        let tree = self.configuration_tree_mut(configuration_index);
        tree.static_model = descriptor.static_model.clone();
        tree.dynamic_model.is_active_configuration = is_active;
        tree.dynamic_model
            .object_name
            .clone_from(&descriptor.object_name);
    }

    /// Upsert a descriptor of category `C` from its response payload.
    pub fn set_descriptor<C: DescriptorCategory>(
        &mut self,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
        descriptor: &C::Descriptor,
    ) {
        let node = self.node_models_mut::<C>(configuration_index, descriptor_index);
        descriptor.apply(node);
    }

    /// Upsert a STRINGS descriptor, copying its strings into the
    /// localized string table when it belongs to the selected locale.
    pub fn set_strings_descriptor(
        &mut self,
        configuration_index: ConfigurationIndex,
        strings_index: StringsIndex,
        descriptor: &StringsStaticModel,
    ) {
        self.set_descriptor::<Strings>(configuration_index, strings_index, descriptor);

        let entity_id = self.entity_id();
        let dynamic = &mut self.configuration_tree_mut(configuration_index).dynamic_model;
        let base = dynamic.selected_locale_base_index;
        let count = dynamic.selected_locale_count_indexes;
        if count == 0 || strings_index < base || strings_index - base >= count {
            return;
        }
        let relative = strings_index - base;
        if relative > LocalizedStringReference::MAX_OFFSET {
            warn!(
                entity_id = %entity_id,
                strings_index,
                "strings descriptor out of localized string reference range"
            );
            return;
        }
        for (string_index, text) in (0u8..7).zip(&descriptor.strings) {
            let key = LocalizedStringReference::new(relative, string_index).global_offset();
            dynamic.localized_strings.insert(key, text.clone());
        }
    }

    /// Mutable static model, created with its dynamic pair if missing.
    pub fn static_model_mut<C: DescriptorCategory>(
        &mut self,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
    ) -> &mut C::Static {
        &mut self
            .node_models_mut::<C>(configuration_index, descriptor_index)
            .static_model
    }

    /// Mutable dynamic model, created with its static pair if missing.
    pub fn dynamic_model_mut<C: DescriptorCategory>(
        &mut self,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
    ) -> &mut C::Dynamic {
        &mut self
            .node_models_mut::<C>(configuration_index, descriptor_index)
            .dynamic_model
    }

    fn configuration_tree_mut(
        &mut self,
        configuration_index: ConfigurationIndex,
    ) -> &mut ConfigurationTree {
        self.entity_tree
            .configuration_trees
            .entry(configuration_index)
            .or_default()
    }

    fn node_models_mut<C: DescriptorCategory>(
        &mut self,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
    ) -> &mut NodeModels<C::Static, C::Dynamic> {
        C::models_mut(self.configuration_tree_mut(configuration_index))
            .entry(descriptor_index)
            .or_default()
    }

    fn current_dynamic_mut<C: DescriptorCategory>(
        &mut self,
        descriptor_index: DescriptorIndex,
    ) -> &mut C::Dynamic {
        let configuration_index = self.current_configuration_index();
        self.dynamic_model_mut::<C>(configuration_index, descriptor_index)
    }

    // ── Model: dynamic state ─────────────────────────────────────────

    pub fn set_entity_name(&mut self, name: &str) {
        self.entity_tree.dynamic_model.entity_name = name.into();
    }

    pub fn set_entity_group_name(&mut self, name: &str) {
        self.entity_tree.dynamic_model.group_name = name.into();
    }

    /// Switch the active configuration, updating every configuration's
    /// active flag.
    pub fn set_current_configuration(&mut self, configuration_index: ConfigurationIndex) {
        self.entity_tree.dynamic_model.current_configuration = configuration_index;
        for (&index, tree) in &mut self.entity_tree.configuration_trees {
            tree.dynamic_model.is_active_configuration = index == configuration_index;
        }
    }

    pub fn set_configuration_name(&mut self, configuration_index: ConfigurationIndex, name: &str) {
        self.configuration_tree_mut(configuration_index)
            .dynamic_model
            .object_name = name.into();
    }

    /// Set the object name of any named descriptor.
    pub fn set_object_name<C>(
        &mut self,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
        name: &str,
    ) where
        C: DescriptorCategory,
        C::Dynamic: ObjectNamed,
    {
        self.dynamic_model_mut::<C>(configuration_index, descriptor_index)
            .set_object_name(name.into());
    }

    pub fn set_sampling_rate(
        &mut self,
        audio_unit_index: AudioUnitIndex,
        sampling_rate: SamplingRate,
    ) {
        self.current_dynamic_mut::<AudioUnit>(audio_unit_index)
            .current_sampling_rate = sampling_rate;
    }

    pub fn set_stream_input_format(&mut self, stream_index: StreamIndex, format: StreamFormat) {
        self.current_dynamic_mut::<StreamInput>(stream_index).stream_format = format;
    }

    pub fn set_stream_output_format(&mut self, stream_index: StreamIndex, format: StreamFormat) {
        self.current_dynamic_mut::<StreamOutput>(stream_index).stream_format = format;
    }

    pub fn set_stream_input_info(&mut self, stream_index: StreamIndex, info: &StreamInfo) {
        let model = self.current_dynamic_mut::<StreamInput>(stream_index);
        model.stream_format = info.stream_format;
        model.stream_info = Some(info.clone());
    }

    pub fn set_stream_output_info(&mut self, stream_index: StreamIndex, info: &StreamInfo) {
        let model = self.current_dynamic_mut::<StreamOutput>(stream_index);
        model.stream_format = info.stream_format;
        model.stream_info = Some(info.clone());
    }

    pub fn set_stream_input_running(&mut self, stream_index: StreamIndex, running: bool) {
        self.current_dynamic_mut::<StreamInput>(stream_index).is_stream_running = Some(running);
    }

    pub fn set_stream_output_running(&mut self, stream_index: StreamIndex, running: bool) {
        self.current_dynamic_mut::<StreamOutput>(stream_index).is_stream_running = Some(running);
    }

    /// Returns the previous connection information.
    pub fn set_stream_input_connection_information(
        &mut self,
        stream_index: StreamIndex,
        info: StreamInputConnectionInfo,
    ) -> StreamInputConnectionInfo {
        std::mem::replace(
            &mut self.current_dynamic_mut::<StreamInput>(stream_index).connection_info,
            info,
        )
    }

    pub fn clear_stream_output_connections(&mut self, stream_index: StreamIndex) {
        self.current_dynamic_mut::<StreamOutput>(stream_index)
            .connections
            .clear();
    }

    /// Returns whether the listener was actually added.
    pub fn add_stream_output_connection(
        &mut self,
        stream_index: StreamIndex,
        listener: StreamIdentification,
    ) -> bool {
        self.current_dynamic_mut::<StreamOutput>(stream_index)
            .connections
            .insert(listener)
    }

    /// Returns whether the listener was actually removed.
    pub fn del_stream_output_connection(
        &mut self,
        stream_index: StreamIndex,
        listener: &StreamIdentification,
    ) -> bool {
        self.current_dynamic_mut::<StreamOutput>(stream_index)
            .connections
            .remove(listener)
    }

    /// Returns the previous info, if any.
    pub fn set_avb_interface_info(
        &mut self,
        avb_interface_index: AvbInterfaceIndex,
        info: AvbInterfaceInfo,
    ) -> Option<AvbInterfaceInfo> {
        self.current_dynamic_mut::<AvbInterface>(avb_interface_index)
            .avb_info
            .replace(info)
    }

    /// Returns the previous path, if any.
    pub fn set_as_path(
        &mut self,
        avb_interface_index: AvbInterfaceIndex,
        as_path: AsPath,
    ) -> Option<AsPath> {
        self.current_dynamic_mut::<AvbInterface>(avb_interface_index)
            .as_path
            .replace(as_path)
    }

    /// Returns the previous status (`Unknown` if never set).
    pub fn set_avb_interface_link_status(
        &mut self,
        avb_interface_index: AvbInterfaceIndex,
        status: InterfaceLinkStatus,
    ) -> InterfaceLinkStatus {
        self.avb_interface_link_status
            .insert(avb_interface_index, status)
            .unwrap_or_default()
    }

    pub fn set_selected_locale_strings_indexes_range(
        &mut self,
        configuration_index: ConfigurationIndex,
        base_index: StringsIndex,
        count_indexes: StringsIndex,
    ) {
        let dynamic = &mut self.configuration_tree_mut(configuration_index).dynamic_model;
        dynamic.selected_locale_base_index = base_index;
        dynamic.selected_locale_count_indexes = count_indexes;
    }

    pub fn set_clock_source(
        &mut self,
        clock_domain_index: ClockDomainIndex,
        clock_source_index: ClockSourceIndex,
    ) {
        self.current_dynamic_mut::<ClockDomain>(clock_domain_index)
            .clock_source_index = clock_source_index;
    }

    pub fn set_control_values(&mut self, control_index: ControlIndex, values: ControlValues) {
        self.current_dynamic_mut::<Control>(control_index).values = values;
    }

    pub fn set_memory_object_length(
        &mut self,
        configuration_index: ConfigurationIndex,
        memory_object_index: MemoryObjectIndex,
        length: u64,
    ) {
        self.dynamic_model_mut::<MemoryObject>(configuration_index, memory_object_index)
            .length = length;
    }

    pub fn set_clock_source_identifier(
        &mut self,
        clock_source_index: ClockSourceIndex,
        identifier: UniqueIdentifier,
    ) {
        self.current_dynamic_mut::<ClockSource>(clock_source_index)
            .clock_source_identifier = identifier;
    }

    // ── Model: audio mappings ────────────────────────────────────────

    pub fn clear_stream_port_input_audio_mappings(&mut self, stream_port_index: StreamPortIndex) {
        self.current_dynamic_mut::<StreamPortInput>(stream_port_index)
            .dynamic_audio_map
            .clear();
    }

    /// Add input mappings. A cluster channel has a single source, except
    /// that the same stream channel of a different (redundant) stream may
    /// be mapped to it as well; any other duplicate replaces the existing
    /// mapping.
    pub fn add_stream_port_input_audio_mappings(
        &mut self,
        stream_port_index: StreamPortIndex,
        mappings: &[AudioMapping],
    ) {
        let entity_id = self.entity_id();
        let map = &mut self
            .current_dynamic_mut::<StreamPortInput>(stream_port_index)
            .dynamic_audio_map;

        for mapping in mappings {
            let existing = map.iter_mut().find(|m| {
                m.cluster_offset == mapping.cluster_offset
                    && m.cluster_channel == mapping.cluster_channel
            });
            match existing {
                None => map.push(*mapping),
                Some(found)
                    if found.stream_index != mapping.stream_index
                        && found.stream_channel == mapping.stream_channel =>
                {
                    map.push(*mapping);
                }
                Some(found) => {
                    if *found != *mapping {
                        warn!(
                            entity_id = %entity_id,
                            stream_port_index,
                            previous = ?found,
                            replacement = ?mapping,
                            "duplicate STREAM_PORT_INPUT audio mapping replaced"
                        );
                        found.stream_index = mapping.stream_index;
                        found.stream_channel = mapping.stream_channel;
                    }
                }
            }
        }
    }

    pub fn remove_stream_port_input_audio_mappings(
        &mut self,
        stream_port_index: StreamPortIndex,
        mappings: &[AudioMapping],
    ) {
        let entity_id = self.entity_id();
        let map = &mut self
            .current_dynamic_mut::<StreamPortInput>(stream_port_index)
            .dynamic_audio_map;
        remove_mappings(entity_id, DescriptorType::StreamPortInput, map, mappings);
    }

    pub fn clear_stream_port_output_audio_mappings(&mut self, stream_port_index: StreamPortIndex) {
        self.current_dynamic_mut::<StreamPortOutput>(stream_port_index)
            .dynamic_audio_map
            .clear();
    }

    /// Add output mappings. A stream channel has a single destination; a
    /// duplicate replaces the existing cluster target.
    pub fn add_stream_port_output_audio_mappings(
        &mut self,
        stream_port_index: StreamPortIndex,
        mappings: &[AudioMapping],
    ) {
        let entity_id = self.entity_id();
        let map = &mut self
            .current_dynamic_mut::<StreamPortOutput>(stream_port_index)
            .dynamic_audio_map;

        for mapping in mappings {
            let existing = map.iter_mut().find(|m| {
                m.stream_index == mapping.stream_index && m.stream_channel == mapping.stream_channel
            });
            match existing {
                None => map.push(*mapping),
                Some(found) => {
                    if *found != *mapping {
                        warn!(
                            entity_id = %entity_id,
                            stream_port_index,
                            previous = ?found,
                            replacement = ?mapping,
                            "duplicate STREAM_PORT_OUTPUT audio mapping replaced"
                        );
                        found.cluster_offset = mapping.cluster_offset;
                        found.cluster_channel = mapping.cluster_channel;
                    }
                }
            }
        }
    }

    pub fn remove_stream_port_output_audio_mappings(
        &mut self,
        stream_port_index: StreamPortIndex,
        mappings: &[AudioMapping],
    ) {
        let entity_id = self.entity_id();
        let map = &mut self
            .current_dynamic_mut::<StreamPortOutput>(stream_port_index)
            .dynamic_audio_map;
        remove_mappings(entity_id, DescriptorType::StreamPortOutput, map, mappings);
    }

    // ── Model: counters ──────────────────────────────────────────────

    pub fn entity_counters(&self) -> Option<&DescriptorCounters> {
        self.entity_tree.dynamic_model.counters.as_ref()
    }

    pub fn set_entity_counters(&mut self, counters: &DescriptorCounters) {
        merge_counters(&mut self.entity_tree.dynamic_model.counters, counters);
    }

    pub fn set_avb_interface_counters(
        &mut self,
        avb_interface_index: AvbInterfaceIndex,
        counters: &DescriptorCounters,
    ) {
        merge_counters(
            &mut self.current_dynamic_mut::<AvbInterface>(avb_interface_index).counters,
            counters,
        );
    }

    pub fn set_clock_domain_counters(
        &mut self,
        clock_domain_index: ClockDomainIndex,
        counters: &DescriptorCounters,
    ) {
        merge_counters(
            &mut self.current_dynamic_mut::<ClockDomain>(clock_domain_index).counters,
            counters,
        );
    }

    pub fn set_stream_input_counters(
        &mut self,
        stream_index: StreamIndex,
        counters: &DescriptorCounters,
    ) {
        merge_counters(
            &mut self.current_dynamic_mut::<StreamInput>(stream_index).counters,
            counters,
        );
    }

    pub fn set_stream_output_counters(
        &mut self,
        stream_index: StreamIndex,
        counters: &DescriptorCounters,
    ) {
        merge_counters(
            &mut self.current_dynamic_mut::<StreamOutput>(stream_index).counters,
            counters,
        );
    }
}

fn merge_counters(target: &mut Option<DescriptorCounters>, counters: &DescriptorCounters) {
    target
        .get_or_insert_with(DescriptorCounters::new)
        .extend(counters.iter().map(|(&flag, &value)| (flag, value)));
}

fn remove_mappings(
    entity_id: UniqueIdentifier,
    port_type: DescriptorType,
    map: &mut Vec<AudioMapping>,
    mappings: &[AudioMapping],
) {
    for mapping in mappings {
        if let Some(position) = map.iter().position(|m| m == mapping) {
            map.remove(position);
        } else {
            warn!(
                entity_id = %entity_id,
                %port_type,
                mapping = ?mapping,
                "removing non-existing audio mapping"
            );
        }
    }
}
