#![allow(clippy::unwrap_used)]
// Full enumeration of a redundant Milan-style talker/listener, then reuse
// of its model by a second entity of the same model.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use avdecc_core::model::category::{AvbInterface, Locale, StreamInput, StreamOutput};
use avdecc_core::model::{
    AvbInterfaceDescriptor, ConfigurationDescriptor, ConfigurationStaticModel, DescriptorType,
    LocaleStaticModel, LocalizedStringReference, StreamDescriptor, StreamNode, StreamStaticModel,
    StringsStaticModel,
};
use avdecc_core::redundancy::RedundantStreamNode;
use avdecc_core::{
    ConfigurationNode, ControlledEntity, CoreError, Entity, EntityCapabilities, EntityDescriptor,
    EntityLock, EntityModelCache, EntityModelVisitor, EntityNode, EntityTree, EnumerationSteps,
    SharedEntity, TrackerConfig, UniqueIdentifier,
};
use tracing_subscriber::EnvFilter;

const MODEL_ID: UniqueIdentifier = UniqueIdentifier(0x001B_9200_0000_0042);

/// Route tracker logs to the test harness; `RUST_LOG=avdecc_core=debug`
/// shows why a cached model was rejected.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn new_entity(entity_id: u64) -> ControlledEntity {
    ControlledEntity::new(
        Entity::new(
            UniqueIdentifier(entity_id),
            MODEL_ID,
            EntityCapabilities::AEM_SUPPORTED,
        ),
        &TrackerConfig::default(),
    )
}

fn entity_descriptor() -> EntityDescriptor {
    EntityDescriptor {
        entity_name: "Stage Box".into(),
        vendor_name_string: LocalizedStringReference::new(0, 0),
        model_name_string: LocalizedStringReference::new(0, 1),
        configurations_count: 1,
        current_configuration: 0,
        ..EntityDescriptor::default()
    }
}

fn configuration_descriptor() -> ConfigurationDescriptor {
    ConfigurationDescriptor {
        object_name: "Default".into(),
        static_model: ConfigurationStaticModel {
            descriptor_counts: [
                (DescriptorType::StreamInput, 2),
                (DescriptorType::StreamOutput, 1),
                (DescriptorType::AvbInterface, 2),
                (DescriptorType::Locale, 1),
                (DescriptorType::Strings, 1),
            ]
            .into(),
            ..ConfigurationStaticModel::default()
        },
    }
}

fn stream(avb_interface_index: u16, redundant_with: &[u16]) -> StreamDescriptor {
    StreamDescriptor {
        static_model: StreamStaticModel {
            avb_interface_index,
            redundant_streams: redundant_with.iter().copied().collect(),
            ..StreamStaticModel::default()
        },
        ..StreamDescriptor::default()
    }
}

/// Drive the static model phase the way the protocol layer would.
fn enumerate(entity: &mut ControlledEntity) {
    entity.set_enumeration_steps(EnumerationSteps::GET_STATIC_MODEL);
    entity.set_selected_locale_strings_indexes_range(0, 0, 1);

    let descriptors = [
        (DescriptorType::StreamInput, 0),
        (DescriptorType::StreamInput, 1),
        (DescriptorType::StreamOutput, 0),
        (DescriptorType::AvbInterface, 0),
        (DescriptorType::AvbInterface, 1),
        (DescriptorType::Locale, 0),
        (DescriptorType::Strings, 0),
    ];
    for (descriptor_type, index) in descriptors {
        entity.set_descriptor_expected(0, descriptor_type, index);
    }

    entity.set_entity_descriptor(&entity_descriptor());
    entity.set_configuration_descriptor(0, &configuration_descriptor());
    entity.set_descriptor::<StreamInput>(0, 0, &stream(0, &[1]));
    entity.set_descriptor::<StreamInput>(0, 1, &stream(1, &[0]));
    entity.set_descriptor::<StreamOutput>(0, 0, &stream(0, &[]));
    entity.set_descriptor::<AvbInterface>(0, 0, &AvbInterfaceDescriptor::default());
    entity.set_descriptor::<AvbInterface>(0, 1, &AvbInterfaceDescriptor::default());
    entity.set_descriptor::<Locale>(
        0,
        0,
        &LocaleStaticModel {
            locale_id: "en-US".into(),
            number_of_string_descriptors: 1,
            base_string_descriptor_index: 0,
        },
    );
    entity.set_strings_descriptor(
        0,
        0,
        &StringsStaticModel {
            strings: vec!["Acme".into(), "Stage Box 32".into()],
        },
    );

    for (descriptor_type, index) in descriptors {
        assert!(entity.check_and_clear_expected_descriptor(0, descriptor_type, index));
    }
    assert!(entity.got_all_expected_descriptors());

    entity.clear_enumeration_step(EnumerationSteps::GET_STATIC_MODEL);
    assert_eq!(entity.next_enumeration_step(), None);
    entity.on_entity_fully_loaded();
}

#[derive(Default)]
struct Recorder {
    configurations: usize,
    stream_inputs: Vec<(u16, bool)>,
    stream_outputs: usize,
    avb_interfaces: usize,
    strings: usize,
    redundant_inputs: Vec<RedundantStreamNode>,
}

impl EntityModelVisitor for Recorder {
    fn visit_configuration(&mut self, _entity: &ControlledEntity, _node: &ConfigurationNode) {
        self.configurations += 1;
    }

    fn visit_stream_input(
        &mut self,
        _entity: &ControlledEntity,
        _configuration: &ConfigurationNode,
        node: &StreamNode,
    ) {
        self.stream_inputs
            .push((node.descriptor_index, node.is_redundant));
    }

    fn visit_stream_output(
        &mut self,
        _entity: &ControlledEntity,
        _configuration: &ConfigurationNode,
        _node: &StreamNode,
    ) {
        self.stream_outputs += 1;
    }

    fn visit_avb_interface(
        &mut self,
        _entity: &ControlledEntity,
        _configuration: &ConfigurationNode,
        _avb_interface_index: u16,
    ) {
        self.avb_interfaces += 1;
    }

    fn visit_strings(
        &mut self,
        _entity: &ControlledEntity,
        _configuration: &ConfigurationNode,
        _locale: &avdecc_core::model::LocaleNode,
        _strings_index: u16,
    ) {
        self.strings += 1;
    }

    fn visit_redundant_stream_input(
        &mut self,
        _entity: &ControlledEntity,
        _configuration: &ConfigurationNode,
        node: &RedundantStreamNode,
    ) {
        self.redundant_inputs.push(node.clone());
    }
}

#[test]
fn full_enumeration_builds_graph_and_classifies_redundancy() {
    init_tracing();
    let mut entity = new_entity(0x0001);
    enumerate(&mut entity);

    assert!(entity.is_entity_model_valid_for_caching());
    assert!(entity.is_redundant_primary_stream_input(0));
    assert!(entity.is_redundant_secondary_stream_input(1));
    assert!(!entity.is_redundant_primary_stream_output(0));
    assert_eq!(
        entity.localized_string_for_current_configuration(LocalizedStringReference::new(0, 1)),
        "Stage Box 32"
    );

    let node: &EntityNode = entity.entity_node().unwrap();
    assert_eq!(node.configurations.len(), 1);

    let mut recorder = Recorder::default();
    entity.accept(&mut recorder, false);
    assert_eq!(recorder.configurations, 1);
    assert_eq!(recorder.stream_inputs, vec![(0, true), (1, true)]);
    assert_eq!(recorder.stream_outputs, 1);
    assert_eq!(recorder.avb_interfaces, 2);
    assert_eq!(recorder.strings, 1);
    assert_eq!(recorder.redundant_inputs.len(), 1);
    assert_eq!(recorder.redundant_inputs[0].primary_stream, 0);
}

#[test]
fn visitor_skips_inactive_configurations_unless_asked() {
    init_tracing();
    let mut entity = new_entity(0x0002);
    enumerate(&mut entity);
    entity.set_configuration_descriptor(1, &ConfigurationDescriptor::default());
    entity.set_descriptor::<StreamInput>(1, 0, &stream(0, &[]));
    entity.build_entity_model_graph();

    let mut active_only = Recorder::default();
    entity.accept(&mut active_only, false);
    assert_eq!(active_only.configurations, 2);
    assert_eq!(active_only.stream_inputs.len(), 2);

    let mut everything = Recorder::default();
    entity.accept(&mut everything, true);
    assert_eq!(everything.stream_inputs.len(), 3);
}

#[test]
fn visitor_sees_nothing_after_fatal_error() {
    init_tracing();
    let mut entity = new_entity(0x0003);
    enumerate(&mut entity);
    entity.set_fatal_enumeration_error();

    let mut recorder = Recorder::default();
    entity.accept(&mut recorder, true);
    assert_eq!(recorder.configurations, 0);
    assert!(!entity.is_entity_model_valid_for_caching());
}

#[test]
fn second_entity_reuses_cached_model() {
    init_tracing();
    let cache = EntityModelCache::from_config(&TrackerConfig::default());
    let mut first = new_entity(0x0010);
    enumerate(&mut first);
    cache.cache_entity_tree(MODEL_ID, first.entity_tree().unwrap());

    let mut second = new_entity(0x0011);
    let descriptor = EntityDescriptor {
        entity_name: "Second Box".into(),
        ..entity_descriptor()
    };
    let cached = cache.get_entity_tree(MODEL_ID, 0, true).unwrap();

    assert!(second.set_cached_entity_tree(&cached, &descriptor, true));
    assert_eq!(second.entity_tree().unwrap().dynamic_model.entity_name, "Second Box");
    assert_eq!(second.models::<StreamInput>(0).len(), 2);

    second.on_entity_fully_loaded();
    assert!(second.is_redundant_secondary_stream_input(1));
}

#[test]
fn cached_model_with_other_vendor_string_is_rejected() {
    init_tracing();
    let mut source = new_entity(0x0020);
    enumerate(&mut source);
    let cached: Arc<EntityTree> = Arc::new(source.entity_tree().unwrap().clone());

    let mut entity = new_entity(0x0021);
    let descriptor = EntityDescriptor {
        vendor_name_string: LocalizedStringReference::new(1, 0),
        ..entity_descriptor()
    };

    assert!(!entity.set_cached_entity_tree(&cached, &descriptor, true));
    assert!(!entity.has_any_configuration_tree());
}

#[test]
fn cached_model_with_other_descriptor_counts_is_rejected() {
    init_tracing();
    let mut source = new_entity(0x0030);
    enumerate(&mut source);
    let cached = source.entity_tree().unwrap().clone();

    let mut entity = new_entity(0x0031);
    let mut declared = configuration_descriptor();
    declared
        .static_model
        .descriptor_counts
        .insert(DescriptorType::StreamInput, 4);
    entity.set_configuration_descriptor(0, &declared);

    assert!(!entity.set_cached_entity_tree(&cached, &entity_descriptor(), false));
    assert!(entity.models::<StreamInput>(0).is_empty());
}

#[test]
fn incomplete_cached_model_is_rejected_for_all_configurations() {
    init_tracing();
    let mut source = new_entity(0x0040);
    enumerate(&mut source);
    let mut cached = source.entity_tree().unwrap().clone();
    cached
        .configuration_trees
        .get_mut(&0)
        .unwrap()
        .stream_input_models
        .remove(&1);

    let mut entity = new_entity(0x0041);
    assert!(!entity.set_cached_entity_tree(&cached, &entity_descriptor(), true));
    assert!(!entity.set_cached_entity_tree(&cached, &entity_descriptor(), false));
}

#[test]
fn unparsable_tree_leaves_existing_model_untouched() {
    init_tracing();
    let mut entity = new_entity(0x0050);
    enumerate(&mut entity);
    let before = entity.entity_tree().unwrap().clone();

    let err = EntityTree::from_json("{ \"configuration_trees\": 3 }").unwrap_err();
    assert!(matches!(err, CoreError::Serialization(_)));
    assert_eq!(entity.entity_tree().unwrap(), &before);

    let restored = EntityTree::from_json(&before.to_json().unwrap()).unwrap();
    entity.set_entity_tree(restored);
    assert_eq!(entity.entity_tree().unwrap(), &before);
}

#[test]
fn trackers_of_one_device_share_the_lock_around_callbacks() {
    init_tracing();
    let lock = EntityLock::shared();
    let controller_a = Arc::new(SharedEntity::with_shared_lock(
        new_entity(0x0060),
        Arc::clone(&lock),
    ));
    let controller_b = Arc::new(SharedEntity::with_shared_lock(
        new_entity(0x0060),
        Arc::clone(&lock),
    ));

    let outer = controller_a.lock();
    let inner = controller_a.lock();
    inner.write(enumerate);
    assert_eq!(lock.depth(), 2);

    let other = Arc::clone(&controller_b);
    let blocked = std::thread::spawn(move || other.try_lock().is_none())
        .join()
        .unwrap();
    assert!(blocked);

    {
        let released = inner.release_scope();
        assert_eq!(released.depth(), 2);
        assert!(!lock.is_self_locked());

        let other = Arc::clone(&controller_b);
        std::thread::spawn(move || {
            let guard = other.try_lock().unwrap();
            guard.write(|entity| entity.set_subscribed_to_unsolicited_notifications(true));
        })
        .join()
        .unwrap();
    }

    assert_eq!(lock.depth(), 2);
    assert!(outer.read(ControlledEntity::got_all_expected_descriptors));
    drop(inner);
    drop(outer);

    let guard = controller_b.lock();
    assert!(guard.read(ControlledEntity::is_subscribed_to_unsolicited_notifications));
}
