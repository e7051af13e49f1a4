// ── Descriptor categories ──
//
// One uninhabited marker type per descriptor category. A category knows
// its static/dynamic model types, the payload a descriptor response
// carries, and which map of a `ConfigurationTree` holds it, so the entity
// exposes a single generic accessor family instead of one getter/setter
// pair per category.

use std::collections::BTreeMap;

use super::descriptors::{
    AudioClusterDescriptor, AudioClusterDynamicModel, AudioClusterStaticModel,
    AudioMapStaticModel, AudioUnitDescriptor, AudioUnitDynamicModel, AudioUnitStaticModel,
    AvbInterfaceDescriptor, AvbInterfaceDynamicModel, AvbInterfaceStaticModel,
    ClockDomainDescriptor, ClockDomainDynamicModel, ClockDomainStaticModel, ClockSourceDescriptor,
    ClockSourceDynamicModel, ClockSourceStaticModel, ControlDescriptor, ControlDynamicModel,
    ControlStaticModel, LocaleStaticModel, MemoryObjectDescriptor, MemoryObjectDynamicModel,
    MemoryObjectStaticModel, StreamDescriptor, StreamInputDynamicModel, StreamOutputDynamicModel,
    StreamPortDynamicModel, StreamPortStaticModel, StreamStaticModel, StringsStaticModel,
};
use super::ids::DescriptorType;
use super::tree::{ConfigurationTree, ModelMap, NodeModels};

/// Copies a descriptor payload into its (static, dynamic) pair.
pub trait ApplyDescriptor<S, D> {
    fn apply(&self, node: &mut NodeModels<S, D>);
}

/// A descriptor category stored per configuration.
pub trait DescriptorCategory {
    type Static: Default + Clone + Send + Sync + 'static;
    type Dynamic: Default + Clone + Send + Sync + 'static;
    type Descriptor: ApplyDescriptor<Self::Static, Self::Dynamic>;

    const DESCRIPTOR_TYPE: DescriptorType;

    fn models(tree: &ConfigurationTree) -> &ModelMap<Self::Static, Self::Dynamic>;
    fn models_mut(tree: &mut ConfigurationTree) -> &mut ModelMap<Self::Static, Self::Dynamic>;

    /// Shared empty map returned when the configuration is absent.
    fn empty() -> &'static ModelMap<Self::Static, Self::Dynamic>;
}

/// Dynamic models carrying a user-settable object name.
pub trait ObjectNamed {
    fn object_name(&self) -> &str;
    fn set_object_name(&mut self, name: String);
}

macro_rules! descriptor_category {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:ident, $field:ident, $static:ty, $dynamic:ty, $descriptor:ty $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub enum $name {}

        impl DescriptorCategory for $name {
            type Static = $static;
            type Dynamic = $dynamic;
            type Descriptor = $descriptor;

            const DESCRIPTOR_TYPE: DescriptorType = DescriptorType::$kind;

            fn models(tree: &ConfigurationTree) -> &ModelMap<$static, $dynamic> {
                &tree.$field
            }

            fn models_mut(tree: &mut ConfigurationTree) -> &mut ModelMap<$static, $dynamic> {
                &mut tree.$field
            }

            fn empty() -> &'static ModelMap<$static, $dynamic> {
                static EMPTY: ModelMap<$static, $dynamic> = BTreeMap::new();
                &EMPTY
            }
        }
    };
}

macro_rules! object_named {
    ($($dynamic:ty),+ $(,)?) => {
        $(
            impl ObjectNamed for $dynamic {
                fn object_name(&self) -> &str {
                    &self.object_name
                }

                fn set_object_name(&mut self, name: String) {
                    self.object_name = name;
                }
            }
        )+
    };
}

descriptor_category!(
    AudioUnit,
    AudioUnit,
    audio_unit_models,
    AudioUnitStaticModel,
    AudioUnitDynamicModel,
    AudioUnitDescriptor,
);
descriptor_category!(
    StreamInput,
    StreamInput,
    stream_input_models,
    StreamStaticModel,
    StreamInputDynamicModel,
    StreamDescriptor,
);
descriptor_category!(
    StreamOutput,
    StreamOutput,
    stream_output_models,
    StreamStaticModel,
    StreamOutputDynamicModel,
    StreamDescriptor,
);
descriptor_category!(
    AvbInterface,
    AvbInterface,
    avb_interface_models,
    AvbInterfaceStaticModel,
    AvbInterfaceDynamicModel,
    AvbInterfaceDescriptor,
);
descriptor_category!(
    ClockSource,
    ClockSource,
    clock_source_models,
    ClockSourceStaticModel,
    ClockSourceDynamicModel,
    ClockSourceDescriptor,
);
descriptor_category!(
    MemoryObject,
    MemoryObject,
    memory_object_models,
    MemoryObjectStaticModel,
    MemoryObjectDynamicModel,
    MemoryObjectDescriptor,
);
descriptor_category!(Locale, Locale, locale_models, LocaleStaticModel, (), LocaleStaticModel);
descriptor_category!(
    /// STRINGS descriptors. Setting one through the entity also fills the
    /// configuration's localized string table when it belongs to the
    /// selected locale.
    Strings, Strings, strings_models, StringsStaticModel, (), StringsStaticModel
);
descriptor_category!(
    StreamPortInput,
    StreamPortInput,
    stream_port_input_models,
    StreamPortStaticModel,
    StreamPortDynamicModel,
    StreamPortStaticModel,
);
descriptor_category!(
    StreamPortOutput,
    StreamPortOutput,
    stream_port_output_models,
    StreamPortStaticModel,
    StreamPortDynamicModel,
    StreamPortStaticModel,
);
descriptor_category!(
    AudioCluster,
    AudioCluster,
    audio_cluster_models,
    AudioClusterStaticModel,
    AudioClusterDynamicModel,
    AudioClusterDescriptor,
);
descriptor_category!(
    AudioMap,
    AudioMap,
    audio_map_models,
    AudioMapStaticModel,
    (),
    AudioMapStaticModel,
);
descriptor_category!(
    Control,
    Control,
    control_models,
    ControlStaticModel,
    ControlDynamicModel,
    ControlDescriptor,
);
descriptor_category!(
    ClockDomain,
    ClockDomain,
    clock_domain_models,
    ClockDomainStaticModel,
    ClockDomainDynamicModel,
    ClockDomainDescriptor,
);

object_named!(
    AudioUnitDynamicModel,
    StreamInputDynamicModel,
    StreamOutputDynamicModel,
    AvbInterfaceDynamicModel,
    ClockSourceDynamicModel,
    MemoryObjectDynamicModel,
    AudioClusterDynamicModel,
    ControlDynamicModel,
    ClockDomainDynamicModel,
);

// ── Descriptor payloads ──────────────────────────────────────────────

impl ApplyDescriptor<AudioUnitStaticModel, AudioUnitDynamicModel> for AudioUnitDescriptor {
    fn apply(&self, node: &mut NodeModels<AudioUnitStaticModel, AudioUnitDynamicModel>) {
        node.static_model = self.static_model.clone();
        node.dynamic_model.object_name.clone_from(&self.object_name);
        node.dynamic_model.current_sampling_rate = self.current_sampling_rate;
    }
}

impl ApplyDescriptor<StreamStaticModel, StreamInputDynamicModel> for StreamDescriptor {
    fn apply(&self, node: &mut NodeModels<StreamStaticModel, StreamInputDynamicModel>) {
        node.static_model = self.static_model.clone();
        node.dynamic_model.object_name.clone_from(&self.object_name);
        node.dynamic_model.stream_format = self.current_format;
    }
}

impl ApplyDescriptor<StreamStaticModel, StreamOutputDynamicModel> for StreamDescriptor {
    fn apply(&self, node: &mut NodeModels<StreamStaticModel, StreamOutputDynamicModel>) {
        node.static_model = self.static_model.clone();
        node.dynamic_model.object_name.clone_from(&self.object_name);
        node.dynamic_model.stream_format = self.current_format;
    }
}

impl ApplyDescriptor<AvbInterfaceStaticModel, AvbInterfaceDynamicModel> for AvbInterfaceDescriptor {
    fn apply(&self, node: &mut NodeModels<AvbInterfaceStaticModel, AvbInterfaceDynamicModel>) {
        node.static_model = self.static_model.clone();
        node.dynamic_model.object_name.clone_from(&self.object_name);
    }
}

impl ApplyDescriptor<ClockSourceStaticModel, ClockSourceDynamicModel> for ClockSourceDescriptor {
    fn apply(&self, node: &mut NodeModels<ClockSourceStaticModel, ClockSourceDynamicModel>) {
        node.static_model = self.static_model.clone();
        node.dynamic_model.object_name.clone_from(&self.object_name);
        node.dynamic_model.clock_source_flags = self.clock_source_flags;
        node.dynamic_model.clock_source_identifier = self.clock_source_identifier;
    }
}

impl ApplyDescriptor<MemoryObjectStaticModel, MemoryObjectDynamicModel> for MemoryObjectDescriptor {
    fn apply(&self, node: &mut NodeModels<MemoryObjectStaticModel, MemoryObjectDynamicModel>) {
        node.static_model = self.static_model.clone();
        node.dynamic_model.object_name.clone_from(&self.object_name);
        node.dynamic_model.length = self.length;
    }
}

impl ApplyDescriptor<LocaleStaticModel, ()> for LocaleStaticModel {
    fn apply(&self, node: &mut NodeModels<LocaleStaticModel, ()>) {
        node.static_model = self.clone();
    }
}

impl ApplyDescriptor<StringsStaticModel, ()> for StringsStaticModel {
    fn apply(&self, node: &mut NodeModels<StringsStaticModel, ()>) {
        node.static_model = self.clone();
    }
}

impl ApplyDescriptor<StreamPortStaticModel, StreamPortDynamicModel> for StreamPortStaticModel {
    fn apply(&self, node: &mut NodeModels<StreamPortStaticModel, StreamPortDynamicModel>) {
        node.static_model = self.clone();
        node.static_model.has_dynamic_audio_map = self.number_of_maps == 0;
    }
}

impl ApplyDescriptor<AudioClusterStaticModel, AudioClusterDynamicModel> for AudioClusterDescriptor {
    fn apply(&self, node: &mut NodeModels<AudioClusterStaticModel, AudioClusterDynamicModel>) {
        node.static_model = self.static_model.clone();
        node.dynamic_model.object_name.clone_from(&self.object_name);
    }
}

impl ApplyDescriptor<AudioMapStaticModel, ()> for AudioMapStaticModel {
    fn apply(&self, node: &mut NodeModels<AudioMapStaticModel, ()>) {
        node.static_model = self.clone();
    }
}

impl ApplyDescriptor<ControlStaticModel, ControlDynamicModel> for ControlDescriptor {
    fn apply(&self, node: &mut NodeModels<ControlStaticModel, ControlDynamicModel>) {
        node.static_model = self.static_model.clone();
        node.dynamic_model.object_name.clone_from(&self.object_name);
        node.dynamic_model.values = self.values_dynamic.clone();
    }
}

impl ApplyDescriptor<ClockDomainStaticModel, ClockDomainDynamicModel> for ClockDomainDescriptor {
    fn apply(&self, node: &mut NodeModels<ClockDomainStaticModel, ClockDomainDynamicModel>) {
        node.static_model = self.static_model.clone();
        node.dynamic_model.object_name.clone_from(&self.object_name);
        node.dynamic_model.clock_source_index = self.clock_source_index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sentinel_is_shared_and_empty() {
        let a = StreamInput::empty();
        let b = StreamInput::empty();
        assert!(a.is_empty());
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn stream_port_without_maps_is_dynamically_mapped() {
        let mut node = NodeModels::default();
        let port = StreamPortStaticModel {
            number_of_clusters: 2,
            number_of_maps: 0,
            ..StreamPortStaticModel::default()
        };
        port.apply(&mut node);
        assert!(node.static_model.has_dynamic_audio_map);

        let mapped = StreamPortStaticModel {
            number_of_maps: 1,
            ..port
        };
        mapped.apply(&mut node);
        assert!(!node.static_model.has_dynamic_audio_map);
    }

    #[test]
    fn categories_write_to_their_own_map() {
        let mut tree = ConfigurationTree::default();
        AvbInterface::models_mut(&mut tree).insert(1, NodeModels::default());
        assert_eq!(AvbInterface::models(&tree).len(), 1);
        assert!(ClockSource::models(&tree).is_empty());
        assert_eq!(AvbInterface::DESCRIPTOR_TYPE, DescriptorType::AvbInterface);
    }
}
