// ── Entity model types ──
//
// Identifiers, descriptor models, the per-entity tree and the graph
// built on top of it. Everything here is plain data; behaviour that
// needs enumeration state lives on `ControlledEntity`.

pub mod category;
mod descriptors;
mod entity;
mod ids;
mod node;
mod tree;

pub use descriptors::*;
pub use entity::{
    AcquireState, CompatibilityFlags, Entity, EntityCapabilities, InterfaceLinkStatus, LockState,
    MilanInfo, MilanInfoFeatures,
};
pub use ids::{
    AudioUnitIndex, AvbInterfaceIndex, ClockDomainIndex, ClockSourceIndex, ClusterIndex,
    ConfigurationIndex, ControlIndex, DescriptorIndex, DescriptorType, LocaleIndex,
    LocalizedStringReference, MacAddress, MapIndex, MemoryObjectIndex, SamplingRate,
    StreamFormat, StreamIndex, StreamPortIndex, StringsIndex, UniqueIdentifier, VirtualIndex,
};
pub use node::{
    AudioUnitNode, ClockDomainNode, ConfigurationNode, EntityNode, LocaleNode, StreamNode,
    StreamPortNode,
};
pub use tree::{CachedModelDocument, ConfigurationTree, EntityTree, ModelMap, NodeModels};
