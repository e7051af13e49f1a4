// ── Descriptor models ──
//
// Each descriptor splits into a static model (learned once, cacheable
// across sessions for the same entity model ID) and a dynamic model
// (current values, refreshed every session). The `*Descriptor` payloads
// are what a READ_DESCRIPTOR response carries: the static model plus the
// current values embedded in it.

use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::Display;

use super::ids::{
    AvbInterfaceIndex, ClockDomainIndex, ClockSourceIndex, ClusterIndex, ConfigurationIndex,
    ControlIndex, DescriptorIndex, DescriptorType, LocalizedStringReference, MacAddress, MapIndex,
    SamplingRate, StreamFormat, StreamIndex, StreamPortIndex, StringsIndex, UniqueIdentifier,
};

/// Counter values keyed by their valid-flag bit.
pub type DescriptorCounters = BTreeMap<u32, u32>;

// ── Shared value types ───────────────────────────────────────────────

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StreamFlags: u16 {
        const CLOCK_SYNC_SOURCE = 1 << 0;
        const CLASS_A = 1 << 1;
        const CLASS_B = 1 << 2;
        const SUPPORTS_ENCRYPTED = 1 << 3;
        const PRIMARY_BACKUP_SUPPORTED = 1 << 4;
        const PRIMARY_BACKUP_VALID = 1 << 5;
        const SECONDARY_BACKUP_SUPPORTED = 1 << 6;
        const SECONDARY_BACKUP_VALID = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ClockSourceFlags: u16 {
        const STREAM_ID = 1 << 0;
        const LOCAL_ID = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AvbInfoFlags: u8 {
        const AS_CAPABLE = 1 << 0;
        const GPTP_ENABLED = 1 << 1;
        const SRP_ENABLED = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ClockSourceType {
    #[default]
    Internal,
    External,
    InputStream,
    Expansion,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum StreamInputConnectionState {
    #[default]
    NotConnected,
    FastConnecting,
    Connected,
}

/// A (entity, stream) pair on the other end of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamIdentification {
    pub entity_id: UniqueIdentifier,
    pub stream_index: StreamIndex,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInputConnectionInfo {
    pub talker_stream: StreamIdentification,
    pub state: StreamInputConnectionState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub stream_format: StreamFormat,
    pub stream_id: UniqueIdentifier,
    pub msrp_accumulated_latency: u32,
    pub stream_dest_mac: MacAddress,
    pub stream_vlan_id: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsrpMapping {
    pub traffic_class: u8,
    pub priority: u8,
    pub vlan_id: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvbInterfaceInfo {
    pub gptp_grandmaster_id: UniqueIdentifier,
    pub gptp_domain_number: u8,
    pub propagation_delay: u32,
    pub flags: AvbInfoFlags,
    pub mappings: Vec<MsrpMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsPath {
    pub sequence: Vec<UniqueIdentifier>,
}

/// One channel route between a stream and an audio cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AudioMapping {
    pub stream_index: StreamIndex,
    pub stream_channel: u16,
    pub cluster_offset: ClusterIndex,
    pub cluster_channel: u16,
}

/// Raw control values, in the order the device reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlValues(pub Vec<u64>);

impl ControlValues {
    pub fn current(&self) -> Option<u64> {
        self.0.first().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Entity ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStaticModel {
    pub vendor_name_string: LocalizedStringReference,
    pub model_name_string: LocalizedStringReference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDynamicModel {
    pub entity_name: String,
    pub group_name: String,
    pub firmware_version: String,
    pub serial_number: String,
    pub current_configuration: ConfigurationIndex,
    pub counters: Option<DescriptorCounters>,
}

/// ENTITY descriptor payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub entity_id: UniqueIdentifier,
    pub entity_model_id: UniqueIdentifier,
    pub entity_name: String,
    pub vendor_name_string: LocalizedStringReference,
    pub model_name_string: LocalizedStringReference,
    pub firmware_version: String,
    pub group_name: String,
    pub serial_number: String,
    pub configurations_count: u16,
    pub current_configuration: ConfigurationIndex,
}

// ── Configuration ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationStaticModel {
    pub localized_description: LocalizedStringReference,
    /// Number of descriptors of each type the configuration declares.
    pub descriptor_counts: BTreeMap<DescriptorType, u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationDynamicModel {
    pub is_active_configuration: bool,
    pub object_name: String,
    pub selected_locale_base_index: StringsIndex,
    pub selected_locale_count_indexes: StringsIndex,
    /// Strings of the selected locale, keyed by `LocalizedStringReference::global_offset`.
    pub localized_strings: BTreeMap<u16, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationDescriptor {
    pub object_name: String,
    pub static_model: ConfigurationStaticModel,
}

// ── Audio unit ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioUnitStaticModel {
    pub localized_description: LocalizedStringReference,
    pub clock_domain_index: ClockDomainIndex,
    pub number_of_stream_input_ports: u16,
    pub base_stream_input_port: StreamPortIndex,
    pub number_of_stream_output_ports: u16,
    pub base_stream_output_port: StreamPortIndex,
    pub number_of_controls: u16,
    pub base_control: ControlIndex,
    pub sampling_rates: BTreeSet<SamplingRate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioUnitDynamicModel {
    pub object_name: String,
    pub current_sampling_rate: SamplingRate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioUnitDescriptor {
    pub object_name: String,
    pub current_sampling_rate: SamplingRate,
    pub static_model: AudioUnitStaticModel,
}

// ── Streams ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStaticModel {
    pub localized_description: LocalizedStringReference,
    pub clock_domain_index: ClockDomainIndex,
    pub stream_flags: StreamFlags,
    pub avb_interface_index: AvbInterfaceIndex,
    pub buffer_length: u32,
    pub formats: BTreeSet<StreamFormat>,
    /// Other streams of the same direction this one is redundant with.
    pub redundant_streams: BTreeSet<StreamIndex>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInputDynamicModel {
    pub object_name: String,
    pub stream_format: StreamFormat,
    pub connection_info: StreamInputConnectionInfo,
    pub stream_info: Option<StreamInfo>,
    pub is_stream_running: Option<bool>,
    pub counters: Option<DescriptorCounters>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOutputDynamicModel {
    pub object_name: String,
    pub stream_format: StreamFormat,
    pub connections: BTreeSet<StreamIdentification>,
    pub stream_info: Option<StreamInfo>,
    pub is_stream_running: Option<bool>,
    pub counters: Option<DescriptorCounters>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub object_name: String,
    pub current_format: StreamFormat,
    pub static_model: StreamStaticModel,
}

// ── AVB interface ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvbInterfaceStaticModel {
    pub localized_description: LocalizedStringReference,
    pub mac_address: MacAddress,
    pub interface_flags: u16,
    pub clock_identity: UniqueIdentifier,
    pub priority1: u8,
    pub clock_class: u8,
    pub port_number: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvbInterfaceDynamicModel {
    pub object_name: String,
    pub avb_info: Option<AvbInterfaceInfo>,
    pub as_path: Option<AsPath>,
    pub counters: Option<DescriptorCounters>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvbInterfaceDescriptor {
    pub object_name: String,
    pub static_model: AvbInterfaceStaticModel,
}

// ── Clock source ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSourceStaticModel {
    pub localized_description: LocalizedStringReference,
    pub clock_source_type: ClockSourceType,
    pub clock_source_location_type: DescriptorType,
    pub clock_source_location_index: DescriptorIndex,
}

impl Default for ClockSourceStaticModel {
    fn default() -> Self {
        Self {
            localized_description: LocalizedStringReference::NULL,
            clock_source_type: ClockSourceType::Internal,
            clock_source_location_type: DescriptorType::Invalid,
            clock_source_location_index: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSourceDynamicModel {
    pub object_name: String,
    pub clock_source_flags: ClockSourceFlags,
    pub clock_source_identifier: UniqueIdentifier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSourceDescriptor {
    pub object_name: String,
    pub clock_source_flags: ClockSourceFlags,
    pub clock_source_identifier: UniqueIdentifier,
    pub static_model: ClockSourceStaticModel,
}

// ── Memory object ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryObjectStaticModel {
    pub localized_description: LocalizedStringReference,
    pub memory_object_type: u16,
    pub target_descriptor_type: DescriptorType,
    pub target_descriptor_index: DescriptorIndex,
    pub start_address: u64,
    pub maximum_length: u64,
}

impl Default for MemoryObjectStaticModel {
    fn default() -> Self {
        Self {
            localized_description: LocalizedStringReference::NULL,
            memory_object_type: 0,
            target_descriptor_type: DescriptorType::Invalid,
            target_descriptor_index: 0,
            start_address: 0,
            maximum_length: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryObjectDynamicModel {
    pub object_name: String,
    pub length: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryObjectDescriptor {
    pub object_name: String,
    pub length: u64,
    pub static_model: MemoryObjectStaticModel,
}

// ── Locale & strings ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleStaticModel {
    pub locale_id: String,
    pub number_of_string_descriptors: u16,
    pub base_string_descriptor_index: StringsIndex,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringsStaticModel {
    /// Up to 7 strings per STRINGS descriptor.
    pub strings: Vec<String>,
}

// ── Stream ports, clusters and maps ──────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPortStaticModel {
    pub clock_domain_index: ClockDomainIndex,
    pub port_flags: u16,
    pub number_of_controls: u16,
    pub base_control: ControlIndex,
    pub number_of_clusters: u16,
    pub base_cluster: ClusterIndex,
    pub number_of_maps: u16,
    pub base_map: MapIndex,
    /// A port without AUDIO_MAP descriptors is mapped dynamically.
    pub has_dynamic_audio_map: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPortDynamicModel {
    pub dynamic_audio_map: Vec<AudioMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClusterStaticModel {
    pub localized_description: LocalizedStringReference,
    pub signal_type: Option<DescriptorType>,
    pub signal_index: DescriptorIndex,
    pub signal_output: u16,
    pub path_latency: u32,
    pub block_latency: u32,
    pub channel_count: u16,
    pub format: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClusterDynamicModel {
    pub object_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClusterDescriptor {
    pub object_name: String,
    pub static_model: AudioClusterStaticModel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMapStaticModel {
    pub mappings: Vec<AudioMapping>,
}

// ── Control ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlStaticModel {
    pub localized_description: LocalizedStringReference,
    pub block_latency: u32,
    pub control_latency: u32,
    pub control_domain: u16,
    pub control_value_type: u16,
    pub control_type: UniqueIdentifier,
    pub reset_time: u32,
    pub signal_type: Option<DescriptorType>,
    pub signal_index: DescriptorIndex,
    pub signal_output: u16,
    pub number_of_values: u16,
    pub values: ControlValues,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDynamicModel {
    pub object_name: String,
    pub values: ControlValues,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub object_name: String,
    pub values_dynamic: ControlValues,
    pub static_model: ControlStaticModel,
}

// ── Clock domain ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDomainStaticModel {
    pub localized_description: LocalizedStringReference,
    pub clock_sources: Vec<ClockSourceIndex>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDomainDynamicModel {
    pub object_name: String,
    pub clock_source_index: ClockSourceIndex,
    pub counters: Option<DescriptorCounters>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDomainDescriptor {
    pub object_name: String,
    pub clock_source_index: ClockSourceIndex,
    pub static_model: ClockDomainStaticModel,
}
