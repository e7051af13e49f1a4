// ── Enumeration phases and query keys ──
//
// The five coarse phases a newly discovered entity goes through, and the
// key spaces used to correlate outstanding queries with their responses.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::model::{DescriptorIndex, DescriptorType};

bitflags! {
    /// Phases still to be completed, checked in declaration order.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EnumerationSteps: u16 {
        const GET_MILAN_INFO = 1 << 0;
        const REGISTER_UNSOL = 1 << 1;
        const GET_STATIC_MODEL = 1 << 2;
        const GET_DESCRIPTOR_DYNAMIC_INFO = 1 << 3;
        const GET_DYNAMIC_INFO = 1 << 4;
    }
}

impl EnumerationSteps {
    const ORDER: [Self; 5] = [
        Self::GET_MILAN_INFO,
        Self::REGISTER_UNSOL,
        Self::GET_STATIC_MODEL,
        Self::GET_DESCRIPTOR_DYNAMIC_INFO,
        Self::GET_DYNAMIC_INFO,
    ];

    /// First pending phase, in enumeration order.
    pub fn next_step(self) -> Option<Self> {
        Self::ORDER.into_iter().find(|step| self.contains(*step))
    }
}

/// Milan vendor-unique queries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
)]
pub enum MilanInfoType {
    #[strum(serialize = "GET_MILAN_INFO")]
    MilanInfo,
}

/// Dynamic state queried every session, outside of any descriptor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
)]
#[repr(u16)]
pub enum DynamicInfoType {
    #[strum(serialize = "ACQUIRE_ENTITY")]
    AcquiredState,
    #[strum(serialize = "LOCK_ENTITY")]
    LockedState,
    #[strum(serialize = "GET_AUDIO_MAP (STREAM_INPUT)")]
    InputStreamAudioMappings,
    #[strum(serialize = "GET_AUDIO_MAP (STREAM_OUTPUT)")]
    OutputStreamAudioMappings,
    #[strum(serialize = "GET_RX_STATE_COMMAND")]
    InputStreamState,
    #[strum(serialize = "GET_TX_STATE_COMMAND")]
    OutputStreamState,
    #[strum(serialize = "GET_TX_CONNECTION_COMMAND")]
    OutputStreamConnection,
    #[strum(serialize = "GET_STREAM_INFO (STREAM_INPUT)")]
    InputStreamInfo,
    #[strum(serialize = "GET_STREAM_INFO (STREAM_OUTPUT)")]
    OutputStreamInfo,
    #[strum(serialize = "GET_AVB_INFO")]
    GetAvbInfo,
    #[strum(serialize = "GET_AS_PATH")]
    GetAsPath,
    #[strum(serialize = "GET_COUNTERS (ENTITY)")]
    GetEntityCounters,
    #[strum(serialize = "GET_COUNTERS (AVB_INTERFACE)")]
    GetAvbInterfaceCounters,
    #[strum(serialize = "GET_COUNTERS (CLOCK_DOMAIN)")]
    GetClockDomainCounters,
    #[strum(serialize = "GET_COUNTERS (STREAM_INPUT)")]
    GetStreamInputCounters,
    #[strum(serialize = "GET_COUNTERS (STREAM_OUTPUT)")]
    GetStreamOutputCounters,
}

impl DynamicInfoType {
    #[allow(clippy::as_conversions)]
    pub fn value(self) -> u16 {
        self as u16
    }
}

/// Values stored inside otherwise static descriptors, re-read every
/// session when the static model came from the cache.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
)]
#[repr(u16)]
pub enum DescriptorDynamicInfoType {
    #[strum(serialize = "GET_NAME (CONFIGURATION)")]
    ConfigurationName,
    #[strum(serialize = "GET_NAME (AUDIO_UNIT)")]
    AudioUnitName,
    #[strum(serialize = "GET_SAMPLING_RATE (AUDIO_UNIT)")]
    AudioUnitSamplingRate,
    #[strum(serialize = "GET_NAME (STREAM_INPUT)")]
    InputStreamName,
    #[strum(serialize = "GET_STREAM_FORMAT (STREAM_INPUT)")]
    InputStreamFormat,
    #[strum(serialize = "GET_NAME (STREAM_OUTPUT)")]
    OutputStreamName,
    #[strum(serialize = "GET_STREAM_FORMAT (STREAM_OUTPUT)")]
    OutputStreamFormat,
    #[strum(serialize = "GET_NAME (AVB_INTERFACE)")]
    AvbInterfaceName,
    #[strum(serialize = "GET_NAME (CLOCK_SOURCE)")]
    ClockSourceName,
    #[strum(serialize = "GET_NAME (MEMORY_OBJECT)")]
    MemoryObjectName,
    #[strum(serialize = "GET_MEMORY_OBJECT_LENGTH")]
    MemoryObjectLength,
    #[strum(serialize = "GET_NAME (AUDIO_CLUSTER)")]
    AudioClusterName,
    #[strum(serialize = "GET_NAME (CONTROL)")]
    ControlName,
    #[strum(serialize = "GET_CONTROL")]
    ControlValues,
    #[strum(serialize = "GET_NAME (CLOCK_DOMAIN)")]
    ClockDomainName,
    #[strum(serialize = "GET_CLOCK_SOURCE")]
    ClockDomainSourceIndex,
}

impl DescriptorDynamicInfoType {
    #[allow(clippy::as_conversions)]
    pub fn value(self) -> u16 {
        self as u16
    }
}

// ── Packed query keys ────────────────────────────────────────────────

/// `(descriptor type << 16) | descriptor index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorKey(u32);

impl DescriptorKey {
    pub fn new(descriptor_type: DescriptorType, index: DescriptorIndex) -> Self {
        Self((u32::from(descriptor_type.value()) << 16) | u32::from(index))
    }

    pub fn descriptor_type(self) -> Option<DescriptorType> {
        let [high, low, _, _] = self.0.to_be_bytes();
        DescriptorType::from_repr(u16::from_be_bytes([high, low]))
    }

    pub fn descriptor_index(self) -> DescriptorIndex {
        let [_, _, high, low] = self.0.to_be_bytes();
        u16::from_be_bytes([high, low])
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// `(info type << 32) | (descriptor index << 16) | sub-index`. The
/// sub-index tells apart several requests against one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DynamicInfoKey(u64);

impl DynamicInfoKey {
    pub fn new(info_type: DynamicInfoType, index: DescriptorIndex, sub_index: u16) -> Self {
        Self(
            (u64::from(info_type.value()) << 32)
                | (u64::from(index) << 16)
                | u64::from(sub_index),
        )
    }

    pub fn descriptor_index(self) -> DescriptorIndex {
        let bytes = self.0.to_be_bytes();
        u16::from_be_bytes([bytes[4], bytes[5]])
    }

    pub fn sub_index(self) -> u16 {
        let bytes = self.0.to_be_bytes();
        u16::from_be_bytes([bytes[6], bytes[7]])
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// `(info type << 16) | descriptor index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorDynamicInfoKey(u64);

impl DescriptorDynamicInfoKey {
    pub fn new(info_type: DescriptorDynamicInfoType, index: DescriptorIndex) -> Self {
        Self((u64::from(info_type.value()) << 16) | u64::from(index))
    }

    pub fn descriptor_index(self) -> DescriptorIndex {
        let bytes = self.0.to_be_bytes();
        u16::from_be_bytes([bytes[6], bytes[7]])
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.descriptor_type() {
            Some(descriptor_type) => write!(f, "{descriptor_type}.{}", self.descriptor_index()),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_step_follows_enumeration_order() {
        let steps = EnumerationSteps::GET_DYNAMIC_INFO | EnumerationSteps::GET_STATIC_MODEL;
        assert_eq!(steps.next_step(), Some(EnumerationSteps::GET_STATIC_MODEL));
        assert_eq!(EnumerationSteps::empty().next_step(), None);
        assert_eq!(
            EnumerationSteps::all().next_step(),
            Some(EnumerationSteps::GET_MILAN_INFO)
        );
    }

    #[test]
    fn descriptor_key_packs_type_and_index() {
        let key = DescriptorKey::new(DescriptorType::StreamOutput, 3);
        assert_eq!(key.value(), 0x0006_0003);
        assert_eq!(key.descriptor_type(), Some(DescriptorType::StreamOutput));
        assert_eq!(key.descriptor_index(), 3);
        assert_eq!(key.to_string(), "STREAM_OUTPUT.3");
    }

    #[test]
    fn dynamic_info_key_distinguishes_sub_index() {
        let first = DynamicInfoKey::new(DynamicInfoType::InputStreamAudioMappings, 2, 0);
        let second = DynamicInfoKey::new(DynamicInfoType::InputStreamAudioMappings, 2, 1);
        assert_ne!(first, second);
        assert_eq!(second.value(), 0x0002_0002_0001);
        assert_eq!(second.descriptor_index(), 2);
        assert_eq!(second.sub_index(), 1);
    }

    #[test]
    fn descriptor_dynamic_info_key_packs_type_and_index() {
        let key = DescriptorDynamicInfoKey::new(DescriptorDynamicInfoType::ControlValues, 9);
        assert_eq!(key.value(), (13 << 16) | 9);
        assert_eq!(key.descriptor_index(), 9);
    }

    #[test]
    fn query_types_display_as_commands() {
        assert_eq!(DynamicInfoType::AcquiredState.to_string(), "ACQUIRE_ENTITY");
        assert_eq!(
            DynamicInfoType::GetStreamOutputCounters.to_string(),
            "GET_COUNTERS (STREAM_OUTPUT)"
        );
        assert_eq!(
            DescriptorDynamicInfoType::ClockDomainSourceIndex.to_string(),
            "GET_CLOCK_SOURCE"
        );
        assert_eq!(MilanInfoType::MilanInfo.to_string(), "GET_MILAN_INFO");
    }
}
