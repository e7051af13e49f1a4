// ── Identifiers and descriptor indices ──
//
// EUI-64 identifiers, per-category descriptor indices, and the
// descriptor type enumeration shared by every part of the model.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, FromRepr};

/// An EUI-64 identifier (entity ID, entity model ID, controller ID, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueIdentifier(pub u64);

impl UniqueIdentifier {
    pub const NULL: Self = Self(0);
    pub const UNINITIALIZED: Self = Self(u64::MAX);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Neither null nor uninitialized.
    pub fn is_valid(self) -> bool {
        self != Self::NULL && self != Self::UNINITIALIZED
    }
}

impl fmt::Display for UniqueIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for UniqueIdentifier {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

pub type ConfigurationIndex = u16;
pub type DescriptorIndex = u16;
pub type AudioUnitIndex = DescriptorIndex;
pub type StreamIndex = DescriptorIndex;
pub type AvbInterfaceIndex = DescriptorIndex;
pub type ClockSourceIndex = DescriptorIndex;
pub type MemoryObjectIndex = DescriptorIndex;
pub type LocaleIndex = DescriptorIndex;
pub type StringsIndex = DescriptorIndex;
pub type StreamPortIndex = DescriptorIndex;
pub type ClusterIndex = DescriptorIndex;
pub type MapIndex = DescriptorIndex;
pub type ControlIndex = DescriptorIndex;
pub type ClockDomainIndex = DescriptorIndex;

/// Index of a node that does not exist on the device (e.g. a redundant
/// stream pair), allocated in build order.
pub type VirtualIndex = u16;

/// A stream sample rate in Hz, pull field included.
pub type SamplingRate = u32;

/// Packed IEEE 1722 stream format.
pub type StreamFormat = u64;

pub type MacAddress = [u8; 6];

/// AEM descriptor types with their on-wire values.
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
    FromRepr,
)]
#[repr(u16)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DescriptorType {
    Entity = 0x0000,
    Configuration = 0x0001,
    AudioUnit = 0x0002,
    StreamInput = 0x0005,
    StreamOutput = 0x0006,
    AvbInterface = 0x0009,
    ClockSource = 0x000a,
    MemoryObject = 0x000b,
    Locale = 0x000c,
    Strings = 0x000d,
    StreamPortInput = 0x000e,
    StreamPortOutput = 0x000f,
    AudioCluster = 0x0014,
    AudioMap = 0x0017,
    Control = 0x001a,
    ClockDomain = 0x0024,
    Invalid = 0xffff,
}

impl DescriptorType {
    /// On-wire value.
    #[allow(clippy::as_conversions)]
    pub fn value(self) -> u16 {
        self as u16
    }
}

/// Reference to a localized string: 13 bits of `STRINGS` offset (relative
/// to the selected locale) and 3 bits of string index inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedStringReference(pub u16);

impl LocalizedStringReference {
    pub const NULL: Self = Self(u16::MAX);
    /// Largest `STRINGS` offset the 13-bit field can carry.
    pub const MAX_OFFSET: u16 = 0x1FFF;

    pub fn new(offset: u16, index: u8) -> Self {
        Self((offset << 3) | (u16::from(index) & 0x7))
    }

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    pub fn offset(self) -> u16 {
        self.0 >> 3
    }

    pub fn index(self) -> u16 {
        self.0 & 0x7
    }

    /// Key into the configuration's localized string table.
    pub fn global_offset(self) -> u16 {
        (self.offset() << 3) + self.index()
    }
}

impl Default for LocalizedStringReference {
    fn default() -> Self {
        Self::NULL
    }
}
