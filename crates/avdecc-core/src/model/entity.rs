// ── Entity identity and global state types ──
//
// What an ADP advertisement tells us about an entity, plus the small
// enums and flag sets describing its controller-facing state.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::Display;

use super::ids::{ControlIndex, UniqueIdentifier};

bitflags! {
    /// ADP entity capabilities.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityCapabilities: u32 {
        const EFU_MODE = 1 << 0;
        const ADDRESS_ACCESS_SUPPORTED = 1 << 1;
        const GATEWAY_ENTITY = 1 << 2;
        const AEM_SUPPORTED = 1 << 3;
        const LEGACY_AVC = 1 << 4;
        const ASSOCIATION_ID_SUPPORTED = 1 << 5;
        const ASSOCIATION_ID_VALID = 1 << 6;
        const VENDOR_UNIQUE_SUPPORTED = 1 << 7;
        const CLASS_A_SUPPORTED = 1 << 8;
        const CLASS_B_SUPPORTED = 1 << 9;
        const GPTP_SUPPORTED = 1 << 10;
        const AEM_AUTHENTICATION_SUPPORTED = 1 << 11;
        const AEM_AUTHENTICATION_REQUIRED = 1 << 12;
        const AEM_PERSISTENT_ACQUIRE_SUPPORTED = 1 << 13;
        const AEM_IDENTIFY_CONTROL_INDEX_VALID = 1 << 14;
        const AEM_INTERFACE_INDEX_VALID = 1 << 15;
        const GENERAL_CONTROLLER_IGNORE = 1 << 16;
        const ENTITY_NOT_READY = 1 << 17;
    }
}

bitflags! {
    /// Which protocol flavours the entity was found to be compatible with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CompatibilityFlags: u8 {
        const IEEE17221 = 1 << 0;
        const MILAN = 1 << 1;
        const MISBEHAVING = 1 << 2;
    }
}

impl Default for CompatibilityFlags {
    fn default() -> Self {
        Self::IEEE17221
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MilanInfoFeatures: u32 {
        const REDUNDANCY = 1 << 0;
    }
}

/// Result of the Milan `GET_MILAN_INFO` vendor-unique command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilanInfo {
    pub protocol_version: u32,
    pub features_flags: MilanInfoFeatures,
    pub certification_version: u32,
}

/// Identity of a discovered entity, as advertised over ADP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: UniqueIdentifier,
    pub entity_model_id: UniqueIdentifier,
    pub entity_capabilities: EntityCapabilities,
    pub talker_stream_sources: u16,
    pub listener_stream_sinks: u16,
    pub identify_control_index: Option<ControlIndex>,
    pub association_id: Option<UniqueIdentifier>,
}

impl Entity {
    pub fn new(
        entity_id: UniqueIdentifier,
        entity_model_id: UniqueIdentifier,
        entity_capabilities: EntityCapabilities,
    ) -> Self {
        Self {
            entity_id,
            entity_model_id,
            entity_capabilities,
            ..Self::default()
        }
    }

    pub fn is_aem_supported(&self) -> bool {
        self.entity_capabilities
            .contains(EntityCapabilities::AEM_SUPPORTED)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum AcquireState {
    #[default]
    Undefined,
    NotSupported,
    NotAcquired,
    AcquireInProgress,
    Acquired,
    AcquiredByOther,
    ReleaseInProgress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum LockState {
    #[default]
    Undefined,
    NotSupported,
    NotLocked,
    LockInProgress,
    Locked,
    LockedByOther,
    UnlockInProgress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum InterfaceLinkStatus {
    #[default]
    Unknown,
    Down,
    Up,
}
