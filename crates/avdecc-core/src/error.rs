// ── Core error types ──
//
// Recoverable faults raised by the entity tracker. Programming errors
// (releasing a lock the caller does not hold) panic instead and never
// show up here. Cache rejection is a `bool` result, not an error.

use thiserror::Error;

use crate::model::{ConfigurationIndex, DescriptorIndex, DescriptorType, UniqueIdentifier};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Model access errors ──────────────────────────────────────────
    #[error("Entity {entity_id} has a fatal enumeration error, model is unavailable")]
    EnumerationError { entity_id: UniqueIdentifier },

    #[error("Invalid configuration index: {configuration_index}")]
    InvalidConfigurationIndex {
        configuration_index: ConfigurationIndex,
    },

    #[error(
        "Invalid descriptor index: {descriptor_type} {descriptor_index} in configuration {configuration_index}"
    )]
    InvalidDescriptorIndex {
        descriptor_type: DescriptorType,
        configuration_index: ConfigurationIndex,
        descriptor_index: DescriptorIndex,
    },

    #[error("Invalid locale: {locale}")]
    InvalidLocaleName { locale: String },

    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation} (requires {required})")]
    Unsupported { operation: String, required: String },

    // ── Serialization errors ─────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn aem_not_supported(operation: &str) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            required: "AEM support".into(),
        }
    }

    /// True for faults that mean "the model is not (yet) available",
    /// as opposed to a malformed request.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfigurationIndex { .. }
                | Self::InvalidDescriptorIndex { .. }
                | Self::InvalidLocaleName { .. }
                | Self::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_index_error_names_the_category() {
        let err = CoreError::InvalidDescriptorIndex {
            descriptor_type: DescriptorType::StreamInput,
            configuration_index: 0,
            descriptor_index: 4,
        };
        assert_eq!(
            err.to_string(),
            "Invalid descriptor index: STREAM_INPUT 4 in configuration 0"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn unsupported_is_not_a_not_found_fault() {
        let err = CoreError::aem_not_supported("entity_node");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("AEM support"));
    }
}
