/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::Address;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by buffer allocation and the locator chain
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum BufferError {
    #[error(
        "Failed to allocate {size} bytes within {min_address:#x}..={max_address:#x}: {reason}"
    )]
    #[diagnostic(
        code(buffers::allocation_failed),
        help("Widen the address window, raise the retry count, or enable brute force.")
    )]
    AllocationFailed {
        size: u32,
        min_address: Address,
        max_address: Address,
        reason: String,
    },

    #[error("Platform not supported: {0}")]
    #[diagnostic(
        code(buffers::platform_unsupported),
        help("This operation is unavailable on the current OS or for the requested process.")
    )]
    PlatformUnsupported(String),

    #[error("Malformed platform data: {0}")]
    #[diagnostic(
        code(buffers::malformed_platform_data),
        help("The OS reported memory layout information that could not be parsed.")
    )]
    MalformedPlatformData(String),

    #[error("Shared mapping failure: {0}")]
    #[diagnostic(
        code(buffers::shared_mapping),
        help("Check that the mapping directory exists and is writable.")
    )]
    SharedMapping(String),

    #[error("Locator unavailable: {0}")]
    #[diagnostic(
        code(buffers::locator_unavailable),
        help("The per-process locator could not be created or attached to.")
    )]
    LocatorUnavailable(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(buffers::configuration),
        help("Check the NEARBY_BUFFERS_* environment variables and JSON config.")
    )]
    Configuration(String),
}

impl BufferError {
    /// Builds an [`BufferError::AllocationFailed`] for the given request window
    pub fn allocation_failed(
        size: u32,
        min_address: Address,
        max_address: Address,
        reason: impl Into<String>,
    ) -> Self {
        Self::AllocationFailed {
            size,
            min_address,
            max_address,
            reason: reason.into(),
        }
    }
}

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Failure modes of allocating a new item inside a single locator header
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ItemAllocationError {
    #[error("Locator header has no free item slots")]
    #[diagnostic(
        code(buffers::header_full),
        help("Continue with the next locator header in the chain.")
    )]
    HeaderFull,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Allocation(#[from] BufferError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_failed_message() {
        let err = BufferError::allocation_failed(4096, 0x1000, 0x2000, "no free region");
        let message = err.to_string();
        assert!(message.contains("4096"));
        assert!(message.contains("0x1000"));
        assert!(message.contains("no free region"));
    }

    #[test]
    fn test_error_serialization() {
        let err = BufferError::PlatformUnsupported("haiku".into());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("platform_unsupported"));
        let back: BufferError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_item_error_from_buffer_error() {
        let err: ItemAllocationError = BufferError::LocatorUnavailable("gone".into()).into();
        assert!(matches!(err, ItemAllocationError::Allocation(_)));
        assert_eq!(err.to_string(), "Locator unavailable: gone");
    }
}
