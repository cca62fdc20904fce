// SPDX-License-Identifier: MPL-2.0

//! Error taxonomy of the video output.
//!
//! | Variant                | Raised by                           | Consequence                        |
//! |------------------------|-------------------------------------|------------------------------------|
//! | `ResourceExhausted`    | pool, config or context creation    | context goes to `Failed`           |
//! | `MappingFailure`       | image map or unmap                  | conversion/OSD upload skipped      |
//! | `AssociationFailure`   | subpicture association              | no OSD this frame                  |
//! | `DisplayProtocolError` | trapped window-system errors        | next presentation strategy is used |
//!
//! None of these escape the per-frame entry points of the driver.

use thiserror::Error;

/// Raw status code reported by the hardware layer.
pub type VaStatus = i32;

pub const VA_STATUS_SUCCESS: VaStatus = 0x0000_0000;
pub const VA_STATUS_ERROR_ALLOCATION_FAILED: VaStatus = 0x0000_0002;
pub const VA_STATUS_ERROR_INVALID_SURFACE: VaStatus = 0x0000_0006;
pub const VA_STATUS_ERROR_INVALID_IMAGE: VaStatus = 0x0000_000b;
pub const VA_STATUS_ERROR_UNSUPPORTED_PROFILE: VaStatus = 0x0000_000c;
pub const VA_STATUS_ERROR_OPERATION_FAILED: VaStatus = 0x0000_0001;
pub const VA_STATUS_ERROR_UNKNOWN: VaStatus = 0xFFFF_FFFF_u32 as i32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoError {
    #[error("{call}: could not allocate {what}")]
    ResourceExhausted { call: &'static str, what: &'static str },

    #[error("{call}: mapping failed")]
    MappingFailure { call: &'static str },

    #[error("{call}: overlay association failed")]
    AssociationFailure { call: &'static str },

    #[error("{call}: display protocol error {code}")]
    DisplayProtocolError { call: &'static str, code: u8 },

    #[error("{call}: failed with status {status:#x}")]
    Status { call: &'static str, status: VaStatus },

    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl VoError {
    /// Converts a raw status into a result, tagging failures with the call name.
    pub fn check(status: VaStatus, call: &'static str) -> Result<(), VoError> {
        if status == VA_STATUS_SUCCESS {
            Ok(())
        } else {
            Err(VoError::Status { call, status })
        }
    }

    /// Whether the error is one the pipeline recovers from on the next frame.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VoError::MappingFailure { .. }
                | VoError::AssociationFailure { .. }
                | VoError::DisplayProtocolError { .. }
        )
    }
}

pub type Result<T, E = VoError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_success() {
        assert!(VoError::check(VA_STATUS_SUCCESS, "vaPutSurface").is_ok());
    }

    #[test]
    fn test_check_failure_keeps_call() {
        let err = VoError::check(VA_STATUS_ERROR_INVALID_SURFACE, "vaPutSurface").unwrap_err();
        assert_eq!(
            err,
            VoError::Status {
                call: "vaPutSurface",
                status: VA_STATUS_ERROR_INVALID_SURFACE
            }
        );
        assert!(err.to_string().contains("vaPutSurface"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(VoError::MappingFailure { call: "vaMapBuffer" }.is_transient());
        assert!(
            !VoError::ResourceExhausted {
                call: "vaCreateSurfaces",
                what: "surfaces"
            }
            .is_transient()
        );
    }
}
