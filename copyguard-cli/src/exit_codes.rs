//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use copyguard_core::CopyguardError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (malformed hash code, undecodable image).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Internal software error (policy engine defect).
/// Maps to EX_SOFTWARE from sysexits.h.
pub const SOFTWARE_ERROR: i32 = 70;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Typed core errors first, then the context messages we attach
        let core = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<CopyguardError>());

        let code = match core {
            Some(CopyguardError::InvalidHash(_)) | Some(CopyguardError::ExtractionFailure(_)) => {
                DATA_ERROR
            }
            Some(CopyguardError::UnsupportedMediaType(_))
            | Some(CopyguardError::InvalidValue(_)) => USAGE_ERROR,
            Some(CopyguardError::PolicyEngine(_)) => SOFTWARE_ERROR,
            _ if message.contains("Failed to read") => INPUT_ERROR,
            _ => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
