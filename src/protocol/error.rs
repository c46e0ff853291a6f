//! Error types shared by the codec, memory pool and request orchestrator.
//!
//! Every fallible operation in the protocol layer returns [`FrontApiError`].
//! Transport failures keep their own [`TransportError`] class and are wrapped
//! unchanged so callers can tell a socket problem from a malformed reply.
use thiserror::Error;

use super::transport::TransportError;

/// Numeric status codes of the front-end API.
pub mod code {
    pub const OK: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_FORMAT: u8 = 2;
    pub const BAD_INPUT_PARAMS: u8 = 3;
    pub const NOT_ENOUGH_MEMORY: u8 = 4;
}

#[derive(Debug, Error)]
pub enum FrontApiError {
    #[error("general error: {0}")]
    General(String),

    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    #[error("bad input parameters: {0}")]
    BadInput(String),

    #[error("not enough memory in message pool (needed {needed} bytes, {available} available)")]
    NotEnoughMemory { needed: usize, available: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FrontApiError {
    /// Returns the numeric status code for this error.
    pub fn code(&self) -> u8 {
        match self {
            FrontApiError::General(_) | FrontApiError::Transport(_) => code::GENERAL_ERROR,
            FrontApiError::InvalidFormat(_) => code::INVALID_FORMAT,
            FrontApiError::BadInput(_) => code::BAD_INPUT_PARAMS,
            FrontApiError::NotEnoughMemory { .. } => code::NOT_ENOUGH_MEMORY,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        log::error!("{reason}");
        FrontApiError::InvalidFormat(reason)
    }

    pub(crate) fn bad_input(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        log::error!("{reason}");
        FrontApiError::BadInput(reason)
    }
}

/// TR-069 style fault codes carried in the header response code.
pub mod fault {
    pub const OK: i32 = 0;

    pub const NOT_SUPPORTED: i32 = 9000;
    pub const REQUEST_DENIED: i32 = 9001;
    pub const INTERNAL_ERROR: i32 = 9002;
    pub const INVALID_ARGUMENT: i32 = 9003;
    pub const RESOURCES_EXCEEDED: i32 = 9004;
    pub const INVALID_PARAM_NAME: i32 = 9005;
    pub const INVALID_PARAM_TYPE: i32 = 9006;
    pub const INVALID_PARAM_VALUE: i32 = 9007;
    pub const NOT_WRITABLE: i32 = 9008;

    // Vendor specific range 9800..=9899
    pub const DB_ACCESS_ERROR: i32 = 9810;
    pub const DB_QUERY_ERROR: i32 = 9811;
    pub const INCORRECT_DB_TYPE: i32 = 9812;

    /// Set-parameter faults are expected in `(SET_FAULT_FROM, SET_FAULT_TO]`.
    pub const SET_FAULT_FROM: i32 = NOT_SUPPORTED;
    pub const SET_FAULT_TO: i32 = NOT_WRITABLE;

    pub fn is_set_fault(code: i32) -> bool {
        code > SET_FAULT_FROM && code <= SET_FAULT_TO
    }

    /// Short human readable description of a fault code.
    pub fn describe(code: i32) -> &'static str {
        match code {
            OK => "ok",
            NOT_SUPPORTED => "method not supported",
            REQUEST_DENIED => "request denied",
            INTERNAL_ERROR => "internal error",
            INVALID_ARGUMENT => "invalid arguments",
            RESOURCES_EXCEEDED => "resources exceeded",
            INVALID_PARAM_NAME => "invalid parameter name",
            INVALID_PARAM_TYPE => "invalid parameter type",
            INVALID_PARAM_VALUE => "invalid parameter value",
            NOT_WRITABLE => "attempt to set a non-writable parameter",
            DB_ACCESS_ERROR => "cannot access database",
            DB_QUERY_ERROR => "database query failure",
            INCORRECT_DB_TYPE => "incorrect database type for the operation",
            _ => "unknown fault",
        }
    }
}
