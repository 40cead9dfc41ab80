use std::fmt;

use crate::device::{LockSide, LockTimeout};

/// Native result code reported by the graphics runtime.
///
/// Values follow the Windows `HRESULT` layout so both backends report the same
/// codes for the same failure.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ResultCode(pub i32);

impl ResultCode {
    pub const E_FAIL: Self = Self(0x8000_4005_u32 as i32);
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    pub const E_NOINTERFACE: Self = Self(0x8000_4002_u32 as i32);
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E_u32 as i32);
    /// `HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`.
    pub const NOT_FOUND: Self = Self(0x8007_0490_u32 as i32);
    pub const DXGI_ERROR_INVALID_CALL: Self = Self(0x887A_0001_u32 as i32);
    pub const DXGI_ERROR_WAS_STILL_DRAWING: Self = Self(0x887A_000A_u32 as i32);
    pub const D2DERR_WRONG_STATE: Self = Self(0x8899_0001_u32 as i32);
    pub const D2DERR_RECREATE_TARGET: Self = Self(0x8899_000C_u32 as i32);

    #[inline]
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultCode({self})")
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0 as u32)
    }
}

/// Error type for every fallible interop operation.
#[derive(Debug, thiserror::Error)]
pub enum InteropError {
    /// An underlying GPU/OS call failed.
    #[error("{context} (result {code})")]
    Graphics { code: ResultCode, context: String },

    /// A finite-timeout acquire missed its deadline. Retriable.
    #[error("timed out after {timeout} waiting for the {side} side of the surface lock")]
    LockTimeout { side: LockSide, timeout: LockTimeout },

    /// The operation is not valid in the current lifecycle state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A required argument was missing or unusable.
    #[error("invalid argument: {0}")]
    Argument(String),
}

impl InteropError {
    pub fn graphics(code: ResultCode, context: impl Into<String>) -> Self {
        Self::Graphics {
            code,
            context: context.into(),
        }
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    /// "No such resource": the lock or surface a call needs does not exist yet.
    pub fn no_such_resource(what: &str) -> Self {
        Self::graphics(ResultCode::NOT_FOUND, format!("no such resource: {what}"))
    }

    /// Native result code, if this error came from the graphics runtime.
    pub fn code(&self) -> Option<ResultCode> {
        match self {
            Self::Graphics { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[inline]
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    #[inline]
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation(_))
    }
}

pub type Result<T> = std::result::Result<T, InteropError>;
