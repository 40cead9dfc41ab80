use std::fmt;

use windows::Win32::Graphics::Dxgi::IDXGIKeyedMutex;
use windows::core::Interface;

use crate::device::{AcquireStatus, KeyedMutex, LockTimeout};
use crate::error::{InteropError, Result, ResultCode};

use super::hr;

/// `WAIT_TIMEOUT`, returned by `AcquireSync` as a success code.
const WAIT_TIMEOUT: i32 = 0x0000_0102;
/// `WAIT_ABANDONED`: the previous holder's device was lost while holding it.
const WAIT_ABANDONED: i32 = 0x0000_0080;

/// One device's `IDXGIKeyedMutex` on a shared texture.
#[derive(Clone)]
pub struct D3D11KeyedMutex {
    mutex: IDXGIKeyedMutex,
}

impl D3D11KeyedMutex {
    pub(crate) fn new(mutex: IDXGIKeyedMutex) -> Self {
        Self { mutex }
    }

    pub fn raw(&self) -> &IDXGIKeyedMutex {
        &self.mutex
    }
}

impl KeyedMutex for D3D11KeyedMutex {
    fn acquire(&self, key: u64, timeout: LockTimeout) -> Result<AcquireStatus> {
        // The projected wrapper folds WAIT_TIMEOUT into Ok(()); call through the
        // vtable to see the raw code.
        let code = unsafe {
            (Interface::vtable(&self.mutex).AcquireSync)(
                Interface::as_raw(&self.mutex),
                key,
                timeout.as_millis_u32(),
            )
        };
        match code.0 {
            0 => Ok(AcquireStatus::Acquired),
            WAIT_TIMEOUT => Ok(AcquireStatus::TimedOut),
            WAIT_ABANDONED => Err(InteropError::graphics(
                ResultCode(code.0),
                format!("AcquireSync({key}): abandoned"),
            )),
            _ => {
                code.ok().map_err(hr("AcquireSync"))?;
                Err(InteropError::graphics(
                    ResultCode(code.0),
                    format!("AcquireSync({key}): unexpected status"),
                ))
            }
        }
    }

    fn release(&self, key: u64) -> Result<()> {
        unsafe { self.mutex.ReleaseSync(key) }.map_err(hr("ReleaseSync"))
    }
}

impl fmt::Debug for D3D11KeyedMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D3D11KeyedMutex({:p})", Interface::as_raw(&self.mutex))
    }
}
