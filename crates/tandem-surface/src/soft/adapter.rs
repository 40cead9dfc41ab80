use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::device::{AdapterId, SharedHandle};
use crate::error::{InteropError, Result, ResultCode};

use super::memory::TextureMemory;

/// Identity of one soft device (owner or guest).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceRole {
    Owner,
    Guest,
}

/// Something the soft runtime did, in the order it did it.
#[derive(Debug, Clone, PartialEq)]
pub enum SoftEvent {
    CreateDevice { device: DeviceId, role: DeviceRole },
    CreateTexture { texture: u64, width: u32, height: u32 },
    OpenSharedResource { device: DeviceId, texture: u64 },
    KeyedAcquire { device: DeviceId, texture: u64, key: u64 },
    KeyedAcquireTimedOut { device: DeviceId, texture: u64, key: u64 },
    KeyedRelease { device: DeviceId, texture: u64, key: u64 },
    FinishCommandList { device: DeviceId, list: u64 },
    ExecuteCommandList { device: DeviceId, list: u64 },
    Draw { device: DeviceId, vertex_count: u32 },
    BeginDraw { device: DeviceId },
    Clear { device: DeviceId },
    FillRect { device: DeviceId },
    DrawText { device: DeviceId, text: String },
    EndDraw { device: DeviceId, ok: bool },
    ResizeBuffers { width: u32, height: u32, ok: bool },
    Present { width: u32, height: u32 },
}

impl SoftEvent {
    /// True for events that issue GPU work against a surface.
    pub fn is_gpu_command(&self) -> bool {
        matches!(
            self,
            Self::ExecuteCommandList { .. }
                | Self::Draw { .. }
                | Self::Clear { .. }
                | Self::FillRect { .. }
                | Self::DrawText { .. }
        )
    }
}

/// Calls the soft runtime can be told to fail, once.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SoftFault {
    CreateDevice,
    CreateTexture,
    SharedHandle,
    OpenSharedResource,
    CreateShaderResourceView,
    CreateRenderTarget,
    FinishCommandList,
    ExecuteCommandList,
    EndDraw,
    CreateTextFormat,
    ResizeBuffers,
}

impl SoftFault {
    fn code(self) -> ResultCode {
        match self {
            Self::EndDraw => ResultCode::D2DERR_RECREATE_TARGET,
            Self::CreateTexture => ResultCode::E_OUTOFMEMORY,
            _ => ResultCode::E_FAIL,
        }
    }
}

const JOURNAL_CAPACITY: usize = 4096;

static NEXT_ADAPTER: AtomicU64 = AtomicU64::new(1);

/// A simulated physical GPU.
///
/// Holds what real drivers keep per adapter: the table that resolves shared
/// handles to texture memory. It also carries the event journal and fault
/// switches used to observe and perturb the runtime.
#[derive(Clone)]
pub struct SoftAdapter {
    inner: Arc<AdapterInner>,
}

struct AdapterInner {
    id: AdapterId,
    name: String,
    next_object: AtomicU64,
    shared: Mutex<HashMap<u64, Weak<TextureMemory>>>,
    journal: Mutex<VecDeque<SoftEvent>>,
    faults: Mutex<Vec<SoftFault>>,
}

impl SoftAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        let id = AdapterId(NEXT_ADAPTER.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Arc::new(AdapterInner {
                id,
                name: name.into(),
                next_object: AtomicU64::new(1),
                shared: Mutex::new(HashMap::new()),
                journal: Mutex::new(VecDeque::new()),
                faults: Mutex::new(Vec::new()),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> AdapterId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Next id for a device, texture, view or command list on this adapter.
    pub(crate) fn next_object_id(&self) -> u64 {
        self.inner.next_object.fetch_add(1, Ordering::Relaxed)
    }

    // ── shared handles ──

    pub(crate) fn export(&self, memory: &Arc<TextureMemory>) -> SharedHandle {
        let handle = memory.id();
        self.inner
            .shared
            .lock()
            .insert(handle, Arc::downgrade(memory));
        SharedHandle(handle)
    }

    pub(crate) fn resolve(&self, handle: SharedHandle) -> Result<Arc<TextureMemory>> {
        let mut table = self.inner.shared.lock();
        match table.get(&handle.0).and_then(Weak::upgrade) {
            Some(memory) => Ok(memory),
            None => {
                table.remove(&handle.0);
                Err(InteropError::graphics(
                    ResultCode::E_INVALIDARG,
                    format!("OpenSharedResource: handle {handle} does not name a live texture"),
                ))
            }
        }
    }

    // ── journal ──

    pub(crate) fn record(&self, event: SoftEvent) {
        let mut journal = self.inner.journal.lock();
        if journal.len() == JOURNAL_CAPACITY {
            journal.pop_front();
        }
        journal.push_back(event);
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn journal(&self) -> Vec<SoftEvent> {
        self.inner.journal.lock().iter().cloned().collect()
    }

    /// Returns and clears the recorded events.
    pub fn take_journal(&self) -> Vec<SoftEvent> {
        self.inner.journal.lock().drain(..).collect()
    }

    pub fn clear_journal(&self) {
        self.inner.journal.lock().clear();
    }

    // ── fault injection ──

    /// Makes the next call of kind `fault` on this adapter fail.
    pub fn inject_fault(&self, fault: SoftFault) {
        self.inner.faults.lock().push(fault);
    }

    pub(crate) fn check_fault(&self, fault: SoftFault, context: &str) -> Result<()> {
        let mut faults = self.inner.faults.lock();
        match faults.iter().position(|f| *f == fault) {
            Some(i) => {
                faults.swap_remove(i);
                log::warn!("SoftAdapter: injected {fault:?} failure in {context}");
                Err(InteropError::graphics(fault.code(), format!("{context}: injected failure")))
            }
            None => Ok(()),
        }
    }
}

impl Default for SoftAdapter {
    fn default() -> Self {
        Self::new("tandem soft adapter")
    }
}

impl fmt::Debug for SoftAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftAdapter")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapters_have_distinct_ids() {
        assert_ne!(SoftAdapter::default().id(), SoftAdapter::default().id());
    }

    #[test]
    fn injected_fault_fires_once() {
        let adapter = SoftAdapter::default();
        adapter.inject_fault(SoftFault::EndDraw);

        let err = adapter.check_fault(SoftFault::EndDraw, "EndDraw").unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::D2DERR_RECREATE_TARGET));
        assert!(adapter.check_fault(SoftFault::EndDraw, "EndDraw").is_ok());
    }

    #[test]
    fn journal_drops_oldest_beyond_capacity() {
        let adapter = SoftAdapter::default();
        for i in 0..(JOURNAL_CAPACITY as u32 + 3) {
            adapter.record(SoftEvent::Present { width: i, height: 0 });
        }
        let journal = adapter.journal();
        assert_eq!(journal.len(), JOURNAL_CAPACITY);
        assert_eq!(journal[0], SoftEvent::Present { width: 3, height: 0 });
    }

    #[test]
    fn unknown_handle_is_invalid_arg() {
        let adapter = SoftAdapter::default();
        let err = adapter.resolve(SharedHandle(42)).unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::E_INVALIDARG));
    }
}
