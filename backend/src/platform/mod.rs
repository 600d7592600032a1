//! The narrow platform surface the inspector is built on.
//!
//! Every OS call the core needs is one method on [`Platform`]. The process-wide
//! instance is created once by [`system`].

use crate::types::{PlatformError, WaitStatus};
use once_cell::sync::Lazy;
use std::time::Duration;

#[cfg(test)]
pub(crate) mod fake;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(any(windows, target_os = "linux")))]
mod unsupported;
#[cfg(windows)]
mod windows;

/// Opaque process handle issued by [`Platform::open_process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub isize);

/// Opaque loaded-module handle issued by [`Platform::first_module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub isize);

/// Rights requested when opening a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Enough to enumerate modules and read their names.
    QueryRead,
    /// Everything, including termination and waiting.
    Full,
}

/// Owner-tagged IPv4 socket tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableClass {
    TcpOwnerPidAll,
    UdpOwnerPid,
}

/// Outcome of a connection-table query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    /// The buffer was large enough and now holds the table.
    Complete,
    /// The buffer was too small; the size argument holds the required size.
    InsufficientBuffer,
    Failed(PlatformError),
}

pub trait Platform: Send + Sync {
    /// Fills `buffer` with little-endian `u32` process identifiers and returns
    /// the number of bytes written. A completely full buffer may be truncated.
    fn query_process_ids(&self, buffer: &mut [u8]) -> Result<usize, PlatformError>;

    fn open_process(&self, pid: u32, access: Access) -> Result<RawHandle, PlatformError>;

    fn close_handle(&self, handle: RawHandle);

    /// The main executable module of an opened process.
    fn first_module(&self, handle: RawHandle) -> Result<ModuleId, PlatformError>;

    /// Writes the module's file name as UTF-16 into `buffer`, returning the
    /// number of code units written.
    fn module_base_name(
        &self,
        handle: RawHandle,
        module: ModuleId,
        buffer: &mut [u16],
    ) -> Result<usize, PlatformError>;

    fn terminate_process(&self, handle: RawHandle, exit_code: u32) -> Result<(), PlatformError>;

    /// Blocks until the process exits. `None` waits forever.
    fn wait_for_exit(&self, handle: RawHandle, timeout: Option<Duration>) -> WaitStatus;

    /// Copies an owner-tagged socket table into `buffer`. On entry `size` is
    /// ignored in favor of `buffer.len()`; on return it holds the bytes used
    /// or, for [`QueryStatus::InsufficientBuffer`], the bytes required.
    fn query_connection_table(
        &self,
        class: TableClass,
        sorted: bool,
        buffer: &mut [u8],
        size: &mut u32,
    ) -> QueryStatus;

    fn current_process_id(&self) -> u32;
}

static SYSTEM: Lazy<Box<dyn Platform>> = Lazy::new(|| {
    #[cfg(windows)]
    let platform: Box<dyn Platform> = Box::new(windows::Win32Platform::new());
    #[cfg(target_os = "linux")]
    let platform: Box<dyn Platform> = Box::new(linux::ProcfsPlatform::new());
    #[cfg(not(any(windows, target_os = "linux")))]
    let platform: Box<dyn Platform> = Box::new(unsupported::UnsupportedPlatform);
    tracing::debug!("platform backend initialized");
    platform
});

/// The platform backend for the running OS.
pub fn system() -> &'static dyn Platform {
    &**SYSTEM
}

/// A process handle that is closed exactly once when dropped.
pub struct ScopedHandle<'p> {
    platform: &'p dyn Platform,
    handle: RawHandle,
}

impl<'p> ScopedHandle<'p> {
    pub fn open(
        platform: &'p dyn Platform,
        pid: u32,
        access: Access,
    ) -> Result<Self, PlatformError> {
        let handle = platform.open_process(pid, access)?;
        Ok(Self { platform, handle })
    }

    pub fn raw(&self) -> RawHandle {
        self.handle
    }
}

impl Drop for ScopedHandle<'_> {
    fn drop(&mut self) {
        self.platform.close_handle(self.handle);
    }
}
