//! Fallback for targets without a process/socket table backend.

use super::{Access, ModuleId, Platform, QueryStatus, RawHandle, TableClass};
use crate::types::{PlatformError, WaitStatus};
use std::time::Duration;

/// Reported as the OS error code of every call.
const UNSUPPORTED: i32 = -1;

pub(super) struct UnsupportedPlatform;

impl Platform for UnsupportedPlatform {
    fn query_process_ids(&self, _buffer: &mut [u8]) -> Result<usize, PlatformError> {
        Err(PlatformError::new("query_process_ids", UNSUPPORTED))
    }

    fn open_process(&self, _pid: u32, _access: Access) -> Result<RawHandle, PlatformError> {
        Err(PlatformError::new("open_process", UNSUPPORTED))
    }

    fn close_handle(&self, _handle: RawHandle) {}

    fn first_module(&self, _handle: RawHandle) -> Result<ModuleId, PlatformError> {
        Err(PlatformError::new("first_module", UNSUPPORTED))
    }

    fn module_base_name(
        &self,
        _handle: RawHandle,
        _module: ModuleId,
        _buffer: &mut [u16],
    ) -> Result<usize, PlatformError> {
        Err(PlatformError::new("module_base_name", UNSUPPORTED))
    }

    fn terminate_process(&self, _handle: RawHandle, _exit_code: u32) -> Result<(), PlatformError> {
        Err(PlatformError::new("terminate_process", UNSUPPORTED))
    }

    fn wait_for_exit(&self, _handle: RawHandle, _timeout: Option<Duration>) -> WaitStatus {
        WaitStatus::Failed(UNSUPPORTED)
    }

    fn query_connection_table(
        &self,
        _class: TableClass,
        _sorted: bool,
        _buffer: &mut [u8],
        _size: &mut u32,
    ) -> QueryStatus {
        QueryStatus::Failed(PlatformError::new("query_connection_table", UNSUPPORTED))
    }

    fn current_process_id(&self) -> u32 {
        std::process::id()
    }
}
