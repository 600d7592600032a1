//! Windows backend over psapi, kernel32 and iphlpapi.

use super::{Access, ModuleId, Platform, QueryStatus, RawHandle, TableClass};
use crate::types::{PlatformError, WaitStatus};
use std::ptr;
use std::time::Duration;
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_INSUFFICIENT_BUFFER, HMODULE, NO_ERROR, WAIT_ABANDONED,
    WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, GetExtendedUdpTable, TCP_TABLE_OWNER_PID_ALL, UDP_TABLE_OWNER_PID,
};
use windows_sys::Win32::Networking::WinSock::AF_INET;
use windows_sys::Win32::System::ProcessStatus::{
    EnumProcessModules, EnumProcesses, GetModuleBaseNameW,
};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcessId, OpenProcess, TerminateProcess, WaitForSingleObject, INFINITE,
    PROCESS_ALL_ACCESS, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};

pub(super) struct Win32Platform;

impl Win32Platform {
    pub(super) fn new() -> Self {
        Self
    }
}

fn last_error(call: &'static str) -> PlatformError {
    // SAFETY: reads thread-local error state only
    PlatformError::new(call, unsafe { GetLastError() } as i32)
}

/// Copies 4-byte-aligned scratch words out to a caller's byte buffer.
fn copy_words(words: &[u32], buffer: &mut [u8]) {
    for (chunk, word) in buffer.chunks_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes()[..chunk.len()]);
    }
}

impl Platform for Win32Platform {
    fn query_process_ids(&self, buffer: &mut [u8]) -> Result<usize, PlatformError> {
        let mut words = vec![0u32; buffer.len() / 4];
        let mut needed = 0u32;
        // SAFETY: `words` provides exactly the byte count passed as `cb`
        let ok = unsafe {
            EnumProcesses(
                words.as_mut_ptr(),
                (words.len() * 4) as u32,
                &mut needed,
            )
        };
        if ok == 0 {
            return Err(last_error("EnumProcesses"));
        }
        copy_words(&words, buffer);
        Ok(needed as usize)
    }

    fn open_process(&self, pid: u32, access: Access) -> Result<RawHandle, PlatformError> {
        let rights = match access {
            Access::QueryRead => PROCESS_QUERY_INFORMATION | PROCESS_VM_READ,
            Access::Full => PROCESS_ALL_ACCESS | PROCESS_VM_READ,
        };
        // SAFETY: plain value arguments; a zero handle signals failure
        let handle = unsafe { OpenProcess(rights, 0, pid) };
        if handle == 0 {
            return Err(last_error("OpenProcess"));
        }
        Ok(RawHandle(handle))
    }

    fn close_handle(&self, handle: RawHandle) {
        // SAFETY: handles reach here only from a successful OpenProcess
        unsafe {
            CloseHandle(handle.0);
        }
    }

    fn first_module(&self, handle: RawHandle) -> Result<ModuleId, PlatformError> {
        let mut module: HMODULE = 0;
        let mut needed = 0u32;
        // SAFETY: room for exactly one module handle is passed
        let ok = unsafe {
            EnumProcessModules(
                handle.0,
                &mut module,
                std::mem::size_of::<HMODULE>() as u32,
                &mut needed,
            )
        };
        if ok == 0 {
            return Err(last_error("EnumProcessModules"));
        }
        Ok(ModuleId(module))
    }

    fn module_base_name(
        &self,
        handle: RawHandle,
        module: ModuleId,
        buffer: &mut [u16],
    ) -> Result<usize, PlatformError> {
        // SAFETY: `nsize` is the buffer length in characters
        let written = unsafe {
            GetModuleBaseNameW(handle.0, module.0, buffer.as_mut_ptr(), buffer.len() as u32)
        };
        if written == 0 {
            return Err(last_error("GetModuleBaseNameW"));
        }
        Ok(written as usize)
    }

    fn terminate_process(&self, handle: RawHandle, exit_code: u32) -> Result<(), PlatformError> {
        // SAFETY: handle comes from OpenProcess with PROCESS_TERMINATE included
        if unsafe { TerminateProcess(handle.0, exit_code) } == 0 {
            return Err(last_error("TerminateProcess"));
        }
        Ok(())
    }

    fn wait_for_exit(&self, handle: RawHandle, timeout: Option<Duration>) -> WaitStatus {
        let millis = timeout.map_or(INFINITE, |t| {
            u32::try_from(t.as_millis()).unwrap_or(INFINITE - 1)
        });
        // SAFETY: handle comes from OpenProcess with SYNCHRONIZE included
        match unsafe { WaitForSingleObject(handle.0, millis) } {
            WAIT_OBJECT_0 => WaitStatus::Signaled,
            WAIT_TIMEOUT => WaitStatus::TimedOut,
            WAIT_ABANDONED => WaitStatus::Abandoned,
            WAIT_FAILED => WaitStatus::Failed(last_error("WaitForSingleObject").code),
            other => WaitStatus::Failed(other as i32),
        }
    }

    fn query_connection_table(
        &self,
        class: TableClass,
        sorted: bool,
        buffer: &mut [u8],
        size: &mut u32,
    ) -> QueryStatus {
        let mut words = vec![0u32; buffer.len().div_ceil(4)];
        let table = if words.is_empty() {
            ptr::null_mut()
        } else {
            words.as_mut_ptr().cast()
        };
        *size = buffer.len() as u32;
        let order = i32::from(sorted);

        // SAFETY: `table` is null or points to at least `*size` aligned bytes
        let (call, status) = unsafe {
            match class {
                TableClass::TcpOwnerPidAll => (
                    "GetExtendedTcpTable",
                    GetExtendedTcpTable(
                        table,
                        size,
                        order,
                        u32::from(AF_INET),
                        TCP_TABLE_OWNER_PID_ALL,
                        0,
                    ),
                ),
                TableClass::UdpOwnerPid => (
                    "GetExtendedUdpTable",
                    GetExtendedUdpTable(
                        table,
                        size,
                        order,
                        u32::from(AF_INET),
                        UDP_TABLE_OWNER_PID,
                        0,
                    ),
                ),
            }
        };

        match status {
            NO_ERROR => {
                copy_words(&words, buffer);
                QueryStatus::Complete
            }
            ERROR_INSUFFICIENT_BUFFER => QueryStatus::InsufficientBuffer,
            code => QueryStatus::Failed(PlatformError::new(call, code as i32)),
        }
    }

    fn current_process_id(&self) -> u32 {
        // SAFETY: no arguments, cannot fail
        unsafe { GetCurrentProcessId() }
    }
}
