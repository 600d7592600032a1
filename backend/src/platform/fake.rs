//! Scripted in-memory platform for unit tests.

use super::{Access, ModuleId, Platform, QueryStatus, RawHandle, TableClass};
use crate::types::{PlatformError, WaitStatus};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    QueryProcessIds(usize),
    Open(u32, Access),
    Close(RawHandle),
    FirstModule(RawHandle),
    ModuleName(RawHandle),
    Terminate(RawHandle, u32),
    Wait(RawHandle, Option<Duration>),
    QueryTable(TableClass, usize),
}

#[derive(Default)]
struct TableScript {
    bytes: Vec<u8>,
    fail: bool,
    fail_fetch: bool,
    grow_times: u32,
    grow_by: u32,
    advertised: Option<u32>,
}

#[derive(Default)]
pub(crate) struct FakePlatform {
    pids: Vec<u32>,
    names: HashMap<u32, String>,
    module_failures: HashSet<u32>,
    fail_process_query: bool,
    fail_terminate: bool,
    wait_status: Option<WaitStatus>,
    tcp: Mutex<TableScript>,
    udp: Mutex<TableScript>,
    calls: Mutex<Vec<Call>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a process that opens and resolves to `name`.
    pub fn with_process(mut self, pid: u32, name: &str) -> Self {
        self.pids.push(pid);
        self.names.insert(pid, name.to_string());
        self
    }

    /// Adds a pid that shows up in the id table but cannot be opened.
    pub fn with_inaccessible(mut self, pid: u32) -> Self {
        self.pids.push(pid);
        self
    }

    /// Adds a process that opens but whose module enumeration fails.
    pub fn with_module_failure(mut self, pid: u32) -> Self {
        self.pids.push(pid);
        self.names.insert(pid, String::new());
        self.module_failures.insert(pid);
        self
    }

    pub fn with_tcp_table(self, bytes: Vec<u8>) -> Self {
        self.tcp.lock().unwrap().bytes = bytes;
        self
    }

    pub fn with_udp_table(self, bytes: Vec<u8>) -> Self {
        self.udp.lock().unwrap().bytes = bytes;
        self
    }

    /// The next `times` fetches of `class` find the table grown by `by` bytes.
    pub fn growing(self, class: TableClass, times: u32, by: u32) -> Self {
        {
            let mut script = self.script(class).lock().unwrap();
            script.grow_times = times;
            script.grow_by = by;
        }
        self
    }

    pub fn failing_table(self, class: TableClass) -> Self {
        self.script(class).lock().unwrap().fail = true;
        self
    }

    /// The size probe of `class` succeeds; every sized fetch fails.
    pub fn failing_fetch(self, class: TableClass) -> Self {
        self.script(class).lock().unwrap().fail_fetch = true;
        self
    }

    pub fn failing_process_query(mut self) -> Self {
        self.fail_process_query = true;
        self
    }

    pub fn failing_terminate(mut self) -> Self {
        self.fail_terminate = true;
        self
    }

    pub fn wait_returns(mut self, status: WaitStatus) -> Self {
        self.wait_status = Some(status);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Open(..)))
            .count()
    }

    pub fn closes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Close(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn script(&self, class: TableClass) -> &Mutex<TableScript> {
        match class {
            TableClass::TcpOwnerPidAll => &self.tcp,
            TableClass::UdpOwnerPid => &self.udp,
        }
    }

    fn pid_of(handle: RawHandle) -> u32 {
        (handle.0 - 1000) as u32
    }
}

impl Platform for FakePlatform {
    fn query_process_ids(&self, buffer: &mut [u8]) -> Result<usize, PlatformError> {
        self.record(Call::QueryProcessIds(buffer.len()));
        if self.fail_process_query {
            return Err(PlatformError::new("EnumProcesses", 5));
        }
        let mut used = 0;
        for (pid, slot) in self.pids.iter().zip(buffer.chunks_exact_mut(4)) {
            slot.copy_from_slice(&pid.to_le_bytes());
            used += 4;
        }
        Ok(used)
    }

    fn open_process(&self, pid: u32, access: Access) -> Result<RawHandle, PlatformError> {
        self.record(Call::Open(pid, access));
        if self.names.contains_key(&pid) {
            Ok(RawHandle(1000 + pid as isize))
        } else {
            Err(PlatformError::new("OpenProcess", 5))
        }
    }

    fn close_handle(&self, handle: RawHandle) {
        self.record(Call::Close(handle));
    }

    fn first_module(&self, handle: RawHandle) -> Result<ModuleId, PlatformError> {
        self.record(Call::FirstModule(handle));
        if self.module_failures.contains(&Self::pid_of(handle)) {
            return Err(PlatformError::new("EnumProcessModules", 299));
        }
        Ok(ModuleId(handle.0))
    }

    fn module_base_name(
        &self,
        handle: RawHandle,
        _module: ModuleId,
        buffer: &mut [u16],
    ) -> Result<usize, PlatformError> {
        self.record(Call::ModuleName(handle));
        let name = &self.names[&Self::pid_of(handle)];
        let mut written = 0;
        for (unit, slot) in name.encode_utf16().zip(buffer.iter_mut()) {
            *slot = unit;
            written += 1;
        }
        Ok(written)
    }

    fn terminate_process(&self, handle: RawHandle, exit_code: u32) -> Result<(), PlatformError> {
        self.record(Call::Terminate(handle, exit_code));
        if self.fail_terminate {
            return Err(PlatformError::new("TerminateProcess", 5));
        }
        Ok(())
    }

    fn wait_for_exit(&self, handle: RawHandle, timeout: Option<Duration>) -> WaitStatus {
        self.record(Call::Wait(handle, timeout));
        self.wait_status.unwrap_or(WaitStatus::Signaled)
    }

    fn query_connection_table(
        &self,
        class: TableClass,
        _sorted: bool,
        buffer: &mut [u8],
        size: &mut u32,
    ) -> QueryStatus {
        self.record(Call::QueryTable(class, buffer.len()));
        let mut guard = self.script(class).lock().unwrap();
        let script = &mut *guard;
        if script.fail || (script.fail_fetch && !buffer.is_empty()) {
            let call = match class {
                TableClass::TcpOwnerPidAll => "GetExtendedTcpTable",
                TableClass::UdpOwnerPid => "GetExtendedUdpTable",
            };
            return QueryStatus::Failed(PlatformError::new(call, 87));
        }
        let required = *script.advertised.get_or_insert(script.bytes.len() as u32);
        if (buffer.len() as u32) < required {
            *size = required;
            return QueryStatus::InsufficientBuffer;
        }
        if script.grow_times > 0 {
            script.grow_times -= 1;
            let grown = required + script.grow_by;
            script.advertised = Some(grown);
            *size = grown;
            return QueryStatus::InsufficientBuffer;
        }
        let len = script.bytes.len();
        buffer[..len].copy_from_slice(&script.bytes);
        *size = len as u32;
        QueryStatus::Complete
    }

    fn current_process_id(&self) -> u32 {
        4242
    }
}
