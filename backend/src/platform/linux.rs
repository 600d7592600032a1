//! Linux backend built on procfs.
//!
//! `/proc` has no handle-based API or owner-tagged socket tables, so this
//! backend keeps opened processes in a handle table and lays out
//! `/proc/net/{tcp,udp}` joined with the socket-inode owners in the same
//! counted-row format the decoder expects. Building a socket table walks every
//! process's fds, so the table built for a size probe is kept and handed to
//! the fetch that follows it.

use super::{Access, ModuleId, Platform, QueryStatus, RawHandle, TableClass};
use crate::endian::{pack_address, pack_port};
use crate::table::encode_counted;
use crate::types::{ConnectionState, PlatformError, WaitStatus};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use procfs::net::TcpState;
use procfs::process::{FDTarget, Process};
use procfs::ProcError;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const WAIT_POLL: Duration = Duration::from_millis(10);
const EBADF: i32 = Errno::EBADF as i32;

pub(super) struct ProcfsPlatform {
    handles: Mutex<HashMap<isize, Arc<Process>>>,
    next_handle: AtomicIsize,
    probed: Mutex<HashMap<(TableClass, bool), Vec<u8>>>,
}

impl ProcfsPlatform {
    pub(super) fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            next_handle: AtomicIsize::new(1),
            probed: Mutex::new(HashMap::new()),
        }
    }

    fn probed(&self) -> MutexGuard<'_, HashMap<(TableClass, bool), Vec<u8>>> {
        self.probed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The table built by the last probe, if `capacity` can hold it.
    fn take_probed(&self, class: TableClass, sorted: bool, capacity: usize) -> Option<Vec<u8>> {
        self.probed()
            .remove(&(class, sorted))
            .filter(|bytes| bytes.len() <= capacity)
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<isize, Arc<Process>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lookup(
        &self,
        call: &'static str,
        handle: RawHandle,
    ) -> Result<Arc<Process>, PlatformError> {
        self.handles()
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| PlatformError::new(call, EBADF))
    }
}

fn proc_error(call: &'static str, err: ProcError) -> PlatformError {
    let code = match err {
        ProcError::PermissionDenied(_) => Errno::EACCES as i32,
        ProcError::NotFound(_) => Errno::ESRCH as i32,
        ProcError::Io(e, _) => e.raw_os_error().unwrap_or(-1),
        _ => -1,
    };
    PlatformError::new(call, code)
}

/// Whether the process behind `process` is gone or a zombie.
fn has_exited(process: &Process) -> Result<bool, PlatformError> {
    match kill(Pid::from_raw(process.pid), None) {
        Ok(()) | Err(Errno::EPERM) => {}
        Err(Errno::ESRCH) => return Ok(true),
        Err(e) => return Err(PlatformError::new("kill", e as i32)),
    }
    // A stale /proc entry means the pid now belongs to someone else
    Ok(process
        .stat()
        .map(|stat| matches!(stat.state, 'Z' | 'X'))
        .unwrap_or(true))
}

/// Socket inode to owning pid, for every process we may inspect.
fn socket_owners() -> HashMap<u64, u32> {
    let mut owners = HashMap::new();
    let Ok(processes) = procfs::process::all_processes() else {
        return owners;
    };
    for process in processes.flatten() {
        let Ok(fds) = process.fd() else { continue };
        for fd in fds.flatten() {
            if let FDTarget::Socket(inode) = fd.target {
                owners.entry(inode).or_insert(process.pid as u32);
            }
        }
    }
    owners
}

fn tcp_state(state: &TcpState) -> ConnectionState {
    match state {
        TcpState::Established => ConnectionState::Established,
        TcpState::SynSent => ConnectionState::SynSent,
        TcpState::SynRecv | TcpState::NewSynRecv => ConnectionState::SynReceived,
        TcpState::FinWait1 => ConnectionState::FinWait1,
        TcpState::FinWait2 => ConnectionState::FinWait2,
        TcpState::TimeWait => ConnectionState::TimeWait,
        TcpState::Close => ConnectionState::Closed,
        TcpState::CloseWait => ConnectionState::CloseWait,
        TcpState::LastAck => ConnectionState::LastAck,
        TcpState::Listen => ConnectionState::Listening,
        TcpState::Closing => ConnectionState::Closing,
        #[allow(unreachable_patterns)]
        _ => ConnectionState::None,
    }
}

fn v4(addr: &SocketAddr) -> Option<(Ipv4Addr, u16)> {
    match addr {
        SocketAddr::V4(a) => Some((*a.ip(), a.port())),
        SocketAddr::V6(_) => None,
    }
}

fn tcp_table(sorted: bool) -> Result<Vec<u8>, PlatformError> {
    let entries = procfs::net::tcp().map_err(|e| proc_error("/proc/net/tcp", e))?;
    let owners = socket_owners();

    let mut rows: Vec<_> = entries
        .iter()
        .filter_map(|e| {
            let local = v4(&e.local_address)?;
            let remote = v4(&e.remote_address)?;
            let pid = owners.get(&e.inode).copied().unwrap_or(0);
            Some((local, remote, tcp_state(&e.state), pid))
        })
        .collect();
    if sorted {
        rows.sort_by_key(|(local, remote, ..)| (*local, *remote));
    }

    let packed: Vec<[u32; 6]> = rows
        .into_iter()
        .map(|(local, remote, state, pid)| {
            [
                state.raw(),
                pack_address(local.0),
                pack_port(local.1),
                pack_address(remote.0),
                pack_port(remote.1),
                pid,
            ]
        })
        .collect();
    Ok(encode_counted(&packed))
}

fn udp_table(sorted: bool) -> Result<Vec<u8>, PlatformError> {
    let entries = procfs::net::udp().map_err(|e| proc_error("/proc/net/udp", e))?;
    let owners = socket_owners();

    let mut rows: Vec<_> = entries
        .iter()
        .filter_map(|e| {
            let local = v4(&e.local_address)?;
            Some((local, owners.get(&e.inode).copied().unwrap_or(0)))
        })
        .collect();
    if sorted {
        rows.sort_by_key(|(local, _)| *local);
    }

    let packed: Vec<[u32; 3]> = rows
        .into_iter()
        .map(|(local, pid)| [pack_address(local.0), pack_port(local.1), pid])
        .collect();
    Ok(encode_counted(&packed))
}

impl Platform for ProcfsPlatform {
    fn query_process_ids(&self, buffer: &mut [u8]) -> Result<usize, PlatformError> {
        let processes =
            procfs::process::all_processes().map_err(|e| proc_error("all_processes", e))?;
        let mut used = 0;
        let pids = processes.flatten().map(|p| p.pid as u32);
        for (slot, pid) in buffer.chunks_exact_mut(4).zip(pids) {
            slot.copy_from_slice(&pid.to_le_bytes());
            used += 4;
        }
        Ok(used)
    }

    fn open_process(&self, pid: u32, access: Access) -> Result<RawHandle, PlatformError> {
        let process = Process::new(pid as i32).map_err(|e| proc_error("open", e))?;
        if access == Access::Full {
            kill(Pid::from_raw(process.pid), None)
                .map_err(|e| PlatformError::new("kill", e as i32))?;
        }
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles().insert(handle, Arc::new(process));
        Ok(RawHandle(handle))
    }

    fn close_handle(&self, handle: RawHandle) {
        self.handles().remove(&handle.0);
    }

    fn first_module(&self, handle: RawHandle) -> Result<ModuleId, PlatformError> {
        let process = self.lookup("first_module", handle)?;
        process.stat().map_err(|e| proc_error("stat", e))?;
        Ok(ModuleId(handle.0))
    }

    fn module_base_name(
        &self,
        handle: RawHandle,
        _module: ModuleId,
        buffer: &mut [u16],
    ) -> Result<usize, PlatformError> {
        let process = self.lookup("module_base_name", handle)?;
        let exe_name = process
            .exe()
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()));
        let name = match exe_name {
            Some(name) => name,
            // Kernel threads and other users' processes expose no exe link
            None => process.stat().map_err(|e| proc_error("stat", e))?.comm,
        };

        let mut written = 0;
        for (slot, unit) in buffer.iter_mut().zip(name.encode_utf16()) {
            *slot = unit;
            written += 1;
        }
        Ok(written)
    }

    fn terminate_process(&self, handle: RawHandle, exit_code: u32) -> Result<(), PlatformError> {
        let process = self.lookup("terminate", handle)?;
        // Signals cannot carry an exit code
        debug!(pid = process.pid, exit_code, "sending SIGKILL");
        kill(Pid::from_raw(process.pid), Signal::SIGKILL)
            .map_err(|e| PlatformError::new("kill", e as i32))
    }

    fn wait_for_exit(&self, handle: RawHandle, timeout: Option<Duration>) -> WaitStatus {
        let process = match self.lookup("wait", handle) {
            Ok(process) => process,
            Err(e) => return WaitStatus::Failed(e.code),
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match has_exited(&process) {
                Ok(true) => return WaitStatus::Signaled,
                Ok(false) => {}
                Err(e) => return WaitStatus::Failed(e.code),
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return WaitStatus::TimedOut;
            }
            thread::sleep(WAIT_POLL);
        }
    }

    fn query_connection_table(
        &self,
        class: TableClass,
        sorted: bool,
        buffer: &mut [u8],
        size: &mut u32,
    ) -> QueryStatus {
        let bytes = match self.take_probed(class, sorted, buffer.len()) {
            Some(bytes) => bytes,
            None => {
                let table = match class {
                    TableClass::TcpOwnerPidAll => tcp_table(sorted),
                    TableClass::UdpOwnerPid => udp_table(sorted),
                };
                match table {
                    Ok(bytes) => bytes,
                    Err(e) => return QueryStatus::Failed(e),
                }
            }
        };
        *size = bytes.len() as u32;
        if buffer.len() < bytes.len() {
            self.probed().insert((class, sorted), bytes);
            return QueryStatus::InsufficientBuffer;
        }
        buffer[..bytes.len()].copy_from_slice(&bytes);
        QueryStatus::Complete
    }

    fn current_process_id(&self) -> u32 {
        std::process::id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_opens_and_names_itself() {
        let platform = ProcfsPlatform::new();
        let handle = platform
            .open_process(std::process::id(), Access::QueryRead)
            .unwrap();
        let module = platform.first_module(handle).unwrap();
        let mut buffer = [0u16; 320];
        let written = platform.module_base_name(handle, module, &mut buffer).unwrap();
        assert!(written > 0);

        platform.close_handle(handle);
        assert!(platform.first_module(handle).is_err());
    }

    #[test]
    fn missing_process_fails_to_open() {
        let platform = ProcfsPlatform::new();
        assert!(platform.open_process(u32::MAX >> 2, Access::QueryRead).is_err());
    }

    #[test]
    fn tcp_probe_reports_required_size() {
        let platform = ProcfsPlatform::new();
        let mut size = 0;
        let status =
            platform.query_connection_table(TableClass::TcpOwnerPidAll, true, &mut [], &mut size);
        assert_eq!(status, QueryStatus::InsufficientBuffer);
        assert!(size >= 4);
        assert_eq!((size - 4) % 24, 0);
    }

    #[test]
    fn fetch_reuses_the_table_built_by_the_probe() {
        let platform = ProcfsPlatform::new();
        let class = TableClass::TcpOwnerPidAll;
        let mut size = 0;
        platform.query_connection_table(class, true, &mut [], &mut size);
        let probed = size;

        // Would add a row to a freshly built table
        let _listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();

        let mut buffer = vec![0u8; probed as usize];
        let status = platform.query_connection_table(class, true, &mut buffer, &mut size);
        assert_eq!(status, QueryStatus::Complete);
        assert_eq!(size, probed);
        assert!(platform.probed().is_empty());
    }
}
