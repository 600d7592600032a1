//! UI-agnostic process and socket-ownership inspection library.
//!
//! Lists running processes by executable name, lists IPv4 TCP and UDP
//! endpoints together with the process that owns them, and terminates a
//! process while waiting for it to release its resources. Every call is a
//! one-shot snapshot taken through the [`platform::Platform`] of the running OS.

mod config;
mod endian;
mod gateway;
mod net_list;
pub mod platform;
mod process_kill;
mod process_list;
mod resolve;
mod table;
mod types;

pub use config::{Config, FetchPolicy, TerminateConfig};
pub use endian::{address_of, pack_address, pack_port, port_of};
pub use resolve::{IDLE_PID, NAME_CAPACITY};
pub use table::{decode, decode_counted, Rows, TableLayout};
pub use types::{
    ConnectionState, PlatformError, ProcError, ProcessInfo, TableKind, TcpConnection,
    UdpConnection, WaitStatus,
};

use once_cell::sync::Lazy;
use platform::Platform;
use tracing::warn;

/// Every table of one inspection pass. A table that could not be read is
/// empty and its error is kept in `errors`.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub processes: Vec<ProcessInfo>,
    pub tcp: Vec<TcpConnection>,
    pub udp: Vec<UdpConnection>,
    pub errors: Vec<ProcError>,
}

/// Inspection operations bound to a platform and a configuration.
#[derive(Clone, Copy)]
pub struct Inspector<'a> {
    platform: &'a dyn Platform,
    config: &'a Config,
}

impl<'a> Inspector<'a> {
    pub fn new(platform: &'a dyn Platform, config: &'a Config) -> Self {
        Self { platform, config }
    }

    pub fn list_processes(&self) -> Result<Vec<ProcessInfo>, ProcError> {
        process_list::list_processes(self.platform, &self.config.fetch)
    }

    pub fn find_processes_by_name(&self, name: &str) -> Result<Vec<u32>, ProcError> {
        process_list::find_processes_by_name(self.platform, &self.config.fetch, name)
    }

    pub fn find_first_process_by_name(&self, name: &str) -> Result<Option<u32>, ProcError> {
        process_list::find_first_process_by_name(self.platform, &self.config.fetch, name)
    }

    pub fn resolve_name(&self, pid: u32) -> Option<String> {
        resolve::resolve_name(self.platform, pid)
    }

    pub fn list_tcp(&self, state: ConnectionState) -> Result<Vec<TcpConnection>, ProcError> {
        net_list::list_tcp(self.platform, &self.config.fetch, state)
    }

    pub fn list_udp(&self) -> Result<Vec<UdpConnection>, ProcError> {
        net_list::list_udp(self.platform, &self.config.fetch)
    }

    /// Terminates `pid` with the configured exit code. Blocks without timeout.
    pub fn terminate(&self, pid: u32) -> Result<WaitStatus, ProcError> {
        process_kill::terminate(self.platform, pid, self.config.terminate.exit_code)
    }

    pub fn current_process_id(&self) -> u32 {
        self.platform.current_process_id()
    }

    /// Reads all three tables, each independently of the others' failures.
    pub fn snapshot(&self, state: ConnectionState) -> Snapshot {
        let mut errors = Vec::new();
        let processes = keep(self.list_processes(), &mut errors);
        let tcp = keep(self.list_tcp(state), &mut errors);
        let udp = keep(self.list_udp(), &mut errors);
        Snapshot {
            processes,
            tcp,
            udp,
            errors,
        }
    }
}

fn keep<T>(result: Result<Vec<T>, ProcError>, errors: &mut Vec<ProcError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "table unavailable, continuing with an empty one");
        errors.push(e);
        Vec::new()
    })
}

static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(Config::default);

fn system() -> Inspector<'static> {
    Inspector::new(platform::system(), &DEFAULT_CONFIG)
}

/// List every process whose name can be resolved.
pub fn list_processes() -> Result<Vec<ProcessInfo>, ProcError> {
    system().list_processes()
}

pub fn find_processes_by_name(name: &str) -> Result<Vec<u32>, ProcError> {
    system().find_processes_by_name(name)
}

pub fn find_first_process_by_name(name: &str) -> Result<Option<u32>, ProcError> {
    system().find_first_process_by_name(name)
}

/// Executable name of `pid`, or `None` if it cannot be inspected.
pub fn resolve_name(pid: u32) -> Option<String> {
    system().resolve_name(pid)
}

/// List TCP connections in `state`; [`ConnectionState::None`] lists all of them.
pub fn list_tcp(state: ConnectionState) -> Result<Vec<TcpConnection>, ProcError> {
    system().list_tcp(state)
}

pub fn list_all_tcp() -> Result<Vec<TcpConnection>, ProcError> {
    system().list_tcp(ConnectionState::None)
}

pub fn list_udp() -> Result<Vec<UdpConnection>, ProcError> {
    system().list_udp()
}

/// Terminate a process and wait, without timeout, until it has exited.
pub fn terminate(pid: u32) -> Result<WaitStatus, ProcError> {
    system().terminate(pid)
}

pub fn current_process_id() -> u32 {
    system().current_process_id()
}

pub fn snapshot(state: ConnectionState) -> Snapshot {
    system().snapshot(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use crate::platform::TableClass;
    use crate::table::encode_counted;

    #[test]
    fn snapshot_keeps_tables_that_succeeded() {
        let fake = FakePlatform::new()
            .with_process(100, "server.exe")
            .with_tcp_table(encode_counted(&[[
                ConnectionState::Listening.raw(),
                0,
                pack_port(8080),
                0,
                0,
                100,
            ]]))
            .failing_table(TableClass::UdpOwnerPid);
        let config = Config::default();

        let snapshot = Inspector::new(&fake, &config).snapshot(ConnectionState::None);

        assert_eq!(snapshot.processes.len(), 1);
        assert_eq!(snapshot.tcp.len(), 1);
        assert!(snapshot.udp.is_empty());
        assert_eq!(snapshot.errors.len(), 1);
        assert_eq!(snapshot.errors[0].table(), Some(TableKind::Udp));
    }

    #[test]
    fn terminate_uses_configured_exit_code() {
        let fake = FakePlatform::new().with_process(500, "notepad.exe");
        let config = Config::from_toml_str("[terminate]\nexit_code = 9\n").unwrap();

        Inspector::new(&fake, &config).terminate(500).unwrap();

        assert!(fake
            .calls()
            .contains(&platform::fake::Call::Terminate(platform::RawHandle(1500), 9)));
    }

    #[test]
    fn current_process_id_comes_from_the_platform() {
        let fake = FakePlatform::new();
        let config = Config::default();
        assert_eq!(Inspector::new(&fake, &config).current_process_id(), 4242);
    }
}
