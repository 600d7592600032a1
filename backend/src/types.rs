//! Data types and error definitions for process and socket inspection.

use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

/// A process whose executable name could be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// A TCP endpoint pair attributed to its owning process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConnection {
    pub name: String,
    pub pid: u32,
    pub state: ConnectionState,
    pub local_ip: Ipv4Addr,
    pub local_port: u16,
    pub remote_ip: Ipv4Addr,
    pub remote_port: u16,
}

/// A bound UDP endpoint attributed to its owning process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpConnection {
    pub name: String,
    pub pid: u32,
    pub local_ip: Ipv4Addr,
    pub local_port: u16,
}

/// TCP connection state as stored in the owner-tagged TCP table.
///
/// `None` is not a real state: passed as a filter it means "every state".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ConnectionState {
    #[default]
    None = 0,
    Closed = 1,
    Listening = 2,
    SynSent = 3,
    SynReceived = 4,
    Established = 5,
    FinWait1 = 6,
    FinWait2 = 7,
    CloseWait = 8,
    Closing = 9,
    LastAck = 10,
    TimeWait = 11,
    DeleteTcb = 12,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 13] = [
        ConnectionState::None,
        ConnectionState::Closed,
        ConnectionState::Listening,
        ConnectionState::SynSent,
        ConnectionState::SynReceived,
        ConnectionState::Established,
        ConnectionState::FinWait1,
        ConnectionState::FinWait2,
        ConnectionState::CloseWait,
        ConnectionState::Closing,
        ConnectionState::LastAck,
        ConnectionState::TimeWait,
        ConnectionState::DeleteTcb,
    ];

    /// Maps a raw table value back to a state. Unknown values yield `Option::None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Whether a row with raw state `raw` passes this state used as a filter.
    pub fn admits(self, raw: u32) -> bool {
        self == ConnectionState::None || self.raw() == raw
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::None => "ANY",
            ConnectionState::Closed => "CLOSED",
            ConnectionState::Listening => "LISTENING",
            ConnectionState::SynSent => "SYN_SENT",
            ConnectionState::SynReceived => "SYN_RCVD",
            ConnectionState::Established => "ESTABLISHED",
            ConnectionState::FinWait1 => "FIN_WAIT1",
            ConnectionState::FinWait2 => "FIN_WAIT2",
            ConnectionState::CloseWait => "CLOSE_WAIT",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::LastAck => "LAST_ACK",
            ConnectionState::TimeWait => "TIME_WAIT",
            ConnectionState::DeleteTcb => "DELETE_TCB",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which kernel table an operation was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Processes,
    Tcp,
    Udp,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Processes => f.write_str("process"),
            TableKind::Tcp => f.write_str("TCP"),
            TableKind::Udp => f.write_str("UDP"),
        }
    }
}

/// A failed call at the platform boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{call} failed (os error {code})")]
pub struct PlatformError {
    pub call: &'static str,
    pub code: i32,
}

impl PlatformError {
    pub fn new(call: &'static str, code: i32) -> Self {
        Self { call, code }
    }
}

/// How the wait that follows a termination request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Signaled,
    TimedOut,
    Abandoned,
    Failed(i32),
}

impl WaitStatus {
    pub fn is_clean(self) -> bool {
        self == WaitStatus::Signaled
    }
}

/// Errors that can occur during inspection or termination.
#[derive(Error, Debug)]
pub enum ProcError {
    #[error("Querying the {table} table failed: {source}")]
    PlatformQuery {
        table: TableKind,
        #[source]
        source: PlatformError,
    },
    #[error("The {table} table kept growing after {attempts} fetch attempts")]
    StaleTableSize { table: TableKind, attempts: u32 },
    #[error(
        "Malformed {table} table: {entries} rows of {row_size} bytes after a {header_size}-byte header exceed {len} bytes"
    )]
    MalformedTable {
        table: TableKind,
        entries: usize,
        header_size: usize,
        row_size: usize,
        len: usize,
    },
    #[error("Failed to terminate PID {pid}: {source}")]
    Termination {
        pid: u32,
        #[source]
        source: PlatformError,
    },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProcError {
    /// The table this error concerns, if it is a per-table failure.
    pub fn table(&self) -> Option<TableKind> {
        match self {
            ProcError::PlatformQuery { table, .. }
            | ProcError::StaleTableSize { table, .. }
            | ProcError::MalformedTable { table, .. } => Some(*table),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_raw_values() {
        for state in ConnectionState::ALL {
            assert_eq!(ConnectionState::from_raw(state.raw()), Some(state));
        }
        assert_eq!(ConnectionState::from_raw(13), None);
    }

    #[test]
    fn none_filter_admits_everything() {
        assert!(ConnectionState::None.admits(2));
        assert!(ConnectionState::None.admits(99));
        assert!(ConnectionState::Listening.admits(2));
        assert!(!ConnectionState::Listening.admits(5));
    }

    #[test]
    fn errors_name_their_table() {
        let err = ProcError::PlatformQuery {
            table: TableKind::Udp,
            source: PlatformError::new("GetExtendedUdpTable", 87),
        };
        assert_eq!(err.table(), Some(TableKind::Udp));
        assert_eq!(
            err.to_string(),
            "Querying the UDP table failed: GetExtendedUdpTable failed (os error 87)"
        );
        assert_eq!(ProcError::Config("x".into()).table(), None);
    }
}
