//! Socket listing: owner-tagged TCP and UDP tables joined with process names.

use crate::config::FetchPolicy;
use crate::endian::{address_of, port_of};
use crate::gateway::fetch_table;
use crate::platform::{Platform, TableClass};
use crate::resolve::resolve_name;
use crate::table::{decode_counted, read_u32};
use crate::types::{ConnectionState, ProcError, TcpConnection, UdpConnection};

/// A row type of an owner-tagged socket table.
trait OwnerRow: Sized {
    const CLASS: TableClass;
    type Record;

    fn parse(row: &[u8]) -> Self;
    fn owner(&self) -> u32;
    fn into_record(self, name: String) -> Self::Record;
}

/// `MIB_TCPROW_OWNER_PID`
struct TcpRow {
    state: u32,
    local_addr: u32,
    local_port: u32,
    remote_addr: u32,
    remote_port: u32,
    owning_pid: u32,
}

impl OwnerRow for TcpRow {
    const CLASS: TableClass = TableClass::TcpOwnerPidAll;
    type Record = TcpConnection;

    fn parse(row: &[u8]) -> Self {
        Self {
            state: read_u32(row, 0),
            local_addr: read_u32(row, 4),
            local_port: read_u32(row, 8),
            remote_addr: read_u32(row, 12),
            remote_port: read_u32(row, 16),
            owning_pid: read_u32(row, 20),
        }
    }

    fn owner(&self) -> u32 {
        self.owning_pid
    }

    fn into_record(self, name: String) -> TcpConnection {
        TcpConnection {
            name,
            pid: self.owning_pid,
            state: ConnectionState::from_raw(self.state).unwrap_or_default(),
            local_ip: address_of(self.local_addr),
            local_port: port_of(self.local_port),
            remote_ip: address_of(self.remote_addr),
            remote_port: port_of(self.remote_port),
        }
    }
}

/// `MIB_UDPROW_OWNER_PID`
struct UdpRow {
    local_addr: u32,
    local_port: u32,
    owning_pid: u32,
}

impl OwnerRow for UdpRow {
    const CLASS: TableClass = TableClass::UdpOwnerPid;
    type Record = UdpConnection;

    fn parse(row: &[u8]) -> Self {
        Self {
            local_addr: read_u32(row, 0),
            local_port: read_u32(row, 4),
            owning_pid: read_u32(row, 8),
        }
    }

    fn owner(&self) -> u32 {
        self.owning_pid
    }

    fn into_record(self, name: String) -> UdpConnection {
        UdpConnection {
            name,
            pid: self.owning_pid,
            local_ip: address_of(self.local_addr),
            local_port: port_of(self.local_port),
        }
    }
}

/// Decodes `buffer` and keeps the rows accepted by `keep` whose owner resolves
/// to a non-empty name.
fn collect_rows<R: OwnerRow>(
    platform: &dyn Platform,
    buffer: &[u8],
    keep: impl Fn(&R) -> bool,
) -> Result<Vec<R::Record>, ProcError> {
    let rows = decode_counted(buffer, R::CLASS.layout())?;
    Ok(rows
        .map(R::parse)
        .filter(|row| keep(row))
        .filter_map(|row| {
            let name = resolve_name(platform, row.owner()).filter(|n| !n.is_empty())?;
            Some(row.into_record(name))
        })
        .collect())
}

/// List TCP connections in `state`, or in every state for [`ConnectionState::None`].
pub fn list_tcp(
    platform: &dyn Platform,
    policy: &FetchPolicy,
    state: ConnectionState,
) -> Result<Vec<TcpConnection>, ProcError> {
    let buffer = fetch_table(platform, TcpRow::CLASS, policy)?;
    collect_rows::<TcpRow>(platform, &buffer, |row| state.admits(row.state))
}

/// List bound UDP endpoints.
pub fn list_udp(
    platform: &dyn Platform,
    policy: &FetchPolicy,
) -> Result<Vec<UdpConnection>, ProcError> {
    let buffer = fetch_table(platform, UdpRow::CLASS, policy)?;
    collect_rows::<UdpRow>(platform, &buffer, |_| true)
}
