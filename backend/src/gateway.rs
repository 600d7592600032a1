//! Size negotiation with the platform's process and socket tables.
//!
//! Socket tables are probed with an empty buffer for their size and then
//! fetched. A table that grew in between is re-probed under the fetch policy
//! instead of being returned truncated.

use crate::config::FetchPolicy;
use crate::platform::{Platform, QueryStatus, TableClass};
use crate::table::{TableLayout, PROCESS_ID_LAYOUT, TCP_OWNER_PID_LAYOUT, UDP_OWNER_PID_LAYOUT};
use crate::types::{ProcError, TableKind};
use std::thread;
use tracing::{debug, warn};

impl TableClass {
    pub fn layout(self) -> &'static TableLayout {
        match self {
            TableClass::TcpOwnerPidAll => &TCP_OWNER_PID_LAYOUT,
            TableClass::UdpOwnerPid => &UDP_OWNER_PID_LAYOUT,
        }
    }

    pub fn kind(self) -> TableKind {
        self.layout().kind
    }
}

/// Fetches a complete owner-tagged socket table, sorted where supported.
pub fn fetch_table(
    platform: &dyn Platform,
    class: TableClass,
    policy: &FetchPolicy,
) -> Result<Vec<u8>, ProcError> {
    let table = class.kind();
    let mut size = 0u32;
    match platform.query_connection_table(class, true, &mut [], &mut size) {
        QueryStatus::InsufficientBuffer | QueryStatus::Complete => {}
        QueryStatus::Failed(source) => {
            warn!(%table, error = %source, "table size probe failed");
            return Err(ProcError::PlatformQuery { table, source });
        }
    }
    debug!(%table, size, "probed table size");

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            thread::sleep(policy.backoff(attempt - 1));
        }
        let mut buffer = vec![0u8; size as usize];
        match platform.query_connection_table(class, true, &mut buffer, &mut size) {
            QueryStatus::Complete => return Ok(buffer),
            QueryStatus::InsufficientBuffer => {
                debug!(%table, attempt, size, "table grew between probe and fetch");
            }
            QueryStatus::Failed(source) => {
                warn!(%table, error = %source, "table fetch failed");
                return Err(ProcError::PlatformQuery { table, source });
            }
        }
    }

    warn!(%table, attempts = policy.max_attempts, "giving up on a growing table");
    Err(ProcError::StaleTableSize {
        table,
        attempts: policy.max_attempts,
    })
}

/// Fetches the process-identifier table, trimmed to the bytes in use.
///
/// The platform cannot report the size it needs, so a buffer that comes back
/// completely full is treated as possibly truncated and doubled.
pub fn fetch_process_ids(
    platform: &dyn Platform,
    policy: &FetchPolicy,
) -> Result<Vec<u8>, ProcError> {
    let table = PROCESS_ID_LAYOUT.kind;
    let mut capacity = policy
        .initial_process_capacity
        .saturating_mul(PROCESS_ID_LAYOUT.row_size);

    for attempt in 1..=policy.max_attempts {
        let mut buffer = vec![0u8; capacity];
        let used = platform.query_process_ids(&mut buffer).map_err(|source| {
            warn!(%table, error = %source, "process enumeration failed");
            ProcError::PlatformQuery { table, source }
        })?;
        if used < capacity {
            buffer.truncate(used);
            debug!(%table, entries = PROCESS_ID_LAYOUT.rows_in(used), "fetched process ids");
            return Ok(buffer);
        }
        debug!(%table, attempt, capacity, "process id buffer filled, growing");
        capacity = capacity.saturating_mul(2);
    }

    warn!(%table, attempts = policy.max_attempts, "giving up on a growing table");
    Err(ProcError::StaleTableSize {
        table,
        attempts: policy.max_attempts,
    })
}
