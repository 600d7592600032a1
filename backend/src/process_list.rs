//! Process listing and lookup by name.

use crate::config::FetchPolicy;
use crate::gateway::fetch_process_ids;
use crate::platform::Platform;
use crate::resolve::{resolve_name, IDLE_PID};
use crate::table::{decode, read_u32, PROCESS_ID_LAYOUT};
use crate::types::{ProcError, ProcessInfo};

/// List every process whose name can be resolved, in platform order.
pub fn list_processes(
    platform: &dyn Platform,
    policy: &FetchPolicy,
) -> Result<Vec<ProcessInfo>, ProcError> {
    let buffer = fetch_process_ids(platform, policy)?;
    let rows = decode(&buffer, &PROCESS_ID_LAYOUT, PROCESS_ID_LAYOUT.rows_in(buffer.len()))?;

    let processes = rows
        .map(|row| read_u32(row, 0))
        .filter(|pid| *pid != IDLE_PID)
        .filter_map(|pid| resolve_name(platform, pid).map(|name| ProcessInfo { pid, name }))
        .collect();
    Ok(processes)
}

/// PIDs of every process whose name matches `name`, ignoring case.
pub fn find_processes_by_name(
    platform: &dyn Platform,
    policy: &FetchPolicy,
    name: &str,
) -> Result<Vec<u32>, ProcError> {
    let wanted = name.to_lowercase();
    Ok(list_processes(platform, policy)?
        .into_iter()
        .filter(|p| p.name.to_lowercase() == wanted)
        .map(|p| p.pid)
        .collect())
}

/// PID of the first process whose name matches `name`, ignoring case.
pub fn find_first_process_by_name(
    platform: &dyn Platform,
    policy: &FetchPolicy,
    name: &str,
) -> Result<Option<u32>, ProcError> {
    Ok(find_processes_by_name(platform, policy, name)?
        .into_iter()
        .next())
}
