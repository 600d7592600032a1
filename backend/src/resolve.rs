//! Process identifier to executable name resolution.

use crate::platform::{Access, Platform, ScopedHandle};
use crate::types::PlatformError;
use tracing::trace;

/// Identifier of the system idle process; never resolvable.
pub const IDLE_PID: u32 = 0;

/// UTF-16 code units reserved for a module base name: the longest file name
/// component (255) plus the terminator, with margin.
pub const NAME_CAPACITY: usize = 320;

/// Resolves `pid` to the base name of its main module.
///
/// Returns `None` when the process cannot be inspected: it is the idle
/// process, it exited, or access was denied. Nothing is cached.
pub fn resolve_name(platform: &dyn Platform, pid: u32) -> Option<String> {
    if pid == IDLE_PID {
        return None;
    }
    match try_resolve(platform, pid) {
        Ok(name) => Some(name),
        Err(e) => {
            trace!(pid, error = %e, "process name unavailable");
            None
        }
    }
}

fn try_resolve(platform: &dyn Platform, pid: u32) -> Result<String, PlatformError> {
    let handle = ScopedHandle::open(platform, pid, Access::QueryRead)?;
    let module = platform.first_module(handle.raw())?;

    let mut buffer = [0u16; NAME_CAPACITY];
    let written = platform.module_base_name(handle.raw(), module, &mut buffer)?;
    if written == 0 {
        return Err(PlatformError::new("GetModuleBaseNameW", 0));
    }
    let units = &buffer[..written.min(NAME_CAPACITY)];
    let end = units.iter().position(|u| *u == 0).unwrap_or(units.len());
    Ok(String::from_utf16_lossy(&units[..end]))
}
