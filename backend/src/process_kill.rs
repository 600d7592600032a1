//! Process termination.

use crate::platform::{Access, Platform, ScopedHandle};
use crate::types::{ProcError, WaitStatus};
use tracing::{info, warn};

/// Terminate a process by PID and block until it has exited.
///
/// The wait has no timeout. Callers that need to give up must run this on a
/// thread of their own. A wait that ends without the process signalling exit
/// is logged and returned, but is not an error: the process was still asked
/// to terminate.
pub fn terminate(
    platform: &dyn Platform,
    pid: u32,
    exit_code: u32,
) -> Result<WaitStatus, ProcError> {
    let handle = ScopedHandle::open(platform, pid, Access::Full).map_err(|source| {
        warn!(pid, error = %source, "failed to open process for termination");
        ProcError::Termination { pid, source }
    })?;

    platform
        .terminate_process(handle.raw(), exit_code)
        .map_err(|source| {
            warn!(pid, error = %source, "termination request failed");
            ProcError::Termination { pid, source }
        })?;

    let status = platform.wait_for_exit(handle.raw(), None);
    if status.is_clean() {
        info!(pid, exit_code, "process terminated");
    } else {
        warn!(pid, ?status, "process did not signal a clean exit");
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{Call, FakePlatform};
    use crate::platform::RawHandle;

    #[test]
    fn terminates_with_exit_code_and_waits_forever() {
        let fake = FakePlatform::new().with_process(500, "notepad.exe");

        assert_eq!(terminate(&fake, 500, 127).unwrap(), WaitStatus::Signaled);
        let handle = RawHandle(1500);
        assert_eq!(
            fake.calls(),
            vec![
                Call::Open(500, Access::Full),
                Call::Terminate(handle, 127),
                Call::Wait(handle, None),
                Call::Close(handle),
            ]
        );
    }

    #[test]
    fn open_failure_attempts_nothing_else() {
        let fake = FakePlatform::new().with_inaccessible(500);
        assert!(matches!(
            terminate(&fake, 500, 127),
            Err(ProcError::Termination { pid: 500, .. })
        ));
        assert_eq!(fake.calls(), vec![Call::Open(500, Access::Full)]);
    }

    #[test]
    fn failed_request_skips_wait_but_closes_handle() {
        let fake = FakePlatform::new()
            .with_process(500, "csrss.exe")
            .failing_terminate();

        assert!(matches!(
            terminate(&fake, 500, 127),
            Err(ProcError::Termination { pid: 500, .. })
        ));
        let calls = fake.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::Wait(..))));
        assert_eq!(fake.closes(), 1);
    }

    #[test]
    fn wait_anomaly_is_reported_not_raised() {
        let fake = FakePlatform::new()
            .with_process(500, "notepad.exe")
            .wait_returns(WaitStatus::Abandoned);

        assert_eq!(terminate(&fake, 500, 1).unwrap(), WaitStatus::Abandoned);
        assert_eq!(fake.closes(), 1);
    }
}
