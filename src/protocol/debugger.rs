//! Debugger detection, used to keep an idle worker alive while it is being debugged.

/// `true` if a debugger is attached to this process.
///
/// On Linux this reads `TracerPid` from `/proc/self/status`; elsewhere it always reports
/// `false`.
#[must_use]
pub fn is_attached() -> bool {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/self/status")
            .map(|status| tracer_pid(&status).is_some_and(|pid| pid != 0))
            .unwrap_or(false)
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

fn tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|value| value.trim().parse().ok())
}
