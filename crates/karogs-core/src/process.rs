//! Process self-inspection for health reports.

/// Resident set size in whole megabytes, if the platform exposes it.
pub fn resident_memory_mb() -> Option<u64> {
    // On Linux, read /proc/self/status
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            return parse_vm_rss_kb(&status).map(|kb| (kb + 512) / 1024);
        }
    }
    None
}

/// `VmRSS:` in kB from a `/proc/<pid>/status` dump.
fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse().ok())
}
