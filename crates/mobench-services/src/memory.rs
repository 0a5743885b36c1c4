use std::fs;
use std::path::Path;

/// Resident set size of this process in MB, from `/proc/self/status`.
pub fn vm_rss_mb() -> Option<u64> {
    vm_rss_mb_from("/proc/self/status")
}

fn vm_rss_mb_from(path: impl AsRef<Path>) -> Option<u64> {
    let status = fs::read_to_string(path).ok()?;
    parse_vm_rss_kb(&status).map(|kb| kb / 1024)
}

pub fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            return rest.split_whitespace().next()?.parse().ok();
        }
    }
    None
}

/// Total system memory in bytes, from `/proc/meminfo`.
pub fn total_memory_bytes() -> Option<u64> {
    let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
    parse_mem_total_kb(&meminfo).map(|kb| kb * 1024)
}

pub fn parse_mem_total_kb(meminfo: &str) -> Option<u64> {
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            return rest.split_whitespace().next()?.parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vm_rss_line() {
        let status = "Name:\tmobench\nVmPeak:\t  202400 kB\nVmRSS:\t  102400 kB\nThreads:\t8\n";
        assert_eq!(parse_vm_rss_kb(status), Some(102400));
    }

    #[test]
    fn missing_vm_rss_yields_none() {
        assert_eq!(parse_vm_rss_kb("Name:\tmobench\n"), None);
        assert_eq!(parse_vm_rss_kb("VmRSS:\tgarbage kB\n"), None);
    }

    #[test]
    fn parses_mem_total() {
        let meminfo = "MemTotal:        8048576 kB\nMemFree:         123456 kB\n";
        assert_eq!(parse_mem_total_kb(meminfo), Some(8048576));
    }
}
