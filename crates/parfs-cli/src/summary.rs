use parfs_core::empty_dirs::EmptyDirRow;
use parfs_core::WalkSummary;

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes == 0 {
        return "0 B".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// One-line result of a walk, followed by detail lines when something was
/// skipped, unchanged or failed.
pub fn format_summary(operation: &str, summary: &WalkSummary, show_bytes: bool) -> Vec<String> {
    let c = &summary.counters;
    let mut headline = format!(
        "{} complete: {} files, {} directories",
        operation, c.processed_files, c.processed_dirs
    );
    if show_bytes {
        headline.push_str(&format!(", {}", format_bytes(c.bytes)));
    }
    headline.push_str(&format!(" in {:.2?}", summary.elapsed));

    let mut lines = vec![headline];
    if show_bytes && c.bytes > 0 {
        let secs = summary.elapsed.as_secs_f64();
        if secs > 0.0 {
            lines.push(format!(
                "• Throughput: {}/s",
                format_bytes((c.bytes as f64 / secs) as u64)
            ));
        }
    }
    if c.unchanged_files > 0 {
        lines.push(format!("• Unchanged: {} file(s)", c.unchanged_files));
    }
    if c.skipped_files > 0 {
        lines.push(format!("• Skipped: {} special file(s)", c.skipped_files));
    }
    if c.failed_files > 0 {
        lines.push(format!("• Failed: {} file(s), see warnings above", c.failed_files));
    }
    if c.processed_dirs < c.total_dirs || c.processed_files < c.total_files {
        lines.push(format!(
            "• Incomplete: {}/{} files, {}/{} directories",
            c.processed_files, c.total_files, c.processed_dirs, c.total_dirs
        ));
    }
    lines
}

pub fn print_summary(operation: &str, summary: &WalkSummary, show_bytes: bool) {
    for line in format_summary(operation, summary, show_bytes) {
        println!("{line}");
    }
}

pub fn print_empty_dirs(rows: &[EmptyDirRow]) {
    for row in rows {
        println!("{:>8} {}", row.files, row.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parfs_core::CounterSnapshot;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn format_bytes_uses_binary_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GiB");
    }

    #[test]
    fn summary_reports_failures_and_unchanged() {
        let summary = WalkSummary {
            root: PathBuf::from("/data"),
            counters: CounterSnapshot {
                total_files: 5,
                total_dirs: 2,
                processed_files: 5,
                processed_dirs: 2,
                bytes: 1024,
                unchanged_files: 3,
                failed_files: 1,
                ..CounterSnapshot::default()
            },
            elapsed: Duration::from_secs(1),
        };
        let lines = format_summary("Copy", &summary, true);
        assert!(lines[0].starts_with("Copy complete: 5 files, 2 directories, 1.00 KiB in "));
        assert!(lines.iter().any(|l| l == "• Unchanged: 3 file(s)"));
        assert!(lines.iter().any(|l| l.starts_with("• Failed: 1 file(s)")));
        assert!(!lines.iter().any(|l| l.starts_with("• Incomplete")));
    }
}
