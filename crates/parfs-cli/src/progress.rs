use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use parfs_core::{CounterSnapshot, ProgressCounters};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::summary::format_bytes;

/// Background status line. Reads the counters on a fixed interval and never
/// feeds anything back into the walk.
pub struct Reporter {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Reporter {
    pub fn start(label: &'static str, counters: Arc<ProgressCounters>, interval: Duration) -> Result<Self> {
        let (stop, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("parfs-report".into())
            .spawn(move || {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::with_template("{spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner())
                        .tick_strings(&["-", "\\", "|", "/", "-"]),
                );
                pb.enable_steady_tick(Duration::from_millis(120));

                let mut memory = MemoryProbe::new();
                let started = Instant::now();
                loop {
                    pb.set_message(render_status(
                        label,
                        &counters.snapshot(),
                        memory.resident(),
                        started.elapsed(),
                    ));
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                pb.finish_with_message(render_status(
                    label,
                    &counters.snapshot(),
                    memory.resident(),
                    started.elapsed(),
                ));
            })
            .context("spawning progress reporter")?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Render once more and wait for the reporter thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("progress reporter panicked");
            }
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct MemoryProbe {
    system: System,
    pid: Option<Pid>,
}

impl MemoryProbe {
    fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Resident set size of this process in bytes.
    fn resident(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map(|process| process.memory())
    }
}

pub fn render_status(
    label: &str,
    snap: &CounterSnapshot,
    resident: Option<u64>,
    elapsed: Duration,
) -> String {
    let mut line = format!(
        "{} files {}/{} | dirs {}/{}",
        label, snap.processed_files, snap.total_files, snap.processed_dirs, snap.total_dirs
    );
    if snap.bytes > 0 {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            (snap.bytes as f64 / secs) as u64
        } else {
            0
        };
        line.push_str(&format!(
            " | {} ({}/s)",
            format_bytes(snap.bytes),
            format_bytes(rate)
        ));
    }
    if snap.failed_files > 0 {
        line.push_str(&format!(" | failed {}", snap.failed_files));
    }
    if let Some(rss) = resident {
        line.push_str(&format!(" | rss {}", format_bytes(rss)));
    }
    line
}
