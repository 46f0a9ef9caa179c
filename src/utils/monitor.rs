#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// 單一階段結束時的行程狀態
#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct PhaseSnapshot {
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub memory_percent: f32,
    pub peak_memory_mb: u64,
    /// 上一個檢查點到現在
    pub phase_time: Duration,
    pub total_time: Duration,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    peak_memory_mb: u64,
    last_checkpoint: Instant,
}

/// 在各 ETL 階段之間記錄本行程的 CPU 與記憶體使用量
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    pid: Option<Pid>,
    started: Instant,
    state: Mutex<MonitorState>,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = enabled
            .then(sysinfo::get_current_pid)
            .and_then(|pid| match pid {
                Ok(pid) => Some(pid),
                Err(e) => {
                    tracing::warn!("System monitoring unavailable: {}", e);
                    None
                }
            });

        let now = Instant::now();
        Self {
            pid,
            started: now,
            state: Mutex::new(MonitorState {
                system: System::new(),
                peak_memory_mb: 0,
                last_checkpoint: now,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pid.is_some()
    }

    /// 取樣並推進檢查點；停用時回傳 None
    pub fn checkpoint(&self) -> Option<PhaseSnapshot> {
        let pid = self.pid?;
        let mut state = self.state.lock().ok()?;

        state.system.refresh_memory();
        state
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let (cpu_usage, memory_mb) = {
            let process = state.system.process(pid)?;
            (process.cpu_usage(), process.memory() / 1024 / 1024)
        };
        let total_mb = state.system.total_memory() / 1024 / 1024;
        let memory_percent = if total_mb > 0 {
            memory_mb as f32 / total_mb as f32 * 100.0
        } else {
            0.0
        };

        state.peak_memory_mb = state.peak_memory_mb.max(memory_mb);
        let now = Instant::now();
        let phase_time = now.duration_since(state.last_checkpoint);
        state.last_checkpoint = now;

        Some(PhaseSnapshot {
            cpu_usage,
            memory_mb,
            memory_percent,
            peak_memory_mb: state.peak_memory_mb,
            phase_time,
            total_time: now.duration_since(self.started),
        })
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(snapshot) = self.checkpoint() {
            tracing::info!(
                "📊 {} took {:?} - CPU: {:.1}%, Memory: {}MB ({:.1}%), Peak: {}MB",
                phase,
                snapshot.phase_time,
                snapshot.cpu_usage,
                snapshot.memory_mb,
                snapshot.memory_percent,
                snapshot.peak_memory_mb
            );
        }
    }

    pub fn log_final_stats(&self) {
        if let Some(snapshot) = self.checkpoint() {
            tracing::info!(
                "📊 Run finished in {:?}, peak memory {}MB",
                snapshot.total_time,
                snapshot.peak_memory_mb
            );
        }
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 未啟用 cli feature 時不收集任何資料
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn is_enabled(&self) -> bool {
        false
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn log_final_stats(&self) {}
}
