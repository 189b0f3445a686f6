use crate::catalog::Catalog;
use crate::config::TerminateConfig;
use crate::error::ProcessError;
use crate::matcher::FuzzyMatcher;
use crate::model::ApplicationEntry;
use crate::process::{ProcessControl, ProcessInfo};
use log::{debug, info, warn};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a close request ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloseStatus {
    /// At least one process was stopped.
    Closed,
    /// The query names a known application but nothing of it is running.
    NotRunning,
    /// The query matched neither an application nor a running process.
    NotRecognized,
    /// Processes were found but none could be stopped.
    AllFailed,
}

/// Outcome of [`Terminator::close_by_name`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloseResult {
    pub success: bool,
    pub query: String,
    pub status: CloseStatus,
    pub closed_processes: Vec<String>,
    pub failed_processes: Vec<String>,
    pub message: String,
}

impl CloseResult {
    fn empty(query: &str, status: CloseStatus, message: String) -> Self {
        Self {
            success: false,
            query: query.to_string(),
            status,
            closed_processes: Vec::new(),
            failed_processes: Vec::new(),
            message,
        }
    }
}

pub struct Terminator {
    control: Box<dyn ProcessControl>,
    graceful_timeout: Duration,
    force_timeout: Duration,
}

impl Terminator {
    pub fn new(control: Box<dyn ProcessControl>, config: &TerminateConfig) -> Self {
        Self {
            control,
            graceful_timeout: config.graceful_timeout(),
            force_timeout: config.force_timeout(),
        }
    }

    /// Stops every running process that belongs to `query`.
    pub fn close_by_name(&self, catalog: &Catalog, query: &str, threshold: u8) -> CloseResult {
        let resolved = FuzzyMatcher::default()
            .resolve(catalog, query, threshold)
            .into_iter()
            .next()
            .map(|hit| hit.entry);
        if let Some(entry) = resolved {
            debug!("'{}' resolved to {} for closing", query, entry.display_name);
        }

        let terms = search_terms(query, resolved);
        let targets = match self.find_processes(&terms) {
            Ok(targets) => targets,
            Err(e) => {
                warn!("Error finding processes: {}", e);
                return CloseResult::empty(query, CloseStatus::AllFailed, format!("Error closing application: {e}"));
            }
        };

        if targets.is_empty() {
            let status = if resolved.is_some() { CloseStatus::NotRunning } else { CloseStatus::NotRecognized };
            return CloseResult::empty(query, status, format!("No running processes found for '{query}'"));
        }

        let mut closed = Vec::new();
        let mut failed = Vec::new();
        for process in &targets {
            info!("Closing {} (PID: {})...", process.name, process.pid);
            match self.close_process(process) {
                Ok(()) => closed.push(process.name.clone()),
                Err(e) => {
                    warn!("Failed to close {} (PID: {}): {}", process.name, process.pid, e);
                    failed.push(format!("{} ({})", process.name, e));
                }
            }
        }

        let (success, status, message) = if closed.is_empty() {
            (false, CloseStatus::AllFailed, format!("Failed to close any processes for '{query}'"))
        } else {
            let mut message = format!("Closed {}", closed.join(", "));
            if !failed.is_empty() {
                message.push_str(&format!(". Failed to close: {}", failed.join(", ")));
            }
            (true, CloseStatus::Closed, message)
        };

        CloseResult {
            success,
            query: query.to_string(),
            status,
            closed_processes: closed,
            failed_processes: failed,
            message,
        }
    }

    /// Running processes matching any term, one per pid, never ourselves.
    pub fn find_processes(&self, terms: &[String]) -> Result<Vec<ProcessInfo>, ProcessError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let own_pid = std::process::id();
        let mut found: Vec<ProcessInfo> = self
            .control
            .processes()?
            .into_iter()
            .filter(|p| p.pid != own_pid)
            .filter(|p| terms.iter().any(|term| p.matches(term)))
            .collect();
        found.sort_by_key(|p| p.pid);
        found.dedup_by_key(|p| p.pid);
        Ok(found)
    }

    /// Graceful request first, then a forced kill once the grace period is
    /// over or the request itself was refused. A process that is gone before
    /// the request is a failure; one that goes away during the grace period
    /// counts as closed.
    pub fn close_process(&self, process: &ProcessInfo) -> Result<(), ProcessError> {
        let pid = process.pid;
        match self.control.request_exit(pid) {
            Ok(()) => {
                if self.wait_for_exit(pid, self.graceful_timeout) {
                    return Ok(());
                }
            }
            Err(e @ (ProcessError::NoSuchProcess(_) | ProcessError::AccessDenied(_))) => return Err(e),
            Err(e) => debug!("Graceful close of {} refused ({}), forcing", process.name, e),
        }

        info!("Force closing {}...", process.name);
        match self.control.force_kill(pid) {
            Ok(()) => {}
            Err(ProcessError::NoSuchProcess(_)) => return Ok(()),
            Err(e) => return Err(e),
        }
        if self.wait_for_exit(pid, self.force_timeout) {
            return Ok(());
        }
        Err(ProcessError::StillRunning {
            pid,
            waited: self.graceful_timeout + self.force_timeout,
        })
    }

    fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool {
        let started = Instant::now();
        loop {
            if !self.control.is_running(pid) {
                return true;
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return false;
            }
            thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
        }
    }
}

/// Lowercased query plus, for a resolved entry, its display name, name and
/// executable stem. Blank and repeated terms are dropped.
pub fn search_terms(query: &str, resolved: Option<&ApplicationEntry>) -> Vec<String> {
    let mut candidates = vec![query.trim().to_lowercase()];
    if let Some(entry) = resolved {
        candidates.push(entry.display_name.to_lowercase());
        candidates.push(entry.name.clone());
        candidates.push(entry.executable_stem());
    }

    let mut terms: Vec<String> = Vec::new();
    for term in candidates {
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// How a fake process reacts to signals.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Behaviour {
        ExitsOnRequest,
        IgnoresRequest,
        Unkillable,
        Protected,
        /// Refuses the graceful request, only a forced kill stops it.
        ForceOnly,
        /// Listed, but gone by the time it is signalled.
        ExitedAlready,
    }

    #[derive(Default)]
    pub struct FakeProcesses {
        table: Mutex<Vec<(ProcessInfo, Behaviour)>>,
    }

    impl FakeProcesses {
        pub fn with(procs: &[(u32, &str, Behaviour)]) -> Self {
            let table = procs
                .iter()
                .map(|&(pid, name, behaviour)| (ProcessInfo { pid, name: name.to_string(), exe: None }, behaviour))
                .collect();
            Self { table: Mutex::new(table) }
        }

        fn behaviour(&self, pid: u32) -> Option<Behaviour> {
            self.table.lock().unwrap().iter().find(|(p, _)| p.pid == pid).map(|(_, b)| *b)
        }

        fn remove(&self, pid: u32) {
            self.table.lock().unwrap().retain(|(p, _)| p.pid != pid);
        }
    }

    impl ProcessControl for FakeProcesses {
        fn processes(&self) -> Result<Vec<ProcessInfo>, ProcessError> {
            Ok(self.table.lock().unwrap().iter().map(|(p, _)| p.clone()).collect())
        }

        fn request_exit(&self, pid: u32) -> Result<(), ProcessError> {
            match self.behaviour(pid) {
                None => Err(ProcessError::NoSuchProcess(pid)),
                Some(Behaviour::Protected) => Err(ProcessError::AccessDenied(pid)),
                Some(Behaviour::ForceOnly) => Err(ProcessError::Other(
                    "This process can only be terminated forcefully".to_string(),
                )),
                Some(Behaviour::ExitedAlready) => {
                    self.remove(pid);
                    Err(ProcessError::NoSuchProcess(pid))
                }
                Some(Behaviour::ExitsOnRequest) => {
                    self.remove(pid);
                    Ok(())
                }
                Some(_) => Ok(()),
            }
        }

        fn force_kill(&self, pid: u32) -> Result<(), ProcessError> {
            match self.behaviour(pid) {
                None => Err(ProcessError::NoSuchProcess(pid)),
                Some(Behaviour::Protected) => Err(ProcessError::AccessDenied(pid)),
                Some(Behaviour::Unkillable) => Ok(()),
                Some(_) => {
                    self.remove(pid);
                    Ok(())
                }
            }
        }

        fn is_running(&self, pid: u32) -> bool {
            self.behaviour(pid).is_some()
        }
    }

    pub fn fast_config() -> TerminateConfig {
        TerminateConfig { graceful_timeout_ms: 60, force_timeout_ms: 60 }
    }
}
