use crate::error::ProcessError;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, Signal, System, UpdateKind};

/// A running process as seen by the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub exe: Option<PathBuf>,
}

impl ProcessInfo {
    /// True when the process name or executable file name contains `term`
    /// (already lowercased).
    pub fn matches(&self, term: &str) -> bool {
        if self.name.to_lowercase().contains(term) {
            return true;
        }
        self.exe
            .as_deref()
            .and_then(Path::file_name)
            .map(|base| base.to_string_lossy().to_lowercase().contains(term))
            .unwrap_or(false)
    }
}

/// OS process table and signalling.
pub trait ProcessControl: Send + Sync {
    fn processes(&self) -> Result<Vec<ProcessInfo>, ProcessError>;
    /// Asks the process to exit on its own.
    fn request_exit(&self, pid: u32) -> Result<(), ProcessError>;
    fn force_kill(&self, pid: u32) -> Result<(), ProcessError>;
    fn is_running(&self, pid: u32) -> bool;
}

/// The process backend for the current platform.
pub fn system() -> Box<dyn ProcessControl> {
    Box::new(SystemProcesses::new())
}

/// Process table backed by `sysinfo`.
pub struct SystemProcesses {
    sys: Mutex<System>,
}

impl SystemProcesses {
    pub fn new() -> Self {
        Self { sys: Mutex::new(System::new()) }
    }

    fn refresh(sys: &mut System, which: ProcessesToUpdate<'_>) {
        sys.refresh_processes_specifics(
            which,
            true,
            ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
        );
    }

    /// Refreshes `pid` and hands its live entry to `f`. Zombies count as gone.
    fn with_process<T>(&self, pid: u32, f: impl FnOnce(&Process) -> T) -> Option<T> {
        let mut sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        let pid = Pid::from_u32(pid);
        Self::refresh(&mut sys, ProcessesToUpdate::Some(&[pid]));
        sys.process(pid).filter(|p| p.status() != ProcessStatus::Zombie).map(f)
    }

    /// A refused signal means either the process just exited or it belongs
    /// to someone else.
    fn refused(&self, pid: u32) -> ProcessError {
        if self.is_running(pid) {
            ProcessError::AccessDenied(pid)
        } else {
            ProcessError::NoSuchProcess(pid)
        }
    }
}

impl Default for SystemProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for SystemProcesses {
    fn processes(&self) -> Result<Vec<ProcessInfo>, ProcessError> {
        let mut sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        Self::refresh(&mut sys, ProcessesToUpdate::All);
        let mut found: Vec<ProcessInfo> = sys
            .processes()
            .iter()
            .filter(|(_, p)| p.status() != ProcessStatus::Zombie)
            .map(|(pid, p)| ProcessInfo {
                pid: pid.as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                exe: p.exe().map(Path::to_path_buf),
            })
            .collect();
        if found.is_empty() {
            return Err(ProcessError::Enumerate("process table is empty".to_string()));
        }
        found.sort_by_key(|p| p.pid);
        Ok(found)
    }

    fn request_exit(&self, pid: u32) -> Result<(), ProcessError> {
        match self.with_process(pid, |p| p.kill_with(Signal::Term)) {
            None => Err(ProcessError::NoSuchProcess(pid)),
            Some(Some(true)) => Ok(()),
            Some(Some(false)) => Err(self.refused(pid)),
            Some(None) => {
                debug!("No graceful signal for process {} on this platform", pid);
                Err(ProcessError::Other("graceful termination is not supported here".to_string()))
            }
        }
    }

    fn force_kill(&self, pid: u32) -> Result<(), ProcessError> {
        match self.with_process(pid, Process::kill) {
            None => Err(ProcessError::NoSuchProcess(pid)),
            Some(true) => Ok(()),
            Some(false) => Err(self.refused(pid)),
        }
    }

    fn is_running(&self, pid: u32) -> bool {
        self.with_process(pid, |_| ()).is_some()
    }
}
