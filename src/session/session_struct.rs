use super::Terminal;
use nix::unistd::Pid;
use std::sync::mpsc;
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Spawning,
    Running,
    Exited(i32),
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// exit code, or 128 + signal number when killed by a signal
    Exited(i32),
}

/// One sandboxed shell attached to its own pseudo-terminal
pub struct SandboxSession {
    pub(super) terminal: Terminal,
    pub(super) state: SessionState,
    pub(super) pid: Option<Pid>,
    pub(super) events: Option<mpsc::Receiver<SessionEvent>>,
    pub(super) watcher: Option<JoinHandle<()>>,
}

impl SandboxSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pid(&self) -> Option<i32> {
        self.pid.map(|pid| pid.as_raw())
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.state {
            SessionState::Exited(code) => Some(code),
            _ => None,
        }
    }
}

impl Drop for SandboxSession {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("Failed to tear down session: {}", e);
        }
    }
}
