use super::{SandboxSession, SessionState};
use crate::errors::SessionError;
use log::{debug, trace};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

impl SandboxSession {
    /**
     * Hang up the whole process group, since proot forks descendants that
     * would otherwise outlive us, then release the terminal. Safe to call
     * more than once and after the process is already gone.
     */
    pub fn finish(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::TornDown {
            return Ok(());
        }

        let mut result = Ok(());
        if let Some(pid) = self.pid {
            debug!("Sending SIGHUP to process group {}", pid);
            match kill(Pid::from_raw(-pid.as_raw()), Signal::SIGHUP) {
                Ok(()) | Err(Errno::ESRCH) => (),
                Err(e) => {
                    result = Err(SessionError::Signal {
                        pid: pid.as_raw(),
                        source: e,
                    })
                }
            }
        }

        self.terminal.close();
        self.state = SessionState::TornDown;
        trace!("Session torn down");
        result
    }
}
