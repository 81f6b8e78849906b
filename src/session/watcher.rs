use super::{SandboxSession, SessionEvent, SessionState};
use log::{debug, trace, warn};
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

/* Blocks in waitpid on exactly one child. This is the only place the
 * child's termination is observed. */
pub(super) fn spawn_watcher(
    pid: Pid,
    sender: mpsc::Sender<SessionEvent>,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("session-watcher-{}", pid))
        .spawn(move || {
            let code = wait_for_exit_code(pid);
            debug!("Sandboxed process {} exited with {}", pid, code);
            let _ = sender.send(SessionEvent::Exited(code));
        })
}

fn wait_for_exit_code(pid: Pid) -> i32 {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return 128 + signal as i32;
            }
            Ok(status) => {
                trace!("Ignoring wait status {:?}", status);
                continue;
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!("waitpid on {} failed: {}", pid, e);
                return -1;
            }
        }
    }
}

impl SandboxSession {
    /// Apply an event from the watcher. Only a running session can exit.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match (self.state, event) {
            (SessionState::Running, SessionEvent::Exited(code)) => {
                self.state = SessionState::Exited(code);
                if let Some(watcher) = self.watcher.take() {
                    let _ = watcher.join();
                }
            }
            (state, event) => {
                trace!("Ignoring {:?} while {:?}", event, state);
            }
        }
    }

    /// Wait up to `timeout` for the next event and apply it
    pub fn poll_event(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let event = self.events.as_ref()?.recv_timeout(timeout).ok()?;
        self.handle_event(event);
        Some(event)
    }

    /// Block until the sandboxed process exits and return its exit code
    #[cfg(test)]
    pub fn wait(&mut self) -> Option<i32> {
        if let Some(code) = self.exit_code() {
            return Some(code);
        }
        let event = self.events.as_ref()?.recv().ok()?;
        self.handle_event(event);
        self.exit_code()
    }
}
