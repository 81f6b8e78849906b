use super::watcher::spawn_watcher;
use super::{SandboxSession, SessionState, Terminal};
use crate::environment::{LaunchSpec, LinuxEnvironment};
use crate::errors::SessionError;
use crate::util::is_executable;
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, setsid};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;
use std::sync::mpsc;

impl SandboxSession {
    /**
     * Validate the environment and start its shell on a fresh pseudo-terminal.
     * Nothing is spawned unless validation passes. Once this returns the
     * session is running and its watcher is waiting on the child.
     */
    pub fn start(
        env: &LinuxEnvironment,
        cols: u16,
        rows: u16,
    ) -> Result<SandboxSession, SessionError> {
        let mut session = SandboxSession {
            terminal: Terminal::open(cols, rows)?,
            state: SessionState::Unstarted,
            pid: None,
            events: None,
            watcher: None,
        };
        session.state = SessionState::Spawning;

        env.validate()?;
        let spec = env.launcher_spec();
        let pid = session.spawn(&spec)?;

        session.pid = Some(pid);
        session.state = SessionState::Running;

        let (sender, receiver) = mpsc::channel();
        session.events = Some(receiver);
        match spawn_watcher(pid, sender) {
            Ok(watcher) => session.watcher = Some(watcher),
            Err(e) => {
                session.pid = None;
                abandon_child(pid);
                return Err(e.into());
            }
        }

        info!("Started sandboxed shell with pid {}", pid);
        Ok(session)
    }

    fn spawn(&mut self, spec: &LaunchSpec) -> Result<Pid, SessionError> {
        let program = spec.argv.first().ok_or(SessionError::NoCommand)?;
        let program_path = Path::new(program);
        if !program_path.exists() {
            return Err(SessionError::LauncherMissing(program_path.into()));
        }
        if !is_executable(program_path) {
            return Err(SessionError::LauncherNotExecutable(
                program_path.into(),
            ));
        }

        let [stdin, stdout, stderr] = self.terminal.slave_stdio()?;
        let mut command = Command::new(program);
        command
            .args(&spec.argv[1..])
            .env_clear()
            .envs(&spec.env)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr);

        // SAFETY: runs in the forked child between fork and exec, where only
        // async-signal-safe calls are allowed. setsid and ioctl both are.
        unsafe {
            command.pre_exec(|| {
                setsid().map_err(std::io::Error::from)?;
                if libc::ioctl(0, libc::TIOCSCTTY as _, 0) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        debug!("Spawning {:?}", spec.argv);
        let child = command.spawn().map_err(|e| SessionError::Spawn {
            program: program.clone(),
            source: e,
        })?;
        self.terminal.release_slave();

        Ok(Pid::from_raw(child.id() as i32))
    }
}

/* With nothing left to wait on it, kill the child's group and reap it here
 * so it doesn't linger as a zombie */
fn abandon_child(pid: Pid) {
    warn!("No watcher for {}, killing it", pid);
    if let Err(e) = kill(Pid::from_raw(-pid.as_raw()), Signal::SIGKILL) {
        debug!("Failed to kill process group {}: {}", pid, e);
    }
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Failed to reap {}: {}", pid, e);
                break;
            }
        }
    }
}
