use super::setup::run_setup;
use crate::config::Config;
use crate::environment::LinuxEnvironment;
use crate::session::{SandboxSession, Terminal};
use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use nix::sys::signal::Signal;
use nix::sys::termios::{SetArg, Termios, cfmakeraw, tcgetattr, tcsetattr};
use std::io::{self, IsTerminal, Read, Write};
use std::fs::File;
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

const DEFAULT_SIZE: (u16, u16) = (80, 24);
/// How often the exit event and the host size are checked
const EVENT_POLL: Duration = Duration::from_millis(100);
/// How long the shell may outlive its pty before it is hung up on
const HANGUP_GRACE: Duration = Duration::from_secs(1);
/// How long trailing output gets after the shell exits
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/**
 * Enter the environment interactively, provisioning it first if needed.
 * Returns the shell's exit code once it has gone away.
 */
pub fn shell(config: &Config, env: &LinuxEnvironment) -> Result<i32> {
    if !env.is_setup_complete() {
        info!("Linux environment is not set up yet, running setup first");
        run_setup(config, env)?;
    }

    let (cols, rows) = host_size().unwrap_or(DEFAULT_SIZE);
    let mut session =
        SandboxSession::start(env, cols, rows).context("Starting shell")?;

    let raw_mode = if io::stdin().is_terminal() {
        Some(RawMode::enable().context("Putting terminal in raw mode")?)
    } else {
        None
    };

    let mut writer = session.terminal().writer()?;
    std::thread::Builder::new()
        .name("stdin-relay".to_string())
        .spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0u8; 4096];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(len) => {
                        if writer.write_all(&buf[..len]).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
                    Err(_) => break,
                }
            }
            trace!("stdin relay finished");
        })
        .context("Failed to spawn stdin relay")?;

    let code = attach(&mut session);
    drop(raw_mode);
    let code = code?;
    debug!("Shell exited with {}", code);
    Ok(code)
}

/**
 * Relay the session's output to stdout until its process exits, then tear
 * it down. A background job may hold the pty open after the shell exits,
 * and the shell may outlive its pty, so the exit event is what ends it.
 */
fn attach(session: &mut SandboxSession) -> Result<i32> {
    let reader = session.terminal().reader()?;
    let relay = std::thread::Builder::new()
        .name("pty-relay".to_string())
        .spawn(move || relay_output(reader))
        .context("Failed to spawn pty relay")?;

    let mut hung_up_at: Option<Instant> = None;
    loop {
        session.poll_event(EVENT_POLL);
        if session.exit_code().is_some() {
            break;
        }
        follow_host_size(session.terminal());
        if relay.is_finished() {
            let hung_up_at = *hung_up_at.get_or_insert_with(Instant::now);
            if hung_up_at.elapsed() >= HANGUP_GRACE {
                warn!("Terminal hung up but the shell is still running");
                break;
            }
        }
    }

    // let output written just before the exit through
    let deadline = Instant::now() + DRAIN_GRACE;
    while !relay.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    let code = session
        .exit_code()
        .unwrap_or(128 + Signal::SIGHUP as i32);
    session.finish()?;
    if relay.is_finished() {
        if let Ok(Err(e)) = relay.join() {
            debug!("Output relay failed: {}", e);
        }
    }
    Ok(code)
}

/* Copies pty output to stdout until the child side hangs up, which Linux
 * reports as EIO rather than end of file. */
fn relay_output(mut reader: File) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(len) => {
                stdout.write_all(&buf[..len])?;
                stdout.flush()?;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
            Err(e) => {
                trace!("pty read ended: {}", e);
                break;
            }
        }
    }
    Ok(())
}

/// Match the pty to the host terminal, if there is one
fn follow_host_size(terminal: &Terminal) {
    if !terminal.is_open() {
        return;
    }
    let Some((cols, rows)) = host_size() else {
        return;
    };
    if terminal.size().ok() == Some((cols, rows)) {
        return;
    }
    if let Err(e) = terminal.resize(cols, rows) {
        debug!("Failed to resize pty: {}", e);
    }
}

fn host_size() -> Option<(u16, u16)> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let fd = io::stdout().as_raw_fd();
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ as _, &mut size) };
    if rc != 0 || size.ws_col == 0 || size.ws_row == 0 {
        return None;
    }
    Some((size.ws_col, size.ws_row))
}

/// Raw host terminal for as long as this is alive
struct RawMode {
    original: Termios,
}

impl RawMode {
    fn enable() -> Result<Self> {
        let stdin = io::stdin();
        let original = tcgetattr(&stdin)?;
        let mut raw = original.clone();
        cfmakeraw(&mut raw);
        tcsetattr(&stdin, SetArg::TCSANOW, &raw)?;
        Ok(Self { original })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) =
            tcsetattr(&io::stdin(), SetArg::TCSANOW, &self.original)
        {
            warn!("Failed to restore terminal settings: {}", e);
        }
    }
}
