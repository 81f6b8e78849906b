use crate::errors::SessionError;
use log::trace;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::pty::{Winsize, openpty};
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::process::Stdio;

/**
 * A pseudo-terminal pair. The master side stays with us for reading and
 * writing, the slave side is handed to one child process as its controlling
 * terminal and then released.
 */
pub struct Terminal {
    master: Option<File>,
    slave: Option<OwnedFd>,
}

impl Terminal {
    pub fn open(cols: u16, rows: u16) -> Result<Self, SessionError> {
        let size = winsize(cols, rows);
        let pty = openpty(Some(&size), None).map_err(SessionError::Pty)?;
        for fd in [pty.master.as_raw_fd(), pty.slave.as_raw_fd()] {
            fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
                .map_err(SessionError::Pty)?;
        }
        trace!(
            "Opened pty master={} slave={} ({}x{})",
            pty.master.as_raw_fd(),
            pty.slave.as_raw_fd(),
            cols,
            rows
        );
        Ok(Self {
            master: Some(File::from(pty.master)),
            slave: Some(pty.slave),
        })
    }

    fn master(&self) -> io::Result<&File> {
        self.master.as_ref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "terminal is closed")
        })
    }

    /// A handle for reading what the child writes
    pub fn reader(&self) -> io::Result<File> {
        self.master()?.try_clone()
    }

    /// A handle for sending input to the child
    pub fn writer(&self) -> io::Result<File> {
        self.master()?.try_clone()
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), SessionError> {
        let size = winsize(cols, rows);
        let fd = self.master()?.as_raw_fd();
        let rc = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ as _, &size) };
        if rc != 0 {
            return Err(SessionError::Io(io::Error::last_os_error()));
        }
        trace!("Resized pty to {}x{}", cols, rows);
        Ok(())
    }

    pub fn size(&self) -> Result<(u16, u16), SessionError> {
        let mut size = winsize(0, 0);
        let fd = self.master()?.as_raw_fd();
        let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ as _, &mut size) };
        if rc != 0 {
            return Err(SessionError::Io(io::Error::last_os_error()));
        }
        Ok((size.ws_col, size.ws_row))
    }

    /// stdin, stdout and stderr for a child, all on the slave side
    pub(crate) fn slave_stdio(&self) -> io::Result<[Stdio; 3]> {
        let slave = self.slave.as_ref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "pty slave released")
        })?;
        Ok([
            Stdio::from(slave.try_clone()?),
            Stdio::from(slave.try_clone()?),
            Stdio::from(slave.try_clone()?),
        ])
    }

    /* Once the child has its own copies we must let go of ours, otherwise
     * reads on the master never see the child hang up. */
    pub(crate) fn release_slave(&mut self) {
        if self.slave.take().is_some() {
            trace!("Released pty slave");
        }
    }

    pub fn close(&mut self) {
        self.release_slave();
        if self.master.take().is_some() {
            trace!("Closed pty master");
        }
    }

    pub fn is_open(&self) -> bool {
        self.master.is_some()
    }
}

fn winsize(cols: u16, rows: u16) -> Winsize {
    Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize() {
        let terminal = Terminal::open(80, 24).unwrap();
        assert_eq!(terminal.size().unwrap(), (80, 24));
        terminal.resize(132, 43).unwrap();
        assert_eq!(terminal.size().unwrap(), (132, 43));
    }

    #[test]
    fn test_closed_terminal() {
        let mut terminal = Terminal::open(80, 24).unwrap();
        assert!(terminal.is_open());
        terminal.close();
        assert!(!terminal.is_open());
        assert!(terminal.reader().is_err());
        assert!(terminal.slave_stdio().is_err());
        assert!(terminal.resize(10, 10).is_err());
    }
}
