//! Error types you might see while provisioning or running the environment

use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors that abort a setup run
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// host architecture has no matching sandbox binary
    #[error("unsupported architecture: {0:?}")]
    UnsupportedArch(String),

    /// a bundled asset could not be read
    #[error("failed to read bundled asset {name}: {source}")]
    Asset {
        name: String,
        #[source]
        source: io::Error,
    },

    /// network request error
    #[error("network request error: {0}")]
    Network(#[from] reqwest::Error),

    /// filesystem or stream error, with a description of what was going on
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// calculated digest of the downloaded archive is not what we asked for
    #[error(
        "downloaded image digest mismatch, expected sha256:{expected}, found sha256:{found}"
    )]
    DigestMismatch { expected: String, found: String },

    /// setup was cancelled before it finished
    #[error("setup was cancelled")]
    Cancelled,

    /// setup thread terminated without reporting a result
    #[error("setup task terminated unexpectedly")]
    TaskTerminated,
}

impl ProvisionError {
    pub fn io<S: Into<String>>(context: S, source: io::Error) -> Self {
        ProvisionError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Extension for attaching a description to io results during setup
pub trait IoContext<T> {
    fn during<S: Into<String>>(self, context: S) -> Result<T, ProvisionError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn during<S: Into<String>>(self, context: S) -> Result<T, ProvisionError> {
        self.map_err(|e| ProvisionError::io(context, e))
    }
}

/// Reasons the environment is not ready to run a session
///
/// Checks short-circuit, so only the first failing one is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Base directory does not exist: {}", .0.display())]
    MissingBaseDir(PathBuf),

    #[error("Rootfs directory does not exist: {}", .0.display())]
    MissingRootfs(PathBuf),

    #[error("Proot binary does not exist: {}", .0.display())]
    MissingSandboxBinary(PathBuf),

    #[error("Proot binary is not executable: {}", .0.display())]
    SandboxBinaryNotExecutable(PathBuf),

    #[error("Launcher script does not exist: {}", .0.display())]
    MissingLauncher(PathBuf),

    #[error("Launcher script is not executable: {}", .0.display())]
    LauncherNotExecutable(PathBuf),

    #[error("No shell found in rootfs (neither /bin/sh nor /bin/busybox)")]
    NoShell,
}

/// Errors while starting a sandboxed session
#[derive(Error, Debug)]
pub enum SessionError {
    /// validation failed, nothing was spawned
    #[error("Linux environment invalid: {0}")]
    Invalid(#[from] ValidationError),

    /// pseudo-terminal allocation failed
    #[error("failed to open pseudo-terminal: {0}")]
    Pty(#[source] nix::Error),

    /// no command to run
    #[error("no shell command provided")]
    NoCommand,

    #[error("launcher not found: {}", .0.display())]
    LauncherMissing(PathBuf),

    #[error("launcher not executable: {}", .0.display())]
    LauncherNotExecutable(PathBuf),

    /// the subprocess could not be created
    #[error("failed to create subprocess {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// signalling the process group failed for a reason other than it
    /// already being gone
    #[error("failed to signal process group {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: nix::Error,
    },

    /// io error on the terminal
    #[error("terminal io error: {0}")]
    Io(#[from] io::Error),
}
