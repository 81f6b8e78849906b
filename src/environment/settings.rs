use crate::config::Config;
use std::path::PathBuf;

/// Shell used when there is no provisioned environment to enter
#[cfg(target_os = "android")]
pub const HOST_SHELL: &str = "/system/bin/sh";
#[cfg(not(target_os = "android"))]
pub const HOST_SHELL: &str = "/bin/sh";

/// Everything about the host that shapes how the environment is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSettings {
    /// Application private storage. Holds the layout and is bound at /android
    pub data_dir: PathBuf,
    pub image_url: String,
    pub image_sha256: Option<String>,
    pub arch: String,
    /// Shared storage, bound at the same path inside the sandbox
    pub host_storage: PathBuf,
    pub host_shell: PathBuf,
}

impl EnvSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            image_url: config.image_url.clone(),
            image_sha256: config.image_sha256.clone(),
            arch: config.arch.clone(),
            host_storage: config.host_storage.clone(),
            host_shell: PathBuf::from(HOST_SHELL),
        }
    }
}
