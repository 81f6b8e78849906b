use super::LinuxEnvironment;
use crate::errors::ValidationError;
use crate::util::ensure_executable;
use log::{debug, info, warn};

impl LinuxEnvironment {
    /**
     * Check that the environment is ready to start a session. Stops at the
     * first problem. Only mutates to restore missing execute bits and to
     * create the tmp directory.
     */
    pub fn validate(&self) -> Result<(), ValidationError> {
        let layout = &self.layout;
        info!("Validating Linux environment at {}", layout.base.display());

        if !layout.base.exists() {
            return Err(ValidationError::MissingBaseDir(layout.base.clone()));
        }
        if !layout.rootfs.exists() {
            return Err(ValidationError::MissingRootfs(layout.rootfs.clone()));
        }
        if !layout.sandbox_binary.exists() {
            return Err(ValidationError::MissingSandboxBinary(
                layout.sandbox_binary.clone(),
            ));
        }
        if !ensure_executable(&layout.sandbox_binary) {
            return Err(ValidationError::SandboxBinaryNotExecutable(
                layout.sandbox_binary.clone(),
            ));
        }

        if !layout.launcher_script.exists() {
            return Err(ValidationError::MissingLauncher(
                layout.launcher_script.clone(),
            ));
        }
        if !ensure_executable(&layout.launcher_script) {
            return Err(ValidationError::LauncherNotExecutable(
                layout.launcher_script.clone(),
            ));
        }

        let shell = layout.rootfs.join("bin/sh");
        let busybox = layout.rootfs.join("bin/busybox");
        debug!("Shell {} exists={}", shell.display(), shell.exists());
        if !shell.exists() && !busybox.exists() {
            return Err(ValidationError::NoShell);
        }

        if !layout.tmp_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&layout.tmp_dir) {
                warn!(
                    "Failed to create tmp dir {}: {}",
                    layout.tmp_dir.display(),
                    e
                );
            }
        }

        info!("Linux environment validation passed");
        Ok(())
    }
}
