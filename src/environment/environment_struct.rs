use super::{EnvSettings, RootLayout, SetupRecord};
use anyhow::Result;

/// A provisioned (or not yet provisioned) Linux userland on this host
#[derive(Debug, Clone)]
pub struct LinuxEnvironment {
    pub layout: RootLayout,
    pub settings: EnvSettings,
}

impl LinuxEnvironment {
    pub fn new(settings: EnvSettings) -> Self {
        Self {
            layout: RootLayout::new(&settings.data_dir.join("linux")),
            settings,
        }
    }

    /* Existence only. A marker next to corrupted files still counts. */
    pub fn is_setup_complete(&self) -> bool {
        self.layout.setup_marker.exists()
            && self.layout.rootfs.exists()
            && self.layout.sandbox_binary.exists()
            && self.layout.launcher_script.exists()
    }

    /// What the completion marker says about the last successful setup
    pub fn setup_record(&self) -> Result<Option<SetupRecord>> {
        if !self.layout.setup_marker.exists() {
            return Ok(None);
        }
        SetupRecord::load_from_file(&self.layout.setup_marker)
    }
}
