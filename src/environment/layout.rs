use std::path::{Path, PathBuf};

/**
 * Every path the environment owns, all derived from one base directory.
 * The base directory is ours alone and is wiped at the start of each setup.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootLayout {
    pub base: PathBuf,
    pub rootfs: PathBuf,
    pub bin_dir: PathBuf,
    pub sandbox_binary: PathBuf,
    pub launcher_script: PathBuf,
    pub tmp_dir: PathBuf,
    pub l2s_dir: PathBuf, // proot's link2symlink bookkeeping
    pub setup_marker: PathBuf,
    pub image_archive: PathBuf, // only exists while setup is running
}

impl RootLayout {
    pub fn new(base: &Path) -> Self {
        let bin_dir = base.join("bin");
        Self {
            base: base.to_path_buf(),
            rootfs: base.join("rootfs"),
            sandbox_binary: bin_dir.join("proot"),
            launcher_script: bin_dir.join("launch-proot.sh"),
            bin_dir,
            tmp_dir: base.join("tmp"),
            l2s_dir: base.join(".proot_l2s"),
            setup_marker: base.join(".setup_complete"),
            image_archive: base.join("alpine.tar.gz"),
        }
    }

    pub fn paths(&self) -> [(&'static str, &Path); 9] {
        [
            ("base", &self.base),
            ("rootfs", &self.rootfs),
            ("bin_dir", &self.bin_dir),
            ("sandbox_binary", &self.sandbox_binary),
            ("launcher_script", &self.launcher_script),
            ("tmp_dir", &self.tmp_dir),
            ("l2s_dir", &self.l2s_dir),
            ("setup_marker", &self.setup_marker),
            ("image_archive", &self.image_archive),
        ]
    }
}
