//! Hand-built environments for tests

use crate::environment::{EnvSettings, LinuxEnvironment};
use crate::util::test_dir;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub fn write_mode(path: &Path, contents: &str, mode: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .unwrap();
}

/// A hand-built environment that passes validation, with a launcher
/// that runs `launcher_body` instead of proot
pub fn stub_environment(prefix: &str, launcher_body: &str) -> LinuxEnvironment {
    let data_dir = test_dir(prefix);
    let env = LinuxEnvironment::new(EnvSettings {
        image_url: "file:///dev/null".into(),
        image_sha256: None,
        arch: "aarch64".into(),
        host_storage: PathBuf::from("/sdcard"),
        host_shell: PathBuf::from("/bin/sh"),
        data_dir,
    });
    let layout = &env.layout;
    write_mode(&layout.sandbox_binary, "proot", 0o755);
    write_mode(
        &layout.launcher_script,
        &format!("#!/bin/sh\n{}\n", launcher_body),
        0o755,
    );
    write_mode(&layout.rootfs.join("bin/sh"), "sh", 0o755);
    std::fs::write(&layout.setup_marker, "").unwrap();
    env
}
