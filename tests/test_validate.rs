mod fixtures;

use anyhow::Result;
use fixtures::*;
use rstest::*;
use std::os::unix::fs::PermissionsExt;

#[rstest]
fn test_validate_before_setup(mut env: EnvManager) -> Result<()> {
    assert!(env.xfail(&["validate"]));
    assert!(env.last_stderr.contains("Base directory does not exist"));

    let json = env.json(&["validate"])?;
    assert_eq!(json["status"], "error");
    assert_eq!(json["valid"], false);
    Ok(())
}

#[rstest]
fn test_validate_reports_first_problem(mut env: EnvManager) -> Result<()> {
    assert!(env.pass(&["setup"]));
    assert!(env.pass(&["validate"]));
    assert_eq!(env.last_stdout.trim(), "ok");

    let linux_dir = env.linux_dir();
    std::fs::remove_file(linux_dir.join("rootfs/bin/sh"))?;
    std::fs::remove_file(linux_dir.join("rootfs/bin/busybox"))?;
    assert!(env.xfail(&["validate"]));
    assert!(env.last_stderr.contains("No shell found in rootfs"));

    std::fs::remove_file(linux_dir.join("bin/launch-proot.sh"))?;
    assert!(env.xfail(&["validate"]));
    assert!(env.last_stderr.contains("Launcher script does not exist"));
    Ok(())
}

#[rstest]
fn test_validate_restores_execute_bits(mut env: EnvManager) -> Result<()> {
    assert!(env.pass(&["setup"]));
    let launcher = env.linux_dir().join("bin/launch-proot.sh");
    std::fs::set_permissions(&launcher, std::fs::Permissions::from_mode(0o644))?;

    assert!(env.pass(&["validate"]));
    let mode = std::fs::metadata(&launcher)?.permissions().mode();
    assert_eq!(mode & 0o100, 0o100);
    Ok(())
}
