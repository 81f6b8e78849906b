use log::trace;
use nix::unistd::{AccessFlags, access};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// True if the current user may execute the file at `path`
pub fn is_executable(path: &Path) -> bool {
    access(path, AccessFlags::X_OK).is_ok()
}

/// Add execute permission for everyone, leaving the other bits alone
pub fn set_executable(path: &Path) -> io::Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    let mode = perms.mode();
    if mode & 0o111 != 0o111 {
        trace!("chmod {:o} -> {:o} {}", mode, mode | 0o111, path.display());
        perms.set_mode(mode | 0o111);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

/**
 * Make sure the file is executable, fixing it up once if it isn't. Returns
 * whether the file is executable afterwards.
 */
pub fn ensure_executable(path: &Path) -> bool {
    if is_executable(path) {
        return true;
    }
    if let Err(e) = set_executable(path) {
        trace!("Failed to mark {} executable: {}", path.display(), e);
    }
    is_executable(path)
}
