use log::trace;
use std::os::unix::fs::PermissionsExt;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/**
 * Recursively delete a directory tree we own. Directories inside a rootfs
 * can end up without the owner write bit (things created from inside the
 * sandbox), which would make a plain remove_dir_all fail, so we walk the
 * tree first and give every directory back u+rwx.
 */
pub fn remove_tree(path: &Path) -> io::Result<()> {
    if std::fs::symlink_metadata(path).is_err() {
        trace!("{} does not exist, nothing to remove", path.display());
        return Ok(());
    }

    if path.is_dir() {
        for entry in WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
        {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let mut perms = metadata.permissions();
            if perms.mode() & 0o700 != 0o700 {
                perms.set_mode(perms.mode() | 0o700);
                let _ = std::fs::set_permissions(entry.path(), perms);
            }
        }
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }

    trace!("Removed {}", path.display());
    Ok(())
}
