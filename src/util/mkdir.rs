use std::io;
use std::path::Path;

/* Makes the directory (and any missing parents) if it doesn't exist. Fails
 * if something other than a directory is already sitting at the path, even
 * a symlink to one.
 */
pub fn mkdir(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists but is not a directory", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            std::fs::create_dir_all(path)
        }
        Err(e) => Err(e),
    }
}
