use anyhow::{Result, anyhow};
use nix::unistd::{User, getuid};
use std::path::{Path, PathBuf};

/**
 * Figure out the home directory of whoever is running us. `$HOME` wins when
 * it is set to something absolute, otherwise we ask the password database.
 */
pub fn resolve_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let home_path = Path::new(&home);
        if home_path.is_absolute() {
            return Ok(home_path.to_path_buf());
        }
    }

    let uid = getuid();
    match User::from_uid(uid)? {
        Some(user) if user.dir.is_absolute() => Ok(user.dir),
        Some(user) => Err(anyhow!(
            "Home directory is not absolute: {:?}",
            user.dir
        )),
        None => Err(anyhow!("No passwd entry for uid {}", uid)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_home_is_absolute() {
        let home = resolve_home().unwrap();
        assert!(home.is_absolute());
    }
}
