mod cancel;
mod home;
mod mkdir;
mod output;
mod permissions;
mod remove_tree;

pub use cancel::*;
pub use home::*;
pub use mkdir::*;
pub use output::*;
pub use permissions::*;
pub use remove_tree::*;

/// Fresh scratch directory for a unit test, under generated-test-data/
#[cfg(test)]
pub fn test_dir(prefix: &str) -> std::path::PathBuf {
    let dir = std::env::current_dir()
        .expect("no current dir")
        .join("generated-test-data")
        .join("unit")
        .join(format!("{}-{}", prefix, uuid::Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir).expect("failed to create test dir");
    dir
}
