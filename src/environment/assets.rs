use crate::errors::ProvisionError;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

pub const SETUP_SCRIPT_ASSET: &str = "scripts/setup-alpine.sh";

/// Read-only access to the files bundled alongside the application
pub trait AssetReader {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Assets laid out as plain files under one directory
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl AssetReader for DirAssets {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(self.root.join(name))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxArch {
    Aarch64,
    Arm,
}

impl SandboxArch {
    /// Match the host's instruction set name against what we ship binaries for
    pub fn detect(isa: &str) -> Result<Self, ProvisionError> {
        let isa_lower = isa.to_lowercase();
        if isa_lower.contains("arm64") || isa_lower.contains("aarch64") {
            Ok(SandboxArch::Aarch64)
        } else if isa_lower.contains("arm") {
            Ok(SandboxArch::Arm)
        } else {
            Err(ProvisionError::UnsupportedArch(isa.to_string()))
        }
    }

    pub fn binary_asset(&self) -> &'static str {
        match self {
            SandboxArch::Aarch64 => "bin/proot-aarch64",
            SandboxArch::Arm => "bin/proot-arm",
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_dir;

    #[test]
    fn test_detect_arch() {
        assert_eq!(SandboxArch::detect("arm64-v8a").unwrap(), SandboxArch::Aarch64);
        assert_eq!(SandboxArch::detect("aarch64").unwrap(), SandboxArch::Aarch64);
        assert_eq!(SandboxArch::detect("armeabi-v7a").unwrap(), SandboxArch::Arm);
        assert_eq!(SandboxArch::detect("arm").unwrap(), SandboxArch::Arm);
        assert!(matches!(
            SandboxArch::detect("x86_64"),
            Err(ProvisionError::UnsupportedArch(_))
        ));
    }

    #[test]
    fn test_dir_assets() {
        let root = test_dir("assets");
        std::fs::create_dir_all(root.join("scripts")).unwrap();
        std::fs::write(root.join(SETUP_SCRIPT_ASSET), "echo hi\n").unwrap();

        let assets = DirAssets::new(&root);
        let mut contents = String::new();
        assets
            .open(SETUP_SCRIPT_ASSET)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "echo hi\n");
        assert!(assets.open("bin/proot-aarch64").is_err());
    }
}
