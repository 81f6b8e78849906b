#![allow(dead_code)]

use anyhow::Result;
use flate2::{Compression, write::GzEncoder};
use log::warn;
use rand::Rng;
use rstest::*;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

const TEST_DATA_DIR: &str = "generated-test-data";

/* Stands in for proot. It reports how it was called and exits with a code
 * the tests can recognise. */
pub const STUB_PROOT: &str = "#!/bin/sh\necho \"stub proot $#: $*\"\nexit 7\n";
pub const STUB_PROOT_EXIT_CODE: i32 = 7;

const ENV_VARS: [&str; 8] = [
    "PROOTENV_LOG_LEVEL",
    "PROOTENV_DATA_DIR",
    "PROOTENV_IMAGE_URL",
    "PROOTENV_IMAGE_SHA256",
    "PROOTENV_ARCH",
    "PROOTENV_ASSETS_DIR",
    "PROOTENV_HOST_STORAGE",
    "PROOTENV_LOG_FILE",
];

pub fn rid() -> String {
    let mut rng = rand::rng();
    let rid: String = (0..10)
        .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
        .collect();
    rid
}

/**
 * One isolated environment per test: its own data dir, assets and a local
 * image archive, all under generated-test-data/.
 */
pub struct EnvManager {
    pub name: String,
    pub dir: PathBuf,
    pub data_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub image: PathBuf,
    pub last_stdout: String,
    pub last_stderr: String,
    pub last_code: Option<i32>,
    pub debug_mode: bool,
    /* when set, only the given args are passed */
    pub no_default_options: bool,
}

impl EnvManager {
    pub fn new() -> Self {
        let name = format!("prootenv-test-{}", rid());
        let dir = std::env::current_dir()
            .expect("no current dir")
            .join(TEST_DATA_DIR)
            .join(&name);
        let data_dir = dir.join("data");
        let assets_dir = dir.join("assets");
        let image = dir.join("alpine-minirootfs.tar.gz");

        write_file(&assets_dir.join("bin/proot-aarch64"), STUB_PROOT, 0o755)
            .expect("failed to write proot asset");
        write_file(&assets_dir.join("bin/proot-arm"), STUB_PROOT, 0o755)
            .expect("failed to write proot asset");
        write_file(
            &assets_dir.join("scripts/setup-alpine.sh"),
            "#!/bin/sh\napk update\n",
            0o644,
        )
        .expect("failed to write setup script asset");
        std::fs::write(&image, minirootfs()).expect("failed to write image");
        std::fs::create_dir_all(&data_dir).expect("failed to create data dir");

        Self {
            name,
            dir,
            data_dir,
            assets_dir,
            image,
            last_stdout: String::new(),
            last_stderr: String::new(),
            last_code: None,
            debug_mode: false,
            no_default_options: false,
        }
    }

    /* When debug mode is on, the test data is kept after the test */
    #[allow(dead_code)]
    pub fn set_debug_mode(&mut self, debug_mode: bool) {
        self.debug_mode = debug_mode;
    }

    pub fn linux_dir(&self) -> PathBuf {
        self.data_dir.join("linux")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_prootenv"));
        for var in ENV_VARS {
            cmd.env_remove(var);
        }
        if !self.no_default_options {
            cmd.arg("--no-config");
            cmd.arg(format!("--data-dir={}", self.data_dir.display()));
            cmd.arg(format!("--assets-dir={}", self.assets_dir.display()));
            cmd.arg(format!("--image-url={}", self.image.display()));
            cmd.arg(format!("--host-storage={}", self.dir.display()));
            cmd.arg("--arch=aarch64");
        }
        cmd.args(args);
        cmd.stdin(Stdio::null());
        println!(
            "Running command: {} {}",
            cmd.get_program().to_string_lossy(),
            cmd.get_args()
                .map(|c| c.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        cmd
    }

    /// Runs prootenv, returning its exit code
    pub fn run(&mut self, args: &[&str]) -> Result<i32> {
        let output = self.command(args).output()?;
        self.last_stdout = String::from_utf8_lossy(&output.stdout).to_string();
        self.last_stderr = String::from_utf8_lossy(&output.stderr).to_string();
        self.last_code = output.status.code();
        self.last_code.ok_or_else(|| {
            anyhow::anyhow!(
                "Command did not return a valid exit code\nstdout: {}\nstderr: {}",
                self.last_stdout,
                self.last_stderr
            )
        })
    }

    /// Starts prootenv without waiting, output is piped
    pub fn spawn(&self, args: &[&str]) -> Result<Child> {
        let mut cmd = self.command(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        Ok(cmd.spawn()?)
    }

    pub fn json(&mut self, args: &[&str]) -> Result<serde_json::Value> {
        let mut json_args = vec!["--json"];
        json_args.extend_from_slice(args);
        self.run(&json_args)?;
        Ok(serde_json::from_str(&self.last_stdout)?)
    }

    pub fn pass(&mut self, args: &[&str]) -> bool {
        if let Ok(0) = self.run(args) {
            return true;
        }
        println!("last_stderr: {}", self.last_stderr);
        println!("last_stdout: {}", self.last_stdout);
        false
    }

    pub fn xfail(&mut self, args: &[&str]) -> bool {
        match self.run(args) {
            Ok(0) => {
                println!("last_stderr: {}", self.last_stderr);
                println!("last_stdout: {}", self.last_stdout);
                false
            }
            _ => true,
        }
    }
}

impl Drop for EnvManager {
    fn drop(&mut self) {
        if !self.debug_mode {
            if let Err(e) = std::fs::remove_dir_all(&self.dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {} dir: {}", self.dir.display(), e);
                }
            }
        } else {
            warn!("Debug mode is on, *NOT* cleaning up {}", self.dir.display());
        }
    }
}

#[fixture]
pub fn env() -> EnvManager {
    EnvManager::new()
}

fn write_file(path: &Path, contents: &str, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

/* A tiny root filesystem in the layout of the Alpine minirootfs, with
 * busybox standing in for /bin/sh */
pub fn minirootfs() -> Vec<u8> {
    let mut tar = Vec::new();
    for dir in ["./", "./bin/", "./etc/", "./root/", "./tmp/"] {
        tar_entry(&mut tar, dir, b'5', 0o755, b"");
    }
    tar_entry(&mut tar, "./bin/busybox", b'0', 0o755, b"#!/bin/sh\n");
    tar_entry(&mut tar, "./etc/alpine-release", b'0', 0o644, b"3.20.3\n");
    tar_entry(&mut tar, "./etc/hostname", b'0', 0o644, b"localhost\n");
    tar.extend_from_slice(&[0u8; 1024]);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&tar).expect("gzip into memory");
    encoder.finish().expect("gzip into memory")
}

fn tar_entry(tar: &mut Vec<u8>, name: &str, typeflag: u8, mode: u32, data: &[u8]) {
    let mut header = [0u8; 512];
    header[..name.len()].copy_from_slice(name.as_bytes());
    header[100..108].copy_from_slice(format!("{:07o}\0", mode).as_bytes());
    header[108..116].copy_from_slice(b"0000000\0");
    header[116..124].copy_from_slice(b"0000000\0");
    header[124..136].copy_from_slice(format!("{:011o}\0", data.len()).as_bytes());
    header[136..148].copy_from_slice(b"00000000000\0");
    header[148..156].copy_from_slice(b"        ");
    header[156] = typeflag;
    header[257..263].copy_from_slice(b"ustar\0");
    header[263..265].copy_from_slice(b"00");
    let checksum: u32 = header.iter().map(|b| *b as u32).sum();
    header[148..156].copy_from_slice(format!("{:06o}\0 ", checksum).as_bytes());

    tar.extend_from_slice(&header);
    tar.extend_from_slice(data);
    let padding = (512 - data.len() % 512) % 512;
    tar.extend(std::iter::repeat_n(0u8, padding));
}
