use super::assets::{AssetReader, SETUP_SCRIPT_ASSET, SandboxArch};
use super::download::{ImageSource, fetch_image, verify_digest};
use super::progress::{ProgressReporter, Setup, SetupProgress};
use super::{LinuxEnvironment, SetupRecord};
use crate::archive::{ExtractSummary, extract, open_tar_gz};
use crate::errors::{IoContext, ProvisionError};
use crate::util::{CancelToken, mkdir, remove_tree, set_executable};
use log::{error, info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;

const RESOLV_CONF: &str = "nameserver 8.8.8.8\nnameserver 8.8.4.4\n";

const PROFILE: &str = "#!/bin/sh
if [ ! -f /root/.setup_done ]; then
    echo 'Running first-time setup...'
    [ -f /root/setup.sh ] && /root/setup.sh && touch /root/.setup_done
fi
[ -x /bin/bash ] && exec /bin/bash --login
export PS1='prootenv# '
";

/// What a successful setup produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSummary {
    pub image_sha256: String,
    pub extracted: ExtractSummary,
}

impl LinuxEnvironment {
    /**
     * Rebuild the environment from scratch on a background thread. Anything
     * already under the base directory is deleted first.
     */
    pub fn setup<A>(&self, assets: A) -> Setup
    where
        A: AssetReader + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let cancel = CancelToken::new();
        let reporter = ProgressReporter::new(sender.clone(), cancel.clone());
        let env = self.clone();

        let worker = std::thread::Builder::new()
            .name("linux-setup".to_string())
            .spawn(move || {
                let mut reporter = reporter;
                let result = env.run_setup(&assets, &mut reporter);
                match &result {
                    Err(ProvisionError::Cancelled) => env.discard_download(),
                    Err(e) => error!("Setup failed: {}", e),
                    Ok(_) => (),
                }
                reporter.finish(result);
            });

        let worker = match worker {
            Ok(worker) => Some(worker),
            Err(e) => {
                let _ = sender.send(SetupProgress::Done(Err(
                    ProvisionError::io("starting setup thread", e),
                )));
                None
            }
        };

        Setup {
            receiver,
            cancel,
            worker,
        }
    }

    pub(crate) fn run_setup(
        &self,
        assets: &dyn AssetReader,
        reporter: &mut ProgressReporter,
    ) -> Result<SetupSummary, ProvisionError> {
        let layout = &self.layout;
        info!("Setting up Linux environment in {}", layout.base.display());

        reporter.report("Cleaning up...", 2);
        reporter.check_cancelled()?;
        remove_tree(&layout.base)
            .during(format!("removing {}", layout.base.display()))?;

        reporter.report("Creating directories...", 5);
        reporter.check_cancelled()?;
        let dirs = [&layout.base, &layout.rootfs, &layout.bin_dir, &layout.tmp_dir];
        for dir in dirs {
            mkdir(dir).during(format!("creating {}", dir.display()))?;
        }

        reporter.report("Installing proot...", 10);
        reporter.check_cancelled()?;
        self.install_sandbox_binary(assets)?;

        reporter.report("Downloading Alpine Linux...", 15);
        reporter.check_cancelled()?;
        let source = ImageSource::parse(&self.settings.image_url);
        let image_sha256 =
            fetch_image(&source, &layout.image_archive, reporter)?;
        verify_digest(self.settings.image_sha256.as_deref(), &image_sha256)?;

        reporter.report("Extracting...", 78);
        reporter.check_cancelled()?;
        let extracted = self.extract_image(reporter.cancel_token())?;
        std::fs::remove_file(&layout.image_archive).during(format!(
            "removing {}",
            layout.image_archive.display()
        ))?;

        reporter.report("Configuring system...", 85);
        reporter.check_cancelled()?;
        self.configure_rootfs(assets)?;

        reporter.report("Creating launcher...", 90);
        reporter.check_cancelled()?;
        self.write_launcher()?;

        reporter.report("Finalizing...", 95);
        reporter.check_cancelled()?;
        SetupRecord::new(&self.settings.image_url, &image_sha256)
            .save_atomic(&layout.setup_marker)
            .map_err(|e| {
                ProvisionError::io("marking setup complete", io::Error::other(e))
            })?;

        reporter.report("Complete!", 100);
        info!("Linux environment is ready");
        Ok(SetupSummary {
            image_sha256,
            extracted,
        })
    }

    /* A cancelled run leaves no marker, so the next setup starts over and
     * the partial archive is only wasted space */
    fn discard_download(&self) {
        let archive = &self.layout.image_archive;
        match std::fs::remove_file(archive) {
            Ok(()) => info!("Removed partial image {}", archive.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(e) => warn!("Failed to remove {}: {}", archive.display(), e),
        }
    }

    fn install_sandbox_binary(
        &self,
        assets: &dyn AssetReader,
    ) -> Result<(), ProvisionError> {
        let arch = SandboxArch::detect(&self.settings.arch)?;
        let binary = &self.layout.sandbox_binary;
        info!("Installing {} to {}", arch.binary_asset(), binary.display());
        copy_asset(assets, arch.binary_asset(), binary)?;
        set_executable(binary)
            .during(format!("marking {} executable", binary.display()))
    }

    fn extract_image(
        &self,
        cancel: &CancelToken,
    ) -> Result<ExtractSummary, ProvisionError> {
        let archive = &self.layout.image_archive;
        let mut reader = open_tar_gz(archive)
            .during(format!("opening {}", archive.display()))?;
        match extract(&mut reader, &self.layout.rootfs, cancel) {
            Ok(summary) => Ok(summary),
            Err(_) if cancel.is_cancelled() => Err(ProvisionError::Cancelled),
            Err(e) => Err(ProvisionError::io(
                format!("extracting {}", archive.display()),
                e,
            )),
        }
    }

    fn configure_rootfs(
        &self,
        assets: &dyn AssetReader,
    ) -> Result<(), ProvisionError> {
        let rootfs = &self.layout.rootfs;

        let resolv_conf = rootfs.join("etc/resolv.conf");
        write_new_file(&resolv_conf, RESOLV_CONF)?;

        let profile = rootfs.join("root/.profile");
        write_new_file(&profile, PROFILE)?;

        let setup_script = rootfs.join("root/setup.sh");
        copy_asset(assets, SETUP_SCRIPT_ASSET, &setup_script)?;
        set_executable(&setup_script)
            .during(format!("marking {} executable", setup_script.display()))
    }

    fn write_launcher(&self) -> Result<(), ProvisionError> {
        let layout = &self.layout;
        for dir in [&layout.l2s_dir, &layout.tmp_dir] {
            mkdir(dir).during(format!("creating {}", dir.display()))?;
        }
        write_new_file(&layout.launcher_script, &self.launcher_script())?;
        set_executable(&layout.launcher_script).during(format!(
            "marking {} executable",
            layout.launcher_script.display()
        ))?;
        info!(
            "Created launcher script at {}",
            layout.launcher_script.display()
        );
        Ok(())
    }
}

fn write_new_file(path: &Path, contents: &str) -> Result<(), ProvisionError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .during(format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, contents)
        .during(format!("writing {}", path.display()))
}

fn copy_asset(
    assets: &dyn AssetReader,
    name: &str,
    dest: &Path,
) -> Result<(), ProvisionError> {
    let asset_error = |source| ProvisionError::Asset {
        name: name.to_string(),
        source,
    };
    let mut reader = assets.open(name).map_err(asset_error)?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .during(format!("creating {}", parent.display()))?;
    }
    let file =
        File::create(dest).during(format!("creating {}", dest.display()))?;
    let mut out = BufWriter::new(file);
    io::copy(&mut reader, &mut out).map_err(asset_error)?;
    out.flush().during(format!("writing {}", dest.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_archive::TarBuilder;
    use crate::environment::assets::test_assets::MemoryAssets;
    use crate::environment::EnvSettings;
    use crate::util::{is_executable, test_dir};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use walkdir::WalkDir;

    fn image() -> Vec<u8> {
        TarBuilder::new()
            .dir("./")
            .dir("./bin/")
            .file("./bin/busybox", b"\x7fELF busybox")
            .symlink("./bin/sh", "/bin/busybox")
            .dir("./etc/")
            .file("./etc/os-release", b"ID=alpine\n")
            .file("./etc/resolv.conf", b"nameserver 10.0.0.1\n")
            .dir("./root/")
            .file("../escape", b"0123456789")
            .finish_gz()
    }

    fn environment(prefix: &str, image: &[u8]) -> LinuxEnvironment {
        let data_dir = test_dir(prefix);
        let image_path = data_dir.join("image.tar.gz");
        std::fs::write(&image_path, image).unwrap();
        LinuxEnvironment::new(EnvSettings {
            image_url: format!("file://{}", image_path.display()),
            image_sha256: None,
            arch: "arm64-v8a".into(),
            host_storage: PathBuf::from("/sdcard"),
            host_shell: PathBuf::from("/bin/sh"),
            data_dir,
        })
    }

    /* relative path -> contents, with the marker left out since it carries a
     * timestamp */
    fn snapshot(env: &LinuxEnvironment) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
        WalkDir::new(&env.layout.base)
            .into_iter()
            .map(|entry| entry.unwrap())
            .filter(|entry| entry.path() != env.layout.setup_marker)
            .map(|entry| {
                let rel = entry
                    .path()
                    .strip_prefix(&env.layout.base)
                    .unwrap()
                    .to_path_buf();
                let contents = entry
                    .file_type()
                    .is_file()
                    .then(|| std::fs::read(entry.path()).unwrap());
                (rel, contents)
            })
            .collect()
    }

    #[test]
    fn test_setup_produces_layout() {
        let env = environment("provision", &image());
        let mut setup = env.setup(MemoryAssets::standard());

        let mut updates = vec![];
        let summary = loop {
            match setup.progress() {
                SetupProgress::Update(update) => updates.push(update),
                SetupProgress::Done(result) => break result.unwrap(),
            }
        };

        assert_eq!(updates.first().unwrap().message, "Cleaning up...");
        assert_eq!(updates.last().unwrap().percent, 100);
        assert!(updates.windows(2).all(|w| w[0].percent <= w[1].percent));
        assert!(
            updates
                .iter()
                .any(|u| u.message == "Extracting..." && u.percent == 78)
        );

        let layout = &env.layout;
        assert!(env.is_setup_complete());
        assert!(!layout.image_archive.exists());
        assert!(is_executable(&layout.sandbox_binary));
        assert_eq!(
            std::fs::read(&layout.sandbox_binary).unwrap(),
            b"\x7fELF proot aarch64"
        );
        assert!(is_executable(&layout.launcher_script));
        assert_eq!(
            std::fs::read_to_string(&layout.launcher_script).unwrap(),
            env.launcher_script()
        );
        assert!(layout.l2s_dir.is_dir());
        assert!(layout.tmp_dir.is_dir());
        assert_eq!(
            std::fs::read_to_string(layout.rootfs.join("etc/resolv.conf"))
                .unwrap(),
            RESOLV_CONF
        );
        assert!(
            std::fs::read_to_string(layout.rootfs.join("root/.profile"))
                .unwrap()
                .contains("/root/setup.sh && touch /root/.setup_done")
        );
        assert!(is_executable(&layout.rootfs.join("root/setup.sh")));
        assert!(is_executable(&layout.rootfs.join("bin/sh")));
        assert!(!layout.base.join("escape").exists());
        assert!(!env.settings.data_dir.join("escape").exists());

        let record = env.setup_record().unwrap().unwrap();
        assert_eq!(record.image_sha256, summary.image_sha256);
        assert_eq!(record.image_url, env.settings.image_url);
        assert_eq!(env.validate(), Ok(()));
    }

    #[test]
    fn test_setup_twice_is_identical() {
        let env = environment("provision-twice", &image());
        env.setup(MemoryAssets::standard()).wait().unwrap();
        let first = snapshot(&env);

        std::fs::write(env.layout.rootfs.join("stale"), "left over").unwrap();
        env.setup(MemoryAssets::standard()).wait().unwrap();
        let second = snapshot(&env);

        assert_eq!(first, second);
    }

    #[test]
    fn test_unsupported_arch() {
        let mut env = environment("provision-arch", &image());
        env.settings.arch = "x86_64".into();
        let result = env.setup(MemoryAssets::standard()).wait();
        assert!(matches!(result, Err(ProvisionError::UnsupportedArch(_))));
        assert!(!env.is_setup_complete());
        assert!(!env.layout.setup_marker.exists());
    }

    #[test]
    fn test_missing_asset() {
        let env = environment("provision-asset", &image());
        let assets = MemoryAssets::new().with("bin/proot-aarch64", b"proot");
        let result = env.setup(assets).wait();
        match result {
            Err(ProvisionError::Asset { name, .. }) => {
                assert_eq!(name, SETUP_SCRIPT_ASSET)
            }
            other => panic!("expected asset error, got {:?}", other),
        }
        assert!(!env.layout.setup_marker.exists());
    }

    #[test]
    fn test_digest_mismatch() {
        let mut env = environment("provision-digest", &image());
        env.settings.image_sha256 = Some("00".repeat(32));
        let result = env.setup(MemoryAssets::standard()).wait();
        assert!(matches!(result, Err(ProvisionError::DigestMismatch { .. })));
        assert!(!env.layout.setup_marker.exists());
    }

    #[test]
    fn test_cancelled_setup() {
        let env = environment("provision-cancel", &image());
        let (sender, receiver) = mpsc::channel();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut reporter = ProgressReporter::new(sender, cancel.clone());

        let result = env.run_setup(&MemoryAssets::standard(), &mut reporter);
        assert!(matches!(result, Err(ProvisionError::Cancelled)));
        reporter.finish(result);

        let mut setup = Setup {
            receiver,
            cancel,
            worker: None,
        };
        let mut done = 0;
        loop {
            match setup.progress() {
                SetupProgress::Update(_) => (),
                SetupProgress::Done(Err(ProvisionError::TaskTerminated)) => break,
                SetupProgress::Done(result) => {
                    assert!(matches!(result, Err(ProvisionError::Cancelled)));
                    done += 1;
                }
            }
        }
        assert_eq!(done, 1);
        assert!(!env.layout.setup_marker.exists());
    }

    #[test]
    fn test_cancelled_download_is_discarded() {
        let env = environment("provision-discard", &image());
        std::fs::create_dir_all(&env.layout.base).unwrap();
        std::fs::write(&env.layout.image_archive, b"partial").unwrap();
        env.discard_download();
        assert!(!env.layout.image_archive.exists());
        // nothing left to remove is fine too
        env.discard_download();
    }
}
