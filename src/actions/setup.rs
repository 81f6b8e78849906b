use crate::config::Config;
use crate::environment::{
    DirAssets, LinuxEnvironment, SetupProgress, SetupSummary,
};
use crate::outln;
use crate::util::set_json_output;
use anyhow::{Context, Result};
use log::warn;
use nix::sys::signal::{
    SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const INTERRUPT_POLL: Duration = Duration::from_millis(100);

pub fn setup(config: &Config, env: &LinuxEnvironment) -> Result<()> {
    let summary = run_setup(config, env)?;
    let extracted = &summary.extracted;
    outln!(
        "Installed {} files and {} directories ({} KB)",
        extracted.files,
        extracted.directories,
        extracted.bytes / 1024
    );
    if extracted.links_skipped > 0 || extracted.entries_skipped > 0 {
        outln!(
            "Skipped {} links and {} other entries",
            extracted.links_skipped,
            extracted.entries_skipped
        );
    }
    set_json_output("image_sha256", json!(summary.image_sha256));
    set_json_output(
        "extracted",
        json!({
            "files": extracted.files,
            "directories": extracted.directories,
            "links_skipped": extracted.links_skipped,
            "entries_skipped": extracted.entries_skipped,
            "bytes": extracted.bytes,
        }),
    );
    Ok(())
}

/// Run a full setup, printing each progress update as it arrives. Ctrl-C
/// cancels the run instead of killing us halfway through.
pub(crate) fn run_setup(
    config: &Config,
    env: &LinuxEnvironment,
) -> Result<SetupSummary> {
    let _interrupts = InterruptGuard::install()?;
    let mut setup = env.setup(DirAssets::new(&config.assets_dir));
    loop {
        if INTERRUPTED.swap(false, Ordering::SeqCst) {
            warn!("Interrupted, cancelling setup");
            setup.cancel();
        }
        match setup.progress_timeout(INTERRUPT_POLL) {
            None => (),
            Some(SetupProgress::Update(update)) => {
                outln!("[{:>3}%] {}", update.percent, update.message);
            }
            Some(SetupProgress::Done(result)) => {
                return result.context("Setup failed");
            }
        }
    }
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/* SIGINT sets INTERRUPTED for as long as this is alive, the previous
 * disposition comes back on drop */
struct InterruptGuard {
    previous: SigAction,
}

impl InterruptGuard {
    fn install() -> Result<Self> {
        INTERRUPTED.store(false, Ordering::SeqCst);
        let action = SigAction::new(
            SigHandler::Handler(on_interrupt),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler only stores to an atomic
        let previous = unsafe { sigaction(Signal::SIGINT, &action) }
            .context("Failed to install SIGINT handler")?;
        Ok(Self { previous })
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        // SAFETY: restores whatever disposition was there before
        if let Err(e) = unsafe { sigaction(Signal::SIGINT, &self.previous) } {
            warn!("Failed to restore SIGINT handler: {}", e);
        }
    }
}
