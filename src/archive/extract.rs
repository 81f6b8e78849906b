use super::tar_reader::{EntryKind, TarEntry, TarReader, has_parent_segment};
use crate::util::{CancelToken, set_executable};
use log::{debug, trace};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

/// Path prefixes whose regular files are always marked executable
const BINARY_DIRS: [&str; 4] = ["bin/", "sbin/", "usr/bin/", "usr/sbin/"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: u64,
    pub directories: u64,
    pub links_skipped: u64,
    pub entries_skipped: u64,
    pub bytes: u64,
}

/**
 * Unpack every entry from `reader` under `dest`.
 *
 * Links are never materialized, only files and directories. This is not
 * transactional: an error part way through leaves whatever was already
 * written, and the caller is expected to wipe `dest` and start over.
 */
pub fn extract<R: Read>(
    reader: &mut TarReader<R>,
    dest: &Path,
    cancel: &CancelToken,
) -> io::Result<ExtractSummary> {
    let mut summary = ExtractSummary::default();
    std::fs::create_dir_all(dest)?;

    while let Some(entry) = reader.next_entry()? {
        if cancel.is_cancelled() {
            return Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "extraction cancelled",
            ));
        }

        if entry.name.is_empty() || has_parent_segment(&entry.name) {
            trace!("Skipping entry {:?}", entry.name);
            summary.entries_skipped += 1;
            continue;
        }

        let out_path = dest.join(&entry.name);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            summary.directories += 1;
        } else if entry.is_link() {
            trace!(
                "Skipping link {} -> {}",
                entry.name, entry.link_target
            );
            summary.links_skipped += 1;
        } else if entry.kind == EntryKind::Regular {
            summary.bytes += write_file(reader, &entry, &out_path)?;
            summary.files += 1;
        } else {
            trace!("Skipping {:?} entry {}", entry.kind, entry.name);
            summary.entries_skipped += 1;
        }
    }

    busybox_shell_fallback(dest)?;

    debug!(
        "Extracted {} files ({} bytes) and {} directories into {}, skipped {} links and {} other entries",
        summary.files,
        summary.bytes,
        summary.directories,
        dest.display(),
        summary.links_skipped,
        summary.entries_skipped
    );
    Ok(summary)
}

fn write_file<R: Read>(
    reader: &mut TarReader<R>,
    entry: &TarEntry,
    out_path: &Path,
) -> io::Result<u64> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(out_path)?);
    let written = reader.copy_payload(&mut out)?;
    out.flush()?;
    drop(out);

    if is_binary_path(&entry.name) || entry.mode & 0o111 != 0 {
        set_executable(out_path)?;
    }
    Ok(written)
}

fn is_binary_path(name: &str) -> bool {
    BINARY_DIRS.iter().any(|dir| name.starts_with(dir))
}

/* Images like Alpine ship /bin/sh as a symlink to busybox, and we don't
 * create links, so give them a real copy to use as the shell. */
fn busybox_shell_fallback(dest: &Path) -> io::Result<()> {
    let busybox = dest.join("bin/busybox");
    if !busybox.is_file() {
        return Ok(());
    }
    set_executable(&busybox)?;

    let sh = dest.join("bin/sh");
    if std::fs::symlink_metadata(&sh).is_err() {
        debug!("No bin/sh in image, copying busybox into place");
        std::fs::copy(&busybox, &sh)?;
        set_executable(&sh)?;
    }
    Ok(())
}
