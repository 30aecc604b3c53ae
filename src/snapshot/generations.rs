//! Generation slots and rotation.
//!
//! Three named directories under the snapshots root hold at most one
//! snapshot each: `previous` is the retained fallback, `current` mirrors
//! the presumed-running system, `upgrade` holds a verified set that has
//! not been installed yet.

use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::utils::errors::{AgentError, Result};

/// Boot artifact compared against the live system as a stand-in for full
/// image identity.
pub const BOOT_PROXY: &str = "bsd.rd";

#[derive(Debug, Clone)]
pub struct GenerationSlots {
    pub previous: PathBuf,
    pub current: PathBuf,
    pub upgrade: PathBuf,
}

impl GenerationSlots {
    pub fn under(snapshots_dir: &Path) -> Self {
        Self {
            previous: snapshots_dir.join("previous"),
            current: snapshots_dir.join("current"),
            upgrade: snapshots_dir.join("upgrade"),
        }
    }
}

/// Shift the generations: previous ← current ← upgrade.
///
/// The old previous generation is deleted; afterwards `upgrade` is empty and
/// exactly one fallback generation remains. The caller guarantees that
/// `upgrade` holds the snapshot now known to be running.
pub fn rotate(slots: &GenerationSlots) -> Result<()> {
    if !slots.upgrade.exists() {
        return Err(AgentError::MissingSlot(slots.upgrade.clone()));
    }
    if slots.previous.exists() {
        fs::remove_dir_all(&slots.previous)?;
    }
    if slots.current.exists() {
        fs::rename(&slots.current, &slots.previous)?;
    }
    fs::rename(&slots.upgrade, &slots.current)?;
    info!("Rotated generations; {} is now current", slots.current.display());
    Ok(())
}

/// Whether the snapshot matches the currently booted system, judged by a
/// byte-for-byte comparison of its boot image against the live one.
pub fn is_running(snapshot: &Path, system_root: &Path) -> Result<bool> {
    files_identical(&snapshot.join(BOOT_PROXY), &system_root.join(BOOT_PROXY))
}

/// Move a staged snapshot into a generation slot.
///
/// A single rename when staging and slots share a filesystem; falls back to
/// copying the flat member files and removing the source when the rename
/// crosses devices.
pub fn promote(snapshot: &Path, slot: &Path) -> Result<()> {
    if let Some(parent) = slot.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(snapshot, slot) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(
                "rename into {} failed ({rename_err}), copying instead",
                slot.display()
            );
            copy_flat_dir(snapshot, slot)?;
            fs::remove_dir_all(snapshot)?;
            Ok(())
        }
    }
}

fn copy_flat_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }
    Ok(())
}

fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut reader_a = BufReader::new(fs::File::open(a)?);
    let mut reader_b = BufReader::new(fs::File::open(b)?);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];
    loop {
        let n = reader_a.read(&mut buf_a)?;
        if n == 0 {
            return Ok(true);
        }
        reader_b.read_exact(&mut buf_b[..n])?;
        if buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
    }
}
