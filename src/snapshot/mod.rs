//! Snapshot acquisition, verification and rotation.
//!
//! The release pipeline reacts to the change-status of the mirror's build
//! manifest: it downloads new snapshot sets into a staging directory, gates
//! them through signature verification, decides whether the set is already
//! the running system, and moves verified sets through the generation slots.

pub mod acquire;
pub mod generations;
pub mod integrity;
pub mod verify;

use std::path::{Path, PathBuf};

use reqwest::Url;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::docwatch::ChangeStatus;
use crate::transfer::Fetcher;
use crate::utils::errors::{AgentError, Result};
use generations::GenerationSlots;
use integrity::IntegrityGate;
use verify::Verifier;

/// What the pipeline did with this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Bootstrap found the running release; it went straight to `current`.
    Promoted,
    /// A verified set is staged in `upgrade`, awaiting install and reboot.
    Staged,
    /// The staged upgrade turned out to be running; generations rotated.
    Rotated,
    /// Nothing to do.
    NoChange,
    /// Verification did not pass after the retry; the download was dropped.
    Discarded,
}

pub struct ReleasePipeline<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub verifier: &'a dyn Verifier,
    pub gate: IntegrityGate,
    /// Mirror directory holding the snapshot set for this architecture.
    pub snapshots_url: Url,
    pub slots: GenerationSlots,
    /// Root of the live filesystem, `/` outside of tests.
    pub system_root: PathBuf,
    /// Stage downloads here instead of the system temp dir. Staging next to
    /// the slots keeps promotion a single same-filesystem rename.
    pub staging_parent: Option<PathBuf>,
}

impl ReleasePipeline<'_> {
    pub async fn run(&self, status: ChangeStatus) -> Result<Outcome> {
        match status {
            ChangeStatus::Unchanged => self.settle(),
            ChangeStatus::Bootstrap => {
                let staging = self.staging_dir()?;
                self.bootstrap(staging.path()).await
            }
            ChangeStatus::Changed => {
                let staging = self.staging_dir()?;
                self.stage_new(staging.path()).await
            }
        }
    }

    /// First sighting of the manifest: record the set as `current` when it is
    /// already running, otherwise stage it as the pending upgrade.
    async fn bootstrap(&self, staging_root: &Path) -> Result<Outcome> {
        let Some(snapshot) = self.acquire_verified(staging_root).await? else {
            return Ok(Outcome::Discarded);
        };
        if generations::is_running(&snapshot, &self.system_root)? {
            generations::promote(&snapshot, &self.slots.current)?;
            info!("Running snapshot recorded as the current generation");
            Ok(Outcome::Promoted)
        } else {
            generations::promote(&snapshot, &self.slots.upgrade)?;
            Ok(Outcome::Staged)
        }
    }

    /// Manifest unchanged: the only possible work is promoting a staged
    /// upgrade that has since been installed and booted.
    fn settle(&self) -> Result<Outcome> {
        if self.slots.upgrade.exists()
            && generations::is_running(&self.slots.upgrade, &self.system_root)?
        {
            generations::rotate(&self.slots)?;
            return Ok(Outcome::Rotated);
        }
        Ok(Outcome::NoChange)
    }

    /// New manifest content: stage the new set, displacing any older staged
    /// upgrade.
    async fn stage_new(&self, staging_root: &Path) -> Result<Outcome> {
        let Some(snapshot) = self.acquire_verified(staging_root).await? else {
            return Ok(Outcome::Discarded);
        };
        if self.slots.upgrade.exists() {
            std::fs::remove_dir_all(&self.slots.upgrade)?;
        }
        generations::promote(&snapshot, &self.slots.upgrade)?;
        Ok(Outcome::Staged)
    }

    async fn acquire_verified(&self, staging_root: &Path) -> Result<Option<PathBuf>> {
        let snapshot = acquire::acquire(self.fetcher, &self.snapshots_url, staging_root).await?;
        let intact = self
            .gate
            .check(self.verifier, self.fetcher, &snapshot, &self.snapshots_url)
            .await?;
        if intact {
            Ok(Some(snapshot))
        } else {
            warn!("Snapshot failed verification after retry, discarding");
            Ok(None)
        }
    }

    fn staging_dir(&self) -> Result<TempDir> {
        match &self.staging_parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                Ok(TempDir::new_in(parent)?)
            }
            None => Ok(TempDir::new()?),
        }
    }
}

pub(crate) fn member_url(base: &Url, member: &str) -> Result<Url> {
    base.join(member).map_err(|err| {
        AgentError::Config(format!("cannot resolve {member} against {base}: {err}"))
    })
}
