//! Integrity gate: verification with one bounded retry.

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use tracing::warn;

use super::member_url;
use super::verify::Verifier;
use crate::transfer::Fetcher;
use crate::utils::errors::Result;

/// Wait before the single verification retry. Transient mirror-sync windows
/// on the order of minutes are the expected failure cause, not corruption.
pub const RETRY_COOLDOWN: Duration = Duration::from_secs(300);

pub struct IntegrityGate {
    cooldown: Duration,
}

impl IntegrityGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Check a snapshot against its manifest.
    ///
    /// When members fail the first pass, wait out the cool-down, re-fetch
    /// only those members in place, and re-verify once more against the full
    /// manifest. There is no third attempt; a snapshot that is still not
    /// intact must be discarded by the caller.
    pub async fn check(
        &self,
        verifier: &dyn Verifier,
        fetcher: &dyn Fetcher,
        snapshot: &Path,
        snapshots_url: &Url,
    ) -> Result<bool> {
        let verdict = verifier.verify(snapshot, None).await?;
        if verdict.failed.is_empty() {
            return Ok(verdict.passed);
        }

        warn!(
            "{} member(s) failed verification, retrying after cool-down: {}",
            verdict.failed.len(),
            verdict.failed.join(", ")
        );
        tokio::time::sleep(self.cooldown).await;

        for member in &verdict.failed {
            fetcher
                .fetch(&member_url(snapshots_url, member)?, &snapshot.join(member))
                .await?;
        }

        let verdict = verifier.verify(snapshot, None).await?;
        Ok(verdict.passed)
    }
}

impl Default for IntegrityGate {
    fn default() -> Self {
        Self::new(RETRY_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::{ScriptedFetcher, ScriptedVerifier};
    use crate::snapshot::verify::Verdict;
    use tempfile::TempDir;

    fn mirror() -> Url {
        Url::parse("http://mirror.test/snapshots/amd64/").unwrap()
    }

    #[tokio::test]
    async fn intact_snapshot_passes_in_one_call() {
        let verifier = ScriptedVerifier::new(vec![Verdict::pass()]);
        let fetcher = ScriptedFetcher::with_files(&[]);
        let snapshot = TempDir::new().unwrap();

        let gate = IntegrityGate::new(Duration::ZERO);
        let intact = gate
            .check(&verifier, &fetcher, snapshot.path(), &mirror())
            .await
            .unwrap();

        assert!(intact);
        assert_eq!(verifier.calls(), 1);
        assert!(fetcher.fetched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_members_are_refetched_after_one_cooldown() {
        let verifier = ScriptedVerifier::new(vec![
            Verdict::fail(&["base77.tgz", "comp77.tgz"]),
            Verdict::pass(),
        ]);
        let fetcher = ScriptedFetcher::with_files(&[
            ("base77.tgz", b"fixed base"),
            ("comp77.tgz", b"fixed comp"),
        ]);
        let snapshot = TempDir::new().unwrap();
        let start = tokio::time::Instant::now();

        let gate = IntegrityGate::new(Duration::from_secs(300));
        let intact = gate
            .check(&verifier, &fetcher, snapshot.path(), &mirror())
            .await
            .unwrap();

        assert!(intact);
        assert_eq!(verifier.calls(), 2);
        // exactly one cool-down, and only the failed members re-fetched
        assert_eq!(start.elapsed(), Duration::from_secs(300));
        assert_eq!(fetcher.fetched(), ["base77.tgz", "comp77.tgz"]);
        assert_eq!(
            std::fs::read(snapshot.path().join("base77.tgz")).unwrap(),
            b"fixed base"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_gives_up_after_two_passes() {
        let verifier = ScriptedVerifier::new(vec![
            Verdict::fail(&["base77.tgz"]),
            Verdict::fail(&["base77.tgz"]),
        ]);
        let fetcher = ScriptedFetcher::with_files(&[("base77.tgz", b"still bad")]);
        let snapshot = TempDir::new().unwrap();

        let gate = IntegrityGate::new(Duration::from_secs(300));
        let intact = gate
            .check(&verifier, &fetcher, snapshot.path(), &mirror())
            .await
            .unwrap();

        assert!(!intact);
        assert_eq!(verifier.calls(), 2);
    }

    #[tokio::test]
    async fn bad_exit_without_failed_members_is_not_retried() {
        let verifier = ScriptedVerifier::new(vec![Verdict {
            passed: false,
            failed: Vec::new(),
        }]);
        let fetcher = ScriptedFetcher::with_files(&[]);
        let snapshot = TempDir::new().unwrap();

        let gate = IntegrityGate::new(Duration::ZERO);
        let intact = gate
            .check(&verifier, &fetcher, snapshot.path(), &mirror())
            .await
            .unwrap();

        assert!(!intact);
        assert_eq!(verifier.calls(), 1);
    }
}
