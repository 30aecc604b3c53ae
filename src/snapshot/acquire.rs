//! Snapshot acquisition into a staging directory.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use tracing::info;

use super::member_url;
use crate::transfer::Fetcher;
use crate::utils::errors::Result;

/// Signed checksum manifest accompanying every snapshot.
pub const MANIFEST_FILE: &str = "SHA256.sig";

static MEMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((.*)\)").expect("member pattern is a valid regex"));

/// Extract the member file list from the manifest text.
///
/// The manifest is the trust root: every checksummed member appears in
/// parentheses on the line describing it, and that list — in order of
/// appearance, duplicates included — is what gets downloaded. Directory
/// listings are never consulted.
pub fn manifest_members(manifest: &str) -> Vec<String> {
    MEMBER_PATTERN
        .captures_iter(manifest)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Download a complete snapshot under `staging_root`.
///
/// Creates a fresh `snapshot` subdirectory, fetches the manifest into it,
/// then fetches every member the manifest names. Any fetch failure aborts
/// the whole acquisition; a partial snapshot is never usable before the
/// integrity gate anyway.
pub async fn acquire(
    fetcher: &dyn Fetcher,
    snapshots_url: &Url,
    staging_root: &Path,
) -> Result<PathBuf> {
    let staging = staging_root.join("snapshot");
    std::fs::create_dir(&staging)?;

    let manifest_path = staging.join(MANIFEST_FILE);
    fetcher
        .fetch(&member_url(snapshots_url, MANIFEST_FILE)?, &manifest_path)
        .await?;

    let manifest = std::fs::read_to_string(&manifest_path)?;
    let members = manifest_members(&manifest);
    info!("Manifest lists {} member file(s)", members.len());

    for member in &members {
        fetcher
            .fetch(&member_url(snapshots_url, member)?, &staging.join(member))
            .await?;
    }

    Ok(staging)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::ScriptedFetcher;
    use tempfile::TempDir;

    #[test]
    fn members_follow_order_of_appearance() {
        let manifest = "SHA256 (bsd) = aa\nSHA256 (bsd.rd) = bb\nSHA256 (base77.tgz) = cc\n";
        assert_eq!(manifest_members(manifest), ["bsd", "bsd.rd", "base77.tgz"]);
    }

    #[test]
    fn duplicate_members_are_kept() {
        let manifest = "(x.tgz)\n(y.tgz)\n(x.tgz)\n";
        assert_eq!(manifest_members(manifest), ["x.tgz", "y.tgz", "x.tgz"]);
    }

    #[test]
    fn text_without_parentheses_yields_no_members() {
        assert!(manifest_members("untrusted comment: nothing here\n").is_empty());
    }

    #[tokio::test]
    async fn fetches_every_member_in_manifest_order() {
        let manifest = "SHA256 (bsd.rd) = aa\nSHA256 (base77.tgz) = bb\nSHA256 (bsd.rd) = aa\n";
        let fetcher = ScriptedFetcher::with_files(&[
            (MANIFEST_FILE, manifest.as_bytes()),
            ("bsd.rd", b"ramdisk"),
            ("base77.tgz", b"base set"),
        ]);
        let staging = TempDir::new().unwrap();
        let url = Url::parse("http://mirror.test/snapshots/amd64/").unwrap();

        let snapshot = acquire(&fetcher, &url, staging.path()).await.unwrap();

        // duplicates in the manifest trigger duplicate fetch attempts
        assert_eq!(
            fetcher.fetched(),
            [MANIFEST_FILE, "bsd.rd", "base77.tgz", "bsd.rd"]
        );
        assert!(snapshot.join(MANIFEST_FILE).exists());
        assert!(snapshot.join("bsd.rd").exists());
        assert!(snapshot.join("base77.tgz").exists());
    }
}
