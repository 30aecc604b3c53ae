//! Signature verification via signify.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::acquire::MANIFEST_FILE;
use crate::utils::errors::{AgentError, Result};

/// Outcome of one verifier run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Tool exited successfully and no member was reported failed.
    pub passed: bool,
    /// Members reported failed, in the tool's own output order.
    pub failed: Vec<String>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            failed: Vec::new(),
        }
    }

    pub fn fail(members: &[&str]) -> Self {
        Self {
            passed: false,
            failed: members.iter().map(|member| member.to_string()).collect(),
        }
    }
}

/// Checks a snapshot, or a single member of it, against its signed manifest.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, snapshot: &Path, member: Option<&str>) -> Result<Verdict>;
}

/// Verifier backed by the external `signify(1)` tool.
pub struct SignifyVerifier {
    key_dir: PathBuf,
}

impl SignifyVerifier {
    pub fn new(key_dir: PathBuf) -> Self {
        Self { key_dir }
    }

    /// Public key matching the snapshot's release, selected purely from the
    /// base archive's filename.
    fn key_path(&self, snapshot: &Path) -> Result<PathBuf> {
        let token = release_token(snapshot)?;
        Ok(self.key_dir.join(format!("openbsd-{token}-base.pub")))
    }
}

#[async_trait]
impl Verifier for SignifyVerifier {
    async fn verify(&self, snapshot: &Path, member: Option<&str>) -> Result<Verdict> {
        let key = self.key_path(snapshot)?;

        let mut command = Command::new("signify");
        command
            .arg("-C")
            .arg("-p")
            .arg(&key)
            .arg("-x")
            .arg(MANIFEST_FILE)
            .current_dir(snapshot);
        if let Some(member) = member {
            command.arg(member);
        }

        let output = command
            .output()
            .await
            .map_err(|err| AgentError::SignatureTool(format!("signify: {err}")))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let failed = failed_members(&combined);
        debug!(
            "signify exited {:?}, {} member(s) failed",
            output.status.code(),
            failed.len()
        );

        // A FAIL line is authoritative even when the tool exits 0; truncated
        // output can produce the opposite disagreement as well.
        Ok(Verdict {
            passed: output.status.success() && failed.is_empty(),
            failed,
        })
    }
}

/// Members named by output lines ending in the FAIL marker, in output order.
pub fn failed_members(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.ends_with("FAIL"))
        .map(|line| line.split(':').next().unwrap_or(line).to_string())
        .collect()
}

/// Release version token from the snapshot's base archive filename.
///
/// Exactly one `base<version>.tgz` member is expected per snapshot; none
/// matching is a fatal configuration error for the snapshot.
pub fn release_token(snapshot: &Path) -> Result<String> {
    let mut archives: Vec<String> = std::fs::read_dir(snapshot)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("base") && name.ends_with(".tgz"))
        .collect();
    archives.sort();

    let Some(name) = archives.into_iter().next() else {
        return Err(AgentError::Config(format!(
            "no base archive found in {}",
            snapshot.display()
        )));
    };

    name.strip_prefix("base")
        .and_then(|rest| rest.strip_suffix(".tgz"))
        .map(str::to_string)
        .ok_or_else(|| AgentError::Config(format!("malformed base archive name: {name}")))
}
