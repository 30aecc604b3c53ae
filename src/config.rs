//! Configuration management for the agent.
//!
//! Loads configuration from a TOML file; command-line flags override
//! individual settings. Every path is threaded explicitly through the
//! components — there is no ambient working-directory state.

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::utils::errors::{AgentError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Mirror base URL; when unset, read from the install-url file.
    #[serde(default)]
    pub url: Option<String>,

    /// File naming the preferred mirror, one URL on the first line.
    #[serde(default = "default_install_url_file")]
    pub install_url_file: PathBuf,

    /// Project website for the document topics.
    #[serde(default = "default_website")]
    pub website: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for cached documents and the snapshots tree.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Root of the live filesystem holding the running boot image.
    #[serde(default = "default_system_root")]
    pub system_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Directory holding one public key per release.
    #[serde(default = "default_key_dir")]
    pub key_dir: PathBuf,

    /// Wait between the two verification passes of the integrity gate.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_install_url_file() -> PathBuf {
    PathBuf::from("/etc/installurl")
}

fn default_website() -> String {
    "https://www.openbsd.org/".to_string()
}

fn default_work_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("obsd"))
        .unwrap_or_else(|| PathBuf::from("obsd"))
}

fn default_system_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_key_dir() -> PathBuf {
    PathBuf::from("/etc/signify")
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            url: None,
            install_url_file: default_install_url_file(),
            website: default_website(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            system_root: default_system_root(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            key_dir: default_key_dir(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|err| AgentError::Config(format!("{}: {err}", path.display())))
    }

    /// Resolve the mirror base URL: an explicit override wins, then the
    /// config file, then the install-url file. A missing or empty
    /// install-url file with no override is a fatal configuration error.
    pub fn resolve_mirror(&self, override_url: Option<&str>) -> Result<Url> {
        let raw = match override_url.or(self.mirror.url.as_deref()) {
            Some(url) => url.trim().to_string(),
            None => {
                let file = &self.mirror.install_url_file;
                let content = std::fs::read_to_string(file).map_err(|_| {
                    AgentError::Config(format!(
                        "no mirror configured and {} is not readable",
                        file.display()
                    ))
                })?;
                let line = content.lines().next().unwrap_or("").trim();
                if line.is_empty() {
                    return Err(AgentError::Config(format!("{} is empty", file.display())));
                }
                line.to_string()
            }
        };

        // a trailing slash keeps relative joins inside the mirror tree
        let raw = if raw.ends_with('/') { raw } else { format!("{raw}/") };
        Url::parse(&raw).map_err(|err| AgentError::Config(format!("invalid mirror URL {raw}: {err}")))
    }
}

/// Architecture and release of the running system, from uname. The release
/// keeps only its digits ("7.7" becomes "77"), matching the naming of
/// errata pages and verification keys.
pub fn machine_identity() -> Result<(String, String)> {
    let uts = nix::sys::utsname::uname()
        .map_err(|err| AgentError::Config(format!("uname failed: {err}")))?;
    let arch = uts.machine().to_string_lossy().into_owned();
    let release = uts.release().to_string_lossy().replace('.', "");
    Ok((arch, release))
}

/// Every URL the agent talks to, derived once from the mirror, the website
/// and the machine identity.
#[derive(Debug, Clone)]
pub struct SiteUrls {
    /// Mirror directory holding the snapshot set for this architecture.
    pub snapshots: Url,
    /// Build manifest whose changes drive the snapshot pipeline.
    pub buildinfo: Url,
    pub packages_index: Url,
    pub changelog: Url,
    pub errata: Url,
    pub events: Url,
    pub hackathons: Url,
    pub innovations: Url,
    pub current_faq: Url,
}

impl SiteUrls {
    pub fn build(mirror: &Url, website: &str, arch: &str, release: &str) -> Result<Self> {
        let website = Url::parse(website)
            .map_err(|err| AgentError::Config(format!("invalid website URL {website}: {err}")))?;
        let snapshots = join(mirror, &format!("snapshots/{arch}/"))?;
        let packages_dir = join(mirror, &format!("snapshots/packages/{arch}/"))?;

        Ok(Self {
            buildinfo: join(&snapshots, "BUILDINFO")?,
            packages_index: join(&packages_dir, "index.txt")?,
            changelog: join(mirror, "Changelogs/ChangeLog")?,
            errata: join(&website, &format!("errata{release}.html"))?,
            events: join(&website, "events.html")?,
            hackathons: join(&website, "hackathons.html")?,
            innovations: join(&website, "innovations.html")?,
            current_faq: join(&website, "faq/current.html")?,
            snapshots,
        })
    }
}

fn join(base: &Url, relative: &str) -> Result<Url> {
    base.join(relative).map_err(|err| {
        AgentError::Config(format!("cannot resolve {relative} against {base}: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn override_mirror_wins_and_gains_a_trailing_slash() {
        let config = Config::default();
        let url = config
            .resolve_mirror(Some("https://cdn.openbsd.org/pub/OpenBSD"))
            .unwrap();
        assert_eq!(url.as_str(), "https://cdn.openbsd.org/pub/OpenBSD/");
    }

    #[test]
    fn mirror_comes_from_install_url_file() {
        let dir = TempDir::new().unwrap();
        let installurl = dir.path().join("installurl");
        fs::write(&installurl, "https://ftp.hostserver.de/pub/OpenBSD\n").unwrap();

        let mut config = Config::default();
        config.mirror.install_url_file = installurl;

        let url = config.resolve_mirror(None).unwrap();
        assert_eq!(url.as_str(), "https://ftp.hostserver.de/pub/OpenBSD/");
    }

    #[test]
    fn empty_install_url_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let installurl = dir.path().join("installurl");
        fs::write(&installurl, "\n").unwrap();

        let mut config = Config::default();
        config.mirror.install_url_file = installurl;

        assert!(matches!(
            config.resolve_mirror(None),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn missing_install_url_file_is_fatal() {
        let mut config = Config::default();
        config.mirror.install_url_file = PathBuf::from("/nonexistent/installurl");

        assert!(matches!(
            config.resolve_mirror(None),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn site_urls_embed_arch_and_release() {
        let mirror = Url::parse("https://cdn.openbsd.org/pub/OpenBSD/").unwrap();
        let site = SiteUrls::build(&mirror, "https://www.openbsd.org/", "arm64", "76").unwrap();

        assert_eq!(
            site.snapshots.as_str(),
            "https://cdn.openbsd.org/pub/OpenBSD/snapshots/arm64/"
        );
        assert_eq!(
            site.buildinfo.as_str(),
            "https://cdn.openbsd.org/pub/OpenBSD/snapshots/arm64/BUILDINFO"
        );
        assert_eq!(site.errata.as_str(), "https://www.openbsd.org/errata76.html");
        assert_eq!(
            site.changelog.as_str(),
            "https://cdn.openbsd.org/pub/OpenBSD/Changelogs/ChangeLog"
        );
    }

    #[test]
    fn config_file_overrides_defaults_per_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.toml");
        fs::write(
            &path,
            "[verify]\ncooldown_secs = 5\n\n[log]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.verify.cooldown_secs, 5);
        assert_eq!(config.log.level, "debug");
        // untouched sections keep their defaults
        assert_eq!(config.verify.key_dir, PathBuf::from("/etc/signify"));
        assert_eq!(config.paths.system_root, PathBuf::from("/"));
    }
}
