//! User feedback fan-out: console, desktop notification, local mail.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

use crate::checks::Urgency;

/// Which sinks a report goes to. Sink failures are logged, never fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Feedback {
    pub console: bool,
    pub desktop: bool,
    pub mail: bool,
}

impl Feedback {
    pub async fn send(&self, title: &str, body: &str, urgency: Urgency) {
        if self.console {
            println!("{body}");
        }
        if self.desktop {
            if let Err(err) = notify(title, body, urgency).await {
                warn!("notify-send failed: {err}");
            }
        }
        if self.mail {
            if let Err(err) = mail(title, body).await {
                warn!("mail failed: {err}");
            }
        }
    }
}

/// Desktop notification via notify-send, skipped when it is not installed.
async fn notify(title: &str, body: &str, urgency: Urgency) -> std::io::Result<()> {
    if which::which("notify-send").is_err() {
        return Ok(());
    }
    Command::new("notify-send")
        .args(["-a", title, "-u", urgency.as_str(), body])
        .status()
        .await?;
    Ok(())
}

/// Local mail to the invoking user, body on stdin.
async fn mail(subject: &str, body: &str) -> std::io::Result<()> {
    let user = std::env::var("USER").unwrap_or_else(|_| "root".to_string());

    let mut child = Command::new("mail")
        .args(["-s", subject, &user])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(body.as_bytes()).await?;
    }
    child.wait().await?;
    Ok(())
}
