use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::DiscordConfig;
use crate::error::{Error, Result};
use crate::render::RenderedReport;
use crate::wiki::is_retryable;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;
/// Discord shows a typing indicator for ~10 seconds per trigger.
const TYPING_REFRESH: Duration = Duration::from_secs(8);
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub color: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub content: String,
    pub embed: Embed,
}

impl From<RenderedReport> for Message {
    fn from(report: RenderedReport) -> Self {
        Self {
            content: report.summary_line,
            embed: Embed {
                color: report.color,
                description: report.body,
            },
        }
    }
}

/// Keeps a "working on it" indicator alive until dropped.
pub struct TypingGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl TypingGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

pub trait Delivery {
    /// Post a message with one embed to `channel`.
    fn send(&self, channel: &str, message: &Message) -> Result<()>;

    /// Show a typing indicator in `channel` until the guard is dropped.
    fn start_typing(&self, channel: &str) -> TypingGuard;
}

impl<T: Delivery + ?Sized> Delivery for &T {
    fn send(&self, channel: &str, message: &Message) -> Result<()> {
        (**self).send(channel, message)
    }

    fn start_typing(&self, channel: &str) -> TypingGuard {
        (**self).start_typing(channel)
    }
}

// ---------------------------------------------------------------------------
// Discord
// ---------------------------------------------------------------------------

/// Resolve the bot token: env var first, then the configured token file.
pub fn resolve_token(config: &DiscordConfig) -> Result<String> {
    if let Ok(token) = std::env::var(&config.token_env)
        && !token.trim().is_empty()
    {
        return Ok(token.trim().to_string());
    }

    if let Some(path) = &config.token_file {
        return read_token_file(path);
    }

    Err(Error::Delivery(format!(
        "Discord token not found in ${} and no token_file configured",
        config.token_env
    )))
}

fn read_token_file(path: &Path) -> Result<String> {
    let token = std::fs::read_to_string(path).map_err(|e| {
        Error::Delivery(format!("failed to read token file {}: {e}", path.display()))
    })?;
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::Delivery(format!(
            "token file {} is empty",
            path.display()
        )));
    }
    debug!(path = %path.display(), "using Discord token from file");
    Ok(token.to_string())
}

/// Posts reports through the Discord REST API.
pub struct DiscordDelivery {
    agent: ureq::Agent,
    api_base: String,
    token: String,
}

impl DiscordDelivery {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        let token = resolve_token(config)?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build();
        Ok(Self {
            agent,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token)
    }
}

pub fn message_payload(message: &Message) -> serde_json::Value {
    serde_json::json!({
        "content": message.content,
        "embeds": [{
            "color": message.embed.color,
            "description": message.embed.description,
        }],
    })
}

impl Delivery for DiscordDelivery {
    fn send(&self, channel: &str, message: &Message) -> Result<()> {
        let url = format!("{}/channels/{channel}/messages", self.api_base);
        let body = message_payload(message);

        let mut backoff_ms = INITIAL_BACKOFF_MS;
        for attempt in 1..=MAX_RETRIES {
            match self
                .agent
                .post(&url)
                .set("Authorization", &self.authorization())
                .send_json(&body)
            {
                Ok(_) => {
                    info!(channel, "report delivered");
                    return Ok(());
                }
                Err(ref e) if attempt < MAX_RETRIES && is_retryable(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        backoff_ms,
                        "retrying Discord send after transient error"
                    );
                    thread::sleep(Duration::from_millis(backoff_ms));
                    backoff_ms *= 2;
                }
                Err(e) => {
                    return Err(Error::Delivery(format!(
                        "failed to send to channel {channel}: {e}"
                    )));
                }
            }
        }
        unreachable!()
    }

    fn start_typing(&self, channel: &str) -> TypingGuard {
        let agent = self.agent.clone();
        let url = format!("{}/channels/{channel}/typing", self.api_base);
        let authorization = self.authorization();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        thread::spawn(move || {
            loop {
                if let Err(e) = agent
                    .post(&url)
                    .set("Authorization", &authorization)
                    .call()
                {
                    // Cosmetic only; the report is still sent.
                    debug!(error = %e, "typing indicator request failed");
                }
                match stop_rx.recv_timeout(TYPING_REFRESH) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        // The refresher is detached: a request in flight finishes on its own
        // and the loop exits at the next stop check.
        TypingGuard::new(move || {
            let _ = stop_tx.send(());
        })
    }
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// Prints reports to stdout instead of sending them.
#[derive(Default)]
pub struct DryRunDelivery;

impl DryRunDelivery {
    pub fn new() -> Self {
        Self
    }
}

pub fn format_dry_run(channel: &str, message: &Message) -> String {
    format!(
        "=== channel {channel} (color {}) ===\n{}\n\n{}\n",
        message.embed.color, message.content, message.embed.description
    )
}

impl Delivery for DryRunDelivery {
    fn send(&self, channel: &str, message: &Message) -> Result<()> {
        println!("{}", format_dry_run(channel, message));
        Ok(())
    }

    fn start_typing(&self, _channel: &str) -> TypingGuard {
        TypingGuard::noop()
    }
}

pub enum AnyDelivery {
    Discord(DiscordDelivery),
    DryRun(DryRunDelivery),
}

impl Delivery for AnyDelivery {
    fn send(&self, channel: &str, message: &Message) -> Result<()> {
        match self {
            AnyDelivery::Discord(d) => d.send(channel, message),
            AnyDelivery::DryRun(d) => d.send(channel, message),
        }
    }

    fn start_typing(&self, channel: &str) -> TypingGuard {
        match self {
            AnyDelivery::Discord(d) => d.start_typing(channel),
            AnyDelivery::DryRun(d) => d.start_typing(channel),
        }
    }
}
