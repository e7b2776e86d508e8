//! Approval notifications.
//!
//! Tells the editor that an article is waiting for a decision, via ntfy push
//! messages and/or email, and clears those notifications once decided.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose;
use base64::Engine;
use serde::Serialize;

use crate::core::{Config, EmailConfig, Error, NtfyConfig, Result};
use crate::publish::ProcessRunner;

/// Header carrying the article ID on approval emails.
pub const ARTICLE_ID_HEADER: &str = "X-Folio-Article-ID";

/// Everything a notifier needs to ask for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    /// Article ID, e.g. `#3FA2C1`
    pub id: String,

    /// Article title
    pub title: String,

    /// Article author
    pub author: String,

    /// Link to the rendered preview
    pub preview_url: String,

    /// Link to the decision page
    pub decision_url: String,
}

impl ApprovalRequest {
    /// Reply code that approves the article.
    pub fn approve_code(&self) -> String {
        format!("{}-APPR", self.id)
    }

    /// Reply code that rejects the article.
    pub fn reject_code(&self) -> String {
        format!("{}-REJ", self.id)
    }
}

/// A channel that can ask the editor for a decision.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs.
    fn name(&self) -> &str;

    /// Send an approval request.
    async fn notify_approval(&self, request: &ApprovalRequest) -> Result<()>;

    /// Withdraw notifications about an article once it has been decided.
    async fn clear(&self, id: &str) -> Result<()>;
}

/// ntfy action button.
#[derive(Debug, Serialize)]
struct NtfyAction<'a> {
    action: &'static str,
    label: &'a str,
    url: &'a str,
}

/// Push notifications through an ntfy server.
#[derive(Debug, Clone)]
pub struct NtfyNotifier {
    config: NtfyConfig,
    client: reqwest::Client,
}

impl NtfyNotifier {
    /// Create a new ntfy notifier.
    pub fn new(config: NtfyConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("folio/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, client })
    }

    fn topic_url(&self) -> String {
        format!("{}/{}", self.config.server.trim_end_matches('/'), self.config.topic)
    }

    fn actions_header(request: &ApprovalRequest) -> Result<String> {
        let actions = [NtfyAction { action: "view", label: "Review article", url: &request.decision_url }];
        Ok(serde_json::to_string(&actions)?)
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    fn name(&self) -> &str {
        "ntfy"
    }

    async fn notify_approval(&self, request: &ApprovalRequest) -> Result<()> {
        let response = self
            .client
            .post(self.topic_url())
            .header("Title", format!("New article: {}", request.title))
            .header("Priority", self.config.priority.to_string())
            .header("Tags", "newspaper")
            .header("Actions", Self::actions_header(request)?)
            .body(format!("By {}\n\nTap to approve or reject ({})", request.author, request.id))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!("ntfy returned status {}", response.status().as_u16())));
        }

        tracing::info!(id = %request.id, topic = %self.config.topic, "ntfy notification sent");
        Ok(())
    }

    async fn clear(&self, id: &str) -> Result<()> {
        let response = self.client.delete(self.topic_url()).send().await?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!("ntfy DELETE returned status {}", response.status().as_u16())));
        }
        tracing::debug!(id, "Cleared ntfy notifications");
        Ok(())
    }
}

/// Approval emails handed to a sendmail-compatible command.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    config: EmailConfig,
    runner: ProcessRunner,
}

impl EmailNotifier {
    /// Create a new email notifier.
    pub fn new(config: EmailConfig, timeout: Duration) -> Self {
        Self { config, runner: ProcessRunner::new(timeout) }
    }

    /// Render the complete RFC 5322 message.
    pub fn render_message(&self, request: &ApprovalRequest) -> String {
        let date = chrono::Local::now().to_rfc2822();
        let body = render_email_body(request);
        format!(
            "From: {from}\r\nTo: {to}\r\nSubject: {subject}\r\nDate: {date}\r\n{header}: {id}\r\nMIME-Version: 1.0\r\nContent-Type: text/html; charset=UTF-8\r\n\r\n{body}",
            from = single_line(&self.config.from),
            to = single_line(&self.config.to),
            subject = encode_header_text(&format!("Article for approval: {}", request.title)),
            header = ARTICLE_ID_HEADER,
            id = request.id,
        )
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify_approval(&self, request: &ApprovalRequest) -> Result<()> {
        let (program, args) = self
            .config
            .sendmail
            .split_first()
            .ok_or_else(|| Error::Config("email.sendmail must name a command".to_string()))?;

        let message = self.render_message(request);
        self.runner.check_with_input(program, args, message.as_bytes()).await?;

        tracing::info!(id = %request.id, to = %self.config.to, "Approval email sent");
        Ok(())
    }

    async fn clear(&self, _id: &str) -> Result<()> {
        // Sent mail cannot be withdrawn.
        Ok(())
    }
}

/// Collapse line breaks so a value cannot start a new header.
fn single_line(value: &str) -> String {
    value.split(['\r', '\n']).filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Encode header text per RFC 2047 when it is not plain ASCII.
///
/// Non-ASCII text becomes UTF-8 base64 encoded-words of at most 45 input
/// bytes each, folded onto continuation lines.
pub fn encode_header_text(value: &str) -> String {
    let value = single_line(value);
    if value.is_ascii() {
        return value;
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > 45 {
            words.push(std::mem::take(&mut chunk));
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(chunk);
    }

    words
        .iter()
        .map(|w| format!("=?UTF-8?B?{}?=", general_purpose::STANDARD.encode(w.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Fans out to several channels.
///
/// Delivery succeeds when at least one channel delivers.
#[derive(Default)]
pub struct CompositeNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl CompositeNotifier {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel.
    #[must_use]
    pub fn with(mut self, channel: Box<dyn Notifier>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Build the channels enabled in the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut composite = Self::new();
        if config.ntfy.enabled {
            composite = composite.with(Box::new(NtfyNotifier::new(config.ntfy.clone(), config.timeouts.network())?));
        }
        if config.email.enabled {
            composite = composite.with(Box::new(EmailNotifier::new(config.email.clone(), config.timeouts.network())));
        }
        Ok(composite)
    }

    /// Number of configured channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel is configured.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    fn name(&self) -> &str {
        "composite"
    }

    async fn notify_approval(&self, request: &ApprovalRequest) -> Result<()> {
        if self.channels.is_empty() {
            tracing::warn!(id = %request.id, "No notification channel enabled; approval request only visible in the web UI");
            return Ok(());
        }

        let mut last_error = None;
        let mut delivered = 0;
        for channel in &self.channels {
            match channel.notify_approval(request).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(channel = channel.name(), id = %request.id, error = %e, "Notification failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(()),
        }
    }

    async fn clear(&self, id: &str) -> Result<()> {
        let mut first_error = None;
        for channel in &self.channels {
            if let Err(e) = channel.clear(id).await {
                tracing::warn!(channel = channel.name(), id, error = %e, "Failed to clear notification");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// HTML body of the approval email.
fn render_email_body(request: &ApprovalRequest) -> String {
    let title = html_escape(&request.title);
    let author = html_escape(&request.author);
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>Approve: {title}</title></head>
<body style="font-family: sans-serif; background: #f5f5f5;">
<div style="max-width: 600px; margin: 40px auto; background: white; padding: 30px; border-radius: 8px;">
<h1 style="margin: 0;">{title}</h1>
<p style="color: #666;">By {author} &middot; Article ID {id}</p>
<p><a href="{preview}">Open the preview</a> or <a href="{decision}">decide in the browser</a>.</p>
<p>Or reply to this email with one of these codes:</p>
<p><code style="color: #28a745; font-size: 20px;">{approve}</code> to approve</p>
<p><code style="color: #dc3545; font-size: 20px;">{reject}</code> to reject</p>
<p style="color: #888; font-size: 12px;">A reply saying APPROVE/GODKEND or REJECT/AFVIS also works.</p>
</div>
</body>
</html>
"#,
        id = request.id,
        preview = html_escape(&request.preview_url),
        decision = html_escape(&request.decision_url),
        approve = request.approve_code(),
        reject = request.reject_code(),
    )
}

/// Escape text for inclusion in HTML.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
