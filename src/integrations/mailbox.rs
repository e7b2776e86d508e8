//! Inbound approval replies.
//!
//! Replies are read from a Maildir that any fetcher (fetchmail, mbsync,
//! a local MTA) keeps filled. Consumed messages are moved from `new/` to
//! `cur/` and marked seen.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use once_cell::sync::Lazy;
use regex::Regex;

use super::notifications::ARTICLE_ID_HEADER;
use crate::core::Result;

/// A reply received from the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundReply {
    /// Message-ID header, if any
    pub message_id: Option<String>,

    /// Subject line
    pub subject: String,

    /// Message body
    pub body: String,

    /// Value of the article ID header, if the mail client kept it
    pub article_id_header: Option<String>,
}

/// Source of inbound replies.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Fetch new replies and mark them consumed.
    async fn fetch_replies(&self) -> Result<Vec<InboundReply>>;
}

/// Reads replies from a Maildir.
#[derive(Debug, Clone)]
pub struct MaildirMailbox {
    root: PathBuf,
}

impl MaildirMailbox {
    /// Create a mailbox rooted at a Maildir directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create `new/`, `cur/` and `tmp/` if missing.
    pub fn ensure_layout(&self) -> Result<()> {
        for sub in ["new", "cur", "tmp"] {
            std::fs::create_dir_all(self.root.join(sub))?;
        }
        Ok(())
    }

    fn consume(&self, path: &Path) -> Result<()> {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            std::fs::remove_file(path)?;
            return Ok(());
        };
        let base = name.split(":2,").next().unwrap_or(name);
        std::fs::rename(path, self.root.join("cur").join(format!("{base}:2,S")))?;
        Ok(())
    }
}

#[async_trait]
impl Mailbox for MaildirMailbox {
    async fn fetch_replies(&self) -> Result<Vec<InboundReply>> {
        let new_dir = self.root.join("new");
        if !new_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&new_dir)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut replies = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = match std::fs::read(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read mail");
                    continue;
                }
            };
            match parse_message(&raw) {
                Ok(reply) => replies.push(reply),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Discarding unparseable mail"),
            }
            self.consume(&path)?;
        }

        if !replies.is_empty() {
            tracing::debug!(count = replies.len(), "Fetched replies");
        }
        Ok(replies)
    }
}

/// Parse a raw RFC 5322 message into the fields needed for reply handling.
///
/// Headers are unfolded and RFC 2047 decoded. The body is the decoded
/// `text/plain` part; an HTML-only reply is reduced to text with quoted
/// `<blockquote>` sections removed.
pub fn parse_message(raw: &[u8]) -> Result<InboundReply> {
    let mail = mailparse::parse_mail(raw)?;
    let headers = mail.get_headers();
    let header = |name: &str| headers.get_first_value(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    Ok(InboundReply {
        message_id: header("Message-ID"),
        subject: header("Subject").unwrap_or_default(),
        body: reply_text(&mail)?.replace("\r\n", "\n"),
        article_id_header: header(ARTICLE_ID_HEADER),
    })
}

fn reply_text(mail: &ParsedMail<'_>) -> Result<String> {
    if let Some(plain) = find_part(mail, "text/plain") {
        return Ok(plain.get_body()?);
    }
    if let Some(html) = find_part(mail, "text/html") {
        return Ok(html_to_text(&html.get_body()?));
    }
    Ok(String::new())
}

/// First inline leaf part of a MIME type, depth first.
fn find_part<'a>(mail: &'a ParsedMail<'a>, mimetype: &str) -> Option<&'a ParsedMail<'a>> {
    if mail.subparts.is_empty() {
        let inline = mail.get_content_disposition().disposition != DispositionType::Attachment;
        return (inline && mail.ctype.mimetype.eq_ignore_ascii_case(mimetype)).then_some(mail);
    }
    mail.subparts.iter().find_map(|part| find_part(part, mimetype))
}

static HIDDEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>|<script\b.*?</script\s*>|<head\b.*?</head\s*>").unwrap());
static BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</p\s*>|</div\s*>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Reduce an HTML reply to its own text.
fn html_to_text(html: &str) -> String {
    let html = strip_blockquotes(html);
    let html = HIDDEN_RE.replace_all(&html, "");
    let html = BREAK_RE.replace_all(&html, "\n");
    let text = TAG_RE.replace_all(&html, "");
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Remove `<blockquote>` sections, nested ones included.
fn strip_blockquotes(html: &str) -> String {
    const OPEN: &str = "<blockquote";
    const CLOSE: &str = "</blockquote";

    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut depth = 0usize;
    let mut pos = 0;

    while pos < html.len() {
        let next_open = lower[pos..].find(OPEN).map(|i| i + pos);
        let next_close = lower[pos..].find(CLOSE).map(|i| i + pos);

        let (at, opening) = match (next_open, next_close) {
            (Some(o), Some(c)) if o < c => (o, true),
            (_, Some(c)) => (c, false),
            (Some(o), None) => (o, true),
            (None, None) => {
                if depth == 0 {
                    out.push_str(&html[pos..]);
                }
                break;
            }
        };

        if depth == 0 {
            out.push_str(&html[pos..at]);
        }
        let tag_end = lower[at..].find('>').map_or(html.len(), |i| at + i + 1);
        if opening {
            depth += 1;
        } else {
            depth = depth.saturating_sub(1);
        }
        pos = tag_end;
    }
    out
}
