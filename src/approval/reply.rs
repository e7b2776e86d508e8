//! Email reply interpretation.
//!
//! A reply approves or rejects an article either with an explicit code
//! (`#3FA2C1-APPR`, `#3FA2C1-REJ`) or with a plain keyword such as
//! "godkendt" or "reject". Quoted lines are ignored, since replies usually
//! quote the request, which lists both codes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::integrations::InboundReply;

static CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)#?\b([0-9a-f]{6})-(APPR|REJ)\b").unwrap());

const APPROVE_KEYWORDS: &[&str] =
    &["godkend", "godkendt", "godkender", "approve", "approved", "accept", "ok", "ja", "yes"];

const REJECT_KEYWORDS: &[&str] = &["afvis", "afvist", "afviser", "reject", "rejected", "decline", "nej", "no"];

/// Decision expressed by a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyAction {
    /// Approve the article
    Approve,
    /// Reject the article
    Reject,
    /// No recognizable decision
    Unknown,
}

impl ReplyAction {
    /// Get the display name for this action.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ReplyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Drop quoted lines (`> ...`) from a message body.
fn strip_quotes(body: &str) -> String {
    body.lines().filter(|l| !l.trim_start().starts_with('>')).collect::<Vec<_>>().join("\n")
}

fn reply_text(subject: &str, body: &str) -> String {
    format!("{subject} {}", strip_quotes(body))
}

/// First decision code in the text: `(id, action)`.
fn find_code(text: &str) -> Option<(String, ReplyAction)> {
    let caps = CODE_PATTERN.captures(text)?;
    let id = format!("#{}", caps[1].to_ascii_uppercase());
    let action = if caps[2].eq_ignore_ascii_case("APPR") { ReplyAction::Approve } else { ReplyAction::Reject };
    Some((id, action))
}

/// Work out the decision in a reply.
///
/// Codes win over keywords; approve keywords are checked before reject
/// keywords. Keywords only match whole words.
pub fn detect_action(subject: &str, body: &str) -> ReplyAction {
    let text = reply_text(subject, body);
    if let Some((_, action)) = find_code(&text) {
        return action;
    }

    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let has_any = |keywords: &[&str]| words.iter().any(|w| keywords.contains(&w.as_str()));

    if has_any(APPROVE_KEYWORDS) {
        ReplyAction::Approve
    } else if has_any(REJECT_KEYWORDS) {
        ReplyAction::Reject
    } else {
        ReplyAction::Unknown
    }
}

/// Find the article a reply refers to.
///
/// The ID header is used verbatim when present; otherwise the ID is taken
/// from a decision code in the text.
pub fn resolve_article_id(reply: &InboundReply) -> Option<String> {
    if let Some(header) = reply.article_id_header.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
        return Some(header.to_string());
    }
    find_code(&reply_text(&reply.subject, &reply.body)).map(|(id, _)| id)
}
