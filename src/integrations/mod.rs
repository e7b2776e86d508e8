//! External integrations module.
//!
//! Provides the notification channels used to ask for approval and the
//! mailbox that replies arrive in.

pub mod mailbox;
pub mod notifications;

pub use mailbox::{parse_message, InboundReply, Mailbox, MaildirMailbox};
pub use notifications::{
    html_escape, ApprovalRequest, CompositeNotifier, EmailNotifier, Notifier, NtfyNotifier,
    ARTICLE_ID_HEADER,
};
