//! MIME handling for fetched messages

use crate::error::Result;
use mailparse::{MailHeaderMap, ParsedMail};

/// The parts of a fetched message the pipeline cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContent {
    /// Decoded subject line, if present
    pub subject: Option<String>,
    /// Body of the first `text/html` part, transfer-decoded
    pub html: Option<String>,
}

/// Parse a raw RFC 822 message.
///
/// Parts are visited depth-first in document order, root included; the first
/// `text/html` part wins and later ones are ignored.
///
/// # Errors
///
/// Returns [`crate::Error::MessageParse`] if the MIME structure is unreadable.
pub fn parse_message(raw: &[u8]) -> Result<MessageContent> {
    let parsed = mailparse::parse_mail(raw)?;

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let html = match first_html_part(&parsed) {
        Some(part) => Some(part.get_body()?),
        None => None,
    };

    Ok(MessageContent { subject, html })
}

fn first_html_part<'m, 'a>(mail: &'m ParsedMail<'a>) -> Option<&'m ParsedMail<'a>> {
    if mail.ctype.mimetype.eq_ignore_ascii_case("text/html") {
        return Some(mail);
    }
    mail.subparts.iter().find_map(|part| first_html_part(part))
}
