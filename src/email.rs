use chrono::{DateTime, FixedOffset, Utc};
use mail_parser::{Addr, Address, MessageParser, MimeHeaders};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Metadata of an attachment. The content itself is not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub message_id: String,
    pub user: String,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    /// Date header of the email, or modification time of the file if the
    /// header is missing or invalid.
    pub date: DateTime<FixedOffset>,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0:?} is not a parsable email")]
    Malformed(PathBuf),
}

pub trait EmailParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Email, ParseError>;
}

/// Parses raw RFC 5322 files with `mail_parser`, attributing every email to
/// the given user.
pub struct MailParser {
    user: String,
}

impl MailParser {
    pub fn new(user: impl Into<String>) -> Self {
        MailParser { user: user.into() }
    }
}

impl EmailParser for MailParser {
    fn parse(&self, path: &Path) -> Result<Email, ParseError> {
        let io_err = |source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        };
        let raw = fs::read(path).map_err(io_err)?;
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(io_err)?;

        let message = MessageParser::default()
            .parse(&raw[..])
            .ok_or_else(|| ParseError::Malformed(path.to_path_buf()))?;

        let date = message
            .header_raw("Date")
            .and_then(parse_date)
            .unwrap_or_else(|| DateTime::<Utc>::from(modified).fixed_offset());

        let attachments = message
            .attachments()
            .map(|part| Attachment {
                filename: part.attachment_name().unwrap_or_default().to_string(),
                content_type: part
                    .content_type()
                    .map(|ct| match ct.subtype() {
                        Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                        None => ct.ctype().to_string(),
                    })
                    .unwrap_or_default(),
                size: part.contents().len(),
            })
            .collect();

        Ok(Email {
            message_id: message.message_id().unwrap_or_default().to_string(),
            user: self.user.clone(),
            subject: message.subject().unwrap_or_default().to_string(),
            from: address_list(message.from()).into_iter().next().unwrap_or_default(),
            to: address_list(message.to()),
            date,
            body: message
                .body_text(0)
                .map(|body| body.into_owned())
                .unwrap_or_default(),
            attachments,
        })
    }
}

fn normalize_date(raw: &str) -> String {
    let mut dt = raw.trim();
    // Trailing commentary timezone info is not recognized.
    if dt.ends_with(')') {
        if let Some(pos) = dt.rfind('(') {
            dt = &dt[..pos];
        }
    }
    // The day of week is not checked against the date.
    if let Some(pos) = dt.find(',') {
        dt = &dt[pos + 1..];
    }
    // Folded headers span lines.
    let dt = dt.split_whitespace().collect::<Vec<_>>().join(" ");
    // -0000 timezone cannot be parsed. Let's just treat it as +0000.
    match dt.strip_suffix("-0000") {
        Some(rest) => format!("{}+0000", rest),
        None => dt,
    }
}

/// Parses a raw Date header, rejecting out of range fields and unknown
/// month names rather than guessing.
fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(&normalize_date(raw)).ok()
}

fn format_addr(addr: &Addr) -> Option<String> {
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) => Some(format!("{} <{}>", name, address)),
        (None, Some(address)) => Some(address.to_string()),
        (Some(name), None) => Some(name.to_string()),
        (None, None) => None,
    }
}

/// Flattens an address header, including groups, into one string per
/// recipient.
fn address_list(address: Option<&Address>) -> Vec<String> {
    match address {
        Some(Address::List(list)) => list.iter().filter_map(format_addr).collect(),
        Some(Address::Group(groups)) => groups
            .iter()
            .flat_map(|group| group.addresses.iter())
            .filter_map(format_addr)
            .collect(),
        None => vec![],
    }
}
