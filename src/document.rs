use crate::email::Email;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Primary key of a document in the index.
///
/// It is the hex encoded SHA-256 of the message id, so indexing the same
/// email again overwrites the previous document. Emails without a message
/// id all share the id of the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn for_message_id(message_id: &str) -> Self {
        DocumentId(hex::encode(Sha256::digest(message_id.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentDoc {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub message_id: String,
    pub user: String,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub date: DateTime<FixedOffset>,
    pub body: String,
    pub attachments: Vec<AttachmentDoc>,
}

pub fn to_document(email: &Email) -> (Document, DocumentId) {
    let attachments = email
        .attachments
        .iter()
        .map(|att| AttachmentDoc {
            filename: att.filename.clone(),
            content_type: att.content_type.clone(),
            size: att.size,
        })
        .collect();
    let doc = Document {
        message_id: email.message_id.clone(),
        user: email.user.clone(),
        subject: email.subject.clone(),
        from: email.from.clone(),
        to: email.to.clone(),
        date: email.date,
        body: email.body.clone(),
        attachments,
    };
    (doc, DocumentId::for_message_id(&email.message_id))
}
