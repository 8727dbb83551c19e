use crate::email::Email;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Emails dated strictly before this instant are archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoff(NaiveDate);

impl Cutoff {
    pub fn parse(s: &str) -> Result<Self, String> {
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Cutoff)
            .map_err(|e| format!("invalid date format {:?}, expected YYYY-MM-DD: {}", s, e))
    }

    /// Midnight UTC of the cutoff day.
    pub fn instant(&self) -> DateTime<Utc> {
        self.0.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

impl fmt::Display for Cutoff {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

pub fn should_index(email: &Email, cutoff: &Cutoff) -> bool {
    email.date < cutoff.instant()
}

/// Counts of emails on each side of the cutoff, used by the statistics run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DateTally {
    pub before: usize,
    pub after: usize,
}

impl DateTally {
    pub fn record(&mut self, email: &Email, cutoff: &Cutoff) {
        if should_index(email, cutoff) {
            self.before += 1;
        } else {
            self.after += 1;
        }
    }

    pub fn merge(self, other: Self) -> Self {
        DateTally {
            before: self.before + other.before,
            after: self.after + other.after,
        }
    }
}

#[cfg(test)]
pub(crate) fn email_at(date: &str) -> Email {
    Email {
        message_id: String::new(),
        user: "u@example.com".to_string(),
        subject: String::new(),
        from: String::new(),
        to: vec![],
        date: DateTime::parse_from_rfc3339(date).unwrap(),
        body: String::new(),
        attachments: vec![],
    }
}
