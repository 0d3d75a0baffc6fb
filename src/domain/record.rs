use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Source;

/// Records from one fetch, in the order they appeared in the feed.
pub type RecordSet = Vec<Record>;

/// One feed line. `created` is the Unix epoch when the timestamp could not
/// be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub origin: Source,
    pub created: DateTime<Utc>,
    pub text: String,
}

impl Record {
    pub fn new(origin: Source, created: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            origin,
            created,
            text: text.into(),
        }
    }
}
