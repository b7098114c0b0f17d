use chrono::{DateTime, Local};

/// Fixed-width, lexicographically sortable timestamp (YYYYMMDDhhmmss)
pub const DATE_PATTERN: &str = "%Y%m%d%H%M%S";

/// Name of a single job, derived from the caller's key and one captured instant.
///
/// Both the working directory and the source file are named from the same
/// stamp, so they always match even when a second boundary passes between
/// directory creation and file naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobName {
    key: String,
    stamp: String,
}

impl JobName {
    pub fn new(key: &str, at: DateTime<Local>) -> Self {
        Self {
            key: key.to_string(),
            stamp: at.format(DATE_PATTERN).to_string(),
        }
    }

    pub fn now(key: &str) -> Self {
        Self::new(key, Local::now())
    }

    pub fn directory_name(&self) -> String {
        format!("{}{}", self.key, self.stamp)
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{}{}.{extension}", self.key, self.stamp)
    }
}
