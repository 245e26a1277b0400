/// Client-supplied session identifier; the only addressing key in the system.
pub type SessionId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
