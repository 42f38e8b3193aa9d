/// Monotonic recomputation counter of the area manager.
pub type Generation = u64;

/// Identifier assigned to every submitted task.
pub type TaskId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
