/// All hub entities (devices, sync items, files) are keyed by UUID.
pub type EntityId = uuid::Uuid;

/// User ids are opaque strings issued by the external identity service.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
