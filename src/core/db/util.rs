use time::OffsetDateTime;
use uuid::Uuid;

/// Opaque, globally unique entity id.
pub(crate) fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn epoch_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
