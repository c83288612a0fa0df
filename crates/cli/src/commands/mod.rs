pub mod checkpoint;
pub mod image;
pub mod replay;
pub mod segments;

/// Milliseconds since the epoch as RFC 3339.
pub(crate) fn format_millis(millis: u64) -> String {
    chrono::DateTime::from_timestamp_millis(millis as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
