use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// `2026-10-16T09:30:05.123Z`, the layout record timestamps use.
pub fn iso_timestamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    at.format(format)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Filename-safe stamp: the ISO timestamp truncated to seconds with `:` replaced by `-`.
pub fn file_stamp(at: OffsetDateTime) -> String {
    iso_timestamp(at)
        .chars()
        .take(19)
        .map(|c| if c == ':' || c == '.' { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn iso_timestamp_has_millisecond_precision() {
        let at = datetime!(2026-10-16 09:30:05.123456 UTC);
        assert_eq!(iso_timestamp(at), "2026-10-16T09:30:05.123Z");
    }

    #[test]
    fn iso_timestamp_normalizes_to_utc() {
        let at = datetime!(2026-10-16 11:30:05 +02:00);
        assert_eq!(iso_timestamp(at), "2026-10-16T09:30:05.000Z");
    }

    #[test]
    fn file_stamp_drops_separators() {
        let at = datetime!(2026-10-16 09:30:05.5 UTC);
        assert_eq!(file_stamp(at), "2026-10-16T09-30-05");
    }
}
