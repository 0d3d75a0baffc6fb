use chrono::{DateTime, NaiveDateTime, Utc};

use crate::domain::{Record, RecordSet, Source};

/// Timestamp layouts seen in the wild, most precise first.
///
/// `true` marks layouts carrying a zone offset. Fractional seconds are
/// optional wherever `%.f` appears.
const TIME_LAYOUTS: &[(&str, bool)] = &[
    ("%Y-%m-%dT%H:%M:%S%.f%:z", true),
    ("%Y-%m-%dT%H:%M:%S%.f%z", true),
    ("%Y-%m-%dT%H:%M:%S%.f", false),
    ("%Y-%m-%dT%H:%M%:z", true),
    ("%Y-%m-%dT%H:%M%z", true),
    ("%Y-%m-%dT%H:%M", false),
];

const COMMENT_MARKER: char = '#';

#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Turns a feed body into records attributed to `origin`.
    ///
    /// Never fails: comment lines, blank lines and lines that do not split
    /// into a timestamp and a text are dropped with a debug log.
    pub fn normalize(&self, origin: &Source, body: &str) -> RecordSet {
        let mut records = Vec::new();

        for line in body.lines() {
            if line.is_empty() {
                continue;
            }

            if line.starts_with(COMMENT_MARKER) {
                tracing::debug!("skipped comment line {:?} (source: {})", line, origin.address);
                continue;
            }

            let Some((stamp, text)) = split_line(line) else {
                tracing::debug!("could not parse {:?} (source: {})", line, origin.address);
                continue;
            };

            records.push(Record::new(origin.clone(), parse_time(stamp), text));
        }

        records
    }
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    let (stamp, rest) = line.split_once(char::is_whitespace)?;
    let text = rest.trim_start();
    if stamp.is_empty() || text.is_empty() {
        return None;
    }
    Some((stamp, text))
}

/// Parses a feed timestamp, falling back to the Unix epoch.
pub fn parse_time(field: &str) -> DateTime<Utc> {
    // chrono's offset specifiers don't take a bare `Z`
    let field = match field.strip_suffix('Z') {
        Some(head) => format!("{}+00:00", head),
        None => field.to_string(),
    };

    for (layout, zoned) in TIME_LAYOUTS {
        let parsed = if *zoned {
            DateTime::parse_from_str(&field, layout).map(|dt| dt.with_timezone(&Utc))
        } else {
            NaiveDateTime::parse_from_str(&field, layout).map(|dt| dt.and_utc())
        };

        if let Ok(dt) = parsed {
            return dt;
        }
    }

    DateTime::<Utc>::UNIX_EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alice() -> Source {
        Source::new("alice", "file:///a.txt")
    }

    #[test]
    fn test_mixed_lines() {
        let body = "2021-01-01T00:00:00Z\thello world\n\
                    # comment\n\
                    \n\
                    badline\n\
                    2021-01-02T00:00:00Z\tsecond post\n";

        let records = Normalizer::new().normalize(&alice(), body);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "hello world");
        assert_eq!(
            records[0].created,
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(records[1].text, "second post");
        assert_eq!(
            records[1].created,
            Utc.with_ymd_and_hms(2021, 1, 2, 0, 0, 0).unwrap()
        );
        assert!(records.iter().all(|r| r.origin == alice()));
    }

    #[test]
    fn test_preserves_file_order() {
        let body = "2022-05-01T10:00:00Z third\n\
                    2020-05-01T10:00:00Z first\n\
                    2021-05-01T10:00:00Z second\n";

        let texts: Vec<_> = Normalizer::new()
            .normalize(&alice(), body)
            .into_iter()
            .map(|r| r.text)
            .collect();

        assert_eq!(texts, vec!["third", "first", "second"]);
    }

    #[test]
    fn test_splits_on_first_whitespace_run() {
        let body = "2021-01-01T00:00:00Z \t  spaced   out text\r\n";
        let records = Normalizer::new().normalize(&alice(), body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "spaced   out text");
    }

    #[test]
    fn test_unparseable_timestamp_keeps_record() {
        let records = Normalizer::new().normalize(&alice(), "yesterday\tstill here\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].created, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(records[0].text, "still here");
    }

    #[test]
    fn test_timestamp_without_text_is_dropped() {
        let records = Normalizer::new().normalize(&alice(), "2021-01-01T00:00:00Z\t   \n");
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_time_layouts() {
        let expected = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(parse_time("2021-03-04T05:06:07Z"), expected);
        assert_eq!(parse_time("2021-03-04T05:06:07+00:00"), expected);
        assert_eq!(parse_time("2021-03-04T07:06:07+02:00"), expected);
        assert_eq!(parse_time("2021-03-04T07:06:07+0200"), expected);
        assert_eq!(parse_time("2021-03-04T05:06:07"), expected);

        let fractional = parse_time("2021-03-04T05:06:07.250Z");
        assert_eq!(fractional.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_time_without_seconds() {
        let expected = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 0).unwrap();
        assert_eq!(parse_time("2021-03-04T05:06Z"), expected);
        assert_eq!(parse_time("2021-03-04T06:06+01:00"), expected);
        assert_eq!(parse_time("2021-03-04T05:06"), expected);
    }

    #[test]
    fn test_parse_time_garbage() {
        assert_eq!(parse_time("not-a-time"), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(parse_time(""), DateTime::<Utc>::UNIX_EPOCH);
    }
}
