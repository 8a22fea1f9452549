/// Encoding of the `users.othergroups` column
///
/// glauth stores a user's secondary groups as a comma-joined list of GID
/// numbers (`"10001,10002"`). Reads are lenient: surrounding commas and
/// entries that are not integers are dropped, the way glauth itself reads the
/// column.

const SEPARATOR: &str = ",";

/// Joins GIDs into the column representation
pub fn to_comma_separated(gids: &[i32]) -> String {
    gids.iter()
        .map(|gid| gid.to_string())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Splits the column representation back into GIDs
pub fn parse_comma_separated(raw: &str) -> Vec<i32> {
    raw.trim_start_matches(SEPARATOR)
        .trim_end_matches(SEPARATOR)
        .split(SEPARATOR)
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(to_comma_separated(&[10001, 10002, 10005]), "10001,10002,10005");
        assert_eq!(to_comma_separated(&[]), "");
    }

    #[test]
    fn test_parse_plain() {
        assert_eq!(parse_comma_separated("10001,10002"), vec![10001, 10002]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_comma_separated("").is_empty());
        assert!(parse_comma_separated(",").is_empty());
    }

    #[test]
    fn test_parse_skips_junk() {
        assert_eq!(parse_comma_separated(",10001,abc,,10003,"), vec![10001, 10003]);
        assert_eq!(parse_comma_separated(" 5501 , 5502"), vec![5501, 5502]);
    }
}
