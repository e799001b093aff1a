//! Topic filter matching.
//!
//! Topics are `/`-separated levels. In a filter, `#` matches the rest of
//! the topic (zero or more levels) and `+` matches exactly one level.

/// Multi-level wildcard.
pub const TOPIC_WILDCARD: &str = "#";
/// Single-level wildcard.
pub const TOPIC_SINGLE_LEVEL_WILDCARD: &str = "+";
/// Separator between topic levels.
pub const TOPIC_LEVEL_SEPARATOR: char = '/';

/// Returns true if `topic` matches the filter `filter`.
#[must_use]
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if filter == TOPIC_WILDCARD {
        return true;
    }

    let mut filter_levels = filter.split(TOPIC_LEVEL_SEPARATOR);
    let mut topic_levels = topic.split(TOPIC_LEVEL_SEPARATOR);
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some(TOPIC_WILDCARD), _) => return true,
            (Some(TOPIC_SINGLE_LEVEL_WILDCARD), Some(_)) => {}
            (Some(expected), Some(level)) if expected == level => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Joins `topic` onto `prefix` with a single separator.
///
/// An empty prefix leaves the topic unchanged.
#[must_use]
pub fn build_topic(prefix: &str, topic: &str) -> String {
    let prefix = prefix.trim_end_matches(TOPIC_LEVEL_SEPARATOR);
    let topic = topic.trim_start_matches(TOPIC_LEVEL_SEPARATOR);
    match (prefix.is_empty(), topic.is_empty()) {
        (true, _) => topic.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}{TOPIC_LEVEL_SEPARATOR}{topic}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exact_match() {
        assert!(topic_matches("edgex/events", "edgex/events"));
        assert!(!topic_matches("edgex/events", "edgex/events/core"));
        assert!(!topic_matches("edgex/events/core", "edgex/events"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(topic_matches("#", "anything/at/all"));
        assert!(topic_matches("edgex/events/#", "edgex/events/core/profile/device/source"));
        assert!(topic_matches("edgex/events/#", "edgex/events"));
        assert!(!topic_matches("edgex/events/#", "edgex/commands/core"));
    }

    #[test]
    fn test_single_level_wildcard() {
        let filter = "edgex/events/core/+/Random-Integer-Device/#";
        assert!(topic_matches(filter, "edgex/events/core/profile/Random-Integer-Device/Int8"));
        assert!(!topic_matches(filter, "edgex/events/core/profile/Other-Device/Int8"));
        assert!(topic_matches("a/+/c", "a/b/c"));
        assert!(!topic_matches("a/+/c", "a/c"));
        assert!(!topic_matches("a/+", "a/b/c"));
    }

    #[test]
    fn test_build_topic() {
        assert_eq!(build_topic("edgex", "events/#"), "edgex/events/#");
        assert_eq!(build_topic("edgex/", "/events"), "edgex/events");
        assert_eq!(build_topic("", "events"), "events");
        assert_eq!(build_topic("edgex", ""), "edgex");
    }
}
