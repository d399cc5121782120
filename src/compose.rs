pub const SEGMENT_SEPARATOR: &str = "\n=====================\n";

/// Joins URL content, an extra message and the primary input, in that order.
/// Absent or blank segments are dropped; an empty result means there is
/// nothing to send.
pub fn compose(
    url_content: Option<&str>,
    extra_message: Option<&str>,
    primary_input: Option<&str>,
) -> String {
    [url_content, extra_message, primary_input]
        .into_iter()
        .flatten()
        .filter(|segment| !segment.trim().is_empty())
        .collect::<Vec<_>>()
        .join(SEGMENT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::compose;

    #[test]
    fn primary_input_alone_is_unchanged() {
        assert_eq!(compose(None, None, Some("hi")), "hi");
    }

    #[test]
    fn segments_are_joined_in_fixed_order() {
        assert_eq!(
            compose(Some("A"), Some("B"), Some("C")),
            "A\n=====================\nB\n=====================\nC"
        );
    }

    #[test]
    fn extra_message_alone_is_unchanged() {
        assert_eq!(compose(None, Some("B"), None), "B");
    }

    #[test]
    fn blank_segments_are_dropped() {
        assert_eq!(
            compose(Some("page"), Some("  \n"), Some("question")),
            "page\n=====================\nquestion"
        );
        assert_eq!(compose(Some(""), None, Some("")), "");
        assert_eq!(compose(None, None, None), "");
    }

    #[test]
    fn kept_segments_are_not_trimmed() {
        assert_eq!(compose(None, Some(" B "), Some("C\n")), " B \n=====================\nC\n");
    }
}
