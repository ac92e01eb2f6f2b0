use crate::record::{ContentBlock, Record, RecordKind};

/// Literal openings of user-kind records that Claude Code injected itself.
///
/// Matching is a best-effort heuristic: typed text that happens to start with
/// one of these is misclassified.
pub const SYSTEM_PREFIXES: &[&str] = &[
    "This session is being continued",
    "<local-command",
    "<command-name>",
    "<command-message>",
    "<system-reminder>",
    "[Request interrupted",
    IMAGE_SOURCE_PREFIX,
];

pub const IMAGE_SOURCE_PREFIX: &str = "[Image: source:";

/// A user record that opens a turn, as opposed to one carrying tool results.
/// String content, even an empty string, counts as one text block.
pub fn is_user_text(record: &Record) -> bool {
    if record.kind != RecordKind::User {
        return false;
    }

    match record.content_blocks().first() {
        Some(ContentBlock::ToolResult { .. }) | None => false,
        Some(_) => true,
    }
}

pub fn is_system_message(text: &str) -> bool {
    SYSTEM_PREFIXES
        .iter()
        .any(|prefix| text.starts_with(prefix))
}

/// Provenance flags win; the prefix list is only consulted without them.
pub fn is_system_injected(record: &Record) -> bool {
    if record.is_compact_summary.unwrap_or(false)
        || record.is_visible_in_transcript_only.unwrap_or(false)
    {
        return true;
    }

    match record.content_blocks().first() {
        Some(ContentBlock::Text { text }) => is_system_message(text),
        _ => false,
    }
}

/// A user record that only carries an attached image, written right after the
/// message the image belongs to.
pub fn is_image_placeholder(record: &Record) -> bool {
    if record.kind != RecordKind::User {
        return false;
    }

    let blocks = record.content_blocks();
    let first_text = blocks.iter().find_map(|block| match block {
        ContentBlock::Text { text } => Some(text.as_str()),
        _ => None,
    });

    match first_text {
        Some(text) => text.starts_with(IMAGE_SOURCE_PREFIX),
        None => blocks
            .iter()
            .any(|block| matches!(block, ContentBlock::Image { .. })),
    }
}

/// Path named by an `[Image: source: <path>]` placeholder.
pub fn image_source_path(text: &str) -> Option<String> {
    let rest = text.strip_prefix(IMAGE_SOURCE_PREFIX)?;
    let path = rest.split(']').next().unwrap_or(rest).trim();
    (!path.is_empty()).then(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use crate::classify::{
        image_source_path, is_image_placeholder, is_system_injected, is_system_message,
        is_user_text,
    };
    use crate::record::Record;

    fn record(raw: &str) -> Record {
        serde_json::from_str(raw).expect("parse record")
    }

    #[test]
    fn user_text_detection() {
        assert!(is_user_text(&record(
            r#"{"type":"user","message":{"content":[{"type":"text","text":"hi"}]}}"#
        )));
        assert!(is_user_text(&record(
            r#"{"type":"user","message":{"content":"typed"}}"#
        )));
        assert!(!is_user_text(&record(
            r#"{"type":"user","message":{"content":[{"type":"tool_result"}]}}"#
        )));
        assert!(!is_user_text(&record(
            r#"{"type":"assistant","message":{"content":[{"type":"text"}]}}"#
        )));
        assert!(!is_user_text(&record(
            r#"{"type":"user","message":{"content":[]}}"#
        )));
        assert!(is_user_text(&record(
            r#"{"type":"user","message":{"content":""}}"#
        )));
        assert!(!is_user_text(&record(r#"{"type":"user"}"#)));
    }

    #[test]
    fn system_prefixes_detected() {
        let cases = [
            ("This session is being continued from a previous conversation", true),
            ("<local-command-stdout>ls</local-command-stdout>", true),
            ("<command-name>/help</command-name>", true),
            ("<command-message>clear</command-message>", true),
            ("<system-reminder>Remember to use tools</system-reminder>", true),
            ("[Request interrupted by user]", true),
            ("[Image: source: /path/to/file.png]", true),
            ("Hello, can you help me with this code?", false),
            ("This session was really helpful", false),
            ("Check this image I found", false),
            ("[Something else in brackets]", false),
            (" <system-reminder>leading space</system-reminder>", false),
            ("<SYSTEM-REMINDER>upper</SYSTEM-REMINDER>", false),
        ];
        for (text, expected) in cases {
            assert_eq!(is_system_message(text), expected, "{text}");
        }
    }

    #[test]
    fn provenance_flags_take_precedence() {
        assert!(is_system_injected(&record(
            r#"{"type":"user","isCompactSummary":true,"message":{"content":"Summary"}}"#
        )));
        assert!(is_system_injected(&record(
            r#"{"type":"user","isVisibleInTranscriptOnly":true,"message":{"content":"x"}}"#
        )));
        assert!(is_system_injected(&record(
            r#"{"type":"user","message":{"content":"<command-name>/clear</command-name>"}}"#
        )));
        assert!(!is_system_injected(&record(
            r#"{"type":"user","isCompactSummary":false,"message":{"content":"plain"}}"#
        )));
    }

    #[test]
    fn image_placeholders() {
        assert!(is_image_placeholder(&record(
            r#"{"type":"user","message":{"content":[{"type":"text","text":"[Image: source: /tmp/img.png]"}]}}"#
        )));
        assert!(is_image_placeholder(&record(
            r#"{"type":"user","message":{"content":[{"type":"image","source":{"type":"base64","data":"abc"}}]}}"#
        )));
        assert!(!is_image_placeholder(&record(
            r#"{"type":"user","message":{"content":[{"type":"text","text":"[Image: I think this looks good]"}]}}"#
        )));
        assert!(!is_image_placeholder(&record(
            r#"{"type":"user","message":{"content":[{"type":"text","text":"Here's the bug"},{"type":"image","source":{}}]}}"#
        )));
        assert!(!is_image_placeholder(&record(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"[Image: source: /path]"}]}}"#
        )));
        assert!(!is_image_placeholder(&record(
            r#"{"type":"user","message":{"content":[]}}"#
        )));
    }

    #[test]
    fn extracts_image_source_path() {
        assert_eq!(
            image_source_path("[Image: source: /tmp/screenshot1.png]").as_deref(),
            Some("/tmp/screenshot1.png")
        );
        assert_eq!(image_source_path("[Image: source: ]"), None);
        assert_eq!(image_source_path("no image"), None);
    }
}
