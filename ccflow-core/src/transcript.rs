//! JSON rendering of a reconstructed session.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{CcflowError, Result};
use crate::model::{Document, Segment, SubagentTranscript};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptMetadata {
    pub session_id: String,
    /// Timestamp of the first turn of the first segment.
    pub started: Option<String>,
    pub total_turns: usize,
    pub total_subagents: usize,
    pub compactions: usize,
    pub skipped_lines: usize,
}

#[derive(Debug, Serialize)]
struct TranscriptJson<'a> {
    metadata: TranscriptMetadata,
    segments: &'a [Segment],
    subagents: &'a BTreeMap<String, SubagentTranscript>,
}

pub fn compute_metadata(document: &Document, session_id: &str) -> TranscriptMetadata {
    TranscriptMetadata {
        session_id: session_id.to_string(),
        started: document
            .segments
            .first()
            .and_then(|segment| segment.turns.first())
            .map(|turn| turn.user_timestamp.clone()),
        total_turns: document.total_turns(),
        total_subagents: document.subagents.len(),
        compactions: document.compactions(),
        skipped_lines: document.skipped_lines,
    }
}

pub fn render_json(document: &Document, session_id: &str, compact: bool) -> Result<String> {
    let output = TranscriptJson {
        metadata: compute_metadata(document, session_id),
        segments: &document.segments,
        subagents: &document.subagents,
    };

    let rendered = if compact {
        serde_json::to_string(&output)
    } else {
        serde_json::to_string_pretty(&output)
    };
    rendered.map_err(|err| CcflowError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::Value;

    use crate::config::ParseOptions;
    use crate::loader::parse_records;
    use crate::model::Document;
    use crate::service::build_document;
    use crate::transcript::{compute_metadata, render_json};

    const SESSION: &str = r#"{"uuid":"u1","type":"user","timestamp":"2026-01-17T10:00:00Z","message":{"content":"Run the tests"}}
{"uuid":"a1","parentUuid":"u1","type":"assistant","timestamp":"2026-01-17T10:00:01Z","message":{"content":[{"type":"thinking","thinking":"plan"},{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"cargo test"}}]}}
{"uuid":"r1","parentUuid":"a1","type":"user","timestamp":"2026-01-17T10:00:05Z","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]}}
{broken
{"uuid":"c1","type":"system","subtype":"compact_boundary","timestamp":"2026-01-17T11:00:00Z","compactMetadata":{"trigger":"auto","preTokens":1000}}
{"uuid":"s1","parentUuid":"c1","type":"user","isCompactSummary":true,"timestamp":"2026-01-17T11:00:01Z","message":{"content":"This session is being continued"}}"#;

    fn document() -> Document {
        build_document(parse_records(SESSION), BTreeMap::new(), ParseOptions::default())
    }

    #[test]
    fn metadata_summarizes_document() {
        let metadata = compute_metadata(&document(), "abc");
        assert_eq!(metadata.session_id, "abc");
        assert_eq!(metadata.started.as_deref(), Some("2026-01-17T10:00:00Z"));
        assert_eq!(metadata.total_turns, 2);
        assert_eq!(metadata.total_subagents, 0);
        assert_eq!(metadata.compactions, 1);
        assert_eq!(metadata.skipped_lines, 1);

        let empty = compute_metadata(&Document::default(), "empty");
        assert_eq!(empty.started, None);
        assert_eq!(empty.total_turns, 0);
    }

    #[test]
    fn renders_tagged_blocks_and_segments() {
        let rendered = render_json(&document(), "abc", false).expect("render");
        let value: Value = serde_json::from_str(&rendered).expect("valid json");

        assert_eq!(value["metadata"]["session_id"], "abc");
        assert_eq!(value["segments"][0]["type"], "original");
        assert_eq!(value["segments"][1]["type"], "continuation");
        assert_eq!(value["segments"][1]["compact_metadata"]["trigger"], "auto");
        assert_eq!(value["segments"][1]["compact_metadata"]["pre_tokens"], 1000);

        let blocks = value["segments"][0]["turns"][0]["blocks"]
            .as_array()
            .expect("blocks");
        let kinds = blocks
            .iter()
            .map(|block| block["type"].as_str().expect("type"))
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["thinking", "tool_use", "tool_result"]);
        assert_eq!(blocks[1]["tool_input"], "cargo test");
        assert_eq!(blocks[1]["record_id"], "a1");
        assert_eq!(blocks[2]["orphaned"], false);
        assert!(value["subagents"].as_object().expect("subagents").is_empty());
        assert!(value.get("warnings").is_none());
    }

    #[test]
    fn compact_output_is_single_line() {
        let rendered = render_json(&document(), "abc", true).expect("render");
        assert!(!rendered.contains('\n'));
        let pretty = render_json(&document(), "abc", false).expect("render");
        assert!(pretty.contains("\n  \"metadata\""));
    }
}
