//! Raw Claude Code log records, one per JSONL line.
//!
//! Every field is optional or defaulted: logs written by different Claude Code
//! versions disagree on which fields are present and what they hold. A missing
//! or wrongly typed field reads as its default and never turns an otherwise
//! useful line into a parse error.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const COMPACT_BOUNDARY_SUBTYPE: &str = "compact_boundary";
pub const TURN_DURATION_SUBTYPE: &str = "turn_duration";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "system")]
    System,
    #[serde(rename = "progress")]
    Progress,
    #[serde(rename = "file-history-snapshot")]
    FileHistorySnapshot,
    #[default]
    #[serde(other)]
    Other,
}

impl RecordKind {
    /// Kinds that never carry conversational content and are dropped on load.
    pub fn is_filtered(self) -> bool {
        matches!(self, Self::Progress | Self::FileHistorySnapshot)
    }
}

/// Any value that does not fit `T` reads as `T::default()`.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Non-negative counts; fractional values are truncated.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|count| count.is_finite() && *count >= 0.0)
            .map(|count| count as u64)
    }))
}

/// A string is typed text; an array holds blocks, and an item that is not a
/// recognizable block becomes [`ContentBlock::Unknown`].
fn lenient_content<'de, D>(deserializer: D) -> Result<Option<MessageContent>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(MessageContent::Text(text)),
        Value::Array(items) => Some(MessageContent::Blocks(
            items
                .into_iter()
                .map(|item| serde_json::from_value(item).unwrap_or(ContentBlock::Unknown))
                .collect(),
        )),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub kind: RecordKind,
    #[serde(default, deserialize_with = "lenient")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub parent_uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub subtype: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<RecordMessage>,
    #[serde(default, deserialize_with = "lenient")]
    pub compact_metadata: Option<RawCompactMetadata>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_compact_summary: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_visible_in_transcript_only: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub subagent_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub agent_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_sidechain: Option<bool>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordMessage {
    #[serde(default, deserialize_with = "lenient_content")]
    pub content: Option<MessageContent>,
}

/// `message.content` is either a bare string (typed user text) or an array of
/// content blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default, deserialize_with = "lenient")]
        text: String,
    },
    Thinking {
        #[serde(default, deserialize_with = "lenient")]
        thinking: String,
    },
    ToolUse {
        #[serde(default, deserialize_with = "lenient")]
        id: String,
        #[serde(default, deserialize_with = "lenient")]
        name: Option<String>,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default, deserialize_with = "lenient")]
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default, deserialize_with = "lenient")]
        is_error: Option<bool>,
    },
    Image {
        #[serde(default)]
        source: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCompactMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub trigger: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub pre_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub post_tokens: Option<u64>,
}

impl Record {
    pub fn id(&self) -> Option<&str> {
        self.uuid.as_deref().filter(|id| !id.is_empty())
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_uuid.as_deref().filter(|id| !id.is_empty())
    }

    pub fn timestamp(&self) -> &str {
        self.timestamp.as_deref().unwrap_or_default()
    }

    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    pub fn is_compact_boundary(&self) -> bool {
        self.kind == RecordKind::System && self.subtype() == Some(COMPACT_BOUNDARY_SUBTYPE)
    }

    pub fn inline_subagent_id(&self) -> Option<&str> {
        self.subagent_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Content blocks of the record; string content becomes a single text block.
    pub fn content_blocks(&self) -> Cow<'_, [ContentBlock]> {
        match self
            .message
            .as_ref()
            .and_then(|message| message.content.as_ref())
        {
            Some(MessageContent::Text(text)) => {
                Cow::Owned(vec![ContentBlock::Text { text: text.clone() }])
            }
            Some(MessageContent::Blocks(blocks)) => Cow::Borrowed(blocks.as_slice()),
            None => Cow::Borrowed(&[]),
        }
    }

    /// Text of the first text block, the message a human would have typed.
    pub fn first_text(&self) -> Option<String> {
        self.content_blocks().iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.clone()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{ContentBlock, Record, RecordKind};

    #[test]
    fn string_content_becomes_text_block() {
        let record: Record = serde_json::from_str(
            r#"{"type":"user","uuid":"u1","message":{"role":"user","content":"hello"}}"#,
        )
        .expect("parse");
        assert_eq!(record.kind, RecordKind::User);
        assert_eq!(
            record.content_blocks().as_ref(),
            &[ContentBlock::Text {
                text: "hello".to_string()
            }]
        );
    }

    #[test]
    fn unknown_kinds_and_blocks_are_tolerated() {
        let record: Record = serde_json::from_str(
            r#"{"type":"queue-operation","uuid":"q1","message":{"content":[{"type":"server_tool_use","id":"x"},{"type":"tool_result"}]}}"#,
        )
        .expect("parse");
        assert_eq!(record.kind, RecordKind::Other);
        let blocks = record.content_blocks();
        assert_eq!(blocks[0], ContentBlock::Unknown);
        assert!(matches!(
            &blocks[1],
            ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id.is_empty()
        ));
    }

    #[test]
    fn compact_boundary_metadata_is_read() {
        let record: Record = serde_json::from_str(
            r#"{"type":"system","subtype":"compact_boundary","uuid":"c1","parentUuid":null,"compactMetadata":{"trigger":"auto","preTokens":162000}}"#,
        )
        .expect("parse");
        assert!(record.is_compact_boundary());
        assert_eq!(record.parent_id(), None);
        let meta = record.compact_metadata.expect("metadata");
        assert_eq!(meta.trigger.as_deref(), Some("auto"));
        assert_eq!(meta.pre_tokens, Some(162_000));
        assert_eq!(meta.post_tokens, None);
    }

    #[test]
    fn wrongly_typed_fields_read_as_defaults() {
        let record: Record = serde_json::from_str(
            r#"{"type":"assistant","uuid":"a1","parentUuid":7,"isSidechain":"yes","message":{"content":[{"type":"tool_use","id":null,"name":3,"input":{"command":"ls"}},{"type":"text","text":null},{"no_type":true},"loose string"]}}"#,
        )
        .expect("parse");
        assert_eq!(record.id(), Some("a1"));
        assert_eq!(record.parent_id(), None);
        assert_eq!(record.is_sidechain, None);

        let blocks = record.content_blocks();
        assert_eq!(blocks.len(), 4);
        assert!(matches!(
            &blocks[0],
            ContentBlock::ToolUse { id, name: None, .. } if id.is_empty()
        ));
        assert_eq!(
            blocks[1],
            ContentBlock::Text {
                text: String::new()
            }
        );
        assert_eq!(blocks[2], ContentBlock::Unknown);
        assert_eq!(blocks[3], ContentBlock::Unknown);
    }

    #[test]
    fn fractional_counts_are_truncated() {
        let record: Record = serde_json::from_str(
            r#"{"type":"system","subtype":"turn_duration","uuid":"d1","durationMs":1234.5,"compactMetadata":{"preTokens":"many","postTokens":900.0}}"#,
        )
        .expect("parse");
        assert_eq!(record.duration_ms, Some(1234));
        let meta = record.compact_metadata.expect("metadata");
        assert_eq!(meta.pre_tokens, None);
        assert_eq!(meta.post_tokens, Some(900));

        let record: Record =
            serde_json::from_str(r#"{"uuid":"d2","durationMs":-5,"message":"not an object"}"#)
                .expect("parse");
        assert_eq!(record.duration_ms, None);
        assert_eq!(record.message, None);
    }

    #[test]
    fn empty_identifiers_read_as_absent() {
        let record: Record =
            serde_json::from_str(r#"{"uuid":"","parentUuid":"","subagentId":""}"#).expect("parse");
        assert_eq!(record.id(), None);
        assert_eq!(record.parent_id(), None);
        assert_eq!(record.inline_subagent_id(), None);
        assert_eq!(record.timestamp(), "");
    }
}
