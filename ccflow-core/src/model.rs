use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Original,
    Continuation,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Continuation => write!(f, "continuation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactMetadata {
    pub trigger: String,
    pub pre_tokens: u64,
    pub post_tokens: Option<u64>,
}

/// Link from a tool invocation to the subagent it spawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubagentLink {
    Available { agent_id: String },
    /// The result names an agent whose transcript could not be found.
    Unavailable { agent_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockContent {
    Text {
        content: String,
    },
    Thinking {
        content: String,
        full_content: Option<String>,
        is_truncated: bool,
    },
    ToolUse {
        tool_use_id: String,
        tool_name: String,
        /// Short preview of the most telling input field.
        tool_input: String,
        input: Value,
        full_content: Option<String>,
        is_truncated: bool,
        subagent_type: Option<String>,
        subagent: Option<SubagentLink>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        full_content: Option<String>,
        is_truncated: bool,
        is_error: bool,
        agent_id: Option<String>,
        /// No invocation with this id exists in the same turn.
        orphaned: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub record_id: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub content: BlockContent,
}

impl Block {
    pub fn tool_use_id(&self) -> Option<&str> {
        match &self.content {
            BlockContent::ToolUse { tool_use_id, .. }
            | BlockContent::ToolResult { tool_use_id, .. } => Some(tool_use_id),
            BlockContent::Text { .. } | BlockContent::Thinking { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    /// Identifier of the record that opened the turn.
    pub id: String,
    pub parent_turn_id: Option<String>,
    pub children_turn_ids: Vec<String>,
    pub user_message: String,
    pub user_timestamp: String,
    pub blocks: Vec<Block>,
    pub image_paths: Vec<String>,
    pub is_system: bool,
    /// Set when the parent turn has more than one child turn.
    pub is_branch: bool,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub timestamp: String,
    pub turns: Vec<Turn>,
    pub compact_metadata: Option<CompactMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// Records embedded in the main log with a `subagentId`.
    Inline,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubagentTranscript {
    pub agent_id: String,
    pub source: TranscriptSource,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    pub segments: Vec<Segment>,
    pub subagents: BTreeMap<String, SubagentTranscript>,
    pub skipped_lines: usize,
    #[serde(skip_serializing)]
    pub warnings: Vec<String>,
}

impl Document {
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.segments.iter().flat_map(|segment| segment.turns.iter())
    }

    pub fn total_turns(&self) -> usize {
        self.segments.iter().map(|segment| segment.turns.len()).sum()
    }

    pub fn compactions(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| segment.compact_metadata.is_some())
            .count()
    }
}
