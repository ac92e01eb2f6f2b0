//! Conversion of raw content blocks into display blocks.

use serde_json::Value;

use crate::config::ParseOptions;
use crate::model::{Block, BlockContent};
use crate::record::{ContentBlock, Record};

/// Input keys that best summarize a tool call, in order of preference.
const PREVIEW_KEYS: &[&str] = &["command", "prompt", "pattern", "file_path", "query"];
const ELLIPSIS: &str = "...";

/// Cuts `text` to `max_chars` characters plus an ellipsis. The second value is
/// the untouched text, present only when something was cut.
pub fn truncate(text: &str, max_chars: usize) -> (String, Option<String>) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (format!("{}{ELLIPSIS}", &text[..cut]), Some(text.to_string())),
        None => (text.to_string(), None),
    }
}

/// Blocks contributed by one record, in payload order.
pub fn record_blocks(record: &Record, options: &ParseOptions) -> Vec<Block> {
    let record_id = record.id().unwrap_or_default();
    let timestamp = record.timestamp();

    record
        .content_blocks()
        .iter()
        .filter_map(|block| convert_block(block, options))
        .map(|content| Block {
            record_id: record_id.to_string(),
            timestamp: timestamp.to_string(),
            content,
        })
        .collect()
}

fn convert_block(block: &ContentBlock, options: &ParseOptions) -> Option<BlockContent> {
    match block {
        ContentBlock::Text { text } => Some(BlockContent::Text {
            content: text.clone(),
        }),
        ContentBlock::Thinking { thinking } => {
            let (content, full_content) = truncate(thinking, options.thinking_limit);
            Some(BlockContent::Thinking {
                is_truncated: full_content.is_some(),
                content,
                full_content,
            })
        }
        ContentBlock::ToolUse { id, name, input } => {
            let (tool_input, full_content) = tool_input_preview(input, options);
            Some(BlockContent::ToolUse {
                tool_use_id: id.clone(),
                tool_name: name.clone().unwrap_or_else(|| "?".to_string()),
                tool_input,
                input: input.clone(),
                is_truncated: full_content.is_some(),
                full_content,
                subagent_type: input
                    .get("subagent_type")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
                subagent: None,
            })
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let (content, full_content) =
                truncate(&tool_result_text(content), options.tool_result_limit);
            Some(BlockContent::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content,
                is_truncated: full_content.is_some(),
                full_content,
                is_error: is_error.unwrap_or(false),
                agent_id: None,
                orphaned: false,
            })
        }
        ContentBlock::Image { .. } | ContentBlock::Unknown => None,
    }
}

fn tool_input_preview(input: &Value, options: &ParseOptions) -> (String, Option<String>) {
    if let Some(value) = PREVIEW_KEYS.iter().find_map(|key| input.get(*key)) {
        return truncate(&value_text(value), options.tool_input_limit);
    }

    let whole = if input.is_null() {
        "{}".to_string()
    } else {
        input.to_string()
    };
    truncate(&whole, options.tool_input_fallback_limit)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Flattens tool result content: list items contribute their `text` fields,
/// one per line.
pub fn tool_result_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| item.get("text").and_then(Value::as_str).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}
