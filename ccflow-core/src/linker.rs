use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Block, BlockContent, Document, SubagentLink, Turn};

static AGENT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"agentId:\s*([a-f0-9]+)").expect("valid regex"));

/// Agent identifier announced in a tool result, e.g. `agentId: a4f21c7`.
pub fn extract_agent_id(text: &str) -> Option<String> {
    AGENT_ID_RE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}

/// Pairs results with invocations inside one turn and links invocations to
/// the subagents their results announce.
pub fn link_turn(turn: &mut Turn, known_agents: &BTreeSet<String>) {
    let mut links = Vec::<(usize, String)>::new();

    for idx in 0..turn.blocks.len() {
        let BlockContent::ToolResult {
            tool_use_id,
            content,
            full_content,
            ..
        } = &turn.blocks[idx].content
        else {
            continue;
        };

        let announced = extract_agent_id(full_content.as_deref().unwrap_or(content));
        let invocation = find_invocation(&turn.blocks, idx, tool_use_id);

        if let BlockContent::ToolResult {
            agent_id, orphaned, ..
        } = &mut turn.blocks[idx].content
        {
            agent_id.clone_from(&announced);
            *orphaned = invocation.is_none();
        }

        if let (Some(invocation), Some(announced)) = (invocation, announced) {
            links.push((invocation, announced));
        }
    }

    for (idx, agent_id) in links {
        if let BlockContent::ToolUse { subagent, .. } = &mut turn.blocks[idx].content {
            *subagent = Some(if known_agents.contains(&agent_id) {
                SubagentLink::Available { agent_id }
            } else {
                SubagentLink::Unavailable { agent_id }
            });
        }
    }
}

/// Nearest preceding invocation with the same id, else any in the turn.
fn find_invocation(blocks: &[Block], result_idx: usize, id: &str) -> Option<usize> {
    let is_invocation = |block: &Block| {
        matches!(block.content, BlockContent::ToolUse { .. }) && block.tool_use_id() == Some(id)
    };

    blocks[..result_idx]
        .iter()
        .rposition(is_invocation)
        .or_else(|| blocks.iter().position(is_invocation))
}

/// Links every turn of the document, main segments and subagent transcripts.
pub fn link_document(document: &mut Document) {
    let known_agents = document.subagents.keys().cloned().collect::<BTreeSet<_>>();

    for segment in &mut document.segments {
        for turn in &mut segment.turns {
            link_turn(turn, &known_agents);
        }
    }
    for transcript in document.subagents.values_mut() {
        for turn in &mut transcript.turns {
            link_turn(turn, &known_agents);
        }
    }
}
