//! Turn assembly.
//!
//! A turn is a user-text record plus every record reachable below it before
//! the next user-text record. The walk is breadth-first because one assistant
//! message with several tool calls fans out into sibling tool-result records;
//! following a single chain would stop at the first of them.

use std::collections::{HashSet, VecDeque};

use crate::blocks::record_blocks;
use crate::classify::{image_source_path, is_image_placeholder, is_system_injected, is_user_text};
use crate::config::ParseOptions;
use crate::model::Turn;
use crate::record::{ContentBlock, Record, RecordKind, TURN_DURATION_SUBTYPE};
use crate::tree::TreeIndex;

/// One collected turn and the user-text records that open its child turns,
/// in timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedTurn {
    pub turn: Turn,
    pub next_turn_ids: Vec<String>,
}

/// Assembles turns from a [`TreeIndex`]. A record is claimed by the first turn
/// that reaches it and is never attributed to another one.
#[derive(Debug)]
pub struct TurnCollector<'a> {
    tree: &'a TreeIndex,
    options: ParseOptions,
    claimed: HashSet<&'a str>,
}

impl<'a> TurnCollector<'a> {
    pub fn new(tree: &'a TreeIndex, options: ParseOptions) -> Self {
        Self {
            tree,
            options,
            claimed: HashSet::new(),
        }
    }

    /// Collects the turn opened by `start`. Returns `None` when `start` is
    /// unknown, not user text, or already claimed.
    pub fn collect_turn(
        &mut self,
        start: &'a str,
        parent_turn_id: Option<&str>,
    ) -> Option<CollectedTurn> {
        let tree = self.tree;
        let record = tree.get(start).filter(|record| is_user_text(record))?;
        if !self.claimed.insert(start) {
            return None;
        }

        let mut turn = Turn {
            id: start.to_string(),
            parent_turn_id: parent_turn_id.map(ToString::to_string),
            children_turn_ids: Vec::new(),
            user_message: record.first_text().unwrap_or_default(),
            user_timestamp: record.timestamp().to_string(),
            blocks: Vec::new(),
            image_paths: Vec::new(),
            is_system: is_system_injected(record),
            is_branch: false,
            duration_ms: None,
        };
        let mut next_turn_ids = Vec::new();

        let mut visited = HashSet::<&str>::from([start]);
        let mut queue = tree
            .children(start)
            .iter()
            .map(String::as_str)
            .collect::<VecDeque<_>>();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(record) = tree.get(id) else {
                continue;
            };

            if is_user_text(record) && !is_image_placeholder(record) {
                next_turn_ids.push(id.to_string());
                continue;
            }

            if !self.claimed.insert(id) {
                continue;
            }
            self.absorb(&mut turn, record);

            queue.extend(
                tree.children(id)
                    .iter()
                    .map(String::as_str)
                    .filter(|child| !visited.contains(child)),
            );
        }

        turn.blocks.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        // boundaries are found level by level; display wants them by time
        next_turn_ids.sort_by(|a, b| {
            let a = tree.get(a).map_or("", Record::timestamp);
            let b = tree.get(b).map_or("", Record::timestamp);
            a.cmp(b)
        });

        Some(CollectedTurn {
            turn,
            next_turn_ids,
        })
    }

    fn absorb(&self, turn: &mut Turn, record: &Record) {
        if is_image_placeholder(record) {
            turn.image_paths
                .extend(record.content_blocks().iter().filter_map(|block| match block {
                    ContentBlock::Text { text } => image_source_path(text),
                    _ => None,
                }));
            return;
        }

        if record.kind == RecordKind::System && record.subtype() == Some(TURN_DURATION_SUBTYPE) {
            turn.duration_ms = record.duration_ms.or(turn.duration_ms);
        }

        turn.blocks.extend(record_blocks(record, &self.options));
    }

    /// Collects `start` and every turn below it, using an explicit work list.
    ///
    /// Turns come out in display order: each turn precedes its descendants and
    /// sibling turns follow timestamp order.
    pub fn collect_tree(&mut self, start: &'a str) -> Vec<Turn> {
        let tree = self.tree;
        let mut turns = Vec::new();
        let mut pending = vec![(start, None::<String>, false)];

        while let Some((id, parent_turn_id, is_branch)) = pending.pop() {
            let Some(collected) = self.collect_turn(id, parent_turn_id.as_deref()) else {
                continue;
            };
            let CollectedTurn {
                mut turn,
                next_turn_ids,
            } = collected;

            turn.is_branch = is_branch;
            let branches = next_turn_ids.len() > 1;
            for next in next_turn_ids.iter().rev() {
                let Some(next) = tree.canonical_id(next) else {
                    continue;
                };
                pending.push((next, Some(turn.id.clone()), branches));
            }
            turn.children_turn_ids = next_turn_ids;
            turns.push(turn);
        }

        turns
    }
}
