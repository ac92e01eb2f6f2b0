use crate::classify::is_user_text;
use crate::config::ParseOptions;
use crate::model::{CompactMetadata, Segment, SegmentKind};
use crate::tree::TreeIndex;
use crate::turn::TurnCollector;

/// Where a segment begins, before its turns are collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStart<'a> {
    pub start_id: &'a str,
    pub kind: SegmentKind,
    pub compact_metadata: Option<CompactMetadata>,
}

/// Classifies every root of `tree` and locates its first user-text record.
/// Roots with no reachable user text produce nothing.
pub fn segment_starts(tree: &TreeIndex) -> Vec<SegmentStart<'_>> {
    let mut starts = Vec::new();

    for root_id in tree.roots() {
        let Some(root) = tree.get(root_id) else {
            continue;
        };

        let kind = if root.is_compact_boundary() {
            SegmentKind::Continuation
        } else {
            SegmentKind::Original
        };

        // the root itself is the first candidate of the search
        let Some(start_id) = tree.find_first(root_id, is_user_text) else {
            continue;
        };

        let compact_metadata = root
            .compact_metadata
            .as_ref()
            .map(|meta| CompactMetadata {
                trigger: meta.trigger.clone().unwrap_or_else(|| "unknown".to_string()),
                pre_tokens: meta.pre_tokens.unwrap_or(0),
                post_tokens: meta.post_tokens,
            });

        starts.push(SegmentStart {
            start_id,
            kind,
            compact_metadata,
        });
    }

    starts
}

/// Splits the tree into segments ordered by the timestamp of their first
/// turn, numbered from zero.
pub fn build_segments(tree: &TreeIndex, options: ParseOptions) -> Vec<Segment> {
    let mut starts = segment_starts(tree);
    starts.sort_by(|a, b| {
        let a = tree.get(a.start_id).map(|record| record.timestamp());
        let b = tree.get(b.start_id).map(|record| record.timestamp());
        a.cmp(&b)
    });

    let mut collector = TurnCollector::new(tree, options);
    let mut segments = Vec::new();

    for start in starts {
        let turns = collector.collect_tree(start.start_id);
        if turns.is_empty() {
            continue;
        }

        segments.push(Segment {
            id: segments.len(),
            kind: start.kind,
            timestamp: turns[0].user_timestamp.clone(),
            turns,
            compact_metadata: start.compact_metadata,
        });
    }

    segments
}
