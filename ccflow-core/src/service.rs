use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::classify::is_user_text;
use crate::config::ParseOptions;
use crate::error::Result;
use crate::linker::link_document;
use crate::loader::{LoadedRecords, load_records, partition_by_subagent};
use crate::model::{Document, SubagentTranscript, TranscriptSource, Turn};
use crate::record::Record;
use crate::segment::build_segments;
use crate::tree::TreeIndex;
use crate::turn::TurnCollector;

const AGENT_FILE_PREFIX: &str = "agent-";

/// Parses a session log and every subagent log it can find next to it.
pub fn parse_session(path: &Path) -> Result<Document> {
    parse_session_with(path, ParseOptions::default())
}

pub fn parse_session_with(path: &Path, options: ParseOptions) -> Result<Document> {
    let main = load_records(path)?;
    let session_id = session_id_from_path(path);

    let mut warnings = Vec::new();
    let mut skipped_lines = 0;
    let mut file_logs = BTreeMap::new();

    for (agent_id, log_path) in discover_subagent_logs(path, &session_id, &mut warnings) {
        match load_records(&log_path) {
            Ok(loaded) => {
                skipped_lines += loaded.skipped_lines;
                warnings.extend(loaded.warnings);
                file_logs.insert(agent_id, loaded.records);
            }
            Err(err) => {
                warn!(agent_id = %agent_id, "omitting subagent transcript: {err}");
                warnings.push(format!("omitting subagent {agent_id}: {err}"));
            }
        }
    }

    let mut document = build_document(main, file_logs, options);
    document.skipped_lines += skipped_lines;
    document.warnings.extend(warnings);

    debug!(
        session_id = %session_id,
        segments = document.segments.len(),
        turns = document.total_turns(),
        subagents = document.subagents.len(),
        skipped_lines = document.skipped_lines,
        "reconstructed session"
    );

    Ok(document)
}

/// Builds a linked document from loaded records. Inline subagent records are
/// split out of `main` and replace file transcripts with the same agent id.
pub fn build_document(
    main: LoadedRecords,
    file_logs: BTreeMap<String, Vec<Record>>,
    options: ParseOptions,
) -> Document {
    let LoadedRecords {
        records,
        skipped_lines,
        warnings,
    } = main;
    let (main_records, inline_logs) = partition_by_subagent(records);

    let tree = TreeIndex::build(main_records);
    let segments = build_segments(&tree, options);

    let mut subagents = BTreeMap::new();
    let logs = file_logs
        .into_iter()
        .map(|(agent_id, records)| (agent_id, TranscriptSource::File, records))
        .chain(
            inline_logs
                .into_iter()
                .map(|(agent_id, records)| (agent_id, TranscriptSource::Inline, records)),
        );
    for (agent_id, source, records) in logs {
        let turns = build_transcript(records, options);
        subagents.insert(
            agent_id.clone(),
            SubagentTranscript {
                agent_id,
                source,
                turns,
            },
        );
    }

    let mut document = Document {
        segments,
        subagents,
        skipped_lines,
        warnings,
    };
    link_document(&mut document);
    document
}

/// Turns of an unsegmented log: the first user-text record under each root
/// opens a turn tree, and the trees follow root order.
pub fn build_transcript(records: Vec<Record>, options: ParseOptions) -> Vec<Turn> {
    let tree = TreeIndex::build(records);
    let mut collector = TurnCollector::new(&tree, options);
    let mut turns = Vec::new();

    for root_id in tree.roots() {
        if let Some(start) = tree.find_first(root_id, is_user_text) {
            turns.extend(collector.collect_tree(start));
        }
    }

    turns
}

/// Subagent logs belonging to the session at `main_path`, keyed by agent id.
///
/// Looks in `<dir>/<session>/subagents/` and, for older layouts, at
/// `agent-*.jsonl` files beside the main log whose first record is a sidechain
/// of this session. The nested directory wins when both hold an agent.
pub fn discover_subagent_logs(
    main_path: &Path,
    session_id: &str,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, PathBuf> {
    let project_dir = main_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut logs = BTreeMap::new();

    for path in agent_files(project_dir) {
        if legacy_log_matches(&path, session_id, warnings)
            && let Some(agent_id) = agent_id_from_path(&path)
        {
            logs.insert(agent_id, path);
        }
    }

    let nested_dir = project_dir.join(session_id).join("subagents");
    for path in agent_files(&nested_dir) {
        if let Some(agent_id) = agent_id_from_path(&path) {
            logs.insert(agent_id, path);
        }
    }

    logs
}

fn agent_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_agent_filename(path))
        .collect::<Vec<_>>();
    paths.sort();
    paths
}

fn is_agent_filename(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "jsonl")
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(AGENT_FILE_PREFIX))
}

fn agent_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let agent_id = stem.strip_prefix(AGENT_FILE_PREFIX).unwrap_or(stem);
    (!agent_id.is_empty()).then(|| agent_id.to_string())
}

/// A legacy agent log belongs to the session when its first record is a
/// sidechain carrying the session id.
fn legacy_log_matches(path: &Path, session_id: &str, warnings: &mut Vec<String>) -> bool {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), "cannot open agent log: {err}");
            warnings.push(format!("cannot open agent log {}: {err}", path.display()));
            return false;
        }
    };

    let first_line = BufReader::new(file)
        .lines()
        .map_while(std::result::Result::ok)
        .find(|line| !line.trim().is_empty());
    let Some(first_line) = first_line else {
        return false;
    };

    serde_json::from_str::<Record>(&first_line).is_ok_and(|record| {
        record.is_sidechain == Some(true) && record.session_id.as_deref() == Some(session_id)
    })
}

/// The session id is the log's file stem.
pub fn session_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
