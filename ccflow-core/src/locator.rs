//! Resolution of a session id to its main log under the Claude data root.

use std::cmp::Reverse;
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::ClaudeRoot;
use crate::error::{CcflowError, Result};
use crate::record::Record;

static SESSION_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid regex")
});

const SESSIONS_INDEX_FILE: &str = "sessions-index.json";
const HEADER_SCAN_LINES: usize = 30;

#[derive(Debug, Deserialize)]
struct SessionsIndex {
    #[serde(default)]
    entries: Vec<SessionIndexEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionIndexEntry {
    session_id: String,
    full_path: Option<PathBuf>,
}

/// How a session log was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateSource {
    SessionsIndex,
    Filename,
    HeaderScan,
}

impl fmt::Display for LocateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::SessionsIndex => "sessions-index",
            Self::Filename => "filename",
            Self::HeaderScan => "header-scan",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub session_id: String,
    pub path: PathBuf,
    pub source: LocateSource,
    pub candidate_count: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SessionLocator {
    projects_root: PathBuf,
}

impl SessionLocator {
    pub fn new(root: &ClaudeRoot) -> Self {
        Self {
            projects_root: root.projects_root(),
        }
    }

    /// Finds the main log of `session_id`. When several logs match, the most
    /// recently modified one wins and a warning is recorded.
    pub fn resolve(&self, session_id: &str) -> Result<ResolvedSession> {
        if !is_session_id(session_id) {
            return Err(CcflowError::InvalidSessionId(session_id.to_string()));
        }

        let strategies: [(LocateSource, fn(&Path, &str) -> Vec<PathBuf>); 3] = [
            (LocateSource::SessionsIndex, find_from_sessions_index),
            (LocateSource::Filename, find_by_filename),
            (LocateSource::HeaderScan, find_by_header_scan),
        ];

        for (source, find) in strategies {
            let hits = find(&self.projects_root, session_id);
            if let Some((path, candidate_count)) = choose_latest(hits) {
                debug!(session_id, %source, path = %path.display(), "resolved session log");
                return Ok(make_resolved(session_id, path, candidate_count, source));
            }
        }

        Err(CcflowError::SessionNotFound {
            session_id: session_id.to_string(),
            searched_roots: vec![self.projects_root.clone()],
        })
    }
}

pub fn is_session_id(input: &str) -> bool {
    SESSION_ID_RE.is_match(input)
}

fn make_resolved(
    session_id: &str,
    path: PathBuf,
    candidate_count: usize,
    source: LocateSource,
) -> ResolvedSession {
    let mut warnings = Vec::new();
    if candidate_count > 1 {
        debug!(session_id, candidate_count, "multiple session logs match");
        warnings.push(format!(
            "multiple matches found ({candidate_count}) for session_id={session_id}; selected latest: {}",
            path.display()
        ));
    }

    ResolvedSession {
        session_id: session_id.to_string(),
        path,
        source,
        candidate_count,
        warnings,
    }
}

fn choose_latest(mut paths: Vec<PathBuf>) -> Option<(PathBuf, usize)> {
    paths.sort();
    paths.dedup();
    let count = paths.len();

    paths
        .into_iter()
        .max_by_key(|path| {
            let modified = fs::metadata(path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            // earliest path wins among equal mtimes
            (modified, Reverse(path.clone()))
        })
        .map(|path| (path, count))
}

fn session_files(projects_root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(projects_root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
}

/// Subagent logs carry their parent's session id and must never be picked as
/// the main log.
fn is_main_log(path: &Path) -> bool {
    let is_jsonl = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "jsonl");
    let is_agent = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("agent-"));
    let in_subagents_dir = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|name| name == "subagents");

    is_jsonl && !is_agent && !in_subagents_dir
}

fn find_from_sessions_index(projects_root: &Path, session_id: &str) -> Vec<PathBuf> {
    session_files(projects_root)
        .filter(|path| path.file_name().is_some_and(|name| name == SESSIONS_INDEX_FILE))
        .filter_map(|path| fs::read_to_string(path).ok())
        .filter_map(|content| serde_json::from_str::<SessionsIndex>(&content).ok())
        .flat_map(|index| index.entries)
        .filter(|entry| entry.session_id.eq_ignore_ascii_case(session_id))
        .filter_map(|entry| entry.full_path)
        .filter(|path| path.is_file())
        .collect()
}

fn find_by_filename(projects_root: &Path, session_id: &str) -> Vec<PathBuf> {
    session_files(projects_root)
        .filter(|path| is_main_log(path))
        .filter(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| stem.eq_ignore_ascii_case(session_id))
        })
        .collect()
}

fn find_by_header_scan(projects_root: &Path, session_id: &str) -> Vec<PathBuf> {
    session_files(projects_root)
        .filter(|path| is_main_log(path))
        .filter(|path| header_mentions_session(path, session_id))
        .collect()
}

fn header_mentions_session(path: &Path, session_id: &str) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };

    BufReader::new(file)
        .lines()
        .take(HEADER_SCAN_LINES)
        .map_while(std::result::Result::ok)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Record>(&line).ok())
        .any(|record| {
            record
                .session_id
                .is_some_and(|id| id.eq_ignore_ascii_case(session_id))
        })
}
