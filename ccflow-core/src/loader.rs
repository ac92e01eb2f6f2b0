use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::{CcflowError, Result};
use crate::record::Record;

/// Records of one log, in log order, plus what had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedRecords {
    pub records: Vec<Record>,
    pub skipped_lines: usize,
    pub warnings: Vec<String>,
}

/// Reads a JSONL log. Only failing to read the file itself is an error.
pub fn load_records(path: &Path) -> Result<LoadedRecords> {
    let bytes = fs::read(path).map_err(|source| CcflowError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(parse_lines(&path.display().to_string(), &bytes))
}

pub fn parse_records(raw: &str) -> LoadedRecords {
    parse_lines("<memory>", raw.as_bytes())
}

fn parse_lines(source: &str, bytes: &[u8]) -> LoadedRecords {
    let mut loaded = LoadedRecords::default();

    for (line_idx, line) in bytes.split(|byte| *byte == b'\n').enumerate() {
        let line_no = line_idx + 1;

        let line = match std::str::from_utf8(line) {
            Ok(line) => line,
            Err(err) => {
                skip_line(&mut loaded, source, line_no, &err);
                continue;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Record>(trimmed) {
            Ok(record) if record.kind.is_filtered() => {}
            Ok(record) => loaded.records.push(record),
            Err(err) => skip_line(&mut loaded, source, line_no, &err),
        }
    }

    loaded
}

fn skip_line(loaded: &mut LoadedRecords, source: &str, line_no: usize, err: &dyn std::fmt::Display) {
    warn!(source, line = line_no, "skipping malformed record: {err}");
    loaded.skipped_lines += 1;
    loaded
        .warnings
        .push(format!("skipping malformed JSON at line {line_no} in {source}: {err}"));
}

/// Splits inline subagent records (non-empty `subagentId`) out of the main log.
pub fn partition_by_subagent(records: Vec<Record>) -> (Vec<Record>, BTreeMap<String, Vec<Record>>) {
    let mut main = Vec::new();
    let mut subagents = BTreeMap::<String, Vec<Record>>::new();

    for record in records {
        match record.inline_subagent_id().map(ToString::to_string) {
            Some(agent_id) => subagents.entry(agent_id).or_default().push(record),
            None => main.push(record),
        }
    }

    (main, subagents)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::error::CcflowError;
    use crate::loader::{load_records, parse_records, partition_by_subagent};
    use crate::record::RecordKind;

    #[test]
    fn empty_input_loads_nothing() {
        let loaded = parse_records("");
        assert!(loaded.records.is_empty());
        assert_eq!(loaded.skipped_lines, 0);
    }

    #[test]
    fn filters_progress_and_file_snapshots() {
        let raw = r#"{"type":"file-history-snapshot","uuid":"1"}
{"type":"progress","uuid":"2"}
{"type":"user","uuid":"3"}
{"type":"system","uuid":"4"}"#;
        let loaded = parse_records(raw);
        let kinds = loaded
            .records
            .iter()
            .map(|record| record.kind)
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec![RecordKind::User, RecordKind::System]);
    }

    #[test]
    fn skips_malformed_lines_and_keeps_order() {
        let raw = "{\"type\":\"user\",\"uuid\":\"b\"}\nnot json\n\n{\"type\":\"assistant\",\"uuid\":\"a\"}\n";
        let loaded = parse_records(raw);
        let ids = loaded
            .records
            .iter()
            .filter_map(|record| record.id())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(loaded.skipped_lines, 1);
        assert!(loaded.warnings[0].contains("line 2"));
    }

    #[test]
    fn skips_non_utf8_lines() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("session.jsonl");
        let mut bytes = b"{\"type\":\"user\",\"uuid\":\"1\"}\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"{\"type\":\"assistant\",\"uuid\":\"2\"}\n");
        fs::write(&path, bytes).expect("write");

        let loaded = load_records(&path).expect("load");
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.skipped_lines, 1);
    }

    #[test]
    fn missing_file_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let err = load_records(&temp.path().join("missing.jsonl")).expect_err("must fail");
        assert!(matches!(err, CcflowError::Io { .. }));
        assert!(format!("{err}").contains("missing.jsonl"));
    }

    #[test]
    fn partitions_inline_subagent_records() {
        let raw = r#"{"uuid":"1","type":"user"}
{"uuid":"2","type":"assistant","subagentId":"agent-a"}
{"uuid":"3","type":"user","subagentId":"agent-a"}
{"uuid":"4","type":"assistant","subagentId":"agent-b"}
{"uuid":"5","type":"user","subagentId":""}
{"uuid":"6","type":"user","subagentId":null}"#;
        let (main, subagents) = partition_by_subagent(parse_records(raw).records);
        assert_eq!(main.len(), 3);
        assert_eq!(subagents["agent-a"].len(), 2);
        assert_eq!(subagents["agent-b"].len(), 1);
    }
}
