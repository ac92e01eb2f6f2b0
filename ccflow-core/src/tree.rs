use std::collections::{HashMap, HashSet, VecDeque};

use crate::record::Record;

/// Identifier-keyed view of one log's records.
///
/// Parent links are only ever resolved through the map, so dangling parents,
/// duplicate identifiers and cycles degrade into extra roots or unreachable
/// records instead of failures.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    records: Vec<Record>,
    by_id: HashMap<String, usize>,
    children: HashMap<String, Vec<String>>,
    roots: Vec<String>,
}

impl TreeIndex {
    pub fn build(records: Vec<Record>) -> Self {
        let mut by_id = HashMap::<String, usize>::new();
        for (idx, record) in records.iter().enumerate() {
            if let Some(id) = record.id() {
                by_id.entry(id.to_string()).or_insert(idx);
            }
        }

        let mut children = HashMap::<String, Vec<String>>::new();
        let mut roots = Vec::new();
        for (idx, record) in records.iter().enumerate() {
            let Some(id) = record.id() else {
                continue;
            };
            // later duplicates of an identifier are shadowed
            if by_id.get(id) != Some(&idx) {
                continue;
            }

            match record.parent_id().filter(|parent| by_id.contains_key(*parent)) {
                Some(parent) => children
                    .entry(parent.to_string())
                    .or_default()
                    .push(id.to_string()),
                None => roots.push(id.to_string()),
            }
        }

        // stable: equal timestamps keep log order
        for kids in children.values_mut() {
            kids.sort_by(|a, b| {
                let a = by_id.get(a).map_or("", |idx| records[*idx].timestamp());
                let b = by_id.get(b).map_or("", |idx| records[*idx].timestamp());
                a.cmp(b)
            });
        }

        Self {
            records,
            by_id,
            children,
            roots,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.by_id.get(id).map(|idx| &self.records[*idx])
    }

    /// The index's own copy of `id`, borrowed for as long as the index.
    pub fn canonical_id(&self, id: &str) -> Option<&str> {
        self.by_id.get_key_value(id).map(|(key, _)| key.as_str())
    }

    pub fn children(&self, id: &str) -> &[String] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Records whose parent is absent or unknown, in log order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Breadth-first search from `start` (inclusive) for the first record
    /// matching `predicate`.
    pub fn find_first<'a>(
        &'a self,
        start: &'a str,
        predicate: impl Fn(&Record) -> bool,
    ) -> Option<&'a str> {
        let mut visited = HashSet::<&str>::new();
        let mut queue = VecDeque::from([start]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(record) = self.get(id) else {
                continue;
            };
            if predicate(record) {
                return Some(id);
            }
            queue.extend(
                self.children(id)
                    .iter()
                    .map(String::as_str)
                    .filter(|child| !visited.contains(child)),
            );
        }

        None
    }
}
