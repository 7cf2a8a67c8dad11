//! Archive layout: which blobs go in, and under which entry names.

use std::collections::{HashMap, HashSet};

use canopy_core::types::NodeId;
use canopy_entity::node::{Node, first_free_name};

/// One file in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    /// Relative path inside the archive.
    pub path: String,
    /// Blob key to read.
    pub content_ref: String,
    /// Expected size in bytes.
    pub size_bytes: i64,
}

/// Collects archive entries across overlapping selections.
#[derive(Debug, Default)]
pub struct ExportPlan {
    entries: Vec<ExportEntry>,
    added: HashSet<NodeId>,
    paths: HashSet<String>,
    total_bytes: u64,
}

impl ExportPlan {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a selected file at the archive root.
    pub fn add_file(&mut self, file: &Node) {
        self.push("", file);
    }

    /// Adds every file below `folder`, rooted at the folder's own name.
    /// `descendants` are the folder's active descendants.
    pub fn add_folder(&mut self, folder: &Node, descendants: &[Node]) {
        let names: HashMap<NodeId, &str> = descendants
            .iter()
            .filter(|n| n.is_folder)
            .map(|n| (n.id, n.name.as_str()))
            .collect();

        for file in descendants.iter().filter(|n| n.is_file()) {
            let ancestors = file.path.ancestor_ids();
            let Some(start) = ancestors.iter().position(|id| *id == folder.id) else {
                continue;
            };

            let mut dir = String::from(folder.name.as_str());
            for id in &ancestors[start + 1..] {
                let Some(name) = names.get(id) else {
                    continue;
                };
                dir.push('/');
                dir.push_str(name);
            }
            dir.push('/');
            self.push(&dir, file);
        }
    }

    fn push(&mut self, dir: &str, file: &Node) {
        let Some(content_ref) = file.content_ref.as_deref() else {
            return;
        };
        if !self.added.insert(file.id) {
            return;
        }

        let name = first_free_name(&file.name, |candidate| {
            self.paths.contains(&format!("{dir}{candidate}"))
        });
        let path = format!("{dir}{name}");
        self.paths.insert(path.clone());

        self.total_bytes += file.size_bytes.max(0) as u64;
        self.entries.push(ExportEntry {
            path,
            content_ref: content_ref.to_string(),
            size_bytes: file.size_bytes,
        });
    }

    /// Whether no file was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sum of entry sizes.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// The planned entries, in insertion order.
    pub fn into_entries(self) -> Vec<ExportEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use canopy_core::types::UserId;
    use canopy_entity::node::{MaterializedPath, NewNode};

    use super::*;

    fn folder(owner: UserId, name: &str, parent: Option<&Node>) -> Node {
        NewNode::folder(
            owner,
            name,
            parent.map(|p| p.id),
            MaterializedPath::build(parent),
        )
        .into_node(Utc::now())
    }

    fn file(owner: UserId, name: &str, parent: Option<&Node>) -> Node {
        NewNode {
            is_folder: false,
            size_bytes: 4,
            content_ref: Some(format!("blob/{name}")),
            ..NewNode::folder(owner, name, parent.map(|p| p.id), MaterializedPath::build(parent))
        }
        .into_node(Utc::now())
    }

    #[test]
    fn test_folder_entries_are_rooted_at_folder_name() {
        let owner = UserId::new();
        let notes = folder(owner, "Notes", None);
        let week = folder(owner, "week1", Some(&notes));
        let a = file(owner, "a.txt", Some(&notes));
        let b = file(owner, "b.txt", Some(&week));

        let mut plan = ExportPlan::new();
        plan.add_folder(&notes, &[week.clone(), a, b]);

        let paths: Vec<String> = plan.into_entries().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["Notes/a.txt", "Notes/week1/b.txt"]);
    }

    #[test]
    fn test_overlapping_selection_is_deduplicated() {
        let owner = UserId::new();
        let notes = folder(owner, "Notes", None);
        let a = file(owner, "a.txt", Some(&notes));

        let mut plan = ExportPlan::new();
        plan.add_folder(&notes, std::slice::from_ref(&a));
        plan.add_file(&a);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.total_bytes(), 4);
    }

    #[test]
    fn test_colliding_names_are_numbered() {
        let owner = UserId::new();
        let left = folder(owner, "left", None);
        let right = folder(owner, "right", None);
        let first = file(owner, "report.pdf", Some(&left));
        let second = file(owner, "report.pdf", Some(&right));

        let mut plan = ExportPlan::new();
        plan.add_file(&first);
        plan.add_file(&second);

        let paths: Vec<String> = plan.into_entries().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["report.pdf", "report (1).pdf"]);
    }
}
