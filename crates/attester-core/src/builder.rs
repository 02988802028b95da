//! Conversion of the engine's task tree into a [`TestTree`].
//!
//! Names are filtered to `[A-Za-z0-9._]` and made unique across the whole
//! tree by appending `2`, `3`, ... Task ids are indexed so that later
//! events can be resolved to their [`Description`](crate::host::Description).

use std::collections::{HashMap, HashSet};

use crate::error::{BridgeError, Result};
use crate::host::{DescriptionId, TestTree};
use crate::protocol::TaskNode;

/// Label used for tasks without a usable name.
pub const UNKNOWN_TEST_NAME: &str = "Unknown_test";

/// Maps engine task ids to tree nodes.
pub type TaskIndex = HashMap<i64, DescriptionId>;

/// Replace every run of characters outside `[A-Za-z0-9._]` with `_`.
///
/// Absent or empty names become [`UNKNOWN_TEST_NAME`].
pub fn filtered_name(name: Option<&str>) -> String {
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return UNKNOWN_TEST_NAME.to_string();
    };
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

/// Incrementally builds a [`TestTree`] from task forests.
#[derive(Debug, Clone)]
pub struct TestTreeBuilder {
    tree: TestTree,
    index: TaskIndex,
    names: HashSet<String>,
}

impl TestTreeBuilder {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            tree: TestTree::new(root_name),
            index: TaskIndex::new(),
            names: HashSet::new(),
        }
    }

    /// Attach `forest` under the root.
    ///
    /// Task ids are checked before anything is added, so a duplicate id
    /// leaves the tree untouched.
    pub fn add_forest(&mut self, forest: &[TaskNode]) -> Result<()> {
        self.check_ids(forest)?;
        let root = self.tree.root().id;
        self.convert_nodes(root, forest);
        Ok(())
    }

    pub fn tree(&self) -> &TestTree {
        &self.tree
    }

    pub fn index(&self) -> &TaskIndex {
        &self.index
    }

    pub fn resolve(&self, task_id: i64) -> Option<DescriptionId> {
        self.index.get(&task_id).copied()
    }

    pub fn finish(self) -> (TestTree, TaskIndex) {
        (self.tree, self.index)
    }

    fn check_ids(&self, forest: &[TaskNode]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&TaskNode> = forest.iter().collect();
        while let Some(node) = stack.pop() {
            if let Some(id) = node.task_id {
                if self.index.contains_key(&id) || !seen.insert(id) {
                    return Err(BridgeError::DuplicateTaskId(id));
                }
            }
            if let Some(children) = &node.sub_tasks {
                stack.extend(children.iter());
            }
        }
        Ok(())
    }

    fn convert_nodes(&mut self, parent: DescriptionId, nodes: &[TaskNode]) {
        for node in nodes {
            let name = self.unique_name(filtered_name(node.name.as_deref()));
            let id = self.tree.add_child(parent, name);
            if let Some(task_id) = node.task_id {
                self.index.insert(task_id, id);
            }
            if let Some(children) = &node.sub_tasks {
                self.convert_nodes(id, children);
            }
        }
    }

    fn unique_name(&mut self, base: String) -> String {
        if self.names.insert(base.clone()) {
            return base;
        }
        let mut suffix = 2u32;
        loop {
            let candidate = format!("{base}{suffix}");
            if self.names.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Build a complete tree and id index from a task forest.
pub fn build_tree(root_name: &str, forest: &[TaskNode]) -> Result<(TestTree, TaskIndex)> {
    let mut builder = TestTreeBuilder::new(root_name);
    builder.add_forest(forest)?;
    Ok(builder.finish())
}
