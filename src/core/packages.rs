//! Per-branch package hierarchy with nested-set bounds.
//!
//! Nodes live in an arena indexed by [`PackageId`]. Ingestion creates one node
//! per path segment; [`PackageTree::reindex`] assigns `left`/`right` bounds in a
//! single depth-first pass, after which subtree membership is a range check.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::core::model::FileRecord;
use crate::core::scoring::aggregate;

/// Index of a package node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageId(pub usize);

/// Name of the root node, the top-level namespace.
pub const ROOT_NAME: &str = "/";

/// One folder of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageNode {
    /// Fully qualified name, `/a/b` style; the root is `/`
    pub name: String,
    /// Parent node, `None` only for the root
    pub parent: Option<PackageId>,
    /// Children in creation order
    pub children: Vec<PackageId>,
    /// Nested-set left bound
    pub left: u32,
    /// Nested-set right bound
    pub right: u32,
}

/// Flat row of the nested-set table, as handed to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRow {
    /// Node index
    pub id: usize,
    /// Fully qualified name
    pub name: String,
    /// Parent node index
    pub parent: Option<usize>,
    /// Left bound
    pub left: u32,
    /// Right bound
    pub right: u32,
}

/// Arena-backed package tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageTree {
    nodes: Vec<PackageNode>,
    #[serde(skip)]
    by_name: HashMap<String, PackageId>,
}

impl Default for PackageTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageTree {
    /// A tree holding only the root node.
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            by_name: HashMap::new(),
        };
        tree.push(ROOT_NAME.to_string(), None);
        tree.reindex();
        tree
    }

    /// The root node id.
    pub fn root(&self) -> PackageId {
        PackageId(0)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; the root exists from construction.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node.
    pub fn node(&self, id: PackageId) -> Option<&PackageNode> {
        self.nodes.get(id.0)
    }

    /// Find a node by its fully qualified name.
    pub fn find(&self, name: &str) -> Option<PackageId> {
        if self.by_name.len() != self.nodes.len() {
            return self
                .nodes
                .iter()
                .position(|node| node.name == name)
                .map(PackageId);
        }
        self.by_name.get(name).copied()
    }

    /// Resolve a folder path such as `a/b`, creating missing segments.
    pub fn get_or_create(&mut self, package: &str) -> PackageId {
        self.rebuild_name_index();

        let mut parent = self.root();
        let mut qualified = String::new();

        for segment in package.split('/').filter(|segment| !segment.is_empty()) {
            qualified.push('/');
            qualified.push_str(segment);

            parent = match self.by_name.get(&qualified) {
                Some(id) => *id,
                None => self.push(qualified.clone(), Some(parent)),
            };
        }

        parent
    }

    fn push(&mut self, name: String, parent: Option<PackageId>) -> PackageId {
        let id = PackageId(self.nodes.len());
        self.nodes.push(PackageNode {
            name: name.clone(),
            parent,
            children: Vec::new(),
            left: 0,
            right: 0,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        self.by_name.insert(name, id);
        id
    }

    fn rebuild_name_index(&mut self) {
        if self.by_name.len() == self.nodes.len() {
            return;
        }
        self.by_name = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.name.clone(), PackageId(index)))
            .collect();
    }

    /// Recompute every node's nested-set bounds.
    ///
    /// `left` is the visit counter on entry and `right` one past the counter
    /// after all descendants were visited, so a leaf satisfies
    /// `right == left + 1`. Running it twice yields identical bounds.
    pub fn reindex(&mut self) {
        enum Step {
            Enter(PackageId),
            Exit(PackageId),
        }

        let mut position: u32 = 0;
        let mut stack = vec![Step::Enter(self.root())];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    self.nodes[id.0].left = position;
                    stack.push(Step::Exit(id));
                    for child in self.nodes[id.0].children.iter().rev() {
                        stack.push(Step::Enter(*child));
                    }
                    position += 1;
                }
                Step::Exit(id) => {
                    self.nodes[id.0].right = position;
                    position += 1;
                }
            }
        }
    }

    /// `descendant` lies strictly below `ancestor`.
    pub fn is_descendant(&self, ancestor: PackageId, descendant: PackageId) -> bool {
        match (self.node(ancestor), self.node(descendant)) {
            (Some(a), Some(d)) => a.left < d.left && d.right < a.right,
            _ => false,
        }
    }

    /// `descendant` is `ancestor` itself or lies below it.
    pub fn contains(&self, ancestor: PackageId, descendant: PackageId) -> bool {
        ancestor == descendant || self.is_descendant(ancestor, descendant)
    }

    /// A node without children.
    pub fn is_leaf(&self, id: PackageId) -> bool {
        self.node(id)
            .map(|node| node.right == node.left + 1)
            .unwrap_or(false)
    }

    /// All nodes strictly below `id`, in visit order.
    pub fn descendants(&self, id: PackageId) -> Vec<PackageId> {
        let Some(anchor) = self.node(id) else {
            return Vec::new();
        };
        let mut found: Vec<(u32, PackageId)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| anchor.left < node.left && node.right < anchor.right)
            .map(|(index, node)| (node.left, PackageId(index)))
            .collect();
        found.sort_unstable();
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// The flat nested-set table.
    pub fn rows(&self) -> Vec<PackageRow> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| PackageRow {
                id: index,
                name: node.name.clone(),
                parent: node.parent.map(|parent| parent.0),
                left: node.left,
                right: node.right,
            })
            .collect()
    }

    /// Aggregate the current composite index of every live file under each package.
    ///
    /// The newest record of each identity decides whether the file is live; a
    /// deleted or faulty newest record drops the file from the roll-up.
    pub fn rollup(&self, records: &[FileRecord], lambda: f64) -> Result<BTreeMap<String, f64>> {
        let mut latest: HashMap<(PackageId, &str), &FileRecord> = HashMap::new();
        for record in records {
            let key = (record.package_id, record.name.as_str());
            match latest.get(&key) {
                Some(existing) if existing.sequence > record.sequence => {}
                _ => {
                    latest.insert(key, record);
                }
            }
        }

        let live: Vec<(PackageId, f64)> = latest
            .values()
            .filter(|record| record.change.is_readable() && !record.faulty)
            .filter_map(|record| record.metrics.composite.map(|c| (record.package_id, c)))
            .collect();

        let mut result = BTreeMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let id = PackageId(index);
            let scores: Vec<f64> = live
                .iter()
                .filter(|(package, _)| self.contains(id, *package))
                .map(|(_, score)| *score)
                .collect();
            if scores.is_empty() {
                continue;
            }
            result.insert(node.name.clone(), aggregate(&scores, lambda)?);
        }

        Ok(result)
    }
}
