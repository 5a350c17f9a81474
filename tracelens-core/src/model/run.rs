use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::node::{NodeId, TraceNode};
use super::{has_metadata, Metadata};

const ID_NAMESPACE: Uuid = Uuid::from_u128(0x7f3c_9b1e_4d2a_4c6b_9e10_5a8f_2d41_c7e3);

/// One capture session: a forest of calls stored in a flat arena.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRun {
    pub id: Option<Uuid>,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub metadata: Metadata,
    roots: Vec<NodeId>,
    nodes: Vec<TraceNode>,
}

impl TraceRun {
    pub fn new(name: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: name.into(),
            start_time,
            metadata: Metadata::new(),
            roots: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Append a top-level call. Any children already on `node` are discarded.
    pub fn add_root(&mut self, node: TraceNode) -> NodeId {
        let id = self.alloc(node);
        self.roots.push(id);
        id
    }

    /// Append `node` as the last child of `parent`. Returns `None` when `parent`
    /// was not issued by this run.
    pub fn add_child(&mut self, parent: NodeId, node: TraceNode) -> Option<NodeId> {
        if parent.0 >= self.nodes.len() {
            return None;
        }
        let id = self.alloc(node);
        self.nodes[parent.0].children.push(id);
        Some(id)
    }

    fn alloc(&mut self, mut node: TraceNode) -> NodeId {
        node.children.clear();
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&TraceNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[TraceNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// A run with no calls is valid but carries nothing to flatten.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn has_metadata(&self) -> bool {
        has_metadata(&self.metadata)
    }

    /// Give the run and every node lacking an identifier one derived from
    /// `scope`, the run's name and start, and the node's arena index.
    /// Reloading the same file yields the same identifiers.
    /// Returns how many identifiers were assigned.
    pub fn assign_missing_ids(&mut self, scope: &str) -> usize {
        let base = format!("{scope}\n{}\n{}", self.name, self.start_time.to_rfc3339());
        let mut assigned = 0;
        if self.id.is_none() {
            self.id = Some(Uuid::new_v5(&ID_NAMESPACE, base.as_bytes()));
            assigned += 1;
        }
        for (index, node) in self.nodes.iter_mut().enumerate() {
            if node.id.is_none() {
                let name = format!("{base}\n{index}");
                node.id = Some(Uuid::new_v5(&ID_NAMESPACE, name.as_bytes()));
                assigned += 1;
            }
        }
        assigned
    }

    /// Depth-first pre-order walk over the root set, left to right.
    pub fn walk(&self) -> PreOrder<'_> {
        PreOrder {
            run: self,
            stack: self.roots.iter().rev().map(|&id| (id, 0)).collect(),
        }
    }
}

/// A visited node together with its depth below the root set.
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub id: NodeId,
    pub node: &'a TraceNode,
    pub level: usize,
}

pub struct PreOrder<'a> {
    run: &'a TraceRun,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, level)) = self.stack.pop() {
            let Some(node) = self.run.node(id) else {
                continue;
            };
            self.stack
                .extend(node.children.iter().rev().map(|&child| (child, level + 1)));
            return Some(Visit { id, node, level });
        }
        None
    }
}

/// The runs parsed out of one file, tagged with the file's name.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub runs: Vec<TraceRun>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, runs: Vec<TraceRun>) -> Self {
        Self {
            name: name.into(),
            runs,
        }
    }

    /// Fill in missing identifiers, scoped by file name and run position.
    pub fn assign_missing_ids(&mut self) -> usize {
        let name = &self.name;
        self.runs
            .iter_mut()
            .enumerate()
            .map(|(index, run)| run.assign_missing_ids(&format!("{name}#{index}")))
            .sum()
    }
}

/// A run viewed together with the file it came from.
#[derive(Debug, Clone, Copy)]
pub struct RunRef<'a> {
    pub source: &'a str,
    pub run: &'a TraceRun,
}

/// Every loaded run, grouped by file of origin, in a caller-defined file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSet {
    files: Vec<SourceFile>,
}

impl RunSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files(files: Vec<SourceFile>) -> Self {
        Self { files }
    }

    pub fn single(name: impl Into<String>, runs: Vec<TraceRun>) -> Self {
        Self {
            files: vec![SourceFile::new(name, runs)],
        }
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Runs in file order, then stored order within each file.
    pub fn iter(&self) -> impl Iterator<Item = RunRef<'_>> + '_ {
        self.files.iter().flat_map(|file| {
            file.runs.iter().map(move |run| RunRef {
                source: file.name.as_str(),
                run,
            })
        })
    }

    pub fn run_count(&self) -> usize {
        self.files.iter().map(|f| f.runs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.run_count() == 0
    }

    pub fn assign_missing_ids(&mut self) -> usize {
        self.files.iter_mut().map(SourceFile::assign_missing_ids).sum()
    }
}
