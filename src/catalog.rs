//! Per-file table of discovered trees
//!
//! Each source file owns exactly one `TestTree`. Re-parsing a file replaces
//! its tree wholesale, so node ids handed out earlier resolve against the
//! new tree or not at all.
//!
//! This is library API for long-lived embedders such as an editor
//! integration that keeps trees for many open files. The one-shot CLI builds
//! a single tree per invocation and does not use it.

use crate::tree::{NodeId, TestTree, TreeNode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct TreeCatalog {
    trees: HashMap<PathBuf, TestTree>,
}

impl TreeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a tree under its own path, returning the one it replaces.
    pub fn insert(&mut self, tree: TestTree) -> Option<TestTree> {
        self.trees.insert(tree.path.clone(), tree)
    }

    pub fn remove(&mut self, path: &Path) -> Option<TestTree> {
        self.trees.remove(path)
    }

    pub fn get(&self, path: &Path) -> Option<&TestTree> {
        self.trees.get(path)
    }

    /// Resolve a node by file and string id.
    pub fn node(&self, path: &Path, id: &str) -> Option<(NodeId, &TreeNode)> {
        let tree = self.trees.get(path)?;
        let index = tree.find(id)?;
        tree.node(index).map(|node| (index, node))
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.trees.keys().map(PathBuf::as_path)
    }
}
