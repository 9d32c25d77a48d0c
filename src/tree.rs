//! Bundle/Suite/Spec test tree
//!
//! Wraps parser output for one file into identified nodes. The tree is an
//! arena: nodes refer to their parent and children by `NodeId`, and the
//! bundle (the file itself) is always node 0, which is also every node's
//! bundle.

use crate::node::{BlockKind, Role, SourceInput, TestNode};
use crate::position::Range;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

pub type NodeId = usize;

/// The bundle node of every tree
pub const BUNDLE: NodeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Bundle,
    Suite,
    Spec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub kind: NodeKind,
    /// Declaring keyword; `None` for the bundle
    pub keyword: Option<BlockKind>,
    pub title: String,
    pub range: Range,
    pub start_offset: usize,
    pub end_offset: Option<usize>,
    pub skipped: bool,
    /// Runner URL that executes just this node
    pub url: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Discovered tests of a single source file
#[derive(Debug, Clone, Serialize)]
pub struct TestTree {
    pub path: PathBuf,
    /// Dotted component path, e.g. `tests.specs.unit.CalculatorTest`
    pub package_name: String,
    /// `package_name` without its last segment
    pub directory: String,
    pub runner_url: String,
    nodes: Vec<TreeNode>,
}

impl TestTree {
    /// Wrap root-level parser output into a tree.
    ///
    /// Children of spec nodes are not wrapped; a spec is always a leaf.
    pub fn build(path: impl Into<PathBuf>, package_name: &str, runner_url: &str, roots: &[TestNode]) -> Self {
        let directory = match package_name.rfind('.') {
            Some(dot) => package_name[..dot].to_string(),
            None => String::new(),
        };

        let mut tree = TestTree {
            path: path.into(),
            package_name: package_name.to_string(),
            directory,
            runner_url: runner_url.to_string(),
            nodes: Vec::new(),
        };

        let url = tree.runner_query(None);
        tree.nodes.push(TreeNode {
            id: format!("bundle_{}", package_name),
            kind: NodeKind::Bundle,
            keyword: None,
            title: package_name.to_string(),
            range: Range::default(),
            start_offset: 0,
            end_offset: None,
            skipped: false,
            url,
            parent: None,
            children: Vec::new(),
        });

        for block in roots {
            tree.attach(BUNDLE, block);
        }

        debug!(package = package_name, nodes = tree.nodes.len(), "built test tree");
        tree
    }

    /// Parse `input` with the matching strategy and build its tree.
    pub fn discover(input: SourceInput<'_>, path: impl Into<PathBuf>, package_name: &str, runner_url: &str) -> Self {
        TestTree::build(path, package_name, runner_url, &input.parse())
    }

    fn attach(&mut self, parent: NodeId, block: &TestNode) {
        let kind = match block.kind.role() {
            Role::Suite => NodeKind::Suite,
            Role::Spec => NodeKind::Spec,
        };
        let segment = match kind {
            NodeKind::Spec => "_spec_",
            _ => "_suite_",
        };
        let id = format!("{}{}{}", self.nodes[parent].id, segment, block.title);
        let url = self.runner_query(Some((kind, block.title.as_str())));

        let index = self.nodes.len();
        self.nodes.push(TreeNode {
            id,
            kind,
            keyword: Some(block.kind),
            title: block.title.clone(),
            range: block.range(),
            start_offset: block.start_offset,
            end_offset: block.end_offset,
            skipped: block.skipped,
            url,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);

        if kind == NodeKind::Suite {
            for child in &block.children {
                self.attach(index, child);
            }
        }
    }

    fn runner_query(&self, target: Option<(NodeKind, &str)>) -> String {
        let mut params: Vec<(&str, &str)> = vec![
            ("method", "runRemote"),
            ("reporter", "JSON"),
            ("recurse", "false"),
            ("directory", self.directory.as_str()),
            ("testBundles", self.package_name.as_str()),
        ];
        match target {
            Some((NodeKind::Suite, title)) => params.push(("testSuites", title)),
            Some((NodeKind::Spec, title)) => params.push(("testSpec", title)),
            _ => {}
        }
        params.push(("opt_run", "true"));
        params.push(("coverageEnabled", "false"));

        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.runner_url, query)
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn bundle(&self) -> &TreeNode {
        &self.nodes[BUNDLE]
    }

    /// The bundle a node belongs to; always the root.
    pub fn bundle_of(&self, _id: NodeId) -> NodeId {
        BUNDLE
    }

    pub fn parent(&self, id: NodeId) -> Option<&TreeNode> {
        self.node(id).and_then(|n| n.parent).and_then(|p| self.node(p))
    }

    /// Find a node by its string id. The first match wins when ids collide.
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes.iter().enumerate()
    }

    /// Every spec in the subtree rooted at `id` in declaration order,
    /// including `id` itself when it is a spec.
    pub fn specs_under(&self, id: NodeId) -> Vec<NodeId> {
        let mut specs = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            if node.kind == NodeKind::Spec {
                specs.push(current);
            }
            stack.extend(node.children.iter().rev());
        }
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use pretty_assertions::assert_eq;

    const RUNNER: &str = "http://localhost:8080/runner.cfm";

    fn sample() -> TestTree {
        let text = r#"describe("My Suite", function(){
    it("adds numbers", function(){});
    xit("skipped one", function(){});
    describe("Nested", function(){
        then("t2", function(){});
    });
});"#;
        TestTree::discover(SourceInput::Text(text), "/app/tests/specs/unit/CalculatorTest.cfc", "tests.specs.unit.CalculatorTest", RUNNER)
    }

    #[test]
    fn test_bundle_fields() {
        let tree = sample();
        let bundle = tree.bundle();
        assert_eq!(bundle.id, "bundle_tests.specs.unit.CalculatorTest");
        assert_eq!(bundle.kind, NodeKind::Bundle);
        assert_eq!(tree.directory, "tests.specs.unit");
        assert_eq!(
            bundle.url,
            "http://localhost:8080/runner.cfm?method=runRemote&reporter=JSON&recurse=false&directory=tests.specs.unit&testBundles=tests.specs.unit.CalculatorTest&opt_run=true&coverageEnabled=false"
        );
    }

    #[test]
    fn test_ids_and_classification() {
        let tree = sample();
        let ids: Vec<(NodeKind, &str)> = tree.iter().skip(1).map(|(_, n)| (n.kind, n.id.as_str())).collect();
        assert_eq!(
            ids,
            vec![
                (NodeKind::Suite, "bundle_tests.specs.unit.CalculatorTest_suite_My Suite"),
                (NodeKind::Spec, "bundle_tests.specs.unit.CalculatorTest_suite_My Suite_spec_adds numbers"),
                (NodeKind::Spec, "bundle_tests.specs.unit.CalculatorTest_suite_My Suite_spec_skipped one"),
                (NodeKind::Suite, "bundle_tests.specs.unit.CalculatorTest_suite_My Suite_suite_Nested"),
                (NodeKind::Spec, "bundle_tests.specs.unit.CalculatorTest_suite_My Suite_suite_Nested_spec_t2"),
            ]
        );
        let skipped = tree.find("bundle_tests.specs.unit.CalculatorTest_suite_My Suite_spec_skipped one").unwrap();
        assert!(tree.node(skipped).unwrap().skipped);
    }

    #[test]
    fn test_ids_are_deterministic() {
        let a: Vec<String> = sample().iter().map(|(_, n)| n.id.clone()).collect();
        let b: Vec<String> = sample().iter().map(|(_, n)| n.id.clone()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_suite_and_spec_urls_are_encoded() {
        let tree = sample();
        let suite = tree.node(1).unwrap();
        assert!(suite.url.contains("&testSuites=My%20Suite&"));
        let spec = tree.node(2).unwrap();
        assert!(spec.url.contains("&testSpec=adds%20numbers&"));
        assert!(!spec.url.contains("testSuites"));
    }

    #[test]
    fn test_parent_links_and_bundle() {
        let tree = sample();
        let t2 = tree.find("bundle_tests.specs.unit.CalculatorTest_suite_My Suite_suite_Nested_spec_t2").unwrap();
        assert_eq!(tree.parent(t2).unwrap().title, "Nested");
        assert_eq!(tree.bundle_of(t2), BUNDLE);
        assert_eq!(tree.parent(BUNDLE), None);
    }

    #[test]
    fn test_specs_under_is_depth_first() {
        let tree = sample();
        let titles: Vec<&str> = tree
            .specs_under(BUNDLE)
            .into_iter()
            .map(|id| tree.node(id).unwrap().title.as_str())
            .collect();
        assert_eq!(titles, vec!["adds numbers", "skipped one", "t2"]);
        assert_eq!(tree.specs_under(2), vec![2]);
    }

    #[test]
    fn test_open_node_range_falls_back_to_start() {
        let mut open = TestNode::new(BlockKind::It, "open", false, 5, Position::new(2, 4));
        open.children.push(TestNode::new(BlockKind::It, "ignored", false, 9, Position::new(3, 0)));
        let tree = TestTree::build("Spec.cfc", "Spec", RUNNER, &[open]);
        let node = tree.node(1).unwrap();
        assert_eq!(node.range, Range::point(Position::new(2, 4)));
        assert!(node.children.is_empty());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_package_without_dots_has_empty_directory() {
        let tree = TestTree::build("Spec.cfc", "Spec", RUNNER, &[]);
        assert_eq!(tree.directory, "");
        assert!(tree.is_empty());
    }
}
