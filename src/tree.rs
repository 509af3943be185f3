//! Hierarchical grouping of results by dotted test name
//!
//! `pkg.mod.Case.test_x` becomes the path `pkg` → `mod` → `Case` →
//! `test_x` below a single `root` node. Group nodes only carry their
//! children; leaves carry the test's status and duration. Children keep the
//! order in which their names were first seen.

use crate::test_result::{TestResult, TestStatus};
use serde::Serialize;

/// Name of the node every tree is rooted at.
pub const ROOT: &str = "root";

/// One node of the name hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// A dotted-name segment grouping further nodes.
    Group {
        name: String,
        children: Vec<TreeNode>,
    },
    /// A single test result.
    Leaf {
        name: String,
        /// Full dotted test name.
        test: String,
        status: TestStatus,
        duration: f64,
    },
}

impl TreeNode {
    fn group(name: &str) -> Self {
        TreeNode::Group {
            name: name.to_string(),
            children: Vec::new(),
        }
    }
}

/// Children of the group named `segment` in `children`, created on first use.
fn group_children<'a>(children: &'a mut Vec<TreeNode>, segment: &str) -> &'a mut Vec<TreeNode> {
    let index = children
        .iter()
        .position(|c| matches!(c, TreeNode::Group { name, .. } if name == segment))
        .unwrap_or_else(|| {
            children.push(TreeNode::group(segment));
            children.len() - 1
        });
    match &mut children[index] {
        TreeNode::Group { children, .. } => children,
        TreeNode::Leaf { .. } => unreachable!("position only matches groups"),
    }
}

/// Group results into a tree keyed by dotted-name segments.
pub fn reorganize(results: &[TestResult]) -> TreeNode {
    let mut top = Vec::new();

    for result in results {
        let mut segments: Vec<&str> = result.name.split('.').collect();
        let leaf_name = segments.pop().unwrap_or_default();

        let mut children = &mut top;
        for segment in segments {
            children = group_children(children, segment);
        }

        children.push(TreeNode::Leaf {
            name: leaf_name.to_string(),
            test: result.name.clone(),
            status: result.status,
            duration: result.duration_secs(),
        });
    }

    TreeNode::Group {
        name: ROOT.to_string(),
        children: top,
    }
}
