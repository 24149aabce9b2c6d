//! This module defines [TreeNode], the renderable proof tree.

use ascii_tree::write_tree;
use serde::Serialize;
use serde_json::{json, Value};

/// A node of a derivation tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TreeNode {
    /// A base fact (or a subtree cut off by the depth limit).
    Leaf {
        /// Rendering of the fact.
        fact: String,
    },
    /// A fact derived by applying a rule to justified premises.
    Inner {
        /// Rendering of the derived fact.
        fact: String,
        /// Label of the applied rule, e.g. `R2`.
        rule: String,
        /// Justifications of the body literals, in rule order.
        children: Vec<TreeNode>,
    },
}

impl TreeNode {
    /// The fact this node justifies.
    pub fn fact(&self) -> &str {
        match self {
            TreeNode::Leaf { fact } | TreeNode::Inner { fact, .. } => fact,
        }
    }

    /// Height of the subtree rooted here; a leaf has height one.
    pub fn height(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Inner { children, .. } => {
                1 + children.iter().map(TreeNode::height).max().unwrap_or(0)
            }
        }
    }

    /// Render the tree as indented ascii art.
    pub fn ascii(&self) -> String {
        let mut out = String::new();
        write_tree(&mut out, &self.as_ascii_tree()).expect("writing to a string cannot fail");
        out
    }

    fn as_ascii_tree(&self) -> ascii_tree::Tree {
        match self {
            TreeNode::Leaf { fact } => ascii_tree::Tree::Leaf(vec![fact.clone()]),
            TreeNode::Inner {
                fact,
                rule,
                children,
            } => ascii_tree::Tree::Node(
                format!("{fact} ({rule})"),
                children.iter().map(TreeNode::as_ascii_tree).collect(),
            ),
        }
    }

    /// Render the tree as JSON; `with_heights` additionally annotates every
    /// node with the height of its subtree.
    pub fn json(&self, with_heights: bool) -> Value {
        let mut value = match self {
            TreeNode::Leaf { fact } => json!({ "fact": fact }),
            TreeNode::Inner {
                fact,
                rule,
                children,
            } => json!({
                "fact": fact,
                "rule": rule,
                "children": children
                    .iter()
                    .map(|child| child.json(with_heights))
                    .collect::<Vec<_>>(),
            }),
        };
        if with_heights {
            value["height"] = json!(self.height());
        }
        value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> TreeNode {
        TreeNode::Inner {
            fact: "path(1, 3)".to_owned(),
            rule: "R2".to_owned(),
            children: vec![
                TreeNode::Leaf {
                    fact: "edge(1, 2)".to_owned(),
                },
                TreeNode::Leaf {
                    fact: "edge(2, 3)".to_owned(),
                },
            ],
        }
    }

    #[test]
    fn ascii_contains_all_facts() {
        let rendered = sample().ascii();
        assert!(rendered.contains("path(1, 3) (R2)"));
        assert!(rendered.contains("edge(1, 2)"));
        assert!(rendered.contains("edge(2, 3)"));
    }

    #[test]
    fn json_heights_are_optional() {
        let tree = sample();
        assert_eq!(tree.height(), 2);

        let plain = tree.json(false);
        assert!(plain.get("height").is_none());

        let with_heights = tree.json(true);
        assert_eq!(with_heights["height"], json!(2));
        assert_eq!(with_heights["children"][0]["height"], json!(1));
    }
}
