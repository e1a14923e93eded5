//! Nodes returned by store operations

/// A single entry in the store namespace, either a leaf or a directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    /// Full key of the node, without a trailing separator
    pub key: String,
    /// Stored value; `None` for directories
    pub value: Option<String>,
    /// Whether the node is a directory
    pub dir: bool,
    /// Index at which the node was created
    pub created_index: u64,
    /// Index of the last modification; this is the node's version
    pub modified_index: u64,
    /// Children of a directory node
    pub nodes: Vec<Node>,
}

impl Node {
    /// Create a leaf node
    pub fn leaf(key: impl Into<String>, value: impl Into<String>, index: u64) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            dir: false,
            created_index: index,
            modified_index: index,
            nodes: Vec::new(),
        }
    }

    /// Create a directory node with the given children
    pub fn directory(key: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            key: key.into(),
            value: None,
            dir: true,
            created_index: 0,
            modified_index: 0,
            nodes,
        }
    }

    /// Visit every leaf at or below this node, depth first
    pub fn leaves(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.dir {
                stack.extend(node.nodes.iter().rev());
            } else {
                out.push(node);
            }
        }
        out
    }
}

/// Result of a `get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The node that was read
    pub node: Node,
    /// Store-wide modification index at the time of the read
    pub index: u64,
}
