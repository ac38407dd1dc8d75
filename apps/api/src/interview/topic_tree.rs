//! Topic Tree Store: owns one session's tree of topic nodes and its active path.
//!
//! Nodes refer to their parent by id only; each node owns the ordered list of its
//! children's ids. Ids come from a per-tree counter and never depend on display names,
//! so repeated sibling names are fine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::interview::analyzer::EngagementLevel;

pub const ROOT_ID: &str = "root";
pub const ROOT_TOPIC_NAME: &str = "Background and current role";

#[derive(Debug, Error, PartialEq)]
pub enum TopicTreeError {
    #[error("Topic node '{0}' not found")]
    NodeNotFound(String),
}

/// Exploration status of a node. Only moves forward; `Rich` and `Exhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Unexplored,
    Exploring,
    Exhausted,
    Rich,
}

impl TopicStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TopicStatus::Exhausted | TopicStatus::Rich)
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    fn can_become(self, next: TopicStatus) -> bool {
        match self {
            TopicStatus::Unexplored => next != TopicStatus::Unexplored,
            TopicStatus::Exploring => next.is_terminal(),
            TopicStatus::Exhausted | TopicStatus::Rich => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMention {
    pub turn_index: u32,
    pub timestamp: DateTime<Utc>,
    pub response_text: String,
    pub engagement_level: EngagementLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicNode {
    pub id: String,
    pub name: String,
    pub depth: u32,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub status: TopicStatus,
    pub context_snippet: String,
    pub mentions: Vec<TopicMention>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TopicTree {
    nodes: HashMap<String, TopicNode>,
    current_path: Vec<String>,
    next_id: u64,
}

impl TopicTree {
    /// Creates a tree holding only the root node, with the path set to `[root]`.
    pub fn initialize(session_id: &str) -> Self {
        let root = TopicNode {
            id: ROOT_ID.to_string(),
            name: ROOT_TOPIC_NAME.to_string(),
            depth: 0,
            parent: None,
            children: Vec::new(),
            status: TopicStatus::Unexplored,
            context_snippet: String::new(),
            mentions: Vec::new(),
            created_at: Utc::now(),
        };
        debug!("Initialized topic tree for session {session_id}");

        Self {
            nodes: HashMap::from([(ROOT_ID.to_string(), root)]),
            current_path: vec![ROOT_ID.to_string()],
            next_id: 1,
        }
    }

    pub fn get_node(&self, id: &str) -> Result<&TopicNode, TopicTreeError> {
        self.nodes
            .get(id)
            .ok_or_else(|| TopicTreeError::NodeNotFound(id.to_string()))
    }

    fn get_node_mut(&mut self, id: &str) -> Result<&mut TopicNode, TopicTreeError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| TopicTreeError::NodeNotFound(id.to_string()))
    }

    /// Allocates a child under `parent_id` and returns its id.
    pub fn create_child(
        &mut self,
        parent_id: &str,
        name: &str,
        context_snippet: &str,
    ) -> Result<String, TopicTreeError> {
        let depth = self.get_node(parent_id)?.depth + 1;
        let id = format!("t{}", self.next_id);
        self.next_id += 1;

        self.nodes.insert(
            id.clone(),
            TopicNode {
                id: id.clone(),
                name: name.to_string(),
                depth,
                parent: Some(parent_id.to_string()),
                children: Vec::new(),
                status: TopicStatus::Unexplored,
                context_snippet: context_snippet.to_string(),
                mentions: Vec::new(),
                created_at: Utc::now(),
            },
        );
        self.get_node_mut(parent_id)?.children.push(id.clone());
        Ok(id)
    }

    pub fn append_mention(
        &mut self,
        node_id: &str,
        mention: TopicMention,
    ) -> Result<(), TopicTreeError> {
        self.get_node_mut(node_id)?.mentions.push(mention);
        Ok(())
    }

    /// Applies a forward status transition. Returns `false` when the node's
    /// current status does not allow it (the node is left untouched).
    pub fn transition(&mut self, node_id: &str, next: TopicStatus) -> Result<bool, TopicTreeError> {
        let node = self.get_node_mut(node_id)?;
        if !node.status.can_become(next) {
            return Ok(false);
        }
        node.status = next;
        Ok(true)
    }

    pub fn current_id(&self) -> &str {
        self.current_path
            .last()
            .map(String::as_str)
            .unwrap_or(ROOT_ID)
    }

    pub fn current_node(&self) -> Result<&TopicNode, TopicTreeError> {
        self.get_node(self.current_id())
    }

    #[cfg(test)]
    pub fn current_path(&self) -> &[String] {
        &self.current_path
    }

    /// Display names along the active path, root first.
    pub fn path_names(&self) -> Vec<String> {
        self.current_path
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TopicNode> {
        self.nodes.values()
    }

    pub(crate) fn push_path(&mut self, id: String) {
        self.current_path.push(id);
    }

    /// Swaps the active node for a sibling at the same depth.
    pub(crate) fn replace_tail(&mut self, id: String) {
        self.current_path.pop();
        self.current_path.push(id);
    }

    /// Drops the active node. Returns `true` if the path had to be reset to `[root]`.
    pub(crate) fn pop_path(&mut self) -> bool {
        self.current_path.pop();
        if self.current_path.is_empty() {
            self.current_path.push(ROOT_ID.to_string());
            return true;
        }
        false
    }

    /// True when the path starts at root and each id is a child of the one before it.
    pub fn is_valid_path(&self) -> bool {
        if self.current_path.first().map(String::as_str) != Some(ROOT_ID) {
            return false;
        }
        self.current_path.windows(2).all(|pair| {
            match (self.nodes.get(&pair[0]), self.nodes.get(&pair[1])) {
                (Some(parent), Some(child)) => {
                    child.parent.as_deref() == Some(parent.id.as_str())
                        && parent.children.contains(&child.id)
                }
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(turn_index: u32) -> TopicMention {
        TopicMention {
            turn_index,
            timestamp: Utc::now(),
            response_text: "I mostly write Go services".to_string(),
            engagement_level: EngagementLevel::Medium,
        }
    }

    #[test]
    fn test_initialize_creates_root_only() {
        let tree = TopicTree::initialize("s1");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.current_path(), &["root".to_string()]);
        let root = tree.get_node(ROOT_ID).unwrap();
        assert_eq!(root.depth, 0);
        assert!(root.parent.is_none());
        assert_eq!(root.status, TopicStatus::Unexplored);
    }

    #[test]
    fn test_create_child_sets_depth_and_parent() {
        let mut tree = TopicTree::initialize("s1");
        let child = tree.create_child(ROOT_ID, "Kafka", "we run Kafka").unwrap();
        let grandchild = tree.create_child(&child, "Consumer groups", "").unwrap();

        let node = tree.get_node(&grandchild).unwrap();
        assert_eq!(node.depth, 2);
        assert_eq!(node.parent.as_deref(), Some(child.as_str()));
        assert_eq!(tree.get_node(ROOT_ID).unwrap().children, vec![child.clone()]);
        assert_eq!(tree.get_node(&child).unwrap().context_snippet, "we run Kafka");
    }

    #[test]
    fn test_create_child_unknown_parent_is_not_found() {
        let mut tree = TopicTree::initialize("s1");
        let err = tree.create_child("t99", "Rust", "").unwrap_err();
        assert_eq!(err, TopicTreeError::NodeNotFound("t99".to_string()));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_repeated_sibling_names_get_distinct_ids() {
        let mut tree = TopicTree::initialize("s1");
        let a = tree.create_child(ROOT_ID, "Redis", "").unwrap();
        let b = tree.create_child(ROOT_ID, "Redis", "").unwrap();
        assert_ne!(a, b);
        assert_eq!(tree.get_node(ROOT_ID).unwrap().children, vec![a, b]);
    }

    #[test]
    fn test_get_node_missing() {
        let tree = TopicTree::initialize("s1");
        assert!(matches!(
            tree.get_node("nope"),
            Err(TopicTreeError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_append_mention() {
        let mut tree = TopicTree::initialize("s1");
        tree.append_mention(ROOT_ID, mention(1)).unwrap();
        tree.append_mention(ROOT_ID, mention(2)).unwrap();
        let turns: Vec<u32> = tree
            .get_node(ROOT_ID)
            .unwrap()
            .mentions
            .iter()
            .map(|m| m.turn_index)
            .collect();
        assert_eq!(turns, vec![1, 2]);
        assert!(tree.append_mention("missing", mention(3)).is_err());
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut tree = TopicTree::initialize("s1");
        assert!(tree.transition(ROOT_ID, TopicStatus::Exploring).unwrap());
        assert!(!tree.transition(ROOT_ID, TopicStatus::Unexplored).unwrap());
        assert!(tree.transition(ROOT_ID, TopicStatus::Rich).unwrap());
        assert!(!tree.transition(ROOT_ID, TopicStatus::Exhausted).unwrap());
        assert_eq!(tree.get_node(ROOT_ID).unwrap().status, TopicStatus::Rich);
    }

    #[test]
    fn test_pop_path_resets_to_root() {
        let mut tree = TopicTree::initialize("s1");
        assert!(tree.pop_path());
        assert_eq!(tree.current_id(), ROOT_ID);
        assert!(tree.is_valid_path());
    }

    #[test]
    fn test_path_validity_tracks_parent_chain() {
        let mut tree = TopicTree::initialize("s1");
        let a = tree.create_child(ROOT_ID, "A", "").unwrap();
        let b = tree.create_child(ROOT_ID, "B", "").unwrap();
        let a1 = tree.create_child(&a, "A1", "").unwrap();
        tree.push_path(a.clone());
        tree.push_path(a1);
        assert!(tree.is_valid_path());
        assert_eq!(tree.path_names(), vec![ROOT_TOPIC_NAME, "A", "A1"]);

        // b is not a child of a
        tree.pop_path();
        tree.push_path(b);
        assert!(!tree.is_valid_path());
    }
}
