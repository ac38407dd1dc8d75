//! Navigation Policy: decides each turn whether to go deeper, stay, or abandon a topic.
//!
//! Priority order:
//! 1. any exhaustion signal, or low engagement → mark `exhausted`, backtrack
//! 2. high engagement with new topics → mark `rich`, add one child per topic, enter the first
//! 3. otherwise → mark `exploring`, stay put
//!
//! Backtracking prefers the first still-unexplored sibling, then ascends one level.
//! Ascending past root resets the path to `[root]`; after `max_root_resets` such resets
//! the session is concluded and navigation stops changing the tree.

use serde::Serialize;
use tracing::{debug, info};

use crate::interview::analyzer::{EngagementLevel, ResponseAnalysis};
use crate::interview::session::ConversationState;
use crate::interview::topic_tree::{TopicStatus, TopicTreeError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "node_id", rename_all = "snake_case")]
pub enum Backtrack {
    /// Moved sideways to an unexplored sibling.
    Sibling(String),
    /// Moved up to the parent.
    Ascended(String),
    /// Left root itself; the path restarted at `[root]`.
    RootReset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum NavigationDecision {
    Exhausted {
        node_id: String,
        backtrack: Backtrack,
    },
    Deepened {
        node_id: String,
        children: Vec<String>,
        entered: String,
    },
    Stayed {
        node_id: String,
    },
    /// The session hit its root-reset cap earlier; nothing changes any more.
    Concluded,
}

/// Runs the policy once for the current node. Exactly one branch executes.
pub fn navigate(
    state: &mut ConversationState,
    analysis: &ResponseAnalysis,
    context_snippet: &str,
) -> Result<NavigationDecision, TopicTreeError> {
    if state.concluded {
        return Ok(NavigationDecision::Concluded);
    }

    let node_id = state.tree.current_id().to_string();

    let decision = if !analysis.exhaustion_signals.is_empty()
        || analysis.engagement_level == EngagementLevel::Low
    {
        if state.tree.transition(&node_id, TopicStatus::Exhausted)?
            && !state.exhausted_topics.contains(&node_id)
        {
            state.exhausted_topics.push(node_id.clone());
        }
        let backtrack = backtrack(state)?;
        NavigationDecision::Exhausted { node_id, backtrack }
    } else if analysis.engagement_level == EngagementLevel::High
        && !analysis.new_topics.is_empty()
    {
        state.tree.transition(&node_id, TopicStatus::Rich)?;
        let children = analysis
            .new_topics
            .iter()
            .map(|topic| state.tree.create_child(&node_id, topic, context_snippet))
            .collect::<Result<Vec<_>, _>>()?;

        // new_topics is non-empty, so children is too
        let entered = children[0].clone();
        let depth = state.tree.get_node(&entered)?.depth;
        state.tree.push_path(entered.clone());
        state.max_depth_reached = state.max_depth_reached.max(depth);

        NavigationDecision::Deepened {
            node_id,
            children,
            entered,
        }
    } else {
        state.tree.transition(&node_id, TopicStatus::Exploring)?;
        NavigationDecision::Stayed { node_id }
    };

    debug!(
        "Session {} navigation: {:?}",
        state.session_id, decision
    );
    debug_assert!(state.tree.is_valid_path());
    Ok(decision)
}

fn backtrack(state: &mut ConversationState) -> Result<Backtrack, TopicTreeError> {
    let current = state.tree.current_node()?;

    if let Some(parent_id) = current.parent.clone() {
        let parent = state.tree.get_node(&parent_id)?;
        let sibling = parent
            .children
            .iter()
            .find(|id| {
                state
                    .tree
                    .get_node(id)
                    .map(|n| n.status == TopicStatus::Unexplored)
                    .unwrap_or(false)
            })
            .cloned();

        if let Some(sibling) = sibling {
            state.tree.replace_tail(sibling.clone());
            return Ok(Backtrack::Sibling(sibling));
        }
    }

    if state.tree.pop_path() {
        state.root_resets += 1;
        if state.max_root_resets > 0 && state.root_resets >= state.max_root_resets {
            state.concluded = true;
            info!(
                "Session {} concluded after {} root resets (started {})",
                state.session_id,
                state.root_resets,
                state.started_at.to_rfc3339()
            );
        }
        return Ok(Backtrack::RootReset);
    }

    Ok(Backtrack::Ascended(state.tree.current_id().to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::interview::analyzer::{heuristic_analysis, ConfidenceLevel, ResponseLength};
    use crate::interview::topic_tree::ROOT_ID;

    fn analysis(engagement: EngagementLevel, signals: &[&str], topics: &[&str]) -> ResponseAnalysis {
        ResponseAnalysis {
            engagement_level: engagement,
            exhaustion_signals: signals.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            new_topics: topics.iter().map(|s| s.to_string()).collect(),
            response_length: ResponseLength::Moderate,
            confidence_level: ConfidenceLevel::Confident,
            buzzwords: vec![],
        }
    }

    fn deepen(state: &mut ConversationState, topics: &[&str]) -> Vec<String> {
        match navigate(state, &analysis(EngagementLevel::High, &[], topics), "").unwrap() {
            NavigationDecision::Deepened { children, .. } => children,
            other => panic!("expected deepen, got {other:?}"),
        }
    }

    fn exhaust(state: &mut ConversationState) -> Backtrack {
        match navigate(state, &analysis(EngagementLevel::Low, &[], &[]), "").unwrap() {
            NavigationDecision::Exhausted { backtrack, .. } => backtrack,
            other => panic!("expected exhaust, got {other:?}"),
        }
    }

    fn status(state: &ConversationState, id: &str) -> TopicStatus {
        state.tree.get_node(id).unwrap().status
    }

    #[test]
    fn test_dont_know_exhausts_and_backtracks() {
        let mut state = ConversationState::new("s1", "u1", 3);
        let children = deepen(&mut state, &["Kafka", "Flink"]);

        let decision = navigate(
            &mut state,
            &heuristic_analysis("I don't know much about that"),
            "",
        )
        .unwrap();

        assert_eq!(
            decision,
            NavigationDecision::Exhausted {
                node_id: children[0].clone(),
                backtrack: Backtrack::Sibling(children[1].clone()),
            }
        );
        assert_eq!(status(&state, &children[0]), TopicStatus::Exhausted);
        assert_eq!(state.exhausted_topics, vec![children[0].clone()]);
        assert_eq!(state.tree.current_path(), &[ROOT_ID.to_string(), children[1].clone()]);
    }

    #[test]
    fn test_exhaustion_signal_wins_over_high_engagement() {
        let mut state = ConversationState::new("s1", "u1", 3);
        let decision = navigate(
            &mut state,
            &analysis(EngagementLevel::High, &["vague"], &["Kafka"]),
            "",
        )
        .unwrap();
        assert!(matches!(decision, NavigationDecision::Exhausted { .. }));
        assert_eq!(state.tree.len(), 1);
    }

    #[test]
    fn test_high_engagement_with_topics_deepens() {
        let mut state = ConversationState::new("s1", "u1", 3);
        let children = deepen(&mut state, &["distributed caching", "Redis"]);

        assert_eq!(children.len(), 2);
        assert_eq!(status(&state, ROOT_ID), TopicStatus::Rich);
        assert_eq!(state.tree.current_id(), children[0]);
        assert_eq!(state.tree.current_node().unwrap().name, "distributed caching");
        assert_eq!(state.max_depth_reached, 1);
        assert_eq!(state.tree.get_node(ROOT_ID).unwrap().children, children);
    }

    #[test]
    fn test_high_engagement_without_topics_stays() {
        let mut state = ConversationState::new("s1", "u1", 3);
        let decision = navigate(&mut state, &analysis(EngagementLevel::High, &[], &[]), "").unwrap();
        assert_eq!(
            decision,
            NavigationDecision::Stayed {
                node_id: ROOT_ID.to_string()
            }
        );
        assert_eq!(status(&state, ROOT_ID), TopicStatus::Exploring);
    }

    #[test]
    fn test_medium_engagement_with_topics_stays() {
        let mut state = ConversationState::new("s1", "u1", 3);
        let decision =
            navigate(&mut state, &analysis(EngagementLevel::Medium, &[], &["Go"]), "").unwrap();
        assert!(matches!(decision, NavigationDecision::Stayed { .. }));
        assert_eq!(state.tree.len(), 1);
        assert_eq!(state.tree.current_path(), &[ROOT_ID.to_string()]);
    }

    #[test]
    fn test_backtrack_without_unexplored_sibling_ascends_one_level() {
        let mut state = ConversationState::new("s1", "u1", 3);
        let level1 = deepen(&mut state, &["Databases"]);
        let level2 = deepen(&mut state, &["Postgres"]);
        assert_eq!(state.tree.current_path().len(), 3);

        let backtrack = exhaust(&mut state);
        assert_eq!(backtrack, Backtrack::Ascended(level1[0].clone()));
        assert_eq!(state.tree.current_path(), &[ROOT_ID.to_string(), level1[0].clone()]);
        assert_eq!(status(&state, &level2[0]), TopicStatus::Exhausted);
    }

    #[test]
    fn test_rich_node_is_not_downgraded_when_exhausted_later() {
        let mut state = ConversationState::new("s1", "u1", 3);
        let level1 = deepen(&mut state, &["Databases"]);
        deepen(&mut state, &["Postgres"]);
        exhaust(&mut state); // back on Databases, which is rich
        exhaust(&mut state);

        assert_eq!(status(&state, &level1[0]), TopicStatus::Rich);
        assert!(!state.exhausted_topics.contains(&level1[0]));
        assert_eq!(state.tree.current_path(), &[ROOT_ID.to_string()]);
    }

    #[test]
    fn test_exhausting_root_resets_path_and_never_errors() {
        let mut state = ConversationState::new("s1", "u1", 0);
        for _ in 0..10 {
            assert_eq!(exhaust(&mut state), Backtrack::RootReset);
            assert_eq!(state.tree.current_path(), &[ROOT_ID.to_string()]);
        }
        assert_eq!(state.root_resets, 10);
        assert!(!state.concluded);
        assert_eq!(state.exhausted_topics, vec![ROOT_ID.to_string()]);
    }

    #[test]
    fn test_root_reset_cap_concludes_session() {
        let mut state = ConversationState::new("s1", "u1", 2);
        exhaust(&mut state);
        assert!(!state.concluded);
        exhaust(&mut state);
        assert!(state.concluded);

        let decision = navigate(
            &mut state,
            &analysis(EngagementLevel::High, &[], &["Kafka"]),
            "",
        )
        .unwrap();
        assert_eq!(decision, NavigationDecision::Concluded);
        assert_eq!(state.tree.len(), 1);
    }

    #[test]
    fn test_one_status_transition_per_turn() {
        let mut state = ConversationState::new("s1", "u1", 3);
        let children = deepen(&mut state, &["A", "B", "C"]);
        let before: Vec<TopicStatus> = state.tree.nodes().map(|n| n.status).collect();
        assert_eq!(before.iter().filter(|s| **s != TopicStatus::Unexplored).count(), 1);

        exhaust(&mut state);
        // A exhausted, B entered but untouched
        assert_eq!(status(&state, &children[0]), TopicStatus::Exhausted);
        assert_eq!(status(&state, &children[1]), TopicStatus::Unexplored);
        assert_eq!(status(&state, &children[2]), TopicStatus::Unexplored);
    }
}
