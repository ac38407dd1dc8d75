//! Per-session conversation state: topic tree, grades, buzzwords and reply history.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::interview::analyzer::ResponseAnalysis;
use crate::interview::buzzwords::BuzzwordTally;
use crate::interview::grading::{score_turn, TurnGrade};
use crate::interview::navigation::{navigate, NavigationDecision};
use crate::interview::prompts::InterviewerContext;
use crate::interview::topic_tree::{TopicMention, TopicStatus, TopicTree, TopicTreeError};
use crate::llm_client::ChatMessage;

/// Prior messages sent with each reply generation call. Kept even so the
/// window always starts on a user message.
const HISTORY_WINDOW: usize = 20;
const CONTEXT_SNIPPET_CHARS: usize = 200;

/// What one analyzed answer did to the session.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    pub turn_index: u32,
    pub topic_id: String,
    pub topic_name: String,
    pub topic_depth: u32,
    /// Topic names from root to the answered node.
    pub context_path: Vec<String>,
    pub decision: NavigationDecision,
    pub score: f64,
}

pub struct ConversationState {
    pub(super) session_id: String,
    pub(super) user_id: String,
    pub(super) tree: TopicTree,
    pub(super) exhausted_topics: Vec<String>,
    pub(super) grades: Vec<TurnGrade>,
    pub(super) buzzwords: BuzzwordTally,
    pub(super) history: Vec<ChatMessage>,
    pub(super) started_at: DateTime<Utc>,
    pub(super) last_active: Instant,
    pub(super) turn_count: u32,
    pub(super) depth_sum: u64,
    pub(super) max_depth_reached: u32,
    pub(super) root_resets: u32,
    /// 0 disables the cap.
    pub(super) max_root_resets: u32,
    pub(super) concluded: bool,
}

impl ConversationState {
    pub fn new(session_id: &str, user_id: &str, max_root_resets: u32) -> Self {
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            tree: TopicTree::initialize(session_id),
            exhausted_topics: Vec::new(),
            grades: Vec::new(),
            buzzwords: BuzzwordTally::new(),
            history: Vec::new(),
            started_at: Utc::now(),
            last_active: Instant::now(),
            turn_count: 0,
            depth_sum: 0,
            max_depth_reached: 0,
            root_resets: 0,
            max_root_resets,
            concluded: false,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn tree(&self) -> &TopicTree {
        &self.tree
    }

    pub fn grades(&self) -> &[TurnGrade] {
        &self.grades
    }

    pub fn buzzwords(&self) -> &BuzzwordTally {
        &self.buzzwords
    }

    pub fn exhausted_topics(&self) -> &[String] {
        &self.exhausted_topics
    }

    #[cfg(test)]
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn depth_sum(&self) -> u64 {
        self.depth_sum
    }

    pub fn max_depth_reached(&self) -> u32 {
        self.max_depth_reached
    }

    pub fn is_concluded(&self) -> bool {
        self.concluded
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Reply side
    // ────────────────────────────────────────────────────────────────────────

    /// Recent history plus the new user message, ready for reply generation.
    pub fn conversation_with(&self, utterance: &str) -> Vec<ChatMessage> {
        let start = self.history.len().saturating_sub(HISTORY_WINDOW);
        let mut messages = self.history[start..].to_vec();
        messages.push(ChatMessage::user(utterance));
        messages
    }

    /// Records a completed exchange and returns its turn index (1-based).
    pub fn commit_exchange(&mut self, utterance: &str, reply: &str) -> u32 {
        self.history.push(ChatMessage::user(utterance));
        self.history.push(ChatMessage::assistant(reply));
        self.turn_count += 1;
        self.touch();
        self.turn_count
    }

    pub fn interviewer_context(&self) -> InterviewerContext {
        let current = self.tree.current_node().ok();
        let open_subtopics = current
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|id| self.tree.get_node(id).ok())
                    .filter(|child| child.status == TopicStatus::Unexplored)
                    .map(|child| child.name.clone())
                    .collect()
            })
            .unwrap_or_default();

        InterviewerContext {
            current_topic: current.map(|n| n.name.clone()).unwrap_or_default(),
            depth: current.map(|n| n.depth).unwrap_or(0),
            path: self.tree.path_names(),
            exhausted_topics: self
                .exhausted_topics
                .iter()
                .filter_map(|id| self.tree.get_node(id).ok())
                .map(|n| n.name.clone())
                .collect(),
            open_subtopics,
            concluded: self.concluded,
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Analysis side
    // ────────────────────────────────────────────────────────────────────────

    /// Applies one analyzed answer: mention on the answered node, navigation,
    /// grading, and buzzword tally, in that order.
    pub fn record_turn(
        &mut self,
        turn_index: u32,
        utterance: &str,
        analysis: &ResponseAnalysis,
    ) -> Result<TurnRecord, TopicTreeError> {
        let node = self.tree.current_node()?;
        let topic_id = node.id.clone();
        let topic_name = node.name.clone();
        let topic_depth = node.depth;
        let context_path = self.tree.path_names();

        self.tree.append_mention(
            &topic_id,
            TopicMention {
                turn_index,
                timestamp: Utc::now(),
                response_text: utterance.to_string(),
                engagement_level: analysis.engagement_level,
            },
        )?;

        let snippet: String = utterance.chars().take(CONTEXT_SNIPPET_CHARS).collect();
        let decision = navigate(self, analysis, &snippet)?;

        let score = score_turn(analysis);
        self.grades.push(TurnGrade {
            turn_index,
            score,
            engagement_level: analysis.engagement_level,
        });
        self.depth_sum += u64::from(topic_depth);

        for term in &analysis.buzzwords {
            self.buzzwords.add(term, turn_index);
        }

        Ok(TurnRecord {
            turn_index,
            topic_id,
            topic_name,
            topic_depth,
            context_path,
            decision,
            score,
        })
    }
}
