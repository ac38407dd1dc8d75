//! Grading & Summary: per-turn scores and read-only session rollups.

use serde::{Deserialize, Serialize};

use crate::interview::analyzer::{ConfidenceLevel, EngagementLevel, ResponseAnalysis, ResponseLength};
use crate::interview::buzzwords::BuzzwordCount;
use crate::interview::session::ConversationState;
use crate::interview::topic_tree::TopicStatus;

const BASE_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 2.0;
const SUMMARY_BUZZWORDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnGrade {
    pub turn_index: u32,
    pub score: f64,
    pub engagement_level: EngagementLevel,
}

/// Scores one answer on a 0.0 – 2.0 scale, starting from 1.0.
///
/// engagement high +0.5 / low −0.3, length detailed +0.3 / brief −0.2,
/// confidence confident +0.2 / struggling −0.3.
pub fn score_turn(analysis: &ResponseAnalysis) -> f64 {
    let mut score = BASE_SCORE;

    score += match analysis.engagement_level {
        EngagementLevel::High => 0.5,
        EngagementLevel::Medium => 0.0,
        EngagementLevel::Low => -0.3,
    };
    score += match analysis.response_length {
        ResponseLength::Detailed => 0.3,
        ResponseLength::Moderate => 0.0,
        ResponseLength::Brief => -0.2,
    };
    score += match analysis.confidence_level {
        ConfidenceLevel::Confident => 0.2,
        ConfidenceLevel::Uncertain => 0.0,
        ConfidenceLevel::Struggling => -0.3,
    };

    score.clamp(0.0, MAX_SCORE)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicCoverage {
    /// Nodes that have left `unexplored`, whatever they became.
    pub explored: usize,
    pub rich: usize,
    pub exhausted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub turn_count: usize,
    pub total_nodes: usize,
    pub max_depth_reached: u32,
    pub exhausted_topics: usize,
    pub average_score: f64,
    pub average_depth: f64,
    pub coverage: TopicCoverage,
    pub top_buzzwords: Vec<BuzzwordCount>,
    pub current_topic: String,
    pub concluded: bool,
}

/// Rolls up a session's accumulated state. Reads only.
pub fn summarize(state: &ConversationState) -> SessionSummary {
    let grades = state.grades();
    let mean_score = average_score(grades);
    let average_depth = if grades.is_empty() {
        0.0
    } else {
        state.depth_sum() as f64 / grades.len() as f64
    };

    let tree = state.tree();
    let coverage = tree.nodes().fold(TopicCoverage::default(), |mut acc, node| {
        match node.status {
            TopicStatus::Unexplored => {}
            TopicStatus::Exploring => acc.explored += 1,
            TopicStatus::Rich => {
                acc.explored += 1;
                acc.rich += 1;
            }
            TopicStatus::Exhausted => {
                acc.explored += 1;
                acc.exhausted += 1;
            }
        }
        acc
    });

    SessionSummary {
        turn_count: grades.len(),
        total_nodes: tree.len(),
        max_depth_reached: state.max_depth_reached(),
        exhausted_topics: state.exhausted_topics().len(),
        average_score: mean_score,
        average_depth,
        coverage,
        top_buzzwords: state.buzzwords().top_n(SUMMARY_BUZZWORDS),
        current_topic: tree
            .current_node()
            .map(|n| n.name.clone())
            .unwrap_or_default(),
        concluded: state.is_concluded(),
    }
}

/// Mean engagement on the 1–3 scale, or 0 before any graded turn.
pub fn average_engagement(grades: &[TurnGrade]) -> f64 {
    if grades.is_empty() {
        return 0.0;
    }
    grades
        .iter()
        .map(|g| g.engagement_level.score() as f64)
        .sum::<f64>()
        / grades.len() as f64
}

pub fn average_score(grades: &[TurnGrade]) -> f64 {
    if grades.is_empty() {
        return 0.0;
    }
    grades.iter().map(|g| g.score).sum::<f64>() / grades.len() as f64
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn analysis(
        engagement_level: EngagementLevel,
        response_length: ResponseLength,
        confidence_level: ConfidenceLevel,
    ) -> ResponseAnalysis {
        ResponseAnalysis {
            engagement_level,
            exhaustion_signals: BTreeSet::new(),
            new_topics: vec![],
            response_length,
            confidence_level,
            buzzwords: vec![],
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_best_answer_clamped_at_two() {
        let a = analysis(
            EngagementLevel::High,
            ResponseLength::Detailed,
            ConfidenceLevel::Confident,
        );
        // 1.0 + 0.5 + 0.3 + 0.2 = 2.0
        assert!(approx(score_turn(&a), 2.0));
    }

    #[test]
    fn test_worst_answer() {
        let a = analysis(
            EngagementLevel::Low,
            ResponseLength::Brief,
            ConfidenceLevel::Struggling,
        );
        // 1.0 - 0.3 - 0.2 - 0.3 = 0.2
        assert!(approx(score_turn(&a), 0.2));
    }

    #[test]
    fn test_neutral_answer_is_base() {
        let a = analysis(
            EngagementLevel::Medium,
            ResponseLength::Moderate,
            ConfidenceLevel::Uncertain,
        );
        assert!(approx(score_turn(&a), 1.0));
    }

    #[test]
    fn test_fresh_session_summary() {
        let state = ConversationState::new("s1", "u1", 3);
        let summary = summarize(&state);
        assert_eq!(summary.total_nodes, 1);
        assert_eq!(summary.max_depth_reached, 0);
        assert_eq!(summary.turn_count, 0);
        assert_eq!(summary.average_score, 0.0);
        assert_eq!(summary.average_depth, 0.0);
        assert_eq!(summary.coverage, TopicCoverage::default());
        assert!(summary.top_buzzwords.is_empty());
        assert!(!summary.concluded);
    }

    #[test]
    fn test_averages_guard_empty() {
        assert_eq!(average_engagement(&[]), 0.0);
        assert_eq!(average_score(&[]), 0.0);
    }

    #[test]
    fn test_average_engagement_scale() {
        let grades = vec![
            TurnGrade {
                turn_index: 1,
                score: 1.5,
                engagement_level: EngagementLevel::High,
            },
            TurnGrade {
                turn_index: 2,
                score: 0.5,
                engagement_level: EngagementLevel::Low,
            },
        ];
        assert!(approx(average_engagement(&grades), 2.0));
        assert!(approx(average_score(&grades), 1.0));
    }
}
