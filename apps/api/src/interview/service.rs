//! Turn orchestration: reply synchronously, defer analysis to the worker.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::buzzwords::BuzzwordCount;
use crate::interview::grading::{summarize, SessionSummary};
use crate::interview::prompts::build_interviewer_system;
use crate::interview::registry::SessionRegistry;
use crate::interview::session::ConversationState;
use crate::interview::worker::{JobQueue, TurnJob};
use crate::llm_client::ChatModel;

const REPLY_BUZZWORDS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub reply: String,
    pub session_id: String,
    pub turn_index: u32,
    pub current_topic: String,
    pub topic_depth: u32,
    pub buzzwords: Vec<BuzzwordCount>,
    pub concluded: bool,
}

pub struct InterviewService {
    registry: Arc<SessionRegistry>,
    model: Arc<dyn ChatModel>,
    jobs: JobQueue,
}

impl InterviewService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        model: Arc<dyn ChatModel>,
        jobs: JobQueue,
    ) -> Self {
        Self {
            registry,
            model,
            jobs,
        }
    }

    /// Generates the interviewer's reply to `message`. Only a reply-generation
    /// failure is surfaced; analysis and persistence happen later on the worker.
    pub async fn process_turn(
        &self,
        session_id: Option<String>,
        user_id: &str,
        message: &str,
    ) -> Result<TurnResponse, AppError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AppError::Validation("user_id cannot be empty".to_string()));
        }
        if message.trim().is_empty() {
            return Err(AppError::Validation("message cannot be empty".to_string()));
        }

        let session_id = match session_id.map(|s| s.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };

        // A new session only enters the registry once its first reply exists.
        let (system, messages) = match self.registry.get(&session_id) {
            Some(handle) => {
                let mut state = handle.lock().await;
                ensure_owner(&state, &session_id, user_id)?;
                state.touch();
                (
                    build_interviewer_system(&state.interviewer_context()),
                    state.conversation_with(message),
                )
            }
            None => {
                let fresh = ConversationState::new(&session_id, user_id, 0);
                (
                    build_interviewer_system(&fresh.interviewer_context()),
                    fresh.conversation_with(message),
                )
            }
        };

        let reply = self
            .model
            .complete(&system, &messages)
            .await
            .map_err(|e| AppError::Llm(e.to_string()))?;

        let handle = self.registry.get_or_create(&session_id, user_id);
        let response = {
            let mut state = handle.lock().await;
            ensure_owner(&state, &session_id, user_id)?;
            let turn_index = state.commit_exchange(message, &reply);
            let (current_topic, topic_depth) = state
                .tree()
                .current_node()
                .map(|n| (n.name.clone(), n.depth))
                .unwrap_or_default();

            TurnResponse {
                reply,
                session_id: session_id.clone(),
                turn_index,
                current_topic,
                topic_depth,
                buzzwords: state.buzzwords().top_n(REPLY_BUZZWORDS),
                concluded: state.is_concluded(),
            }
        };

        debug!(
            "Session {} turn {} replied on '{}'",
            session_id, response.turn_index, response.current_topic
        );

        let job = TurnJob {
            session_id,
            user_id: user_id.to_string(),
            turn_index: response.turn_index,
            utterance: message.to_string(),
        };
        match self.jobs.try_enqueue(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => warn!(
                "Background queue full; turn {} of session {} will not be analyzed",
                job.turn_index, job.session_id
            ),
            Err(TrySendError::Closed(job)) => warn!(
                "Background worker stopped; turn {} of session {} will not be analyzed",
                job.turn_index, job.session_id
            ),
        }

        Ok(response)
    }

    pub async fn get_summary(&self, session_id: &str) -> Result<SessionSummary, AppError> {
        let handle = self
            .registry
            .get(session_id)
            .ok_or_else(|| AppError::NotFound(format!("Interview session {session_id}")))?;
        let state = handle.lock().await;
        Ok(summarize(&state))
    }

    pub fn close_session(&self, session_id: &str) -> Result<(), AppError> {
        if self.registry.close(session_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Interview session {session_id}")))
        }
    }
}

fn ensure_owner(state: &ConversationState, session_id: &str, user_id: &str) -> Result<(), AppError> {
    if state.user_id() != user_id {
        return Err(AppError::Validation(format!(
            "Session {session_id} belongs to a different user"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::interview::worker::channel;
    use crate::llm_client::fake::ScriptedModel;

    fn service(model: Arc<ScriptedModel>, capacity: usize) -> (InterviewService, mpsc::Receiver<TurnJob>) {
        let (queue, mut shards) = channel(capacity, 1);
        let service = InterviewService::new(Arc::new(SessionRegistry::new(3)), model, queue);
        (service, shards.remove(0))
    }

    #[tokio::test]
    async fn test_turn_replies_and_enqueues_job() {
        let model = Arc::new(ScriptedModel::new(vec!["Tell me about your current role."]));
        let (service, mut rx) = service(model.clone(), 4);

        let response = service
            .process_turn(Some("s1".to_string()), "u1", "Hi, I'm a backend engineer")
            .await
            .unwrap();

        assert_eq!(response.reply, "Tell me about your current role.");
        assert_eq!(response.session_id, "s1");
        assert_eq!(response.turn_index, 1);
        assert_eq!(response.current_topic, "Background and current role");
        assert_eq!(response.topic_depth, 0);
        assert!(response.buzzwords.is_empty());
        assert!(!response.concluded);

        let job = rx.try_recv().unwrap();
        assert_eq!(job.turn_index, 1);
        assert_eq!(job.utterance, "Hi, I'm a backend engineer");

        let systems = model.systems.lock().await;
        assert!(systems[0].contains("Background and current role"));
    }

    #[tokio::test]
    async fn test_missing_session_id_allocates_uuid() {
        let (service, _rx) = service(Arc::new(ScriptedModel::new(vec!["ok"])), 4);
        let response = service.process_turn(None, "u1", "hello").await.unwrap();
        assert!(Uuid::parse_str(&response.session_id).is_ok());
        assert!(service.get_summary(&response.session_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_generation_failure_surfaces_and_commits_nothing() {
        let (service, mut rx) = service(Arc::new(ScriptedModel::failing()), 4);
        let result = service.process_turn(Some("s1".to_string()), "u1", "hello").await;

        assert!(matches!(result, Err(AppError::Llm(_))));
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            service.get_summary("s1").await,
            Err(AppError::NotFound(_))
        ));

        let unnamed = service.process_turn(None, "u1", "hello").await;
        assert!(matches!(unnamed, Err(AppError::Llm(_))));
        assert!(service.registry.is_empty());
    }

    #[tokio::test]
    async fn test_failure_on_existing_session_keeps_it() {
        let model = Arc::new(ScriptedModel::new(vec!["q1"]));
        let (service, _rx) = service(model, 4);
        service.process_turn(Some("s1".to_string()), "u1", "a1").await.unwrap();

        // script exhausted: the second reply fails
        let failed = service.process_turn(Some("s1".to_string()), "u1", "a2").await;
        assert!(matches!(failed, Err(AppError::Llm(_))));
        let handle = service.registry.get("s1").unwrap();
        assert_eq!(handle.lock().await.turn_count(), 1);
    }

    #[tokio::test]
    async fn test_turn_indexes_increase() {
        let (service, _rx) = service(Arc::new(ScriptedModel::new(vec!["q1", "q2"])), 4);
        let first = service.process_turn(Some("s1".to_string()), "u1", "a1").await.unwrap();
        let second = service.process_turn(Some("s1".to_string()), "u1", "a2").await.unwrap();
        assert_eq!((first.turn_index, second.turn_index), (1, 2));
    }

    #[tokio::test]
    async fn test_full_queue_drops_job_but_still_replies() {
        let (service, mut rx) = service(Arc::new(ScriptedModel::new(vec!["q1", "q2"])), 1);
        service.process_turn(Some("s1".to_string()), "u1", "a1").await.unwrap();
        let second = service.process_turn(Some("s1".to_string()), "u1", "a2").await;

        assert_eq!(second.unwrap().reply, "q2");
        assert_eq!(rx.try_recv().unwrap().turn_index, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (service, _rx) = service(Arc::new(ScriptedModel::new(vec!["q1"])), 4);
        assert!(matches!(
            service.process_turn(None, "  ", "hello").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.process_turn(None, "u1", "   ").await,
            Err(AppError::Validation(_))
        ));

        service.process_turn(Some("s1".to_string()), "u1", "hi").await.unwrap();
        assert!(matches!(
            service.process_turn(Some("s1".to_string()), "u2", "hi").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_summary_and_close() {
        let (service, _rx) = service(Arc::new(ScriptedModel::new(vec![])), 4);
        assert!(matches!(
            service.get_summary("missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.close_session("missing"),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fresh_session_summary() {
        let (service, _rx) = service(Arc::new(ScriptedModel::new(vec!["q1"])), 4);
        service.process_turn(Some("s1".to_string()), "u1", "hello").await.unwrap();

        let summary = service.get_summary("s1").await.unwrap();
        assert_eq!(summary.total_nodes, 1);
        assert_eq!(summary.max_depth_reached, 0);
        assert_eq!(summary.average_score, 0.0);
        assert!(service.close_session("s1").is_ok());
        assert!(service.get_summary("s1").await.is_err());
    }
}
