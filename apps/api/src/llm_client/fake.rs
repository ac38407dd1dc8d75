//! Scripted `ChatModel` doubles for tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ChatMessage, ChatModel, LlmError};

/// Returns queued replies in order; an exhausted script fails with `EmptyContent`.
/// Records every system prompt it was called with.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    pub systems: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            systems: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(LlmError::Api {
                status: 500,
                message: "upstream unavailable".to_string(),
            })])),
            systems: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, system: &str, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.systems.lock().await.push(system.to_string());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}

/// Never answers within any sane timeout.
pub struct StalledModel(pub Duration);

#[async_trait]
impl ChatModel for StalledModel {
    async fn complete(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        tokio::time::sleep(self.0).await;
        Ok("{}".to_string())
    }
}
