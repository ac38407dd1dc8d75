//! Background turn worker.
//!
//! Jobs are sharded by session id over a fixed set of bounded queues, one consumer
//! each: a session's turns are applied in order while other sessions proceed in
//! parallel. Each job runs analysis, tree update, skill aggregation, session metrics
//! and periodic summaries. Nothing here can fail a reply that has already been
//! returned; failures are retried, then logged.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::interview::analyzer::{AnalysisSource, ResponseAnalyzer};
use crate::interview::grading::{average_engagement, average_score, summarize, SessionSummary};
use crate::interview::registry::SessionRegistry;
use crate::interview::session_store::SessionRepository;
use crate::retry::with_retry;
use crate::skills::aggregator::{extract_observations, SkillAggregator};

#[derive(Debug, Clone)]
pub struct TurnJob {
    pub session_id: String,
    pub user_id: String,
    pub turn_index: u32,
    pub utterance: String,
}

/// Producer side of the sharded job queue.
#[derive(Clone)]
pub struct JobQueue {
    shards: Vec<mpsc::Sender<TurnJob>>,
}

impl JobQueue {
    /// Enqueues without waiting; a full shard hands the job back.
    pub fn try_enqueue(&self, job: TurnJob) -> Result<(), TrySendError<TurnJob>> {
        let shard = shard_for(&job.session_id, self.shards.len());
        self.shards[shard].try_send(job)
    }
}

/// Shard a session's jobs always land on.
pub fn shard_for(session_id: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    session_id.hash(&mut hasher);
    (hasher.finish() % shards.max(1) as u64) as usize
}

/// Creates `shards` bounded queues sharing `capacity` between them.
pub fn channel(capacity: usize, shards: usize) -> (JobQueue, Vec<mpsc::Receiver<TurnJob>>) {
    let shards = shards.max(1);
    let per_shard = (capacity / shards).max(1);
    let (senders, receivers) = (0..shards).map(|_| mpsc::channel(per_shard)).unzip();
    (JobQueue { shards: senders }, receivers)
}

pub struct TurnWorker {
    registry: Arc<SessionRegistry>,
    analyzer: ResponseAnalyzer,
    aggregator: SkillAggregator,
    sessions: Arc<dyn SessionRepository>,
    /// Persist a summary every N analyzed turns; 0 disables snapshots.
    summary_interval: u32,
}

/// What a job changed, handed from the locked section to the persistence steps.
struct AppliedTurn {
    analyzed_turns: u32,
    avg_engagement: f64,
    avg_score: f64,
    summary: Option<SessionSummary>,
}

impl TurnWorker {
    pub fn new(
        registry: Arc<SessionRegistry>,
        analyzer: ResponseAnalyzer,
        aggregator: SkillAggregator,
        sessions: Arc<dyn SessionRepository>,
        summary_interval: u32,
    ) -> Self {
        Self {
            registry,
            analyzer,
            aggregator,
            sessions,
            summary_interval,
        }
    }

    /// One consumer task per shard; each runs until its queue is closed.
    pub fn spawn(
        self,
        shards: Vec<mpsc::Receiver<TurnJob>>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let worker = Arc::new(self);
        shards
            .into_iter()
            .enumerate()
            .map(|(shard, mut jobs)| {
                let worker = worker.clone();
                tokio::spawn(async move {
                    debug!("Turn worker shard {shard} started");
                    while let Some(job) = jobs.recv().await {
                        worker.process(job).await;
                    }
                    info!("Turn worker shard {shard} stopped: job queue closed");
                })
            })
            .collect()
    }

    pub async fn process(&self, job: TurnJob) {
        let Some(handle) = self.registry.get(&job.session_id) else {
            warn!(
                "Dropping turn {} for session {}: session no longer active",
                job.turn_index, job.session_id
            );
            return;
        };

        if let Err(e) = with_retry("session get-or-create", || {
            self.sessions.get_or_create(&job.session_id, &job.user_id)
        })
        .await
        {
            error!("Session row for {} not persisted: {e}", job.session_id);
        }

        // The answered topic is whatever the path points at before this job moves it.
        let topic = {
            let state = handle.lock().await;
            state
                .tree()
                .current_node()
                .map(|n| n.name.clone())
                .unwrap_or_default()
        };

        let outcome = self.analyzer.analyze(&job.utterance, &topic).await;
        if outcome.source == AnalysisSource::Heuristic {
            debug!(
                "Turn {} of session {} analyzed heuristically",
                job.turn_index, job.session_id
            );
        }

        let (record, applied) = {
            let mut state = handle.lock().await;
            let record = match state.record_turn(job.turn_index, &job.utterance, &outcome.analysis) {
                Ok(record) => record,
                Err(e) => {
                    error!(
                        "Turn {} of session {} not applied: {e}",
                        job.turn_index, job.session_id
                    );
                    return;
                }
            };
            state.touch();

            let analyzed_turns = state.grades().len() as u32;
            let summary_due =
                self.summary_interval > 0 && analyzed_turns % self.summary_interval == 0;
            let applied = AppliedTurn {
                analyzed_turns,
                avg_engagement: average_engagement(state.grades()),
                avg_score: average_score(state.grades()),
                summary: summary_due.then(|| summarize(&state)),
            };
            (record, applied)
        };

        debug!(
            "Session {} turn {} on '{}': {:?}, score {:.2}",
            job.session_id, record.turn_index, record.topic_name, record.decision, record.score
        );

        for observation in extract_observations(
            &job.user_id,
            &job.session_id,
            &job.utterance,
            &outcome.analysis,
            &record,
        ) {
            if let Err(e) = self.aggregator.upsert(&observation).await {
                error!(
                    "Skill '{}' for user {} not persisted: {e}",
                    observation.skill_name, job.user_id
                );
            }
        }

        if let Err(e) = with_retry("session metrics", || {
            self.sessions.update_metrics(
                &job.session_id,
                applied.analyzed_turns,
                applied.avg_engagement,
                applied.avg_score,
            )
        })
        .await
        {
            error!("Metrics for session {} not persisted: {e}", job.session_id);
        }

        if let Some(summary) = applied.summary {
            match with_retry("session summary", || {
                self.sessions
                    .save_summary(&job.session_id, job.turn_index, &summary)
            })
            .await
            {
                Ok(key) => info!("Stored summary for session {} at {key}", job.session_id),
                Err(e) => error!("Summary for session {} not persisted: {e}", job.session_id),
            }
        }
    }
}
