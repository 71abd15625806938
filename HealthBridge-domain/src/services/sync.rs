//! Offline sync queue.
//!
//! Clients in areas with poor connectivity record operations locally and
//! upload them in batches. Each upload lands in `sync_queue` as a pending
//! entry; a background worker replays pending entries through the regular
//! services, acting as the user who queued them, so the same access rules
//! apply as for online requests.
//!
//! Entries that fail with a transient error stay pending and are retried on
//! the next pass until `max_retries` attempts have been made. Errors that
//! cannot succeed on retry (validation, forbidden, not found, conflict) fail
//! the entry immediately.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

use crate::auth::UserInfo;
use crate::entities::{
    BookAppointmentRequest, SubmitAssignmentRequest, SubmitSurveyResponseRequest, SyncBatchRequest, SyncBatchResponse,
    SyncReport,
};
use crate::errors::ServiceError;
use crate::services::appointments::AppointmentService;
use crate::services::learning::LearningService;
use crate::services::policies::PolicyService;
use crate::services::surveys::SurveyService;
use health_bridge_data::models::{AppointmentStatus, NewSyncEntry, SyncEntry};
use health_bridge_data::repository::{RepositoryError, SyncRepository, UserRepository};

/// Queue processing settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub interval_seconds: u64,
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            batch_size: 50,
            max_retries: 3,
        }
    }
}

impl SyncConfig {
    /// Load from `SYNC_INTERVAL_SECONDS`, `SYNC_BATCH_SIZE` and `SYNC_MAX_RETRIES`
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            env::var(name).ok().and_then(|v| v.parse().ok())
        }

        let defaults = Self::default();
        Self {
            interval_seconds: var("SYNC_INTERVAL_SECONDS")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.interval_seconds),
            batch_size: var("SYNC_BATCH_SIZE").filter(|v| *v > 0).unwrap_or(defaults.batch_size),
            max_retries: var("SYNC_MAX_RETRIES").filter(|v| *v > 0).unwrap_or(defaults.max_retries),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Operations a client may queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncOperation {
    CreateAppointment,
    CancelAppointment,
    CreateSurveyResponse,
    CreateSubmission,
    AcknowledgePolicy,
}

impl SyncOperation {
    fn parse(entity_type: &str, operation: &str) -> Option<Self> {
        match (entity_type, operation) {
            ("appointment", "create") => Some(Self::CreateAppointment),
            ("appointment", "cancel") => Some(Self::CancelAppointment),
            ("survey_response", "create") => Some(Self::CreateSurveyResponse),
            ("submission", "create") => Some(Self::CreateSubmission),
            ("policy_acknowledgement", "create") => Some(Self::AcknowledgePolicy),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct AppointmentRef {
    appointment_id: String,
}

#[derive(Deserialize)]
struct SurveyAnswers {
    survey_id: String,
    answers: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct QueuedSubmission {
    assignment_id: String,
    content: String,
    attachment_url: Option<String>,
}

#[derive(Deserialize)]
struct PolicyRef {
    policy_id: String,
}

fn payload<T: DeserializeOwned>(entry: &SyncEntry) -> Result<T, ServiceError> {
    serde_json::from_value(entry.payload.clone()).map_err(|e| {
        ServiceError::Validation(format!(
            "Invalid payload for {}/{}: {}",
            entry.entity_type, entry.operation, e
        ))
    })
}

#[derive(Clone)]
pub struct SyncService {
    queue: Arc<dyn SyncRepository>,
    users: Arc<dyn UserRepository>,
    appointments: Arc<AppointmentService>,
    surveys: Arc<SurveyService>,
    learning: Arc<LearningService>,
    policies: Arc<PolicyService>,
    config: SyncConfig,
    /// Held for the length of a pass; passes never overlap
    pass: Arc<Mutex<()>>,
}

impl SyncService {
    pub fn new(
        queue: Arc<dyn SyncRepository>,
        users: Arc<dyn UserRepository>,
        appointments: Arc<AppointmentService>,
        surveys: Arc<SurveyService>,
        learning: Arc<LearningService>,
        policies: Arc<PolicyService>,
        config: SyncConfig,
    ) -> Self {
        Self {
            queue,
            users,
            appointments,
            surveys,
            learning,
            policies,
            config,
            pass: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Queue a batch of offline operations for the caller
    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn upload_batch(&self, actor: &UserInfo, request: SyncBatchRequest) -> Result<SyncBatchResponse, ServiceError> {
        request.validate()?;
        for operation in &request.operations {
            operation.validate()?;
        }

        let mut accepted = 0;
        let mut duplicates = 0;
        let mut entries = Vec::with_capacity(request.operations.len());
        for operation in request.operations {
            let (entry, created) = self
                .queue
                .enqueue(NewSyncEntry {
                    user_id: actor.user_id.clone(),
                    client_id: operation.client_id,
                    entity_type: operation.entity_type,
                    operation: operation.operation,
                    payload: operation.payload,
                    client_timestamp: operation.client_timestamp,
                })
                .await?;
            if created {
                accepted += 1;
            } else {
                duplicates += 1;
            }
            entries.push(entry);
        }

        info!("Queued {} sync operations ({} duplicates)", accepted, duplicates);
        Ok(SyncBatchResponse {
            accepted,
            duplicates,
            entries,
        })
    }

    /// The caller's queue entries, newest first
    pub async fn status(&self, actor: &UserInfo) -> Result<Vec<SyncEntry>, ServiceError> {
        Ok(self.queue.list_for_user(&actor.user_id).await?)
    }

    async fn acting_user(&self, user_id: &str) -> Result<UserInfo, ServiceError> {
        match self.users.find_by_id(user_id).await? {
            Some(user) if user.is_active => {
                let mut info = UserInfo::new(user.id, user.role);
                info.auth_source = "sync".to_string();
                Ok(info)
            }
            Some(_) => Err(ServiceError::Forbidden(format!("User {} is deactivated", user_id))),
            None => Err(ServiceError::not_found("User", user_id)),
        }
    }

    /// Replay one entry through the matching service
    async fn apply(&self, entry: &SyncEntry) -> Result<(), ServiceError> {
        let operation = SyncOperation::parse(&entry.entity_type, &entry.operation).ok_or_else(|| {
            ServiceError::Validation(format!(
                "Unsupported sync operation: {}/{}",
                entry.entity_type, entry.operation
            ))
        })?;
        let actor = self.acting_user(&entry.user_id).await?;

        match operation {
            SyncOperation::CreateAppointment => {
                let mut request: BookAppointmentRequest = payload(entry)?;
                // payments need the client online
                request.payment = None;
                self.appointments.book(&actor, &request).await?;
            }
            SyncOperation::CancelAppointment => {
                let target: AppointmentRef = payload(entry)?;
                let appointment = self.appointments.get(&actor, &target.appointment_id).await?;
                if appointment.status != AppointmentStatus::Cancelled {
                    self.appointments
                        .update_status(&actor, &appointment.id, AppointmentStatus::Cancelled)
                        .await?;
                }
            }
            SyncOperation::CreateSurveyResponse => {
                let response: SurveyAnswers = payload(entry)?;
                self.surveys
                    .respond(
                        &actor,
                        &response.survey_id,
                        SubmitSurveyResponseRequest {
                            answers: response.answers,
                        },
                    )
                    .await?;
            }
            SyncOperation::CreateSubmission => {
                let submission: QueuedSubmission = payload(entry)?;
                self.learning
                    .submit(
                        &actor,
                        &submission.assignment_id,
                        SubmitAssignmentRequest {
                            content: submission.content,
                            attachment_url: submission.attachment_url,
                        },
                    )
                    .await?;
            }
            SyncOperation::AcknowledgePolicy => {
                let policy: PolicyRef = payload(entry)?;
                self.policies.acknowledge(&actor, &policy.policy_id).await?;
            }
        }
        Ok(())
    }

    /// Process up to `batch_size` pending entries, oldest first.
    ///
    /// Passes run one at a time. An entry settled elsewhere between fetch and
    /// settle is skipped and not counted.
    #[instrument(skip(self))]
    pub async fn process_pending(&self, batch_size: usize) -> Result<SyncReport, ServiceError> {
        let _pass = self.pass.lock().await;
        let pending = self.queue.get_pending(batch_size, self.config.max_retries).await?;
        let mut report = SyncReport::default();

        for entry in pending {
            match self.apply(&entry).await {
                Ok(()) => match self.queue.mark_synced(&entry.id).await {
                    Ok(()) => {
                        report.processed += 1;
                        report.synced += 1;
                        debug!("Synced {} ({}/{})", entry.id, entry.entity_type, entry.operation);
                    }
                    Err(RepositoryError::Conflict(state)) => debug!("Skipped {}: {}", entry.id, state),
                    Err(e) => return Err(e.into()),
                },
                Err(e) => {
                    let terminal = !e.is_retryable() || entry.retry_count + 1 >= self.config.max_retries;
                    let updated = match self.queue.record_failure(&entry.id, &e.to_string(), terminal).await {
                        Ok(updated) => updated,
                        Err(RepositoryError::Conflict(state)) => {
                            debug!("Skipped {}: {}", entry.id, state);
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    };
                    report.processed += 1;
                    if terminal {
                        report.failed += 1;
                        warn!(
                            "Sync entry {} failed after {} attempts: {}",
                            entry.id, updated.retry_count, e
                        );
                    } else {
                        report.retried += 1;
                        debug!("Sync entry {} will be retried: {}", entry.id, e);
                    }
                }
            }
        }

        if report.processed > 0 {
            info!(
                "Sync pass: {} processed, {} synced, {} failed, {} retried",
                report.processed, report.synced, report.failed, report.retried
            );
        }
        Ok(report)
    }

    /// Run `process_pending` on the configured interval until the task is aborted
    pub fn spawn_worker(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval());
            loop {
                ticker.tick().await;
                if let Err(e) = self.process_pending(self.config.batch_size).await {
                    error!("Sync pass aborted: {}", e);
                }
            }
        })
    }
}
