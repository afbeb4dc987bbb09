use crate::plan::{self, PlannedStep, StepAction};
use apimigrate_ai::MigrationAdvisor;
use apimigrate_bundle::ProxySource;
use apimigrate_core::{
    MigrateError, MigrationConfig, MigrationExecution, MigrationStatus, PolicyMapping, ProxyFile,
    RecordId,
};
use apimigrate_store::{Collections, UpdateOutcome};
use chrono::Utc;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
enum RunError {
    /// Cancelled, or another writer already finished the record.
    #[error("migration stopped")]
    Stopped,
    #[error("{0}")]
    Step(String),
    #[error(transparent)]
    Store(#[from] MigrateError),
}

type RunResult<T> = std::result::Result<T, RunError>;

/// Called with the final status whenever a run ends.
pub type FinishHook = Arc<dyn Fn(MigrationStatus) + Send + Sync>;

/// Drives migration executions through the step plan in background tasks.
#[derive(Clone)]
pub struct MigrationRunner {
    collections: Collections,
    advisor: MigrationAdvisor,
    config: Arc<MigrationConfig>,
    active: Arc<DashMap<RecordId, CancellationToken>>,
    on_finish: Option<FinishHook>,
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("active", &self.active.len())
            .field("config", &self.config)
            .finish()
    }
}

fn touch(e: &mut MigrationExecution) {
    e.updated_at = Utc::now();
}

fn raise_progress(e: &mut MigrationExecution, progress: u8) {
    e.progress = e.progress.max(progress.min(100));
}

fn advance_status(e: &mut MigrationExecution, next: MigrationStatus) {
    if e.status.can_advance_to(next) {
        e.status = next;
    }
}

impl MigrationRunner {
    pub fn new(collections: Collections, advisor: MigrationAdvisor, config: MigrationConfig) -> Self {
        Self {
            collections,
            advisor,
            config: Arc::new(config),
            active: Arc::new(DashMap::new()),
            on_finish: None,
        }
    }

    pub fn with_finish_hook(mut self, hook: FinishHook) -> Self {
        self.on_finish = Some(hook);
        self
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_running(&self, execution_id: &str) -> bool {
        self.active.contains_key(execution_id)
    }

    /// Starts the execution in a background task.
    pub fn spawn(&self, execution_id: RecordId) -> JoinHandle<()> {
        let token = CancellationToken::new();
        self.active.insert(execution_id.clone(), token.clone());
        let runner = self.clone();
        tokio::spawn(async move {
            runner.run(&execution_id, token).await;
            runner.active.remove(&execution_id);
        })
    }

    /// Runs one execution to completion on the current task.
    pub async fn run(&self, execution_id: &str, token: CancellationToken) {
        info!("Starting migration {}", execution_id);
        let result = self.perform(execution_id, &token).await;

        let final_status = match result {
            Ok(()) => {
                info!("Migration {} completed", execution_id);
                Some(MigrationStatus::Completed)
            }
            Err(RunError::Stopped) => {
                info!("Migration {} stopped before completion", execution_id);
                None
            }
            Err(e) => {
                error!("Migration failed for {}: {}", execution_id, e);
                let message = e.to_string();
                match self
                    .collections
                    .executions
                    .update(execution_id, move |x| x.fail(message))
                    .await
                {
                    Ok(_) => Some(MigrationStatus::Failed),
                    Err(store_err) => {
                        error!(
                            "Could not record failure of migration {}: {}",
                            execution_id, store_err
                        );
                        None
                    }
                }
            }
        };

        if let Some(hook) = &self.on_finish {
            let status = match final_status {
                Some(s) => s,
                None => self
                    .collections
                    .executions
                    .get(execution_id)
                    .await
                    .ok()
                    .flatten()
                    .map(|e| e.status)
                    .unwrap_or(MigrationStatus::Failed),
            };
            hook(status);
        }
    }

    /// Cancels a pending or in-flight execution. Returns the updated record,
    /// or `None` when it does not exist or is past the cancellable phases.
    pub async fn cancel(&self, execution_id: &str) -> apimigrate_core::Result<Option<MigrationExecution>> {
        let outcome = self
            .collections
            .executions
            .update(execution_id, |e| {
                if !e.status.is_cancellable() {
                    return false;
                }
                e.migration_log.push(plan::CANCELLED_MESSAGE.to_string());
                e.fail(plan::CANCELLED_MESSAGE)
            })
            .await?;

        match outcome {
            UpdateOutcome::Updated(e) => {
                if let Some(token) = self.active.get(execution_id) {
                    token.cancel();
                }
                info!("Migration {} cancelled", execution_id);
                Ok(Some(e))
            }
            UpdateOutcome::Unchanged(_) | UpdateOutcome::Missing => Ok(None),
        }
    }

    /// Fails every execution left non-terminal by a previous process.
    pub async fn recover_interrupted(&self) -> apimigrate_core::Result<usize> {
        let mut recovered = 0;
        for execution in self.collections.executions.list().await? {
            if execution.status.is_terminal() || self.is_running(&execution.id) {
                continue;
            }
            let outcome = self
                .collections
                .executions
                .update(&execution.id, |e| {
                    if e.status.is_terminal() {
                        return false;
                    }
                    e.migration_log.push(plan::INTERRUPTED_MESSAGE.to_string());
                    e.fail(plan::INTERRUPTED_MESSAGE)
                })
                .await?;
            if outcome.is_updated() {
                recovered += 1;
            }
        }
        if recovered > 0 {
            warn!("Marked {} interrupted migration(s) as failed", recovered);
        }
        Ok(recovered)
    }

    /// Applies `f` unless the record is terminal. A rejected write means the
    /// run must stop.
    async fn apply<F>(&self, execution_id: &str, f: F) -> RunResult<MigrationExecution>
    where
        F: FnOnce(&mut MigrationExecution) + Send,
    {
        let outcome = self
            .collections
            .executions
            .update(execution_id, |e| {
                if e.status.is_terminal() {
                    return false;
                }
                f(e);
                touch(e);
                true
            })
            .await?;
        match outcome {
            UpdateOutcome::Updated(e) => Ok(e),
            UpdateOutcome::Unchanged(_) | UpdateOutcome::Missing => Err(RunError::Stopped),
        }
    }

    async fn fail_early(&self, execution_id: &str, message: &'static str) -> RunResult<()> {
        warn!("Migration {}: {}", execution_id, message);
        self.collections
            .executions
            .update(execution_id, |e| e.fail(message))
            .await?;
        Err(RunError::Stopped)
    }

    /// Records the step start, awaits `work` (or cancellation) and records
    /// the outcome.
    async fn step<T, Fut>(
        &self,
        execution_id: &str,
        token: &CancellationToken,
        name: &'static str,
        work: Fut,
    ) -> RunResult<T>
    where
        Fut: Future<Output = std::result::Result<T, String>>,
    {
        self.apply(execution_id, |e| {
            e.current_step = name.to_string();
            e.migration_log.push(format!("Starting: {}", name));
        })
        .await?;
        debug!("Migration {}: {}", execution_id, name);

        let result = tokio::select! {
            _ = token.cancelled() => return Err(RunError::Stopped),
            result = work => result,
        };

        match result {
            Ok(value) => {
                self.apply(execution_id, |e| {
                    e.steps_completed.push(name.to_string());
                    e.migration_log.push(format!("Completed: {}", name));
                })
                .await?;
                Ok(value)
            }
            Err(message) => {
                let logged = message.clone();
                self.apply(execution_id, move |e| {
                    e.steps_failed.push(name.to_string());
                    e.migration_log.push(format!("Failed: {} - {}", name, logged));
                })
                .await?;
                Err(RunError::Step(message))
            }
        }
    }

    async fn generate_bundle(
        &self,
        proxy_file: &ProxyFile,
        mappings: &[PolicyMapping],
    ) -> std::result::Result<String, String> {
        let source = ProxySource::from_proxy_file(proxy_file).map_err(|e| e.to_string())?;
        Ok(self
            .advisor
            .convert_bundle(&source.analysis_content, mappings)
            .await)
    }

    async fn deployment_target(&self, execution: &MigrationExecution) -> (String, String) {
        let credentials = self
            .collections
            .credentials
            .get(&execution.credentials_id)
            .await
            .ok()
            .flatten();
        let pick = |value: Option<&String>, default: &String| {
            value
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| default.clone())
        };
        (
            pick(
                credentials.as_ref().map(|c| &c.apigee_x_project),
                &self.config.default_org,
            ),
            pick(
                credentials.as_ref().map(|c| &c.apigee_x_env),
                &self.config.default_env,
            ),
        )
    }

    async fn perform(&self, execution_id: &str, token: &CancellationToken) -> RunResult<()> {
        let Some(execution) = self.collections.executions.get(execution_id).await? else {
            warn!("Migration {} not found", execution_id);
            return Err(RunError::Stopped);
        };

        let Some(analysis) = self
            .collections
            .analyses
            .get(&execution.proxy_analysis_id)
            .await?
        else {
            return self.fail_early(execution_id, plan::ANALYSIS_MISSING).await;
        };

        let Some(proxy_file) = self.collections.proxy_files.get(&analysis.proxy_id).await? else {
            return self.fail_early(execution_id, plan::PROXY_FILE_MISSING).await;
        };

        self.apply(execution_id, |e| {
            advance_status(e, MigrationStatus::Preparing);
            raise_progress(e, plan::STARTED_PROGRESS);
            e.started_at = Some(Utc::now());
        })
        .await?;

        for PlannedStep {
            name,
            action,
            status_before,
            progress_after,
            status_after,
        } in plan::steps(&self.config)
        {
            if let Some(status) = status_before {
                self.apply(execution_id, |e| advance_status(e, status)).await?;
            }

            let bundle = match action {
                StepAction::Simulated(delay) => {
                    self.step(execution_id, token, name, async move {
                        tokio::time::sleep(delay).await;
                        Ok(None::<String>)
                    })
                    .await?
                }
                StepAction::GenerateBundle => {
                    self.step(execution_id, token, name, async {
                        self.generate_bundle(&proxy_file, &analysis.policy_mappings)
                            .await
                            .map(Some)
                    })
                    .await?
                }
            };

            if progress_after.is_some() || status_after.is_some() || bundle.is_some() {
                self.apply(execution_id, move |e| {
                    if let Some(p) = progress_after {
                        raise_progress(e, p);
                    }
                    if let Some(s) = status_after {
                        advance_status(e, s);
                    }
                    if let Some(b) = bundle {
                        e.apigee_x_bundle = Some(b);
                    }
                })
                .await?;
            }
        }

        let (org, env) = self.deployment_target(&execution).await;
        let url = plan::deployment_url(&org, &env, &analysis.proxy_name);
        self.apply(execution_id, move |e| {
            advance_status(e, MigrationStatus::Completed);
            raise_progress(e, 100);
            e.current_step = plan::COMPLETED_STEP.to_string();
            e.deployment_url = Some(url);
            e.migration_log.push(plan::COMPLETED_LOG.to_string());
            e.completed_at = Some(Utc::now());
        })
        .await?;

        Ok(())
    }
}
