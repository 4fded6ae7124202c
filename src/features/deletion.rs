use crate::domain::types::{AgentRecord, SweepFailure, SweepSummary};
use crate::features::chain::ChainClientFactory;
use crate::features::signer::KeyResolver;
use crate::features::sweep::SweepEngine;
use async_trait::async_trait;
use canlog::{log, GetLogFilter, LogFilter, LogPriorityLevels};
use std::fmt;

#[derive(Clone, Copy, Debug, LogPriorityLevels)]
enum DeletionLogPriority {
    #[log_level(capacity = 500, name = "DELETION_INFO")]
    Info,
    #[log_level(capacity = 200, name = "DELETION_ERROR")]
    Error,
}

impl GetLogFilter for DeletionLogPriority {
    fn get_log_filter() -> LogFilter {
        LogFilter::ShowAll
    }
}

/// Process supervisor for running agents.
#[async_trait(?Send)]
pub trait AgentRuntimeControl {
    fn is_running(&self, agent_id: &str) -> bool;
    async fn stop(&self, agent_id: &str) -> Result<(), String>;
}

/// Persisted agent rows.
pub trait AgentRecordStore {
    fn delete_agent(&self, agent_id: &str) -> Result<(), String>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeletionError {
    /// Preflight or sweep refused; the record is untouched.
    Denied(SweepFailure),
    RuntimeStop(String),
    /// Assets were swept but the record could not be removed.
    RecordDelete {
        summary: SweepSummary,
        error: String,
    },
}

impl DeletionError {
    pub fn http_status(&self) -> u16 {
        match self {
            DeletionError::Denied(failure) => failure.http_status(),
            DeletionError::RuntimeStop(_) | DeletionError::RecordDelete { .. } => 500,
        }
    }
}

impl fmt::Display for DeletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionError::Denied(failure) => {
                write!(f, "{} ({})", failure.error, failure.code.as_str())
            }
            DeletionError::RuntimeStop(error) => write!(f, "failed to stop agent: {error}"),
            DeletionError::RecordDelete { error, .. } => {
                write!(f, "assets swept but agent record was not deleted: {error}")
            }
        }
    }
}

/// Deletes an agent after draining its wallet: preflight, stop the runtime
/// if it is running, sweep, and remove the record only once the sweep
/// settled.
pub async fn delete_agent_with_sweep<F: ChainClientFactory>(
    engine: &SweepEngine<F>,
    record: &AgentRecord,
    runtime: &dyn AgentRuntimeControl,
    store: &dyn AgentRecordStore,
    resolver: &dyn KeyResolver,
) -> Result<SweepSummary, DeletionError> {
    engine.preflight(record).map_err(DeletionError::Denied)?;

    if runtime.is_running(&record.id) {
        runtime.stop(&record.id).await.map_err(|error| {
            log!(
                DeletionLogPriority::Error,
                "agent={} stop failed error={}",
                record.id,
                error
            );
            DeletionError::RuntimeStop(error)
        })?;
        log!(DeletionLogPriority::Info, "agent={} stopped", record.id);
    }

    let summary = engine
        .sweep(record, resolver)
        .await
        .map_err(DeletionError::Denied)?;

    if let Err(error) = store.delete_agent(&record.id) {
        log!(
            DeletionLogPriority::Error,
            "agent={} swept transfers={} record delete failed error={}",
            record.id,
            summary.transfers.len(),
            error
        );
        return Err(DeletionError::RecordDelete { summary, error });
    }
    log!(
        DeletionLogPriority::Info,
        "agent={} deleted transfers={}",
        record.id,
        summary.transfers.len()
    );
    Ok(summary)
}
