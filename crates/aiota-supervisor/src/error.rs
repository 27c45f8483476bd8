use aiota_core::CoreError;

pub type SupervisorResult<T> = Result<T, SupervisorError>;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open output file {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting on child: {0}")]
    Wait(#[source] std::io::Error),

    #[error("supervision of {role} ended without reaching a terminal state")]
    TaskLost { role: String },

    #[error("invalid restart policy: {0}")]
    Policy(#[from] CoreError),
}

impl SupervisorError {
    /// Stable label for structured logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::Spawn { .. } => "spawn_failed",
            SupervisorError::Output { .. } => "output_failed",
            SupervisorError::Wait(_) => "wait_failed",
            SupervisorError::TaskLost { .. } => "task_lost",
            SupervisorError::Policy(_) => "invalid_policy",
        }
    }
}
