use thiserror::Error;

use crate::models::ExerciseId;

/// Rejected session transitions. State is left untouched when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no workout is in progress")]
    NoActiveSession,

    #[error("a workout is already in progress")]
    WorkoutInProgress,

    /// Completing a set needs both weight and reps.
    #[error("set {index} of exercise {exercise_id} is missing weight or reps")]
    IncompleteSet { exercise_id: ExerciseId, index: usize },

    #[error("add at least one exercise before finishing")]
    NoExercises,
}

/// Failure reading or writing the persisted state blob.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An import document was rejected; history is unchanged.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("import document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("import document has no workoutHistory")]
    MissingHistory,
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("network unreachable: {0}")]
    Unreachable(String),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    /// No network and nothing usable in the cache.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// One manifest entry could not be fetched; nothing was committed.
    #[error("precache of {url} failed: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("cache gateway has not been installed")]
    NotInstalled,

    #[error("invalid url {0}")]
    InvalidUrl(String),
}
