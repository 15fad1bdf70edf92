//! Error taxonomy for scene assembly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    /// Typed or pattern lookup left zero candidates after filtering.
    #[error("no valid fixture for {id}")]
    NoValidFixture { id: String },

    #[error("unknown fixture: {0}")]
    UnknownFixture(String),

    #[error("no catalog object matches groups {groups:?}")]
    NoValidObject { groups: Vec<String> },

    #[error("no catalog instance with asset path {0}")]
    UnknownObjectPath(String),

    /// A placement batch exhausted its per-entity retry budget. The
    /// orchestrator restarts the whole load on this error.
    #[error("could not find a valid placement for {entity}")]
    Randomization { entity: String },

    #[error("scene load failed after {attempts} attempts")]
    LoadExhausted { attempts: u32 },

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SceneError {
    pub fn is_randomization(&self) -> bool {
        matches!(self, SceneError::Randomization { .. })
    }
}
