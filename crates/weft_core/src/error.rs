//! Error types for the Weft runtime

use std::fmt;

use thiserror::Error;

use crate::lifecycle::{Lifecycle, LifecycleEvent};

/// Hook that raised a [`HookError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    ShouldRender,
    Updates,
    AfterMount,
    AfterUpdate,
    Deferred,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::ShouldRender => "should_render",
            Hook::Updates => "updates",
            Hook::AfterMount => "after_mount",
            Hook::AfterUpdate => "after_update",
            Hook::Deferred => "deferred",
        };
        f.write_str(name)
    }
}

/// Error returned by a behavior from one of its hooks.
///
/// The composition chain records which behavior raised the error the
/// first time it crosses a layer boundary.
#[derive(Debug)]
pub struct HookError {
    behavior: Option<&'static str>,
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            behavior: None,
            message: message.into(),
        }
    }

    /// Name of the behavior that raised the error, if known
    pub fn behavior(&self) -> Option<&'static str> {
        self.behavior
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn attribute(mut self, behavior: &'static str) -> Self {
        self.behavior.get_or_insert(behavior);
        self
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.behavior {
            Some(behavior) => write!(f, "{behavior}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for HookError {}

impl From<serde_json::Error> for HookError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Result type of behavior hooks
pub type HookResult<T> = Result<T, HookError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("cannot handle {event:?} while {from:?}")]
    InvalidStateTransition {
        from: Lifecycle,
        event: LifecycleEvent,
    },

    #[error("no render target named `{name}`")]
    UnresolvedTarget { name: String },

    #[error("{hook} hook failed: {source}")]
    HookFailure {
        hook: Hook,
        #[source]
        source: HookError,
    },

    #[error("gave up after {passes} consecutive re-entrant render passes")]
    RenderLoop { passes: u32 },

    #[error("malformed update descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("no role registered as `{0}`")]
    UnknownRole(String),

    #[error(transparent)]
    Value(#[from] serde_json::Error),
}

impl RuntimeError {
    pub(crate) fn hook(hook: Hook, source: HookError) -> Self {
        RuntimeError::HookFailure { hook, source }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
