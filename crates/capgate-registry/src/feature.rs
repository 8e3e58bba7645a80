//! Feature Flags
//!
//! The registry consults an injected [`FeatureChecker`] for capabilities
//! gated behind a flag. The checker is owned outside the engine and may do
//! I/O; the engine hands it the caller's [`RequestContext`] and never caches
//! its answers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Error type returned by feature checkers.
pub type FlagError = Box<dyn std::error::Error + Send + Sync>;

/// Per-request cancellation and deadline, passed through to every checker call.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the token is cancelled or the deadline has passed.
    pub fn is_done(&self) -> bool {
        self.cancellation.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Evaluates a named feature flag for the current request.
#[async_trait]
pub trait FeatureChecker: Send + Sync {
    async fn is_enabled(&self, ctx: &RequestContext, flag: &str) -> Result<bool, FlagError>;
}

/// Checker as held by a registry filter.
#[derive(Clone)]
pub(crate) struct SharedChecker(Arc<dyn FeatureChecker>);

impl SharedChecker {
    pub(crate) fn new(checker: Arc<dyn FeatureChecker>) -> Self {
        Self(checker)
    }

    pub(crate) async fn is_enabled(&self, ctx: &RequestContext, flag: &str) -> Result<bool, FlagError> {
        self.0.is_enabled(ctx, flag).await
    }
}

impl fmt::Debug for SharedChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedChecker(..)")
    }
}

/// Adapts a synchronous closure into a [`FeatureChecker`].
pub struct FnChecker<F>(F);

pub fn checker_fn<F>(f: F) -> FnChecker<F>
where
    F: Fn(&RequestContext, &str) -> Result<bool, FlagError> + Send + Sync,
{
    FnChecker(f)
}

#[async_trait]
impl<F> FeatureChecker for FnChecker<F>
where
    F: Fn(&RequestContext, &str) -> Result<bool, FlagError> + Send + Sync,
{
    async fn is_enabled(&self, ctx: &RequestContext, flag: &str) -> Result<bool, FlagError> {
        (self.0)(ctx, flag)
    }
}

/// A fixed set of enabled flags, typically taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticFlags {
    enabled: HashSet<String>,
}

impl StaticFlags {
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: flags.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl FeatureChecker for StaticFlags {
    async fn is_enabled(&self, ctx: &RequestContext, flag: &str) -> Result<bool, FlagError> {
        if ctx.is_done() {
            return Err("request cancelled before flag evaluation".into());
        }
        Ok(self.enabled.contains(flag))
    }
}
