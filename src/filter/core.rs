use crate::controller::RequestContext;
use crate::error::StrestError;

/// Hooks wrapped around every controller action.
///
/// One instance per registered filter name is shared by all concurrent
/// requests, so implementations must not keep per-request state in `self`.
/// Per-request data belongs in the [`RequestContext`].
pub trait ControllerFilter: Send + Sync {
    /// Runs before the action. May call
    /// [`RequestContext::set_skip_execution`] to short-circuit the action
    /// while still running `after` hooks and sending the response.
    fn before(&self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after the action, before the response is sent.
    fn after(&self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on the error path once the response carries the error status.
    /// Failures here are logged and otherwise ignored.
    fn error(&self, _ctx: &mut RequestContext, _err: &StrestError) -> anyhow::Result<()> {
        Ok(())
    }
}
