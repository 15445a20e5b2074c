use crate::error::StrestError;

use super::context::RequestContext;

/// A request handler.
///
/// A fresh instance is created for every dispatched message, so `&mut self`
/// state never leaks between requests. Per-request data (parameters, the
/// inbound message, the outgoing response, flags) lives in the
/// [`RequestContext`].
///
/// Unimplemented verbs answer `405 Method Not Allowed`.
pub trait Controller: Send {
    fn handle_get(&mut self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        Err(StrestError::method_not_allowed().into())
    }

    fn handle_post(&mut self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        Err(StrestError::method_not_allowed().into())
    }

    fn handle_put(&mut self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        Err(StrestError::method_not_allowed().into())
    }

    fn handle_delete(&mut self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        Err(StrestError::method_not_allowed().into())
    }
}
