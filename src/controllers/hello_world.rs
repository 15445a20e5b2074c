use tracing::info;

use crate::controller::{Controller, ControllerDescriptor, RequestContext};

/// Greets whoever is named in the path: `GET /hello/earth` answers
/// `Hello EARTH!` as `text/plain`.
#[derive(Debug, Default)]
pub struct HelloWorld;

impl HelloWorld {
    pub const NAME: &'static str = "hello_world";
    pub const ROUTE: &'static str = "/hello/:param";

    #[must_use]
    pub fn descriptor() -> ControllerDescriptor {
        ControllerDescriptor::of::<Self>(Self::NAME).route(Self::ROUTE)
    }
}

impl Controller for HelloWorld {
    fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        let name = ctx.param_str("param").unwrap_or("World").to_uppercase();
        info!(request_id = %ctx.request_id(), name = %name, "Saying hello");
        ctx.set_response_text(&format!("Hello {name}!"), "text/plain");
        Ok(())
    }
}
