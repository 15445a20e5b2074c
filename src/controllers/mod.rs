//! Built-in controllers.
//!
//! [`HelloWorld`] is the smallest useful controller and the one the `strest`
//! binary registers by default.

mod hello_world;

pub use hello_world::HelloWorld;

use crate::dispatcher::Dispatcher;

/// Register every built-in controller on `dispatcher`.
pub fn register_builtin(dispatcher: &Dispatcher) {
    dispatcher.register_controller(HelloWorld::descriptor());
}
