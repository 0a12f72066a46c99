//! Built-in handler types.
//!
//! `RequestHandler` is the root of every handler hierarchy and carries no
//! rules of its own. `Controller` adds the conventional
//! `$Action//$ID/$OtherID` fallback rule and the controller lifecycle.
//! Both are abstract: they are only reachable as ancestors or by name from
//! a global rule.
//!
//! `EchoController` is a small concrete controller used by `dispatchd` when
//! no handlers are configured, and by the integration tests.

use serde_json::Value;

use crate::handler::node::{Outcome, ViewData};
use crate::handler::registry::{HandlerKind, HandlerType, RegistryBuilder};

pub const REQUEST_HANDLER: &str = "RequestHandler";
pub const CONTROLLER: &str = "Controller";
pub const ECHO_CONTROLLER: &str = "EchoController";

/// Fallback rule inherited by every controller.
pub const DEFAULT_ACTION_RULE: &str = "$Action//$ID/$OtherID";

pub fn request_handler_base() -> HandlerType {
    HandlerType::new(REQUEST_HANDLER, HandlerKind::RequestHandler).abstract_type()
}

pub fn controller_base() -> HandlerType {
    HandlerType::new(CONTROLLER, HandlerKind::Controller)
        .extends(REQUEST_HANDLER)
        .url_handler(DEFAULT_ACTION_RULE, "$Action")
        .abstract_type()
}

/// Answers `index` with a greeting and `params` with everything bound so
/// far.
pub fn echo_controller() -> HandlerType {
    HandlerType::controller(ECHO_CONTROLLER)
        .action("index", |node, ctx| {
            let mut data = ViewData::new();
            data.insert("path".into(), Value::from(ctx.request().path()));
            data.insert("method".into(), Value::from(ctx.request().method().as_str()));
            node.customise(data);
            Ok(Outcome::Render)
        })
        .action("params", |_, ctx| {
            let params = serde_json::to_value(ctx.cursor().all_params()).unwrap_or_default();
            let mut data = ViewData::new();
            data.insert("params".into(), params);
            data.insert("remaining".into(), Value::from(ctx.cursor().remaining()));
            Ok(Outcome::Data(data))
        })
}

pub fn register_builtins(builder: &mut RegistryBuilder) {
    builder
        .register(request_handler_base())
        .register(controller_base());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::matcher::Rule;

    #[test]
    fn test_builtins_resolve() {
        let mut builder = RegistryBuilder::with_builtins();
        builder.register(echo_controller());
        let registry = builder.build().unwrap();

        assert!(registry.get(REQUEST_HANDLER).unwrap().rules().is_empty());
        let controller = registry.get(CONTROLLER).unwrap();
        assert_eq!(controller.kind(), HandlerKind::Controller);
        assert_eq!(controller.rules()[0].pattern().as_str(), DEFAULT_ACTION_RULE);

        let echo = registry.get(ECHO_CONTROLLER).unwrap();
        assert!(echo.action("params").is_some());
        assert_eq!(registry.routable_controllers().len(), 1);
    }
}
