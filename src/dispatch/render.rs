//! Rendering collaborator.
//!
//! When a handler chain ends in a node ("render me") or in structured data
//! rather than a body, something has to turn it into bytes. Templating is
//! not part of the dispatch core, so that something is a [`Renderer`]
//! supplied by the host. [`JsonRenderer`] is the default.

use std::fmt;

use axum::http::{header, HeaderValue};
use serde_json::{json, Value};

use crate::handler::node::{HandlerNode, ViewData};
use crate::http::response::Response;

pub trait Renderer: Send + Sync + fmt::Debug {
    /// Render a node that ended the chain without a body of its own.
    fn render(&self, node: &HandlerNode, response: &mut Response);

    /// Render structured data that reached the top of the chain.
    fn render_data(&self, data: &ViewData, response: &mut Response);
}

/// Renders nodes and data as JSON documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl JsonRenderer {
    fn write(value: &Value, response: &mut Response) {
        response.set_body(value.to_string());
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
}

impl Renderer for JsonRenderer {
    fn render(&self, node: &HandlerNode, response: &mut Response) {
        let document = json!({
            "handler": node.name(),
            "action": node.action(),
            "params": node.url_params(),
            "data": node.view(),
        });
        Self::write(&document, response);
    }

    fn render_data(&self, data: &ViewData, response: &mut Response) {
        Self::write(&Value::Object(data.clone()), response);
    }
}
