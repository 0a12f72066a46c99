//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use request_dispatch::dispatch::{Director, RoutingTable, RuleTarget, Session};
use request_dispatch::handler::{HandlerType, Outcome, Permission, RegistryBuilder, ViewData};
use request_dispatch::http::{HttpRequest, Response};
use request_dispatch::security::Principal;
use request_dispatch::HttpError;

/// Counts invocations of an action.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A small site: pages with an edit action behind `CMS_ACCESS`, a form
/// sub-handler, and an API handler with a fail-fast rule pair.
pub fn site_registry(edits: &Calls, fallbacks: &Calls) -> RegistryBuilder {
    let edits = edits.clone();
    let fallbacks = fallbacks.clone();

    let mut builder = RegistryBuilder::with_builtins();
    builder
        .register(
            HandlerType::controller("PageController")
                .allow("index", Permission::Allow)
                .allow("show", Permission::Allow)
                .allow("form", Permission::Allow)
                .allow("edit", Permission::Code("CMS_ACCESS".into()))
                .action("show", |node, ctx| {
                    let mut data = ViewData::new();
                    data.insert("id".into(), ctx.cursor().param("ID").unwrap_or_default().into());
                    data.insert("section".into(), ctx.cursor().param("Section").unwrap_or_default().into());
                    data.insert("layout".into(), ctx.cursor().param("Layout").unwrap_or_default().into());
                    node.customise(data);
                    Ok(Outcome::Render)
                })
                .action("edit", move |_, ctx| {
                    edits.hit();
                    Ok(Outcome::body(format!(
                        "editing {}",
                        ctx.cursor().param("ID").unwrap_or("?")
                    )))
                })
                .action("form", |_, ctx| {
                    let form = ctx
                        .instantiate("ContactForm")
                        .ok_or_else(|| HttpError::not_found("no form"))?;
                    Ok(Outcome::handler(form))
                }),
        )
        .register(
            HandlerType::request_handler("ContactForm")
                .url_handler("field/$FieldName!", "field")
                .url_handler("POST ", "submit")
                .action("field", |_, ctx| {
                    Ok(Outcome::body(format!(
                        "field {}",
                        ctx.cursor().latest_param("FieldName").unwrap_or_default()
                    )))
                })
                .action("submit", |_, ctx| {
                    Ok(Outcome::body(format!(
                        "thanks {}",
                        ctx.request().post_var("name").unwrap_or("stranger")
                    )))
                }),
        )
        .register(
            HandlerType::controller("ApiController")
                .url_handler("broken/$ID", "broken")
                .url_handler("$Anything", "fallback")
                .action("broken", |_, _| {
                    Ok(Outcome::Response(Response::plain_text(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "maintenance",
                    )))
                })
                .action("fallback", move |_, _| {
                    fallbacks.hit();
                    Ok(Outcome::body("fallback"))
                }),
        );
    builder
}

pub fn site_table(builder: &RegistryBuilder) -> RoutingTable {
    RoutingTable::new(builder.build().unwrap())
        .base_url("https://example.com/")
        .unwrap()
        .rule("old-home", RuleTarget::redirect("home"))
        .unwrap()
        .rule(
            "pages/$Section!//$Action/$ID",
            RuleTarget::Handler {
                controller: Some("PageController".into()),
                params: [("Layout", Some("wide"))].into_iter().collect(),
                pop_tokeniser: 0,
            },
        )
        .unwrap()
        .rule("api//$Action/$ID", RuleTarget::controller("ApiController"))
        .unwrap()
        .rule("POST $Controller/$Action!", RuleTarget::dynamic())
        .unwrap()
        .rule("$Controller//$Action/$ID/$OtherID", RuleTarget::dynamic())
        .unwrap()
}

pub fn site_director(edits: &Calls, fallbacks: &Calls) -> Director {
    let builder = site_registry(edits, fallbacks);
    Director::new(site_table(&builder))
}

pub fn get(url: &str) -> HttpRequest {
    HttpRequest::builder(Method::GET, url).build().unwrap()
}

pub fn dispatch(director: &Director, request: HttpRequest, principal: Option<Principal>) -> Response {
    director
        .dispatch(request, Session::new(), principal)
        .unwrap()
        .response
        .expect("output was not suppressed")
}
