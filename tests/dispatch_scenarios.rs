//! End-to-end dispatch through the director and nested handlers.

mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use request_dispatch::config::parse_config;
use request_dispatch::dispatch::{Director, RequestFilter, Session};
use request_dispatch::http::{HttpRequest, Response};
use request_dispatch::routing::Rule;
use request_dispatch::security::Principal;
use request_dispatch::DispatchError;
use serde_json::Value;

use common::{dispatch, get, site_director, site_registry, Calls};

fn json(response: &Response) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

fn editor() -> Principal {
    Principal::new("editor").with_permission("CMS_ACCESS")
}

#[test]
fn test_controller_action_with_static_params() {
    let director = site_director(&Calls::default(), &Calls::default());

    let response = dispatch(&director, get("pages/news/show/7"), None);
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(&response);
    assert_eq!(body["handler"], "PageController");
    assert_eq!(body["action"], "show");
    assert_eq!(body["data"]["id"], "7");
    assert_eq!(body["data"]["section"], "news");
    assert_eq!(body["data"]["layout"], "wide");
}

#[test]
fn test_dynamic_controller_rule() {
    let director = site_director(&Calls::default(), &Calls::default());

    let response = dispatch(&director, get("pagecontroller/edit/42"), Some(editor()));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body_text(), "editing 42");
}

#[test]
fn test_method_restricted_rule_skipped_for_get() {
    let director = site_director(&Calls::default(), &Calls::default());
    let table = director.table();

    let matched = table.probe(&get("PageController/save")).unwrap();
    assert_eq!(matched.rule.pattern().as_str(), "$Controller//$Action/$ID/$OtherID");

    let post = HttpRequest::builder(Method::POST, "PageController/save")
        .build()
        .unwrap();
    let matched = table.probe(&post).unwrap();
    assert_eq!(matched.rule.pattern().as_str(), "POST $Controller/$Action!");
    assert_eq!(matched.params.get("Action"), Some("save"));

    // `save` is not an action of PageController.
    let response = dispatch(&director, get("PageController/save"), None);
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_permission_denied_never_runs_action() {
    let edits = Calls::default();
    let director = site_director(&edits, &Calls::default());

    let response = dispatch(&director, get("pages/news/edit/1"), None);
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.header("content-type"), Some("text/plain; charset=utf-8"));
    assert_eq!(response.body_text(), "Action 'edit' isn't allowed on class PageController.");
    assert_eq!(edits.count(), 0);

    let response = dispatch(&director, get("pages/news/edit/1"), Some(editor()));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body_text(), "editing 1");
    assert_eq!(edits.count(), 1);
}

#[test]
fn test_delegated_form_renders_itself() {
    let director = site_director(&Calls::default(), &Calls::default());

    let response = dispatch(&director, get("pagecontroller/form"), None);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(&response)["handler"], "ContactForm");
}

#[test]
fn test_delegated_form_field_action() {
    let director = site_director(&Calls::default(), &Calls::default());

    let response = dispatch(&director, get("pagecontroller/form/field/email"), None);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body_text(), "field email");
}

#[test]
fn test_post_reaches_form_submit() {
    let director = site_director(&Calls::default(), &Calls::default());

    let request = HttpRequest::builder(Method::POST, "pages/contact/form")
        .post_var("name", "Ada")
        .build()
        .unwrap();
    let response = dispatch(&director, request, None);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body_text(), "thanks Ada");
}

#[test]
fn test_error_response_stops_rule_search() {
    let fallbacks = Calls::default();
    let director = site_director(&Calls::default(), &fallbacks);

    let response = dispatch(&director, get("api/broken/1"), None);
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body_text(), "maintenance");
    assert_eq!(fallbacks.count(), 0);

    let response = dispatch(&director, get("api/anything"), None);
    assert_eq!(response.body_text(), "fallback");
    assert_eq!(fallbacks.count(), 1);
}

#[test]
fn test_redirect_rule_is_absolute() {
    let director = site_director(&Calls::default(), &Calls::default());

    let response = dispatch(&director, get("old-home"), None);
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.header("location"), Some("https://example.com/home"));
}

#[test]
fn test_unmatched_url() {
    let director = site_director(&Calls::default(), &Calls::default());

    let response = dispatch(&director, get("nothing-here/at/all"), None);
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.body_text(), "No URL rule was matched");
}

#[test]
fn test_unconsumed_segments() {
    let director = site_director(&Calls::default(), &Calls::default());

    let response = dispatch(&director, get("pagecontroller/show/7/8/9"), None);
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.body_text(),
        "I can't handle sub-URLs of this PageController object."
    );
}

#[test]
fn test_abstract_base_types_are_not_routable() {
    let director = site_director(&Calls::default(), &Calls::default());

    let response = dispatch(&director, get("controller/index"), None);
    assert_eq!(response.body_text(), "No URL rule was matched");
}

#[derive(Debug)]
struct Veto {
    before: bool,
    after: bool,
}

impl RequestFilter for Veto {
    fn pre_request(&self, _request: &HttpRequest, session: &mut Session) -> bool {
        session.set("seen", true);
        !self.before
    }

    fn post_request(&self, _request: &HttpRequest, _response: &Response) -> bool {
        !self.after
    }
}

#[test]
fn test_pre_request_veto() {
    let edits = Calls::default();
    let director = site_director(&edits, &Calls::default()).with_filter(Arc::new(Veto {
        before: true,
        after: false,
    }));

    let dispatched = director
        .dispatch(get("pages/news/edit/1"), Session::new(), Some(editor()))
        .unwrap();
    let response = dispatched.response.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.body_text(), "Invalid request");
    assert_eq!(edits.count(), 0);
    assert!(dispatched.session.is_changed());
}

#[test]
fn test_post_request_veto_suppresses_output() {
    let edits = Calls::default();
    let director = site_director(&edits, &Calls::default()).with_filter(Arc::new(Veto {
        before: false,
        after: true,
    }));

    let dispatched = director
        .dispatch(get("pages/news/edit/1"), Session::new(), Some(editor()))
        .unwrap();
    assert!(dispatched.response.is_none());
    assert_eq!(edits.count(), 1);
}

#[test]
fn test_bad_method_override_is_rejected_before_dispatch() {
    let err = HttpRequest::builder(Method::POST, "pages/news")
        .post_var("_method", "PATCH")
        .build()
        .unwrap_err();
    assert!(matches!(err, DispatchError::MalformedMethodOverride(_)));
}

#[test]
fn test_concurrent_dispatches_are_isolated() {
    let director = site_director(&Calls::default(), &Calls::default());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let director = &director;
                scope.spawn(move || {
                    let response = dispatch(director, get(&format!("pages/s{i}/show/{i}")), None);
                    json(&response)
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let body = handle.join().unwrap();
            assert_eq!(body["data"]["id"], i.to_string());
            assert_eq!(body["data"]["section"], format!("s{i}"));
        }
    });
}

const SITE_CONFIG: &str = r#"
[director]
base_url = "https://example.com/"

[[director.rules]]
pattern = "pages//$Action/$ID"
controller = "PageController"
"#;

const RELOADED_CONFIG: &str = r#"
[director]
base_url = "https://example.com/"

[[director.rules]]
pattern = "pages"
redirect = "moved"
"#;

const BROKEN_CONFIG: &str = r#"
[[director.rules]]
pattern = "pages"
controller = "MissingController"
"#;

#[test]
fn test_reload_swaps_rules() {
    let builder = site_registry(&Calls::default(), &Calls::default());
    let director = Director::from_config(builder, &parse_config(SITE_CONFIG).unwrap()).unwrap();

    let response = dispatch(&director, get("pages/show/3"), None);
    assert_eq!(json(&response)["action"], "show");

    director.reload(&parse_config(RELOADED_CONFIG).unwrap()).unwrap();
    let response = dispatch(&director, get("pages"), None);
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.header("location"), Some("https://example.com/moved"));

    assert!(director.reload(&parse_config(BROKEN_CONFIG).unwrap()).is_err());
    let response = dispatch(&director, get("pages"), None);
    assert_eq!(response.status(), StatusCode::FOUND);
}
