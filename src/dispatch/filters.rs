//! Pre/post dispatch hooks.
//!
//! # Responsibilities
//! - Run host-supplied filters before routing (may veto with 400)
//! - Run them again after the response is final (may suppress output)
//!
//! # Design Decisions
//! - Filters run in registration order; the first `false` stops the chain
//! - Filters see the session before routing and the response after, never
//!   the cursor

use std::fmt;
use std::sync::Arc;

use crate::dispatch::context::Session;
use crate::http::request::HttpRequest;
use crate::http::response::Response;

pub trait RequestFilter: Send + Sync + fmt::Debug {
    /// Return `false` to reject the request with a 400.
    fn pre_request(&self, _request: &HttpRequest, _session: &mut Session) -> bool {
        true
    }

    /// Return `false` to suppress the response.
    fn post_request(&self, _request: &HttpRequest, _response: &Response) -> bool {
        true
    }
}

/// Ordered chain of request filters.
#[derive(Debug, Default, Clone)]
pub struct RequestProcessor {
    filters: Vec<Arc<dyn RequestFilter>>,
}

impl RequestProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Arc<dyn RequestFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn pre_request(&self, request: &HttpRequest, session: &mut Session) -> bool {
        for filter in &self.filters {
            if !filter.pre_request(request, session) {
                tracing::debug!(filter = ?filter, "Pre-request filter vetoed request");
                return false;
            }
        }
        true
    }

    pub fn post_request(&self, request: &HttpRequest, response: &Response) -> bool {
        for filter in &self.filters {
            if !filter.post_request(request, response) {
                tracing::debug!(filter = ?filter, "Post-request filter suppressed response");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counting {
        calls: AtomicUsize,
        verdict: bool,
    }

    impl RequestFilter for Counting {
        fn pre_request(&self, _request: &HttpRequest, session: &mut Session) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            session.set("seen", true);
            self.verdict
        }
    }

    #[test]
    fn test_first_veto_stops_chain() {
        let deny = Arc::new(Counting::default());
        let after = Arc::new(Counting {
            verdict: true,
            ..Default::default()
        });

        let mut processor = RequestProcessor::new();
        processor.push(deny.clone());
        processor.push(after.clone());

        let request = HttpRequest::builder(Method::GET, "/").build().unwrap();
        let mut session = Session::new();
        assert!(!processor.pre_request(&request, &mut session));
        assert_eq!(deny.calls.load(Ordering::SeqCst), 1);
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);
        assert!(session.is_changed());
    }

    #[test]
    fn test_default_hooks_pass() {
        #[derive(Debug)]
        struct Noop;
        impl RequestFilter for Noop {}

        let mut processor = RequestProcessor::new();
        processor.push(Arc::new(Noop));
        let request = HttpRequest::builder(Method::GET, "/").build().unwrap();
        assert!(processor.pre_request(&request, &mut Session::new()));
        assert!(processor.post_request(&request, &Response::default()));
    }
}
