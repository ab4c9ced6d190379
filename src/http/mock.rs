//! A scripted [`Transport`] for exercising fetchers without the network.

use failure::Error;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Method, Request, Response, Transport};

#[derive(Debug)]
struct Route {
    method: Method,
    url: String,
    /// Only match POST bodies whose `query` contains this.
    query_contains: Option<String>,
    responses: VecDeque<Response>,
}

impl Route {
    fn matches(&self, request: &Request) -> bool {
        if self.method != request.method || self.url != request.url {
            return false;
        }

        match self.query_contains {
            Some(ref needle) => request
                .body
                .as_ref()
                .and_then(|b| b.get("query"))
                .and_then(|q| q.as_str())
                .map(|q| q.contains(needle.as_str()))
                .unwrap_or(false),
            None => true,
        }
    }

    /// Pop the next scripted response, repeating the last one forever.
    fn next_response(&mut self) -> Response {
        if self.responses.len() > 1 {
            if let Some(response) = self.responses.pop_front() {
                return response;
            }
        }

        self.responses.front().cloned().unwrap_or_else(not_found)
    }
}

fn not_found() -> Response {
    Response::new(404, r#"{"message": "Not Found"}"#)
}

#[derive(Debug, Default)]
struct State {
    routes: Vec<Route>,
    requests: Vec<Request>,
}

/// A [`Transport`] which replies with canned responses and remembers every
/// request it was sent. Anything without a route gets a 404.
///
/// Clones share the same script and request log.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    fn state(&self) -> MutexGuard<State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn add_route(
        &self,
        method: Method,
        url: &str,
        query_contains: Option<&str>,
        responses: Vec<Response>,
    ) {
        self.state().routes.push(Route {
            method,
            url: url.to_string(),
            query_contains: query_contains.map(String::from),
            responses: responses.into_iter().collect(),
        });
    }

    /// Reply to `GET`s of `url` (whatever the query string) with each of
    /// `responses` in turn.
    pub fn on_get(&self, url: &str, responses: Vec<Response>) {
        self.add_route(Method::Get, url, None, responses);
    }

    pub fn on_post(&self, url: &str, responses: Vec<Response>) {
        self.add_route(Method::Post, url, None, responses);
    }

    /// Like [`MockTransport::on_post`], but only for GraphQL queries
    /// containing `needle`.
    pub fn on_query(&self, url: &str, needle: &str, responses: Vec<Response>) {
        self.add_route(Method::Post, url, Some(needle), responses);
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<Request> {
        self.state().requests.clone()
    }

    /// Requests sent to a particular URL.
    pub fn requests_to(&self, url: &str) -> Vec<Request> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &Request) -> Result<Response, Error> {
        let mut state = self.state();
        state.requests.push(request.clone());

        let response = match state.routes.iter_mut().find(|r| r.matches(request)) {
            Some(route) => route.next_response(),
            None => not_found(),
        };

        Ok(response)
    }
}
