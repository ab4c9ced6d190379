//! Talking to the GitHub REST and GraphQL APIs.
//!
//! The actual network access goes through the [`Transport`] trait so the
//! fetchers can be exercised against canned responses, and every call is
//! spaced out by a shared [`RateLimiter`].

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use failure::{Error, ResultExt};
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use sec::Secret;
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::errors::FailedRequest;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request, as handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn get<S: Into<String>>(url: S) -> Request {
        Request {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post<S: Into<String>>(url: S, body: Value) -> Request {
        Request {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, query: &[(&str, String)]) -> Request {
        self.query
            .extend(query.iter().map(|(k, v)| (k.to_string(), v.clone())));
        self
    }

    /// Look up a query parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// The status and body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new<S: Into<String>>(status: u16, body: S) -> Response {
        Response {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Response {
        Response::new(status, body.to_string())
    }

    pub fn ok(body: &Value) -> Response {
        Response::json(200, body)
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Parse the body as JSON, provided the request succeeded.
    pub fn into_json(self, url: &str) -> Result<Value, Error> {
        if !self.is_success() {
            return Err(FailedRequest {
                status: self.status,
                url: url.to_string(),
            }
            .into());
        }

        let value = serde_json::from_str(&self.body)
            .with_context(|_| format!("Unable to deserialize the response from {}", url))?;
        Ok(value)
    }
}

/// Something which can send HTTP requests.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response, Error>;
}

/// Something network calls must acquire a permit from before going out.
pub trait RateLimiter: Send + Sync {
    fn acquire(&self);
}

type Governor = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Make sure consecutive calls are at least `interval` apart.
///
/// This is a token bucket holding a single permit, refilled once per
/// `interval`. A zero interval never blocks.
pub struct FixedInterval {
    interval: Duration,
    bucket: Option<Governor>,
    clock: DefaultClock,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> FixedInterval {
        FixedInterval {
            interval,
            bucket: Quota::with_period(interval).map(Governor::direct),
            clock: DefaultClock::default(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl RateLimiter for FixedInterval {
    fn acquire(&self) {
        let bucket = match self.bucket {
            Some(ref bucket) => bucket,
            None => return,
        };

        while let Err(not_until) = bucket.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            trace!("Rate limited, waiting {:?}", wait);
            thread::sleep(wait);
        }
    }
}

impl Debug for FixedInterval {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("FixedInterval")
            .field("interval", &self.interval)
            .finish()
    }
}

/// No rate limiting at all.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn acquire(&self) {}
}

/// A [`Transport`] which actually hits the network.
pub struct HttpTransport {
    client: Client,
    token: Secret<String>,
}

impl HttpTransport {
    pub fn new(user_agent: &str, token: Secret<String>) -> Result<HttpTransport, Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .context("Unable to create the HTTP client")?;

        Ok(HttpTransport { client, token })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<Response, Error> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        let mut builder = builder
            .query(&request.query)
            .header(AUTHORIZATION, format!("Bearer {}", self.token.reveal()))
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");

        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .with_context(|_| format!("Unable to send request to {}", request.url))?;

        let status = response.status().as_u16();
        trace!("Received response ({}) from {}", status, request.url);

        let body = response.text().context("Unable to read the response body")?;

        Ok(Response { status, body })
    }
}

impl Debug for HttpTransport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("HttpTransport").finish()
    }
}

/// A rate-limited handle to the GitHub APIs.
///
/// Failures are logged and turned into `None`; the callers treat them as
/// "no (more) data" rather than as errors.
#[derive(Clone)]
pub struct Api {
    transport: Arc<dyn Transport>,
    limiter: Arc<dyn RateLimiter>,
    rest_base: String,
    graphql_url: String,
}

impl Api {
    pub fn new<T, R>(transport: T, limiter: R, rest_base: &str, graphql_url: &str) -> Api
    where
        T: Transport + 'static,
        R: RateLimiter + 'static,
    {
        Api {
            transport: Arc::new(transport),
            limiter: Arc::new(limiter),
            rest_base: rest_base.trim_end_matches('/').to_string(),
            graphql_url: graphql_url.to_string(),
        }
    }

    pub fn from_config(cfg: &ApiConfig, token: Secret<String>) -> Result<Api, Error> {
        let transport = HttpTransport::new(&cfg.user_agent, token)?;
        let limiter = FixedInterval::new(Duration::from_millis(cfg.request_delay_ms));

        Ok(Api::new(transport, limiter, &cfg.rest_base, &cfg.graphql_url))
    }

    /// The full URL for a REST path like `/repos/ros/geometry2`.
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}{}", self.rest_base, path)
    }

    /// Send a request, waiting on the rate limiter first.
    pub fn send(&self, request: &Request) -> Option<Response> {
        self.limiter.acquire();
        debug!("Sending {:?} request to {}", request.method, request.url);

        match self.transport.send(request) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("{}", e);
                for cause in e.iter_chain().skip(1) {
                    warn!("\tCaused By: {}", cause);
                }
                None
            }
        }
    }

    /// `GET` a REST path, returning the JSON body if the request succeeded.
    pub fn rest(&self, path: &str, query: &[(&str, String)]) -> Option<Value> {
        let url = self.rest_url(path);
        let response = self.send(&Request::get(url.as_str()).with_query(query))?;
        let status = response.status;

        match response.into_json(&url) {
            Ok(value) => Some(value),
            Err(e) => {
                // Missing content is expected for most optional resources.
                if status == 404 {
                    debug!("{}", e);
                } else {
                    warn!("{}", e);
                }
                None
            }
        }
    }

    /// Run a GraphQL query. Responses carrying an `errors` field count as
    /// failures.
    pub fn graphql(&self, query: &str, variables: Value) -> Option<Value> {
        let body = json!({ "query": query, "variables": variables });
        let response = self.send(&Request::post(self.graphql_url.as_str(), body))?;

        match response.into_json(&self.graphql_url) {
            Ok(payload) => {
                if let Some(errors) = payload.get("errors") {
                    warn!("GraphQL query failed: {}", first_error(errors));
                    None
                } else {
                    Some(payload)
                }
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Download the raw text at an absolute URL.
    pub fn download(&self, url: &str) -> Option<String> {
        let response = self.send(&Request::get(url))?;

        if response.is_success() {
            Some(response.body)
        } else {
            warn!("Downloading {} failed with {}", url, response.status);
            None
        }
    }
}

impl Debug for Api {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Api")
            .field("rest_base", &self.rest_base)
            .field("graphql_url", &self.graphql_url)
            .finish()
    }
}

fn first_error(errors: &Value) -> String {
    match errors.as_array().and_then(|e| e.first()) {
        Some(err) => err
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| err.to_string()),
        None => errors.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use std::time::Instant;

    #[test]
    fn non_success_statuses_become_none() {
        let mock = MockTransport::new();
        mock.on_get(
            "https://api.github.com/repos/ros/missing",
            vec![Response::json(404, &json!({"message": "Not Found"}))],
        );
        let api = Api::new(mock.clone(), Unlimited, "https://api.github.com", "");

        assert_eq!(api.rest("/repos/ros/missing", &[]), None);
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn graphql_errors_are_failures() {
        let mock = MockTransport::new();
        mock.on_post(
            "https://api.github.com/graphql",
            vec![
                Response::ok(&json!({"errors": [{"message": "Bad credentials"}]})),
                Response::ok(&json!({"data": {"viewer": {"login": "me"}}})),
            ],
        );
        let api = Api::new(
            mock.clone(),
            Unlimited,
            "https://api.github.com",
            "https://api.github.com/graphql",
        );

        assert_eq!(api.graphql("{ viewer { login } }", json!({})), None);
        let got = api.graphql("{ viewer { login } }", json!({})).unwrap();
        assert_eq!(got["data"]["viewer"]["login"], "me");

        let sent = mock.requests();
        assert_eq!(sent[0].body.as_ref().unwrap()["query"], "{ viewer { login } }");
    }

    #[test]
    fn fixed_interval_spaces_out_calls() {
        let limiter = FixedInterval::new(Duration::from_millis(20));
        let start = Instant::now();

        limiter.acquire();
        limiter.acquire();
        limiter.acquire();

        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn the_first_permit_is_free() {
        let limiter = FixedInterval::new(Duration::from_secs(60));
        let start = Instant::now();

        limiter.acquire();

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn a_zero_interval_never_blocks() {
        let limiter = FixedInterval::new(Duration::from_millis(0));
        let start = Instant::now();

        for _ in 0..100 {
            limiter.acquire();
        }

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.interval(), Duration::from_millis(0));
    }

    #[test]
    fn query_parameters_can_be_looked_up() {
        let request = Request::get("https://example.com")
            .with_query(&[("per_page", 100.to_string()), ("page", 3.to_string())]);

        assert_eq!(request.param("page"), Some("3"));
        assert_eq!(request.param("missing"), None);
    }
}
