//! Walking GitHub's two pagination styles to exhaustion.

use serde_json::Value;

use crate::http::Api;

/// Everything a paginated fetch managed to collect.
#[derive(Debug, Clone, PartialEq)]
pub struct Pages<T> {
    pub items: Vec<T>,
    /// How many requests were sent.
    pub requests: usize,
    /// The fetch stopped because a request failed after at least one page
    /// had already come back, so `items` is probably incomplete.
    pub truncated: bool,
}

impl<T> Pages<T> {
    fn new() -> Pages<T> {
        Pages {
            items: Vec::new(),
            requests: 0,
            truncated: false,
        }
    }

    pub fn map<U, F>(self, f: F) -> Pages<U>
    where
        F: FnMut(T) -> U,
    {
        Pages {
            items: self.items.into_iter().map(f).collect(),
            requests: self.requests,
            truncated: self.truncated,
        }
    }
}

/// Fetch `page=1, 2, ...` of a REST endpoint until a request fails or a
/// page comes back empty, normalizing each record with `normalize`
/// (records it returns `None` for are dropped).
pub fn offset_paginated<T, F>(
    api: &Api,
    path: &str,
    params: &[(&str, String)],
    per_page: u32,
    mut normalize: F,
) -> Pages<T>
where
    F: FnMut(&Value) -> Option<T>,
{
    let mut pages = Pages::new();
    let mut page = 1;

    loop {
        let mut query = params.to_vec();
        query.push(("per_page", per_page.to_string()));
        query.push(("page", page.to_string()));

        pages.requests += 1;
        let records = match api.rest(path, &query) {
            Some(Value::Array(records)) => records,
            Some(_) => {
                debug!("{} page {} wasn't a list, stopping", path, page);
                break;
            }
            None => {
                pages.truncated = page > 1;
                break;
            }
        };

        if records.is_empty() {
            break;
        }

        trace!("{} page {} had {} records", path, page, records.len());
        pages.items.extend(records.iter().filter_map(|r| normalize(r)));
        page += 1;
    }

    if pages.truncated {
        warn!(
            "{} stopped early after {} pages ({} records)",
            path,
            page - 1,
            pages.items.len()
        );
    }

    pages
}

/// Follow a GraphQL connection's `pageInfo.endCursor` until
/// `hasNextPage` is false or a request fails.
///
/// `connection` is a JSON pointer to the connection object inside the
/// response (e.g. `/data/repository/stargazers`), and the query must take
/// an `$after` cursor variable.
pub fn cursor_paginated<T, F>(
    api: &Api,
    query: &str,
    variables: Value,
    connection: &str,
    mut normalize: F,
) -> Pages<T>
where
    F: FnMut(&Value) -> Option<T>,
{
    let mut pages = Pages::new();
    let mut after = Value::Null;

    loop {
        let mut vars = variables.clone();
        if let Some(obj) = vars.as_object_mut() {
            obj.insert(String::from("after"), after.clone());
        }

        pages.requests += 1;
        let payload = match api.graphql(query, vars) {
            Some(payload) => payload,
            None => {
                pages.truncated = pages.requests > 1;
                break;
            }
        };

        let conn = match payload.pointer(connection) {
            Some(conn) if !conn.is_null() => conn,
            _ => {
                warn!("The response had nothing at {}", connection);
                pages.truncated = pages.requests > 1;
                break;
            }
        };

        if let Some(edges) = conn.get("edges").and_then(Value::as_array) {
            pages.items.extend(edges.iter().filter_map(|e| normalize(e)));
        }

        let page_info = conn.get("pageInfo");
        let has_next = page_info
            .and_then(|p| p.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let end_cursor = page_info
            .and_then(|p| p.get("endCursor"))
            .and_then(Value::as_str);

        match end_cursor {
            Some(cursor) if has_next => after = Value::from(cursor),
            _ => break,
        }
    }

    if pages.truncated {
        warn!(
            "{} stopped early after {} requests ({} records)",
            connection,
            pages.requests,
            pages.items.len()
        );
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;
    use crate::http::{Response, Unlimited};

    const BASE: &str = "https://api.github.com";
    const GRAPHQL: &str = "https://api.github.com/graphql";

    fn api(mock: &MockTransport) -> Api {
        Api::new(mock.clone(), Unlimited, BASE, GRAPHQL)
    }

    fn identity(v: &Value) -> Option<Value> {
        Some(v.clone())
    }

    #[test]
    fn stop_on_the_first_empty_page() {
        let mock = MockTransport::new();
        let url = format!("{}/repos/ros/rclcpp/forks", BASE);
        mock.on_get(
            &url,
            vec![
                Response::ok(&json!([1, 2])),
                Response::ok(&json!([3])),
                Response::ok(&json!([])),
                Response::ok(&json!([99])),
            ],
        );

        let got = offset_paginated(&api(&mock), "/repos/ros/rclcpp/forks", &[], 2, identity);

        assert_eq!(got.items, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(got.requests, 3);
        assert!(!got.truncated);

        let sent = mock.requests_to(&url);
        assert_eq!(sent.len(), 3);
        let pages: Vec<_> = sent.iter().map(|r| r.param("page").unwrap()).collect();
        assert_eq!(pages, vec!["1", "2", "3"]);
        assert_eq!(sent[0].param("per_page"), Some("2"));
    }

    #[test]
    fn a_failed_page_truncates_the_result() {
        let mock = MockTransport::new();
        mock.on_get(
            &format!("{}/repos/ros/rclcpp/pulls", BASE),
            vec![
                Response::ok(&json!([1])),
                Response::json(502, &json!({"message": "Bad Gateway"})),
            ],
        );

        let got = offset_paginated(
            &api(&mock),
            "/repos/ros/rclcpp/pulls",
            &[("state", String::from("all"))],
            100,
            identity,
        );

        assert_eq!(got.items, vec![json!(1)]);
        assert!(got.truncated);
        assert_eq!(mock.requests()[0].param("state"), Some("all"));
    }

    #[test]
    fn failing_on_the_first_page_is_just_absence() {
        let mock = MockTransport::new();

        let got = offset_paginated(&api(&mock), "/repos/ros/gone/forks", &[], 100, identity);

        assert!(got.items.is_empty());
        assert_eq!(got.requests, 1);
        assert!(!got.truncated);
    }

    fn star_page(logins: &[&str], cursor: &str, has_next: bool) -> Response {
        let edges: Vec<Value> = logins
            .iter()
            .map(|l| json!({"starredAt": "2020-01-01T00:00:00Z", "node": {"login": l}}))
            .collect();

        Response::ok(&json!({
            "data": {
                "repository": {
                    "stargazers": {
                        "edges": edges,
                        "pageInfo": {"endCursor": cursor, "hasNextPage": has_next},
                    }
                }
            }
        }))
    }

    fn login(edge: &Value) -> Option<String> {
        edge.pointer("/node/login")
            .and_then(Value::as_str)
            .map(String::from)
    }

    #[test]
    fn follow_cursors_until_there_are_no_more_pages() {
        let mock = MockTransport::new();
        mock.on_post(
            GRAPHQL,
            vec![
                star_page(&["a", "b"], "c1", true),
                star_page(&["c"], "c2", false),
            ],
        );

        let got = cursor_paginated(
            &api(&mock),
            "query",
            json!({"owner": "ros", "repo": "rclcpp"}),
            "/data/repository/stargazers",
            login,
        );

        assert_eq!(got.items, vec!["a", "b", "c"]);
        assert!(!got.truncated);

        let sent = mock.requests();
        assert_eq!(sent.len(), 2);
        let body = |i: usize| sent[i].body.clone().unwrap();
        assert_eq!(body(0)["variables"]["after"], Value::Null);
        assert_eq!(body(1)["variables"]["after"], "c1");
        assert_eq!(body(1)["variables"]["owner"], "ros");
    }

    #[test]
    fn a_failed_cursor_request_keeps_what_was_already_fetched() {
        let mock = MockTransport::new();
        mock.on_post(
            GRAPHQL,
            vec![
                star_page(&["a"], "c1", true),
                Response::ok(&json!({"errors": [{"message": "timeout"}]})),
            ],
        );

        let got = cursor_paginated(
            &api(&mock),
            "query",
            json!({}),
            "/data/repository/stargazers",
            login,
        );

        assert_eq!(got.items, vec!["a"]);
        assert_eq!(got.requests, 2);
        assert!(got.truncated);
    }
}
