#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{PathMatcher, Router};
use crate::definition::{parse_label, EndpointDefinition};
use crate::error::SourceLocation;
use http::Method;

fn definition(label: &str) -> EndpointDefinition {
    parse_label(label, SourceLocation::programmatic())
        .unwrap()
        .unwrap()
}

fn matcher(label: &str) -> PathMatcher {
    PathMatcher::new(&definition(label)).unwrap()
}

#[test]
fn test_root_path_matches_everything() {
    let re = matcher("/");
    assert!(re.is_match("/"));
    assert!(re.is_match("/anything/below"));
}

#[test]
fn test_exact_root() {
    let re = matcher("GET /{$}");
    assert!(re.is_match("/"));
    assert!(!re.is_match("/x"));
}

#[test]
fn test_parameterized_path() {
    let re = matcher("GET /items/{id}");
    assert_eq!(re.as_str(), "^/items/([^/]+)$");
    let params = re.captures("/items/123").unwrap();
    assert_eq!(params["id"], "123");
    assert!(!re.is_match("/items/"));
    assert!(!re.is_match("/items/1/2"));

    let params = re.captures("/items/a%2Fb%20c").unwrap();
    assert_eq!(params["id"], "a/b c");
    let params = re.captures("/items/%FF").unwrap();
    assert_eq!(params["id"], "%FF");
}

#[test]
fn test_wildcard_and_subtree() {
    let re = matcher("GET /files/{rest...}");
    assert_eq!(re.captures("/files/a/b.txt").unwrap()["rest"], "a/b.txt");
    assert_eq!(re.captures("/files/").unwrap()["rest"], "");

    let re = matcher("GET /static/");
    assert!(re.is_match("/static/"));
    assert!(re.is_match("/static/css/site.css"));
    assert!(!re.is_match("/static"));
}

#[test]
fn test_literals_are_escaped() {
    let re = matcher("GET /about.html");
    assert!(re.is_match("/about.html"));
    assert!(!re.is_match("/aboutXhtml"));
}

#[test]
fn test_router_prefers_specific_routes() {
    let definitions = vec![
        definition("/"),
        definition("GET /user/{id}"),
        definition("GET /user/new"),
        definition("POST /user/{id}"),
        definition("GET api.example.com/user/{id}"),
        definition("/user/{id}"),
    ];
    let router = Router::new(&definitions).unwrap();
    assert_eq!(router.len(), 6);

    let m = router.route(&Method::GET, "", "/user/new").unwrap();
    assert_eq!(m.index, 2);

    let m = router.route(&Method::GET, "", "/user/7").unwrap();
    assert_eq!(m.index, 1);
    assert_eq!(m.path_params["id"], "7");

    let m = router.route(&Method::POST, "", "/user/7").unwrap();
    assert_eq!(m.index, 3);

    let m = router.route(&Method::DELETE, "", "/user/7").unwrap();
    assert_eq!(m.index, 5);

    let m = router.route(&Method::GET, "API.example.com", "/user/7").unwrap();
    assert_eq!(m.index, 4);

    let m = router.route(&Method::GET, "", "/elsewhere").unwrap();
    assert_eq!(m.index, 0);
}

#[test]
fn test_router_without_fallback() {
    let definitions = vec![definition("GET /a")];
    let router = Router::new(&definitions).unwrap();
    assert!(router.route(&Method::GET, "", "/b").is_none());
    assert!(router.route(&Method::POST, "", "/a").is_none());
}
