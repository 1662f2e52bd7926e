//! End-to-end tests for the client over GraphQL-over-HTTP.

use std::sync::Arc;

use futures_util::StreamExt;
use graphlink::link::{Diagnostic, DiagnosticSink};
use graphlink::{
    CacheSnapshot, ClientConfig, Error, ExecutionContext, FetchPolicy, FragmentMatcher,
    GraphQLClient, MemoryStore, NetworkError, Operation, create_client,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, context: ExecutionContext) -> ClientConfig {
    ClientConfig::builder()
        .graphql_url(format!("{}/graphql", server.uri()))
        .context(context)
        .build()
        .unwrap()
}

fn store_with(token: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set("id_token", token);
    store
}

fn client_with_store(server: &MockServer, store: Arc<MemoryStore>) -> GraphQLClient {
    GraphQLClient::builder(config(server, ExecutionContext::Client))
        .credential_store(store)
        .build()
        .unwrap()
}

#[derive(Default)]
struct Collect(Mutex<Vec<Diagnostic>>);

impl DiagnosticSink for Collect {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.0.lock().push(diagnostic.clone());
    }
}

#[tokio::test]
async fn test_bearer_token_from_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "a": 1 } })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_store(&server, store_with("abc123"));
    let response = client.query(Operation::new("{ a }")).await.unwrap();
    assert_eq!(response.data, Some(json!({ "a": 1 })));
}

#[tokio::test]
async fn test_empty_authorization_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "a": 1 } })))
        .mount(&server)
        .await;

    let client = client_with_store(&server, Arc::new(MemoryStore::new()));
    client.query(Operation::new("{ a }")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].headers.get("authorization").unwrap(), "");
}

#[tokio::test]
async fn test_server_context_ignores_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "a": 1 } })))
        .mount(&server)
        .await;

    let client = create_client(
        config(&server, ExecutionContext::Server),
        Some(store_with("abc123")),
    )
    .unwrap();
    assert!(client.ssr_mode());
    client.query(Operation::new("{ a }")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get("authorization").unwrap(), "");
}

#[tokio::test]
async fn test_caller_headers_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-request-id", "r-1"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "a": 1 } })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_store(&server, store_with("abc123"));
    client
        .query(Operation::new("{ a }").header("x-request-id", "r-1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_token_read_per_operation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "a": 1 } })))
        .mount(&server)
        .await;

    let store = store_with("first");
    let client = client_with_store(&server, store.clone());
    client
        .query_with_policy(Operation::new("{ a }"), FetchPolicy::NetworkOnly)
        .await
        .unwrap();
    store.set("id_token", "second");
    client
        .query_with_policy(Operation::new("{ a }"), FetchPolicy::NetworkOnly)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get("authorization").unwrap(), "Bearer first");
    assert_eq!(requests[1].headers.get("authorization").unwrap(), "Bearer second");
}

#[tokio::test]
async fn test_cache_first_skips_second_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "viewer": { "__typename": "User", "id": "1", "name": "Ada" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(config(&server, ExecutionContext::Client), None).unwrap();
    let operation = Operation::new("{ viewer { __typename id name } }");

    let first = client.query(operation.clone()).await.unwrap();
    let second = client.query(operation).await.unwrap();
    assert_eq!(first.data, second.data);
}

#[tokio::test]
async fn test_mutation_updates_cached_entity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "query": "{ viewer { __typename id name } }" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "viewer": { "__typename": "User", "id": "1", "name": "old" } }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "query": "mutation Rename($name: String!) { rename(name: $name) { __typename id name } }"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "rename": { "__typename": "User", "id": "1", "name": "new" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(config(&server, ExecutionContext::Client), None).unwrap();
    let query = Operation::new("{ viewer { __typename id name } }");
    client.query(query.clone()).await.unwrap();

    let mutation = Operation::new(
        "mutation Rename($name: String!) { rename(name: $name) { __typename id name } }",
    )
    .variable("name", "new");
    client.mutate(mutation).await.unwrap();

    let cached = client
        .query_with_policy(query, FetchPolicy::CacheOnly)
        .await
        .unwrap();
    assert_eq!(cached.data.unwrap()["viewer"]["name"], "new");
}

#[tokio::test]
async fn test_results_with_errors_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "a": 1 },
            "errors": [{ "message": "partial" }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = create_client(config(&server, ExecutionContext::Client), None).unwrap();
    let first = client.query(Operation::new("{ a }")).await.unwrap();
    assert!(first.has_errors());
    client.query(Operation::new("{ a }")).await.unwrap();
    assert_eq!(client.cache(|cache| cache.entity_count()), 0);
}

#[tokio::test]
async fn test_graphql_errors_reported_and_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [
                { "message": "first", "locations": [{ "line": 1, "column": 3 }], "path": ["a"] },
                { "message": "second", "path": ["b", 0] }
            ]
        })))
        .mount(&server)
        .await;

    let sink = Arc::new(Collect::default());
    let client = GraphQLClient::builder(config(&server, ExecutionContext::Client))
        .diagnostic_sink(sink.clone())
        .build()
        .unwrap();

    let response = client
        .query_with_policy(Operation::new("{ a b }"), FetchPolicy::NetworkOnly)
        .await
        .unwrap();
    assert_eq!(response.errors.len(), 2);
    assert_eq!(response.errors[0].message, "first");
    assert_eq!(response.errors[1].message, "second");

    let emitted = sink.0.lock().clone();
    assert_eq!(emitted.len(), 2);
    assert_eq!(
        emitted[0].to_string(),
        "[GraphQL error]: Message: first, Location: 1:3, Path: a"
    );
    assert_eq!(
        emitted[1].to_string(),
        "[GraphQL error]: Message: second, Location: , Path: b.0"
    );
}

#[tokio::test]
async fn test_network_error_reported_and_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(Collect::default());
    let client = GraphQLClient::builder(config(&server, ExecutionContext::Client))
        .diagnostic_sink(sink.clone())
        .build()
        .unwrap();

    let result = client.query(Operation::new("{ a }")).await;
    assert!(matches!(result, Err(Error::Network(_))));

    let emitted = sink.0.lock().clone();
    assert_eq!(emitted.len(), 1);
    assert!(matches!(emitted[0], Diagnostic::Network { .. }));
    assert!(emitted[0].to_string().starts_with("[Network error]: "));
}

#[tokio::test]
async fn test_unreadable_document_goes_to_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Syntax Error: Expected Name, found <EOF>." }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(Collect::default());
    let client = GraphQLClient::builder(config(&server, ExecutionContext::Client))
        .diagnostic_sink(sink.clone())
        .build()
        .unwrap();

    let response = client.query(Operation::new("{ a ")).await.unwrap();
    assert_eq!(response.errors.len(), 1);
    assert_eq!(sink.0.lock().len(), 1);

    let cache_only = client
        .query_with_policy(Operation::new("{ a "), FetchPolicy::CacheOnly)
        .await;
    assert!(matches!(cache_only, Err(Error::Cache(_))));
}

#[tokio::test]
async fn test_root_typename_fetched_from_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "__typename": "QueryRoot" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(config(&server, ExecutionContext::Client), None).unwrap();
    let first = client.query(Operation::new("{ __typename }")).await.unwrap();
    assert_eq!(first.data, Some(json!({ "__typename": "QueryRoot" })));

    let second = client.query(Operation::new("{ __typename }")).await.unwrap();
    assert_eq!(second.data, first.data);
}

#[tokio::test]
async fn test_query_as() {
    #[derive(Deserialize)]
    struct Viewer {
        viewer: User,
    }
    #[derive(Deserialize)]
    struct User {
        name: String,
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "query": "{ viewer { name } }" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "viewer": { "name": "Ada" } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "query": "{ broken }" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "nope" }]
        })))
        .mount(&server)
        .await;

    let client = create_client(config(&server, ExecutionContext::Client), None).unwrap();
    let viewer: Viewer = client.query_as(Operation::new("{ viewer { name } }")).await.unwrap();
    assert_eq!(viewer.viewer.name, "Ada");

    let broken = client.query_as::<serde_json::Value>(Operation::new("{ broken }")).await;
    assert!(matches!(broken, Err(Error::GraphQL(errors)) if errors[0].message == "nope"));
}

#[tokio::test]
async fn test_restored_snapshot_answers_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let snapshot = CacheSnapshot::from_json(r#"{"ROOT_QUERY":{"field":"x"}}"#).unwrap();
    let client = GraphQLClient::builder(config(&server, ExecutionContext::Client))
        .initial_state(snapshot)
        .build()
        .unwrap();

    assert_eq!(
        client.cache(|cache| cache.read_field("ROOT_QUERY", "field").cloned()),
        Some(json!("x"))
    );
    let response = client.query(Operation::new("{ field }")).await.unwrap();
    assert_eq!(response.data, Some(json!({ "field": "x" })));
}

#[tokio::test]
async fn test_server_render_handoff() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "page": { "__typename": "Page", "id": "home", "html": "<b>hi</b>" } }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let operation = Operation::new("{ page { __typename id html } }");

    let render = create_client(config(&server, ExecutionContext::Server), None).unwrap();
    render.query(operation.clone()).await.unwrap();
    let script = render.extract().to_handoff_script().unwrap();
    assert!(!script.contains("<b>"));

    let payload = script
        .strip_prefix("<script>window.__APOLLO__=")
        .and_then(|rest| rest.strip_suffix(";</script>"))
        .unwrap();
    let browser = GraphQLClient::builder(config(&server, ExecutionContext::Client))
        .initial_state(CacheSnapshot::from_json(payload).unwrap())
        .build()
        .unwrap();

    let response = browser
        .query_with_policy(operation, FetchPolicy::CacheOnly)
        .await
        .unwrap();
    assert_eq!(response.data.unwrap()["page"]["html"], "<b>hi</b>");
}

#[tokio::test]
async fn test_fragment_matcher_on_union() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "search": [
                { "__typename": "User", "id": "1", "login": "ada" },
                { "__typename": "Repository", "id": "2", "stars": 10 }
            ] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let matcher = FragmentMatcher::from_introspection(&json!({
        "__schema": { "types": [{
            "kind": "UNION",
            "name": "SearchResult",
            "possibleTypes": [{ "name": "User" }, { "name": "Repository" }]
        }] }
    }))
    .unwrap();
    let client = GraphQLClient::builder(config(&server, ExecutionContext::Client))
        .fragment_matcher(matcher)
        .build()
        .unwrap();

    let operation = Operation::new(
        "{ search { __typename ... on SearchResult { id } ... on User { login } ... on Repository { stars } } }",
    );
    let network = client.query(operation.clone()).await.unwrap();
    let cached = client
        .query_with_policy(operation, FetchPolicy::CacheOnly)
        .await
        .unwrap();
    assert_eq!(network.data, cached.data);

    client.cache(|cache| {
        assert_eq!(cache.read_field("User:1", "login"), Some(&json!("ada")));
        assert!(cache.read_field("User:1", "stars").is_none());
        assert_eq!(cache.read_field("Repository:2", "stars"), Some(&json!(10)));
    });
}

#[tokio::test]
async fn test_subscription_without_streaming_uses_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "query": "subscription { tick }" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "tick": 1 } })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(config(&server, ExecutionContext::Client), None).unwrap();
    let items: Vec<_> = client.subscribe(Operation::new("subscription { tick }")).collect().await;

    assert_eq!(items.len(), 1);
    let response = items.into_iter().next().unwrap().unwrap();
    assert_eq!(response.data, Some(json!({ "tick": 1 })));
    assert_eq!(
        client.cache(|cache| cache.read_field("ROOT_SUBSCRIPTION", "tick").cloned()),
        Some(json!(1))
    );
}

#[tokio::test]
async fn test_invalid_endpoint_rejected() {
    let result = ClientConfig::builder().graphql_url("ftp://example.com").build();
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));

    let unreachable = ClientConfig::builder()
        .graphql_url("http://127.0.0.1:9/graphql")
        .build()
        .unwrap();
    let client = create_client(unreachable, None).unwrap();
    let result = client.query(Operation::new("{ a }")).await;
    assert!(matches!(result, Err(Error::Network(NetworkError::Connection(_) | NetworkError::Timeout))));
}
