//! HTTP engine implementation.
//!
//! This module maps the [`SearchEngine`] surface onto the Elasticsearch REST
//! API. The actual HTTP client is abstracted via a trait so the engine can be
//! driven by reqwest, hyper, ureq or a test double.

use crate::engine::SearchEngine;
use crate::error::{EngineError, EngineResult};
use crate::types::{
    Acknowledged, AliasBindings, CountResponse, Document, IndexMappings, Mapping,
    RefreshResponse, ReindexResponse,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// HEAD.
    Head,
    /// PUT.
    Put,
    /// POST.
    Post,
    /// DELETE.
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A request handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
}

/// A response returned by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Errors are
/// transport failures only (connection refused, timeout); any response the
/// server sends, whatever its status, is an `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Elasticsearch-compatible search engine over HTTP.
pub struct HttpEngine<C: HttpClient> {
    /// Base URL of the cluster (e.g., "http://localhost:9200").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Timeout of the synchronous `_reindex` call.
    reindex_timeout: Option<Duration>,
}

impl<C: HttpClient> HttpEngine<C> {
    /// Creates a new HTTP engine.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            reindex_timeout: None,
        }
    }

    /// Sets the timeout of `_reindex`, which returns only once every
    /// document is copied.
    #[must_use]
    pub fn with_reindex_timeout(mut self, timeout: Duration) -> Self {
        self.reindex_timeout = Some(timeout);
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> EngineResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!(%method, %url, "engine request");

        let body = body.map(|value| value.to_string().into_bytes());
        self.client
            .send(HttpRequest {
                method,
                url,
                body,
                timeout,
            })
            .map_err(EngineError::transport_retryable)
    }

    /// Sends a request and decodes a successful JSON response.
    fn call<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        resource: &str,
        body: Option<&Value>,
    ) -> EngineResult<T> {
        self.call_timed(method, path, resource, body, None)
    }

    fn call_timed<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        resource: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> EngineResult<T> {
        let response = self.send(method, path, body, timeout)?;
        check_status(&response, resource)?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Sends a HEAD request: 2xx is true, 404 is false.
    fn probe(&self, path: &str, resource: &str) -> EngineResult<bool> {
        let response = self.send(HttpMethod::Head, path, None, None)?;
        if response.status == 404 {
            return Ok(false);
        }
        check_status(&response, resource)?;
        Ok(true)
    }
}

/// Maps a non-2xx response onto an [`EngineError`].
fn check_status(response: &HttpResponse, resource: &str) -> EngineResult<()> {
    if response.is_success() {
        return Ok(());
    }

    let message = response.text();
    match response.status {
        404 => Err(EngineError::not_found(resource)),
        400 if message.contains("resource_already_exists_exception") => {
            Err(EngineError::AlreadyExists {
                index: resource.to_string(),
            })
        }
        status @ 500..=599 => Err(EngineError::Server { status, message }),
        status => Err(EngineError::rejected(status, message)),
    }
}

impl<C: HttpClient> SearchEngine for HttpEngine<C> {
    fn create_index(&self, name: &str, mapping: &Mapping) -> EngineResult<Acknowledged> {
        let body = json!({ "mappings": mapping });
        self.call(HttpMethod::Put, &format!("/{}", name), name, Some(&body))
    }

    fn delete_index(&self, pattern: &str) -> EngineResult<Acknowledged> {
        self.call(HttpMethod::Delete, &format!("/{}", pattern), pattern, None)
    }

    fn index_exists(&self, name: &str) -> EngineResult<bool> {
        self.probe(&format!("/{}", name), name)
    }

    fn alias_exists(&self, name: &str) -> EngineResult<bool> {
        self.probe(&format!("/_alias/{}", name), name)
    }

    fn create_alias(&self, index: &str, alias: &str) -> EngineResult<Acknowledged> {
        let current = match self.get_alias(alias) {
            Ok(bindings) => bindings,
            Err(EngineError::NotFound { .. }) => AliasBindings::default(),
            Err(e) => return Err(e),
        };

        // All removals and the add travel in one `_aliases` request, which the
        // engine applies atomically.
        let mut actions: Vec<Value> = current
            .indices_for(alias)
            .into_iter()
            .filter(|bound| *bound != index)
            .map(|bound| json!({ "remove": { "index": bound, "alias": alias } }))
            .collect();
        actions.push(json!({ "add": { "index": index, "alias": alias } }));

        let body = json!({ "actions": actions });
        self.call(HttpMethod::Post, "/_aliases", alias, Some(&body))
    }

    fn get_alias(&self, alias: &str) -> EngineResult<AliasBindings> {
        self.call(HttpMethod::Get, &format!("/_alias/{}", alias), alias, None)
    }

    fn get_mapping(&self, name: &str) -> EngineResult<IndexMappings> {
        self.call(HttpMethod::Get, &format!("/{}/_mapping", name), name, None)
    }

    fn refresh_index(&self, name: &str) -> EngineResult<RefreshResponse> {
        self.call(HttpMethod::Post, &format!("/{}/_refresh", name), name, None)
    }

    fn reindex(&self, source: &str, target: &str) -> EngineResult<ReindexResponse> {
        let body = json!({
            "source": { "index": source },
            "dest": { "index": target }
        });
        self.call_timed(
            HttpMethod::Post,
            "/_reindex?refresh=true",
            source,
            Some(&body),
            self.reindex_timeout,
        )
    }

    fn upsert_document(&self, index: &str, document: &Document) -> EngineResult<()> {
        let path = format!("/{}/_doc/{}", index, document.id);
        let _: Value = self.call(HttpMethod::Put, &path, index, Some(&document.body))?;
        Ok(())
    }

    fn delete_document(&self, index: &str, id: &str) -> EngineResult<()> {
        let path = format!("/{}/_doc/{}", index, id);
        let resource = format!("{}/{}", index, id);
        let _: Value = self.call(HttpMethod::Delete, &path, &resource, None)?;
        Ok(())
    }

    fn count_documents(&self, index: &str) -> EngineResult<CountResponse> {
        self.call(HttpMethod::Get, &format!("/{}/_count", index), index, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays canned responses and records requests.
    #[derive(Default)]
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedClient {
        fn reply(&self, status: u16, body: Value) -> &Self {
            self.responses
                .lock()
                .push_back(Ok(HttpResponse::json(status, &body)));
            self
        }

        fn fail(&self, message: &str) -> &Self {
            self.responses.lock().push_back(Err(message.to_string()));
            self
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().clone()
        }
    }

    impl HttpClient for ScriptedClient {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err("no response scripted".into()))
        }
    }

    fn body_of(request: &HttpRequest) -> Value {
        serde_json::from_slice(request.body.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn base_url_is_normalized() {
        let engine = HttpEngine::new("http://localhost:9200/", ScriptedClient::default());
        assert_eq!(engine.base_url(), "http://localhost:9200");
    }

    #[test]
    fn create_index_sends_mapping() {
        let engine = HttpEngine::new("http://es:9200", ScriptedClient::default());
        engine.client().reply(200, json!({ "acknowledged": true }));

        let mut mapping = Mapping::new();
        mapping.insert("dynamic".into(), json!(false));
        let ack = engine.create_index("p__web__asset-even", &mapping).unwrap();
        assert!(ack.acknowledged);

        let request = &engine.client().requests()[0];
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url, "http://es:9200/p__web__asset-even");
        assert_eq!(body_of(request), json!({ "mappings": { "dynamic": false } }));
    }

    #[test]
    fn create_index_conflict_maps_to_already_exists() {
        let engine = HttpEngine::new("http://es:9200", ScriptedClient::default());
        engine.client().reply(
            400,
            json!({ "error": { "type": "resource_already_exists_exception" }, "status": 400 }),
        );
        let result = engine.create_index("x-odd", &Mapping::new());
        assert!(matches!(result, Err(EngineError::AlreadyExists { .. })));
    }

    #[test]
    fn probes_map_404_to_false() {
        let engine = HttpEngine::new("http://es:9200", ScriptedClient::default());
        engine.client().reply(404, json!({})).reply(200, json!({}));

        assert!(!engine.alias_exists("p__web__asset").unwrap());
        assert!(engine.index_exists("p__web__asset-even").unwrap());

        let requests = engine.client().requests();
        assert_eq!(requests[0].method, HttpMethod::Head);
        assert_eq!(requests[0].url, "http://es:9200/_alias/p__web__asset");
    }

    #[test]
    fn create_alias_swaps_in_one_request() {
        let engine = HttpEngine::new("http://es:9200", ScriptedClient::default());
        engine
            .client()
            .reply(200, json!({ "a-even": { "aliases": { "a": {} } } }))
            .reply(200, json!({ "acknowledged": true }));

        assert!(engine.create_alias("a-odd", "a").unwrap().acknowledged);

        let requests = engine.client().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url, "http://es:9200/_aliases");
        assert_eq!(
            body_of(&requests[1]),
            json!({ "actions": [
                { "remove": { "index": "a-even", "alias": "a" } },
                { "add": { "index": "a-odd", "alias": "a" } }
            ]})
        );
    }

    #[test]
    fn create_alias_for_new_alias_only_adds() {
        let engine = HttpEngine::new("http://es:9200", ScriptedClient::default());
        engine
            .client()
            .reply(404, json!({ "error": "alias [a] missing" }))
            .reply(200, json!({ "acknowledged": true }));

        engine.create_alias("a-even", "a").unwrap();
        let requests = engine.client().requests();
        assert_eq!(
            body_of(&requests[1]),
            json!({ "actions": [ { "add": { "index": "a-even", "alias": "a" } } ] })
        );
    }

    #[test]
    fn reindex_parses_failures() {
        let engine = HttpEngine::new("http://es:9200", ScriptedClient::default());
        engine
            .client()
            .reply(200, json!({ "total": 2, "created": 2, "failures": [] }));

        let response = engine.reindex("a-even", "a-odd").unwrap();
        assert!(response.succeeded());
        assert_eq!(response.created, 2);

        let request = &engine.client().requests()[0];
        assert_eq!(request.url, "http://es:9200/_reindex?refresh=true");
        assert_eq!(
            body_of(request),
            json!({ "source": { "index": "a-even" }, "dest": { "index": "a-odd" } })
        );
        assert_eq!(request.timeout, None);
    }

    #[test]
    fn reindex_timeout_applies_to_reindex_only() {
        let engine = HttpEngine::new("http://es:9200", ScriptedClient::default())
            .with_reindex_timeout(Duration::from_secs(3600));
        engine
            .client()
            .reply(200, json!({ "_shards": { "total": 1, "successful": 1, "failed": 0 } }))
            .reply(200, json!({ "total": 0, "created": 0, "failures": [] }));

        engine.refresh_index("a-even").unwrap();
        engine.reindex("a-even", "a-odd").unwrap();

        let requests = engine.client().requests();
        assert_eq!(requests[0].timeout, None);
        assert_eq!(requests[1].timeout, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn upsert_puts_document_body() {
        let engine = HttpEngine::new("http://es:9200", ScriptedClient::default());
        engine.client().reply(201, json!({ "result": "created" }));

        let document = Document::new("42", json!({ "name": "logo.png" }));
        engine.upsert_document("a-odd", &document).unwrap();

        let request = &engine.client().requests()[0];
        assert_eq!(request.url, "http://es:9200/a-odd/_doc/42");
        assert_eq!(body_of(request), json!({ "name": "logo.png" }));
    }

    #[test]
    fn status_codes_map_to_errors() {
        let engine = HttpEngine::new("http://es:9200", ScriptedClient::default());
        engine
            .client()
            .reply(503, json!({ "error": "unavailable" }))
            .reply(403, json!({ "error": "forbidden" }))
            .reply(404, json!({ "result": "not_found" }))
            .fail("connection refused");

        assert!(matches!(
            engine.refresh_index("a"),
            Err(EngineError::Server { status: 503, .. })
        ));
        assert!(matches!(
            engine.refresh_index("a"),
            Err(EngineError::Rejected { status: 403, .. })
        ));
        assert!(engine.delete_document("a", "1").unwrap_err().is_not_found());
        assert!(engine.count_documents("a").unwrap_err().is_retryable());
    }
}
