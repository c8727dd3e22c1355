//! Issue one `RequestSpec` and normalize the reply.
//!
//! # Design
//! `RequestExecutor` is cheap to clone and holds no mutable state, so any
//! number of calls can run concurrently through the same instance. The HTTP
//! engine sits behind `Transport`, logging behind `ObservabilitySink`.
//! A 4xx or 5xx reply is a successful execution; only failures below HTTP
//! come back as `TransportError`.

use std::sync::Arc;

use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ProbeConfig;
use crate::error::TransportError;
use crate::http::{NormalizedResponse, RequestSpec};
use crate::observe::{truncate_body, ObservabilitySink, Observation, TracingSink, DEFAULT_BODY_LIMIT};
use crate::transport::{ReqwestTransport, Transport, TransportRequest};

#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ObservabilitySink>,
    base_url: Option<String>,
    body_limit: usize,
}

impl RequestExecutor {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            sink: Arc::new(TracingSink),
            base_url: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Reqwest-backed executor using the timeout, base URL and log limit
    /// from `config`.
    pub fn from_config(config: &ProbeConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::new(transport)
            .with_base_url(&config.base_url)
            .with_body_limit(config.log_body_limit))
    }

    /// Base for targets that are paths rather than absolute URLs.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_sink(mut self, sink: impl ObservabilitySink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Maximum number of body bytes included in observations.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub async fn execute(&self, spec: &RequestSpec) -> Result<NormalizedResponse, TransportError> {
        self.execute_with_id(Uuid::new_v4(), spec).await
    }

    async fn execute_with_id(
        &self,
        request_id: Uuid,
        spec: &RequestSpec,
    ) -> Result<NormalizedResponse, TransportError> {
        let request = match self.prepare(spec) {
            Ok(request) => request,
            Err(err) => {
                self.report_failure(request_id, &err);
                return Err(err);
            }
        };

        self.sink.observe(&Observation::Sending {
            request_id,
            method: request.method,
            url: request.url.to_string(),
            body: request
                .body
                .as_deref()
                .map(|body| truncate_body(body, self.body_limit))
                .unwrap_or_default(),
        });

        let start = Instant::now();
        let raw = match self.transport.send(request).await {
            Ok(raw) => raw,
            Err(err) => {
                self.report_failure(request_id, &err);
                return Err(err);
            }
        };
        let elapsed = start.elapsed();

        if !(100..=599).contains(&raw.status) {
            let err = TransportError::InvalidStatus(raw.status);
            self.report_failure(request_id, &err);
            return Err(err);
        }

        self.sink.observe(&Observation::Received {
            request_id,
            status: raw.status,
            elapsed,
            body: truncate_body(&raw.body, self.body_limit),
        });

        Ok(NormalizedResponse::new(raw.status, raw.headers, raw.body).with_elapsed(elapsed))
    }

    /// Like `execute`, but abandons the request as soon as `cancel` fires.
    pub async fn execute_cancellable(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<NormalizedResponse, TransportError> {
        let request_id = Uuid::new_v4();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let err = TransportError::Cancelled;
                self.report_failure(request_id, &err);
                Err(err)
            }
            result = self.execute_with_id(request_id, spec) => result,
        }
    }

    /// Run every spec concurrently. Results come back in input order.
    pub async fn execute_all(
        &self,
        specs: &[RequestSpec],
    ) -> Vec<Result<NormalizedResponse, TransportError>> {
        join_all(specs.iter().map(|spec| self.execute(spec))).await
    }

    fn prepare(&self, spec: &RequestSpec) -> Result<TransportRequest, TransportError> {
        Ok(TransportRequest {
            method: spec.method(),
            url: spec.resolve_url(self.base_url.as_deref())?,
            headers: spec.header_map()?,
            body: spec.body().cloned(),
        })
    }

    fn report_failure(&self, request_id: Uuid, err: &TransportError) {
        self.sink.observe(&Observation::Failed {
            request_id,
            error: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::observe::MemorySink;
    use crate::transport::TransportResponse;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::HeaderMap;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays canned outcomes and records what it was asked to send.
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        sent: Arc<Mutex<Vec<TransportRequest>>>,
    }

    impl ScriptedTransport {
        fn replying(outcomes: Vec<Result<TransportResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(outcomes.into()),
                sent: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
            self.sent.lock().push(request);
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    struct HangingTransport;

    #[async_trait]
    impl Transport for HangingTransport {
        async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(TransportError::Timeout("never".to_string()))
        }
    }

    fn reply(status: u16, body: &str) -> Result<TransportResponse, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        Ok(TransportResponse {
            status,
            headers,
            body: Bytes::from(body.to_string()),
        })
    }

    #[tokio::test]
    async fn non_2xx_is_a_response_not_an_error() {
        let executor = RequestExecutor::new(ScriptedTransport::replying(vec![reply(404, "{}")]))
            .with_sink(crate::observe::NullSink);
        let response = executor.execute(&RequestSpec::get("http://store/x")).await.unwrap();
        assert_eq!(response.status(), 404);
        assert!(response.parsed_json().is_none());
    }

    #[tokio::test]
    async fn transport_error_is_propagated_unchanged() {
        let executor = RequestExecutor::new(ScriptedTransport::replying(vec![Err(
            TransportError::Connect("refused".to_string()),
        )]));
        let err = executor.execute(&RequestSpec::get("http://store/x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(ref msg) if msg == "refused"));
    }

    #[tokio::test]
    async fn out_of_range_status_is_rejected() {
        let executor = RequestExecutor::new(ScriptedTransport::replying(vec![reply(999, "")]));
        let err = executor.execute(&RequestSpec::get("http://store/x")).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidStatus(999)));
    }

    #[tokio::test]
    async fn request_is_resolved_against_base_url() {
        let transport = ScriptedTransport::replying(vec![reply(200, "[]")]);
        let sent = transport.sent.clone();
        let executor = RequestExecutor::new(transport).with_base_url("http://store:8080/");
        let spec = RequestSpec::post("/cart/add")
            .with_query("b", "2")
            .with_query("a", "1")
            .with_form(&[("product_id", "1")])
            .with_bearer("tok");
        executor.execute(&spec).await.unwrap();

        let sent = sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].url.as_str(), "http://store:8080/cart/add?a=1&b=2");
        assert_eq!(sent[0].headers.get("authorization").unwrap(), "Bearer tok");
        assert_eq!(sent[0].body.as_deref(), Some(&b"product_id=1"[..]));
    }

    #[tokio::test]
    async fn invalid_spec_never_reaches_transport() {
        let transport = ScriptedTransport::replying(vec![reply(200, "")]);
        let sent = transport.sent.clone();
        let executor = RequestExecutor::new(transport);
        let err = executor.execute(&RequestSpec::get("/relative")).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
        assert!(sent.lock().is_empty());
    }

    #[tokio::test]
    async fn observations_bracket_each_request() {
        let sink = MemorySink::new();
        let executor = RequestExecutor::new(ScriptedTransport::replying(vec![
            reply(201, r#"{"created":true}"#),
            Err(TransportError::Timeout("slow".to_string())),
        ]))
        .with_sink(sink.clone())
        .with_body_limit(4);

        let spec = RequestSpec::post("http://store/items").with_body("abcdefgh");
        executor.execute(&spec).await.unwrap();
        let _ = executor.execute(&spec).await;

        let events = sink.events();
        assert_eq!(events.len(), 4);
        match &events[0] {
            Observation::Sending { method, url, body, .. } => {
                assert_eq!(*method, HttpMethod::Post);
                assert_eq!(url, "http://store/items");
                assert_eq!(body, "abcd... (4 more bytes)");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(&events[1], Observation::Received { status: 201, .. }));
        assert_eq!(events[0].request_id(), events[1].request_id());
        assert!(matches!(&events[3], Observation::Failed { error, .. } if error.contains("slow")));
        assert_ne!(events[1].request_id(), events[2].request_id());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_in_flight_request() {
        let sink = MemorySink::new();
        let executor = RequestExecutor::new(HangingTransport).with_sink(sink.clone());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });
        let err = executor
            .execute_cancellable(&RequestSpec::get("http://store/slow"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Observation::Sending { .. }));
        assert!(matches!(&events[1], Observation::Failed { error, .. } if error == "request cancelled"));
        assert_eq!(events[0].request_id(), events[1].request_id());
    }

    #[tokio::test]
    async fn execute_all_keeps_input_order() {
        let executor = RequestExecutor::new(ScriptedTransport::replying(vec![
            reply(200, "1"),
            reply(500, "2"),
            Err(TransportError::Connect("down".to_string())),
        ]));
        let specs = vec![
            RequestSpec::get("http://store/a"),
            RequestSpec::get("http://store/b"),
            RequestSpec::get("http://store/c"),
        ];
        let results = executor.execute_all(&specs).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().text(), "1");
        assert_eq!(results[1].as_ref().unwrap().status(), 500);
        assert!(results[2].is_err());
    }
}
