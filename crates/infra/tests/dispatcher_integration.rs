//! Dispatcher behaviour against a scripted in-memory transport.
//!
//! All tests run on tokio's paused clock, so backoff sleeps, queue waits and
//! reset timeouts complete instantly while still being measurable.

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_common::resilience::CircuitState;
use courier_domain::{
    ApiRequest, DispatchError, DispatchResult, ErrorCode, OverflowPolicy, RequestOptions,
};
use courier_infra::http::TransportErrorKind;
use courier_infra::RequestInterceptor;
use serde_json::{json, Value};
use support::{dispatcher_with, test_config, ScriptedTransport, Step};
use tokio::time::Instant;

/* -------------------------------------------------------------------------- */
/* Cache */
/* -------------------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn cached_get_hits_the_network_once() {
    let transport = ScriptedTransport::new(Step::ok(r#"{"data":[{"id":1}]}"#));
    let dispatcher = dispatcher_with(test_config(), transport.clone());
    let options = RequestOptions::new().cached();

    let first: Value = dispatcher.get("/contacts", options.clone()).await.unwrap();
    let second = dispatcher.send_raw(ApiRequest::get("/contacts").options(options)).await.unwrap();

    assert_eq!(first, json!([{ "id": 1 }]));
    assert_eq!(second.unwrapped_data(), &first);
    assert!(second.metadata.from_cache);
    assert_eq!(transport.call_count(), 1);

    let summary = dispatcher.metrics_summary();
    assert_eq!(summary.total_recorded, 2);
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(dispatcher.cache_stats().hits, 1);
}

#[tokio::test(start_paused = true)]
async fn zero_ttl_always_goes_to_the_network() {
    let transport = ScriptedTransport::new(Step::ok("[]"));
    let dispatcher = dispatcher_with(test_config(), transport.clone());
    let options = RequestOptions::new().cache_ttl(Duration::ZERO);

    let _: Value = dispatcher.get("/contacts", options.clone()).await.unwrap();
    let _: Value = dispatcher.get("/contacts", options).await.unwrap();

    assert_eq!(transport.call_count(), 2);
    assert_eq!(dispatcher.cache_stats().size, 0);
}

#[tokio::test(start_paused = true)]
async fn cache_entries_expire_after_their_ttl() {
    let transport = ScriptedTransport::new(Step::ok("[]"));
    let dispatcher = dispatcher_with(test_config(), transport.clone());
    let options = RequestOptions::new().cache_ttl(Duration::from_secs(30));

    let _: Value = dispatcher.get("/contacts", options.clone()).await.unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;
    let _: Value = dispatcher.get("/contacts", options).await.unwrap();

    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn uncached_and_write_requests_bypass_the_cache() {
    let transport = ScriptedTransport::new(Step::ok("{}"));
    let dispatcher = dispatcher_with(test_config(), transport.clone());

    let _: Value = dispatcher.get("/contacts", RequestOptions::new()).await.unwrap();
    let _: Value = dispatcher.get("/contacts", RequestOptions::new()).await.unwrap();
    let body = json!({ "name": "Ada" });
    let _: Value = dispatcher.post("/contacts", &body, RequestOptions::new().cached()).await.unwrap();
    let _: Value = dispatcher.post("/contacts", &body, RequestOptions::new().cached()).await.unwrap();

    assert_eq!(transport.call_count(), 4);
}

/* -------------------------------------------------------------------------- */
/* Circuit breaker */
/* -------------------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn breaker_opens_at_threshold_and_recovers_after_reset() {
    let transport = ScriptedTransport::new(Step::status(500));
    let dispatcher = dispatcher_with(test_config(), transport.clone());
    let options = RequestOptions::new().retries(0);

    for _ in 0..3 {
        let error = dispatcher.get::<Value>("/reports", options.clone()).await.unwrap_err();
        assert!(error.is(ErrorCode::ServerError));
    }
    assert_eq!(dispatcher.circuit_state("GET /reports"), CircuitState::Open);

    let error = dispatcher.get::<Value>("/reports", options.clone()).await.unwrap_err();
    assert!(error.is(ErrorCode::CircuitOpenError));
    assert!(!error.is_retryable());
    assert_eq!(transport.call_count(), 3, "open circuit must not reach the network");

    tokio::time::advance(Duration::from_secs(10)).await;
    transport.set_fallback(Step::ok("[]"));

    let _: Value = dispatcher.get("/reports", options).await.unwrap();
    assert_eq!(dispatcher.circuit_state("GET /reports"), CircuitState::Closed);
    assert_eq!(transport.call_count(), 4);
    assert_eq!(dispatcher.circuit_snapshot("GET /reports").unwrap().failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_reopens_the_circuit() {
    let transport = ScriptedTransport::new(Step::Fail(TransportErrorKind::Connect));
    let dispatcher = dispatcher_with(test_config(), transport.clone());
    let options = RequestOptions::new().retries(0);

    for _ in 0..3 {
        let error = dispatcher.get::<Value>("/reports", options.clone()).await.unwrap_err();
        assert!(error.is(ErrorCode::NetworkError));
    }

    tokio::time::advance(Duration::from_secs(10)).await;
    let error = dispatcher.get::<Value>("/reports", options.clone()).await.unwrap_err();
    assert!(error.is(ErrorCode::NetworkError));
    assert_eq!(dispatcher.circuit_state("GET /reports"), CircuitState::Open);

    let error = dispatcher.get::<Value>("/reports", options).await.unwrap_err();
    assert!(error.is(ErrorCode::CircuitOpenError));
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn circuits_are_isolated_per_endpoint() {
    let transport = ScriptedTransport::new(Step::status(502));
    let dispatcher = dispatcher_with(test_config(), transport.clone());
    let options = RequestOptions::new().retries(0);

    for _ in 0..3 {
        let _ = dispatcher.get::<Value>("/flaky", options.clone()).await;
    }
    assert_eq!(dispatcher.circuit_state("GET /flaky"), CircuitState::Open);

    transport.set_fallback(Step::ok("{}"));
    let _: Value = dispatcher.get("/stable", options.clone()).await.unwrap();
    let _: Value = dispatcher.post("/flaky", &json!({}), options).await.unwrap();

    assert_eq!(dispatcher.circuit_state("GET /stable"), CircuitState::Closed);
    assert_eq!(dispatcher.circuit_state("POST /flaky"), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn client_errors_do_not_count_against_the_circuit() {
    let transport = ScriptedTransport::new(Step::status(404));
    let dispatcher = dispatcher_with(test_config(), transport.clone());

    for _ in 0..5 {
        let error = dispatcher.get::<Value>("/missing", RequestOptions::new()).await.unwrap_err();
        assert!(error.is(ErrorCode::NotFoundError));
    }

    assert_eq!(dispatcher.circuit_state("GET /missing"), CircuitState::Closed);
    assert_eq!(dispatcher.circuit_snapshot("GET /missing").unwrap().failure_count, 0);
}

/* -------------------------------------------------------------------------- */
/* Rate limiting */
/* -------------------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn overflow_is_queued_until_the_window_resets() {
    let transport = ScriptedTransport::new(Step::ok("{}"));
    let mut config = test_config();
    config.rate_limit.max_requests = 3;
    config.rate_limit.window = Duration::from_secs(1);
    let dispatcher = Arc::new(dispatcher_with(config, transport.clone()));
    let start = Instant::now();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher.get::<Value>("/search", RequestOptions::new()).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().expect("queued requests must complete, not be dropped");
    }

    let offsets = transport.offsets_since(start);
    assert_eq!(offsets.len(), 5);
    assert!(offsets[..3].iter().all(|offset| *offset < Duration::from_secs(1)));
    assert!(offsets[3..].iter().all(|offset| *offset >= Duration::from_secs(1)));

    // Let the drain worker observe the last finished turn
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(dispatcher.queued_requests("GET /search"), 0);
    assert_eq!(dispatcher.metrics_summary().failures, 0);
}

#[tokio::test(start_paused = true)]
async fn queued_requests_keep_arrival_order() {
    let transport = ScriptedTransport::new(Step::ok("{}"));
    let mut config = test_config();
    config.rate_limit.max_requests = 1;
    config.rate_limit.window = Duration::from_millis(500);
    let dispatcher = Arc::new(dispatcher_with(config, transport.clone()));

    let mut handles = Vec::new();
    for page in 0..4 {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(async move {
            dispatcher.get::<Value>(&format!("/feed?page={page}"), RequestOptions::new()).await
        }));
        // Let each task reach the limiter before the next one is spawned
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let pages: Vec<String> = transport
        .calls()
        .iter()
        .map(|call| call.request.url.query().unwrap_or_default().to_string())
        .collect();
    assert_eq!(pages, vec!["page=0", "page=1", "page=2", "page=3"]);
}

#[tokio::test(start_paused = true)]
async fn reject_policy_fails_fast_with_reset_time() {
    let transport = ScriptedTransport::new(Step::ok("{}"));
    let mut config = test_config();
    config.rate_limit.max_requests = 1;
    config.rate_limit.window = Duration::from_secs(2);
    config.rate_limit.overflow = OverflowPolicy::Reject;
    let dispatcher = dispatcher_with(config, transport.clone());

    let _: Value = dispatcher.get("/search", RequestOptions::new()).await.unwrap();
    let error = dispatcher.get::<Value>("/search", RequestOptions::new()).await.unwrap_err();

    assert!(error.is(ErrorCode::RateLimitError));
    assert!(!error.is_retryable());
    assert_eq!(error.details.unwrap()["resetInMs"], json!(2000));
    assert_eq!(transport.call_count(), 1);

    let info = dispatcher.rate_limit_info("GET /search");
    assert_eq!(info.limit, 1);
    assert_eq!(info.remaining, 0);
}

#[tokio::test(start_paused = true)]
async fn per_call_limit_and_skip_flag() {
    let transport = ScriptedTransport::new(Step::ok("{}"));
    let mut config = test_config();
    config.rate_limit.overflow = OverflowPolicy::Reject;
    let dispatcher = dispatcher_with(config, transport.clone());

    let tight = RequestOptions::new().rate_limit(1, Duration::from_secs(60));
    let _: Value = dispatcher.get("/export", tight.clone()).await.unwrap();
    let error = dispatcher.get::<Value>("/export", tight).await.unwrap_err();
    assert!(error.is(ErrorCode::RateLimitError));

    let _: Value = dispatcher
        .get("/export", RequestOptions::new().rate_limit(1, Duration::from_secs(60)).skip_rate_limit())
        .await
        .unwrap();
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn unbounded_ttl_and_window_do_not_overflow() {
    let transport = ScriptedTransport::new(Step::ok("[1]"));
    let mut config = test_config();
    config.rate_limit.overflow = OverflowPolicy::Reject;
    let dispatcher = dispatcher_with(config, transport.clone());

    let forever = RequestOptions::new().cache_ttl(Duration::MAX);
    let first: Value = dispatcher.get("/forever", forever.clone()).await.unwrap();
    tokio::time::advance(Duration::from_secs(86_400)).await;
    let second: Value = dispatcher.get("/forever", forever).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(transport.call_count(), 1);

    let endless = RequestOptions::new().rate_limit(1, Duration::MAX);
    let _: Value = dispatcher.get("/window", endless.clone()).await.unwrap();
    let error = dispatcher.get::<Value>("/window", endless).await.unwrap_err();
    assert!(error.is(ErrorCode::RateLimitError));
    assert_eq!(transport.call_count(), 2);
}

/* -------------------------------------------------------------------------- */
/* Retry */
/* -------------------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn retries_are_spaced_by_exponential_backoff() {
    let transport = ScriptedTransport::new(Step::status(503));
    let dispatcher = dispatcher_with(test_config(), transport.clone());
    let start = Instant::now();

    let error = dispatcher.get::<Value>("/jobs", RequestOptions::new().retries(2)).await.unwrap_err();

    assert!(error.is(ErrorCode::ServiceUnavailableError));
    assert_eq!(error.status_code, Some(503));

    let offsets = transport.offsets_since(start);
    assert_eq!(offsets.len(), 3);
    assert!(offsets[1] - offsets[0] >= Duration::from_secs(1));
    assert!(offsets[2] - offsets[1] >= Duration::from_secs(2));
    assert_eq!(dispatcher.recent_metrics(1)[0].attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn recovers_when_a_retry_succeeds() {
    let transport = ScriptedTransport::new(Step::ok(r#"{"data":{"ok":true}}"#));
    transport.push(Step::Fail(TransportErrorKind::Connect));
    transport.push(Step::status(500));
    let dispatcher = dispatcher_with(test_config(), transport.clone());

    let value: Value = dispatcher.get("/jobs", RequestOptions::new()).await.unwrap();

    assert_eq!(value, json!({ "ok": true }));
    assert_eq!(transport.call_count(), 3);
    assert_eq!(dispatcher.circuit_snapshot("GET /jobs").unwrap().failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn not_found_is_attempted_exactly_once() {
    let transport = ScriptedTransport::new(Step::Respond {
        status: 404,
        body: r#"{"message":"contact 9 not found"}"#.to_string(),
    });
    let dispatcher = dispatcher_with(test_config(), transport.clone());

    let error = dispatcher.get::<Value>("/contacts/9", RequestOptions::new().retries(5)).await.unwrap_err();

    assert!(error.is(ErrorCode::NotFoundError));
    assert_eq!(error.message, "contact 9 not found");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_never_retried() {
    for status in [400, 401, 403, 409, 422, 429] {
        let transport = ScriptedTransport::new(Step::status(status));
        let dispatcher = dispatcher_with(test_config(), transport.clone());

        let error = dispatcher.get::<Value>("/items", RequestOptions::new().retries(3)).await.unwrap_err();

        assert_eq!(error.status_code, Some(status));
        assert_eq!(transport.call_count(), 1, "status {status} was retried");
    }
}

#[tokio::test(start_paused = true)]
async fn server_and_network_errors_are_retried() {
    let cases = [
        Step::status(500),
        Step::status(502),
        Step::status(503),
        Step::Fail(TransportErrorKind::Connect),
        Step::Fail(TransportErrorKind::Other),
        Step::Fail(TransportErrorKind::Timeout),
    ];

    for step in cases {
        let transport = ScriptedTransport::new(step.clone());
        let dispatcher = dispatcher_with(test_config(), transport.clone());

        let error = dispatcher.get::<Value>("/items", RequestOptions::new().retries(1)).await.unwrap_err();

        assert!(error.is_retryable(), "{step:?} produced {error}");
        assert_eq!(transport.call_count(), 2, "{step:?} was not retried");
    }
}

#[tokio::test(start_paused = true)]
async fn writes_default_to_no_retries() {
    let transport = ScriptedTransport::new(Step::status(500));
    let dispatcher = dispatcher_with(test_config(), transport.clone());
    let body = json!({ "amount": 10 });

    let _ = dispatcher.post::<Value, _>("/payments", &body, RequestOptions::new()).await;
    assert_eq!(transport.call_count(), 1);

    let _ = dispatcher.put::<Value, _>("/payments/1", &body, RequestOptions::new()).await;
    let _ = dispatcher.patch::<Value, _>("/payments/1", &body, RequestOptions::new()).await;
    let _ = dispatcher.delete::<Value>("/payments/1", RequestOptions::new()).await;
    assert_eq!(transport.call_count(), 4);

    let _ = dispatcher.post::<Value, _>("/payments", &body, RequestOptions::new().retries(1)).await;
    assert_eq!(transport.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn reads_default_to_configured_retries() {
    let transport = ScriptedTransport::new(Step::status(500));
    let mut config = test_config();
    config.default_retries = 2;
    config.circuit.failure_threshold = 10;
    let dispatcher = dispatcher_with(config, transport.clone());

    let _ = dispatcher.get::<Value>("/items", RequestOptions::new()).await;
    assert_eq!(transport.call_count(), 3);
}

/* -------------------------------------------------------------------------- */
/* Timeouts */
/* -------------------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn hanging_attempt_times_out() {
    let transport = ScriptedTransport::new(Step::Hang);
    let dispatcher = dispatcher_with(test_config(), transport.clone());
    let start = Instant::now();

    let options = RequestOptions::new().timeout(Duration::from_millis(250)).retries(0);
    let error = dispatcher.get::<Value>("/slow", options).await.unwrap_err();

    assert!(error.is(ErrorCode::TimeoutError));
    assert!(start.elapsed() >= Duration::from_millis(250));
    assert_eq!(error.details.unwrap()["timeoutMs"], json!(250));
}

#[tokio::test(start_paused = true)]
async fn each_attempt_gets_its_own_deadline() {
    let transport = ScriptedTransport::new(Step::ok("[]"));
    transport.push(Step::Hang);
    let dispatcher = dispatcher_with(test_config(), transport.clone());

    let options = RequestOptions::new().timeout(Duration::from_millis(250)).retries(1);
    let value: Value = dispatcher.get("/slow", options).await.unwrap();

    assert_eq!(value, json!([]));
    assert_eq!(transport.call_count(), 2);
}

/* -------------------------------------------------------------------------- */
/* Validation and interceptors */
/* -------------------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn validation_errors_touch_nothing() {
    let transport = ScriptedTransport::new(Step::ok("{}"));
    let dispatcher = dispatcher_with(test_config(), transport.clone());

    let error = dispatcher.get::<Value>("", RequestOptions::new()).await.unwrap_err();
    assert!(error.is(ErrorCode::ValidationError));

    let error = dispatcher
        .send::<Value>(ApiRequest::get("/items").header("x-bad", "a\r\nb"))
        .await
        .unwrap_err();
    assert!(error.is(ErrorCode::ValidationError));

    assert_eq!(transport.call_count(), 0);
    assert!(dispatcher.circuit_snapshots().is_empty());
    assert_eq!(dispatcher.rate_limit_info("GET /items").remaining, 100);
}

struct RejectingInterceptor;

#[async_trait]
impl RequestInterceptor for RejectingInterceptor {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn on_request(&self, _request: ApiRequest) -> DispatchResult<ApiRequest> {
        Err(DispatchError::new(ErrorCode::AuthenticationError, "session expired"))
    }
}

#[tokio::test(start_paused = true)]
async fn interceptor_error_aborts_the_call() {
    let transport = ScriptedTransport::new(Step::ok("{}"));
    let dispatcher = courier_infra::Dispatcher::builder()
        .config(test_config())
        .transport(transport.clone())
        .request_interceptor(Arc::new(RejectingInterceptor))
        .build()
        .unwrap();

    let error = dispatcher.get::<Value>("/me", RequestOptions::new()).await.unwrap_err();

    assert!(error.is(ErrorCode::AuthenticationError));
    assert_eq!(error.message, "session expired");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn timing_interceptor_reports_duration_and_attempts() {
    let transport = ScriptedTransport::new(Step::ok("{}"));
    transport.push(Step::status(500));
    let dispatcher = courier_infra::Dispatcher::builder()
        .config(test_config())
        .transport(transport.clone())
        .with_timing()
        .build()
        .unwrap();

    let response = dispatcher.send_raw(ApiRequest::get("/me")).await.unwrap();

    assert!(response.metadata.request.start_time.is_some());
    assert!(response.metadata.duration.is_some());
    assert_eq!(response.metadata.request.attempts, 2);
    assert_eq!(response.metadata.endpoint, "GET /me");
}
