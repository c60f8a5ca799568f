//! Hot-path benchmarks for the dispatcher's per-call primitives
//!
//! Every dispatched request pays for one breaker check, one rate window
//! acquisition and, when cacheable, one cache key derivation and lookup.
//!
//! Run with: `cargo bench --bench resilience_bench -p courier-common`

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use courier_common::cache::{cache_key, CacheConfig, ResponseCache};
use courier_common::resilience::{
    CircuitBreakerConfig, CircuitBreakerRegistry, ExponentialBackoff, MockClock, Quota,
    RateLimiterRegistry, WindowStrategy,
};
use serde_json::json;

// ============================================================================
// Circuit Breaker Benchmarks
// ============================================================================

fn bench_circuit_breaker(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker");
    let clock = Arc::new(MockClock::new());

    group.bench_function("check_and_record_success", |b| {
        let registry = CircuitBreakerRegistry::with_clock(CircuitBreakerConfig::default(), clock.clone())
            .expect("valid circuit breaker config for benchmarks");
        b.iter(|| {
            let admission = registry.check(black_box("GET /contacts"));
            black_box(&admission);
            registry.record_success("GET /contacts");
        });
    });

    group.bench_function("open_short_circuit", |b| {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(60),
            reset_on_success: true,
        };
        let registry = CircuitBreakerRegistry::with_clock(config, clock.clone())
            .expect("valid circuit breaker config for benchmarks");
        registry.record_failure("GET /contacts");

        b.iter(|| black_box(registry.check(black_box("GET /contacts")).is_err()));
    });

    group.finish();
}

// ============================================================================
// Rate Limiter Benchmarks
// ============================================================================

fn bench_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiter");
    let quota = Quota::new(u32::MAX, Duration::from_secs(60));

    for strategy in [WindowStrategy::FixedWindow, WindowStrategy::SlidingLog] {
        group.bench_with_input(
            BenchmarkId::new("try_acquire", format!("{strategy:?}")),
            &strategy,
            |b, strategy| {
                let clock = Arc::new(MockClock::new());
                let limiter = RateLimiterRegistry::with_clock(*strategy, clock.clone());
                b.iter(|| {
                    // Keep the sliding log short so the bench measures admission
                    clock.advance(Duration::from_millis(1));
                    black_box(limiter.try_acquire(black_box("GET /contacts"), &quota))
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Cache Benchmarks
// ============================================================================

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_cache");

    let mut headers = BTreeMap::new();
    headers.insert("accept".to_string(), "application/json".to_string());
    headers.insert("x-tenant".to_string(), "acme".to_string());
    let body = json!({ "filter": { "status": "active" }, "page": 3 });

    group.bench_function("cache_key", |b| {
        b.iter(|| {
            black_box(cache_key(
                "GET",
                black_box("https://api.example.com/contacts?page=3"),
                Some(&body),
                &headers,
            ))
        });
    });

    group.bench_function("get_hit", |b| {
        let cache = ResponseCache::with_clock(CacheConfig::default(), Arc::new(MockClock::new()));
        cache.set("key", json!([1, 2, 3]), Duration::from_secs(60));
        b.iter(|| black_box(cache.get(black_box("key"))));
    });

    group.finish();
}

// ============================================================================
// Backoff Benchmarks
// ============================================================================

fn bench_backoff(c: &mut Criterion) {
    let backoff = ExponentialBackoff::default();
    c.bench_function("exponential_delay_for", |b| {
        b.iter(|| {
            for retry in 1..=10 {
                black_box(backoff.delay_for(black_box(retry)));
            }
        });
    });
}

criterion_group!(benches, bench_circuit_breaker, bench_rate_limiter, bench_cache, bench_backoff);
criterion_main!(benches);
