use criterion::{Criterion, black_box, criterion_group, criterion_main};
use insight_forge::error::OrchestratorError;
use insight_forge::services::llm::retry::{RetryConfig, retry_with_backoff};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;

fn bench_retry_immediate_success(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_secs(1),
        backoff_multiplier: 2.0,
    };

    c.bench_function("retry_immediate_success", |b| {
        b.iter(|| {
            rt.block_on(async {
                let operation = || async { Ok::<String, OrchestratorError>("success".to_string()) };
                let result = retry_with_backoff(operation, &config).await;
                black_box(result)
            })
        })
    });
}

fn bench_retry_with_transient_failures(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_secs(1),
        backoff_multiplier: 2.0,
    };

    c.bench_function("retry_with_two_transient_failures", |b| {
        b.iter(|| {
            let attempt = AtomicUsize::new(0);
            rt.block_on(async {
                let operation = || async {
                    if attempt.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(OrchestratorError::llm_transient("temporary failure"))
                    } else {
                        Ok("success".to_string())
                    }
                };
                let result = retry_with_backoff(operation, &config).await;
                black_box(result)
            })
        })
    });
}

criterion_group!(benches, bench_retry_immediate_success, bench_retry_with_transient_failures);
criterion_main!(benches);
