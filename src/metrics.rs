use once_cell::sync::Lazy;
use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};

pub static FETCH_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tms_bridge_fetch_requests_total",
        "Total upstream order fetches attempted"
    )
    .expect("fetch_requests counter")
});

pub static PUSH_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tms_bridge_push_requests_total",
        "Total upstream order pushes attempted"
    )
    .expect("push_requests counter")
});

pub static UPSTREAM_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tms_bridge_upstream_errors_total",
        "Total upstream calls that failed (transport or non-2xx)"
    )
    .expect("upstream_errors counter")
});

pub static TRANSFORMS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tms_bridge_transforms_total",
        "Total payload transformations applied before a push"
    )
    .expect("transforms counter")
});

pub static UPSTREAM_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tms_bridge_upstream_latency_seconds",
        "Upstream call latency (send to first byte of the response)",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0]
    )
    .expect("upstream_latency histogram")
});
