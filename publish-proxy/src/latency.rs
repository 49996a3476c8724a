use publish_proxy_common::tools::epoch_millis;

use crate::filter_trait::{FilterContext, BACKEND_REQUEST_TIME, BACKEND_RESPONSE_TIME, REQUEST_IN_TIME, RESPONSE_OUT_TIME};
use crate::record::LatencyRecord;

/// Milliseconds from `start` to `end`, 0 when either is unknown or `end` comes first.
#[inline]
fn span(start: Option<u64>, end: Option<u64>) -> u64 {
    match (start, end) {
        (Some(start), Some(end)) => end.saturating_sub(start),
        _ => 0
    }
}

/// Builds the latency record of a request completed at `completed_at` (epoch millis).
///
/// Lifecycle boundaries come from the context attributes:
/// - request mediation: `REQUEST_IN_TIME` -> `BACKEND_REQUEST_TIME`
/// - backend: `BACKEND_REQUEST_TIME` -> `BACKEND_RESPONSE_TIME`
/// - response mediation: `BACKEND_RESPONSE_TIME` -> `RESPONSE_OUT_TIME`
/// - response: `REQUEST_IN_TIME` -> `completed_at`, the full round trip
///
/// A missing `REQUEST_IN_TIME` is taken as `completed_at`. Durations never go negative,
/// clock skew between the captured timestamps floors them at 0.
pub fn compute_latency(ctx: &FilterContext, correlation_id: &str, completed_at: u64) -> LatencyRecord {
    let request_in = ctx.get_attr_as_u64(REQUEST_IN_TIME);
    let backend_request = ctx.get_attr_as_u64(BACKEND_REQUEST_TIME);
    let backend_response = ctx.get_attr_as_u64(BACKEND_RESPONSE_TIME);
    let response_out = ctx.get_attr_as_u64(RESPONSE_OUT_TIME);

    let request_timestamp = request_in.unwrap_or(completed_at);

    LatencyRecord {
        correlation_id: correlation_id.to_string(),
        request_timestamp,
        backend_latency: span(backend_request, backend_response),
        request_mediation_latency: span(request_in, backend_request),
        response_latency: span(Some(request_timestamp), Some(completed_at)),
        response_mediation_latency: span(backend_response, response_out),
    }
}

pub fn compute_latency_now(ctx: &FilterContext, correlation_id: &str) -> LatencyRecord {
    compute_latency(ctx, correlation_id, epoch_millis())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::filter_trait::Value;

    fn ctx_with(attrs: &[(&str, u64)]) -> FilterContext {
        let mut ctx = FilterContext::new();
        for (k, v) in attrs {
            ctx.set_attr(k, Value::U64(*v));
        }
        ctx
    }

    #[test]
    fn test_all_fields_present() {
        let message_id = Uuid::new_v4().to_string();
        let ctx = ctx_with(&[(REQUEST_IN_TIME, epoch_millis())]);
        let record = compute_latency_now(&ctx, &message_id);
        assert_eq!(record.correlation_id, message_id);
        assert!(record.request_timestamp > 0);
        assert_eq!(record.backend_latency, 0);
        assert_eq!(record.request_mediation_latency, 0);
        assert_eq!(record.response_mediation_latency, 0);
    }

    #[test]
    fn test_full_lifecycle() {
        let t = 1_700_000_000_000;
        let ctx = ctx_with(&[
            (REQUEST_IN_TIME, t),
            (BACKEND_REQUEST_TIME, t + 3),
            (BACKEND_RESPONSE_TIME, t + 40),
            (RESPONSE_OUT_TIME, t + 42),
        ]);
        let record = compute_latency(&ctx, "id", t + 45);
        assert_eq!(record, LatencyRecord {
            correlation_id: "id".to_string(),
            request_timestamp: t,
            backend_latency: 37,
            request_mediation_latency: 3,
            response_latency: 45,
            response_mediation_latency: 2,
        });
    }

    #[test]
    fn test_only_request_in_time() {
        let t = 1_700_000_000_000;
        let ctx = ctx_with(&[(REQUEST_IN_TIME, t)]);
        let record = compute_latency(&ctx, "id", t + 5000);
        assert_eq!(record.request_timestamp, t);
        assert_eq!(record.response_latency, 5000);
        assert_eq!(record.backend_latency, 0);
        assert_eq!(record.request_mediation_latency, 0);
        assert_eq!(record.response_mediation_latency, 0);
    }

    #[test]
    fn test_request_in_time_in_the_future() {
        let ctx = ctx_with(&[(REQUEST_IN_TIME, epoch_millis() + 60 * 1000)]);
        let record = compute_latency_now(&ctx, "id");
        assert_eq!(record.response_latency, 0);
    }

    #[test]
    fn test_out_of_order_timestamps_clamp_to_zero() {
        let t = 1_700_000_000_000;
        let ctx = ctx_with(&[
            (REQUEST_IN_TIME, t + 100),
            (BACKEND_REQUEST_TIME, t + 50),
            (BACKEND_RESPONSE_TIME, t + 10),
            (RESPONSE_OUT_TIME, t),
        ]);
        let record = compute_latency(&ctx, "id", t);
        assert_eq!(record.backend_latency, 0);
        assert_eq!(record.request_mediation_latency, 0);
        assert_eq!(record.response_latency, 0);
        assert_eq!(record.response_mediation_latency, 0);
    }

    #[test]
    fn test_missing_request_in_time() {
        let ctx = ctx_with(&[(BACKEND_REQUEST_TIME, 10), (BACKEND_RESPONSE_TIME, 30)]);
        let record = compute_latency(&ctx, "id", 1000);
        assert_eq!(record.request_timestamp, 1000);
        assert_eq!(record.response_latency, 0);
        assert_eq!(record.request_mediation_latency, 0);
        assert_eq!(record.backend_latency, 20);
    }

    #[test]
    fn test_wrong_attribute_type_is_ignored() {
        let mut ctx = FilterContext::new();
        ctx.set_attr(REQUEST_IN_TIME, Value::String("yesterday".to_string()));
        let record = compute_latency(&ctx, "id", 500);
        assert_eq!(record.request_timestamp, 500);
        assert_eq!(record.response_latency, 0);
    }

    #[test]
    fn test_idempotent() {
        let t = 1_700_000_000_000;
        let ctx = ctx_with(&[(REQUEST_IN_TIME, t), (BACKEND_REQUEST_TIME, t + 1)]);
        let first = compute_latency(&ctx, "id", t + 10);
        let second = compute_latency(&ctx, "id", t + 10);
        assert_eq!(first, second);
    }
}
