use opentelemetry::trace::TraceId;
use rand::Rng;

///  Fetch an opentelemetry::trace::TraceId as hex through the full tracing stack
pub fn get_trace_id() -> TraceId {
    let mut rng = rand::thread_rng();
    let val: u128 = rng.gen();
    TraceId::from(val)
}
