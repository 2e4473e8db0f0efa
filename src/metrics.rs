use tracing::trace;

// Counters and timings go out as trace events; the prometheus recorder in
// main only renders what the exporter itself collects.

pub fn inc_requests(route: &'static str) {
    trace!(target = "hermes.metrics", route, "requests_total_inc");
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "hermes.metrics",
        stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn advertisement_finished(status: &'static str) {
    trace!(target = "hermes.metrics", status, "advertisements_total_inc");
}

pub fn run_finished(marketplace: &'static str, published: usize, failed: usize) {
    trace!(
        target = "hermes.metrics",
        marketplace,
        published = published as u64,
        failed = failed as u64,
        "runs_total_inc"
    );
}
