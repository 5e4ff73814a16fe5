use lazy_static::lazy_static;
use prometheus::{exponential_buckets, Histogram, HistogramOpts, IntCounter, Opts, Registry};

lazy_static! {
    pub static ref CHUNK_GET_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("chunk_get_time", "Complete time spent in chunk get",)
            .namespace("chunktree")
            .buckets(exponential_buckets(0.00001, 2.0, 17).unwrap()),
    )
    .unwrap();
    pub static ref CHUNK_PUT_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("chunk_put_time", "Complete time spent in chunk put",)
            .namespace("chunktree")
            .buckets(exponential_buckets(0.00001, 2.0, 17).unwrap()),
    )
    .unwrap();
    pub static ref CHUNK_GET_SIZE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("chunk_get_size", "Size of chunks being read",)
            .namespace("chunktree")
            .buckets(exponential_buckets(64.0, 2.0, 16).unwrap()),
    )
    .unwrap();
    pub static ref CHUNK_PUT_SIZE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("chunk_put_size", "Size of chunks being written",)
            .namespace("chunktree")
            .buckets(exponential_buckets(64.0, 2.0, 16).unwrap()),
    )
    .unwrap();
    pub static ref FLUSH_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("flush_time", "Complete time to rebalance and persist a container",)
            .namespace("chunktree")
            .buckets(exponential_buckets(0.00001, 2.0, 20).unwrap()),
    )
    .unwrap();
    pub static ref CACHE_EVICTIONS: IntCounter = IntCounter::with_opts(
        Opts::new("cache_evictions", "Number of data chunks evicted from container caches")
            .namespace("chunktree"),
    )
    .unwrap();
}

pub fn register_metrics(registry: &Registry) -> anyhow::Result<()> {
    registry.register(Box::new(CHUNK_GET_HIST.clone()))?;
    registry.register(Box::new(CHUNK_PUT_HIST.clone()))?;
    registry.register(Box::new(CHUNK_GET_SIZE_HIST.clone()))?;
    registry.register(Box::new(CHUNK_PUT_SIZE_HIST.clone()))?;
    registry.register(Box::new(FLUSH_HIST.clone()))?;
    registry.register(Box::new(CACHE_EVICTIONS.clone()))?;
    Ok(())
}
