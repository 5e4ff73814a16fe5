#![allow(dead_code)]
//! helper methods for the tests
use chunktree::{ChunkContainer, Config, MemAccessor};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::{io::Read, sync::Arc};

/// log to the test output, if RUST_LOG is set
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rng(seed).fill_bytes(&mut data);
    data
}

pub fn container(store: &MemAccessor, config: Config) -> anyhow::Result<ChunkContainer> {
    ChunkContainer::create(Arc::new(store.clone()), config)
}

pub fn content(container: &mut ChunkContainer) -> anyhow::Result<Vec<u8>> {
    let mut result = Vec::new();
    container.reader().read_to_end(&mut result)?;
    Ok(result)
}

/// content defined chunking with chunks of a few hundred bytes
pub fn small_cyclic_poly() -> Config {
    Config::cyclic_poly(b"tests".to_vec(), 512, 128, 2048, 32)
}

/// the configs used for most tests, as (name, config)
pub fn configs() -> Vec<(&'static str, Config)> {
    vec![
        ("fixed", Config::debug()),
        ("cyclic_poly", Config::debug_fast()),
        ("rabin", Config::rabin(512, 128, 2048, 32)),
        ("wide", Config::debug_fast().with_compact_pointers(false)),
    ]
}
