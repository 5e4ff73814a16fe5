//! Cyclic polynomial (buzhash) rolling hash with seeded tables
use super::RollingHash;
use sha2::{Digest, Sha256};
use std::{fmt, sync::Arc};

struct Tables {
    push: [u32; 256],
    pop: [u32; 256],
}

impl Tables {
    fn new(seed: &[u8], window_size: usize) -> Self {
        let mut push = [0u32; 256];
        let mut pop = [0u32; 256];
        let rotation = (window_size % 32) as u32;
        for b in 0..256usize {
            let mut hasher = Sha256::new();
            hasher.update(seed);
            hasher.update([b as u8]);
            let digest = hasher.finalize();
            let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
            push[b] = value;
            // a byte leaving the window has been rotated once per byte in the window
            pop[b] = value.rotate_right(rotation);
        }
        Self { push, pop }
    }
}

/// Rolling hash where each byte is mapped to a pseudo random 32 bit value.
///
/// The tables are derived from a seed, so that boundaries differ between
/// repositories with different seeds.
#[derive(Clone)]
pub struct CyclicPolyHash {
    tables: Arc<Tables>,
    value: u32,
}

impl CyclicPolyHash {
    pub fn new(seed: &[u8], window_size: usize) -> Self {
        Self {
            tables: Arc::new(Tables::new(seed, window_size.max(1))),
            value: 0,
        }
    }
}

impl fmt::Debug for CyclicPolyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CyclicPolyHash")
            .field("value", &self.value)
            .finish()
    }
}

impl RollingHash for CyclicPolyHash {
    fn roll(&mut self, incoming: u8, outgoing: Option<u8>) {
        self.value = self.value.rotate_right(1);
        if let Some(outgoing) = outgoing {
            self.value ^= self.tables.pop[outgoing as usize];
        }
        self.value ^= self.tables.push[incoming as usize];
    }

    fn fingerprint(&self) -> u64 {
        self.value as u64
    }

    fn reset(&mut self) {
        self.value = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::tests::random_bytes;
    use std::collections::VecDeque;

    fn fingerprint_of(seed: &[u8], prefix: &[u8], window: &[u8]) -> u64 {
        let mut hash = CyclicPolyHash::new(seed, window.len());
        let mut buffer = VecDeque::new();
        for byte in prefix.iter().chain(window.iter()) {
            let outgoing = if buffer.len() == window.len() {
                buffer.pop_front()
            } else {
                None
            };
            buffer.push_back(*byte);
            hash.roll(*byte, outgoing);
        }
        hash.fingerprint()
    }

    #[test]
    fn fingerprint_only_depends_on_window() {
        for window_size in [1usize, 16, 31, 32, 33, 64] {
            let window = random_bytes(window_size as u64, window_size);
            let a = fingerprint_of(b"seed", &random_bytes(100, 77), &window);
            let b = fingerprint_of(b"seed", &[], &window);
            assert_eq!(a, b, "window size {}", window_size);
        }
    }

    #[test]
    fn seed_changes_fingerprint() {
        let window = random_bytes(1, 16);
        assert_ne!(
            fingerprint_of(b"a", &[], &window),
            fingerprint_of(b"b", &[], &window)
        );
    }
}
