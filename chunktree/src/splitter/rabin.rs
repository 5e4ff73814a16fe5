//! Rabin fingerprint over GF(2)[x]
use super::RollingHash;
use std::{fmt, sync::Arc};

/// irreducible polynomial of degree 53
const POLYNOMIAL: u64 = 0x3d_a335_8b4d_c173;

fn degree(x: u64) -> i32 {
    63 - x.leading_zeros() as i32
}

/// polynomial remainder of `x` divided by `p`
fn modulo(mut x: u64, p: u64) -> u64 {
    let dp = degree(p);
    while degree(x) >= dp {
        x ^= p << (degree(x) - dp);
    }
    x
}

fn append_byte(hash: u64, byte: u8, p: u64) -> u64 {
    modulo((hash << 8) | byte as u64, p)
}

struct Tables {
    /// contribution of a byte once it is about to leave the window
    out: [u64; 256],
    /// reduction of the top byte that gets shifted out of the fingerprint
    reduce: [u64; 256],
    shift: u32,
}

impl Tables {
    fn new(polynomial: u64, window_size: usize) -> Self {
        let mut out = [0u64; 256];
        let mut reduce = [0u64; 256];
        let k = degree(polynomial);
        for b in 0..256usize {
            let mut h = append_byte(0, b as u8, polynomial);
            for _ in 1..window_size {
                h = append_byte(h, 0, polynomial);
            }
            out[b] = h;
            let top = (b as u64) << k;
            reduce[b] = modulo(top, polynomial) | top;
        }
        Self {
            out,
            reduce,
            shift: (k - 8) as u32,
        }
    }
}

/// Rabin fingerprint of the bytes in the window, with windowed removal of the
/// oldest byte.
#[derive(Clone)]
pub struct RabinHash {
    tables: Arc<Tables>,
    digest: u64,
}

impl RabinHash {
    pub fn new(window_size: usize) -> Self {
        Self {
            tables: Arc::new(Tables::new(POLYNOMIAL, window_size.max(1))),
            digest: 0,
        }
    }
}

impl fmt::Debug for RabinHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RabinHash")
            .field("digest", &self.digest)
            .finish()
    }
}

impl RollingHash for RabinHash {
    fn roll(&mut self, incoming: u8, outgoing: Option<u8>) {
        if let Some(outgoing) = outgoing {
            self.digest ^= self.tables.out[outgoing as usize];
        }
        let index = (self.digest >> self.tables.shift) as usize & 0xff;
        self.digest = ((self.digest << 8) | incoming as u64) ^ self.tables.reduce[index];
    }

    fn fingerprint(&self) -> u64 {
        self.digest
    }

    fn reset(&mut self) {
        self.digest = 0;
    }
}
