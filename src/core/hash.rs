//! 32-bit block-mix hash for content-addressed lookups
//!
//! MurmurHash3 (x86, 32-bit). Views hash by their bytes, never by address.
//! The process-wide seed is chosen once, on first use, from the wall clock and
//! is read-only afterwards; callers that need determinism pass their own seed.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static PROCESS_SEED: OnceLock<u32> = OnceLock::new();

/// The seed shared by every table that was not given an explicit one
pub fn process_seed() -> u32 {
    *PROCESS_SEED.get_or_init(|| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        (nanos as u32) ^ ((nanos >> 32) as u32)
    })
}

/// Pin the process-wide seed. Returns false if it was already initialised.
pub fn init_process_seed(seed: u32) -> bool {
    PROCESS_SEED.set(seed).is_ok()
}

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

#[inline]
fn mix_block(mut k: u32) -> u32 {
    k = k.wrapping_mul(C1);
    k = k.rotate_left(15);
    k.wrapping_mul(C2)
}

/// Hash a byte string with the given seed
pub fn hash32(bytes: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let mut blocks = bytes.chunks_exact(4);

    for block in &mut blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h ^= mix_block(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k |= (b as u32) << (8 * i);
        }
        h ^= mix_block(k);
    }

    // Finalisation: force all bits to avalanche
    h ^= bytes.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        // Reference values for MurmurHash3_x86_32
        assert_eq!(hash32(b"", 0), 0);
        assert_eq!(hash32(b"", 1), 0x514e_28b7);
        assert_eq!(hash32(b"test", 0), 0xba6b_d213);
        assert_eq!(hash32(b"Hello, world!", 1234), 0xfaf6_cdb3);
    }

    #[test]
    fn test_seed_changes_hash() {
        assert_ne!(hash32(b"amp", 1), hash32(b"amp", 2));
    }

    #[test]
    fn test_process_seed_is_stable() {
        let first = process_seed();
        assert_eq!(process_seed(), first);
        // Already initialised by the call above
        assert!(!init_process_seed(first.wrapping_add(1)));
        assert_eq!(process_seed(), first);
    }
}
