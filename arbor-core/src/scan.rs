//! Vectorized search over fixed-width integer payloads.
//!
//! The generic tree cannot assume anything about its payloads, so this fast
//! path only applies where the payloads are already a contiguous `u32`
//! array: the preorder data of a [`SuccinctEncoding<u32>`].
//!
//! # Architecture Dispatch
//!
//! - x86_64 + AVX2: 8 lanes per compare (runtime detection)
//! - aarch64: NEON, 4 lanes per compare (always available)
//! - Fallback: portable scalar loop

use crate::succinct::SuccinctEncoding;

/// Index of the first element equal to `needle`.
#[inline]
pub fn find_u32(haystack: &[u32], needle: u32) -> Option<usize> {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return unsafe { find_u32_avx2(haystack, needle) };
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { find_u32_neon(haystack, needle) };
    }

    find_u32_scalar(haystack, needle)
}

/// Scalar implementation (portable fallback)
#[inline]
pub fn find_u32_scalar(haystack: &[u32], needle: u32) -> Option<usize> {
    haystack.iter().position(|&value| value == needle)
}

/// AVX2 implementation (x86_64 only)
///
/// Compares 8 lanes at a time; the movemask of the first block with a hit
/// gives the lane directly. The final `< 8` elements go through the scalar
/// loop.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn find_u32_avx2(haystack: &[u32], needle: u32) -> Option<usize> {
    use std::arch::x86_64::*;

    let len = haystack.len();
    let target = _mm256_set1_epi32(needle as i32);
    let mut i = 0;

    while i + 8 <= len {
        let block = unsafe { _mm256_loadu_si256(haystack.as_ptr().add(i).cast::<__m256i>()) };
        let hits = _mm256_cmpeq_epi32(block, target);
        let mask = _mm256_movemask_ps(_mm256_castsi256_ps(hits)) as u32;
        if mask != 0 {
            return Some(i + mask.trailing_zeros() as usize);
        }
        i += 8;
    }

    find_u32_scalar(&haystack[i..], needle).map(|offset| i + offset)
}

/// NEON implementation (aarch64)
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn find_u32_neon(haystack: &[u32], needle: u32) -> Option<usize> {
    use std::arch::aarch64::*;

    let len = haystack.len();
    let target = vdupq_n_u32(needle);
    let mut i = 0;

    while i + 4 <= len {
        let block = unsafe { vld1q_u32(haystack.as_ptr().add(i)) };
        if vmaxvq_u32(vceqq_u32(block, target)) != 0 {
            return find_u32_scalar(&haystack[i..i + 4], needle).map(|offset| i + offset);
        }
        i += 4;
    }

    find_u32_scalar(&haystack[i..], needle).map(|offset| i + offset)
}

impl SuccinctEncoding<u32> {
    /// Preorder rank of the first node carrying `value`.
    ///
    /// The rank is also the node's position in `data()`; after
    /// `NodeStore::decode` it names the same node as the tree's `n`-th
    /// preorder visit.
    #[inline]
    pub fn position_of(&self, value: u32) -> Option<usize> {
        find_u32(self.data(), value)
    }

    /// True when some node carries `value`
    #[inline]
    pub fn contains(&self, value: u32) -> bool {
        self.position_of(value).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NodeStore;

    #[test]
    fn test_find_matches_scalar() {
        for len in [0, 1, 7, 8, 9, 31, 64, 257] {
            let haystack: Vec<u32> = (0..len).map(|i| i * 3 + 1).collect();
            for needle in [0, 1, 4, (len * 3).saturating_sub(2), len * 3 + 1, u32::MAX] {
                assert_eq!(
                    find_u32(&haystack, needle),
                    find_u32_scalar(&haystack, needle),
                    "len {len}, needle {needle}"
                );
            }
        }
    }

    #[test]
    fn test_find_returns_first_duplicate() {
        let mut haystack = vec![0u32; 40];
        haystack[13] = 9;
        haystack[21] = 9;
        assert_eq!(find_u32(&haystack, 9), Some(13));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2_specific() {
        if is_x86_feature_detected!("avx2") {
            let haystack: Vec<u32> = (0..1024).collect();
            for needle in [0, 7, 8, 500, 1023, 1024] {
                let avx2 = unsafe { find_u32_avx2(&haystack, needle) };
                assert_eq!(avx2, find_u32_scalar(&haystack, needle));
            }
        }
    }

    #[test]
    fn test_position_of_is_preorder_rank() {
        let mut store = NodeStore::new();
        let root = store.create_root(10u32).unwrap();
        let a = store.add_child(root, 20).unwrap();
        store.add_child(root, 30).unwrap();
        store.add_child(a, 40).unwrap();

        let encoding = store.encode().unwrap();
        assert_eq!(encoding.position_of(40), Some(2));
        assert_eq!(encoding.position_of(30), Some(3));
        assert!(encoding.contains(10));
        assert!(!encoding.contains(50));

        let rank = encoding.position_of(40).unwrap();
        let decoded = NodeStore::decode(encoding).unwrap();
        assert_eq!(decoded.preorder().nth(rank).map(|n| *n.payload()), Some(40));
    }
}
