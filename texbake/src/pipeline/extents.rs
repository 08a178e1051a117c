//! Derived texture extents and mip counts.

use crate::input::{ExtentPolicy, MipmapGeneration, RoundMode};

/// Extent of `dim` at mip `level`, minimum 1.
pub fn level_extent(dim: u32, level: u32) -> u32 {
    if level >= 32 {
        1
    } else {
        (dim >> level).max(1)
    }
}

/// Number of levels from the given extents down to 1×1×1.
pub fn full_chain_length(width: u32, height: u32, depth: u32) -> u32 {
    let largest = width.max(height).max(depth).max(1);
    largest.ilog2() + 1
}

/// Mip levels a job produces.
pub fn declared_mip_count(full_chain: u32, mipmaps: &MipmapGeneration) -> u32 {
    match (mipmaps.enabled, mipmaps.max_level) {
        (_, Some(max_level)) => full_chain.min(max_level.saturating_add(1)),
        (true, None) => full_chain,
        (false, None) => 1,
    }
}

fn previous_power_of_two(x: u32) -> u32 {
    if x == 0 {
        1
    } else {
        1 << x.ilog2()
    }
}

fn next_power_of_two(x: u32) -> u32 {
    x.max(1).checked_next_power_of_two().unwrap_or(1 << 31)
}

fn round_extent(x: u32, mode: RoundMode) -> u32 {
    match mode {
        RoundMode::None => x,
        RoundMode::ToNext => next_power_of_two(x),
        RoundMode::ToPrevious => previous_power_of_two(x),
        RoundMode::ToNearest => {
            let next = next_power_of_two(x);
            let prev = previous_power_of_two(x);
            if next - x <= x - prev {
                next
            } else {
                prev
            }
        }
    }
}

/// Extents after the max-extent clamp and power-of-two rounding.
///
/// The clamp scales every dimension by the same factor so the aspect ratio
/// survives. Rounding up never pushes a dimension past the clamp.
pub fn target_extents(width: u32, height: u32, depth: u32, policy: &ExtentPolicy) -> (u32, u32, u32) {
    let mut dims = [width, height, depth];

    if let Some(max_extent) = policy.max_extent.filter(|&m| m > 0) {
        let largest = width.max(height).max(depth);
        if largest > max_extent {
            for d in &mut dims {
                *d = ((*d as u64 * max_extent as u64) / largest as u64).max(1) as u32;
            }
        }
    }

    for d in &mut dims {
        *d = round_extent(*d, policy.round_mode);
        if let Some(max_extent) = policy.max_extent.filter(|&m| m > 0) {
            if *d > max_extent {
                *d = match policy.round_mode {
                    RoundMode::None => max_extent,
                    _ => previous_power_of_two(max_extent),
                };
            }
        }
    }

    (dims[0], dims[1], dims[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_extent: Option<u32>, round_mode: RoundMode) -> ExtentPolicy {
        ExtentPolicy {
            max_extent,
            round_mode,
        }
    }

    #[test]
    fn test_full_chain_length() {
        assert_eq!(full_chain_length(1, 1, 1), 1);
        assert_eq!(full_chain_length(4, 4, 1), 3);
        assert_eq!(full_chain_length(256, 16, 1), 9);
        assert_eq!(full_chain_length(5, 3, 1), 3);
    }

    #[test]
    fn test_declared_mip_count() {
        let on = MipmapGeneration {
            enabled: true,
            max_level: None,
        };
        let capped = MipmapGeneration {
            enabled: true,
            max_level: Some(2),
        };
        let off = MipmapGeneration {
            enabled: false,
            max_level: None,
        };
        let off_capped = MipmapGeneration {
            enabled: false,
            max_level: Some(20),
        };

        assert_eq!(declared_mip_count(9, &on), 9);
        assert_eq!(declared_mip_count(9, &capped), 3);
        assert_eq!(declared_mip_count(9, &off), 1);
        assert_eq!(declared_mip_count(9, &off_capped), 9);
    }

    #[test]
    fn test_level_extent() {
        assert_eq!(level_extent(256, 0), 256);
        assert_eq!(level_extent(256, 3), 32);
        assert_eq!(level_extent(5, 4), 1);
        assert_eq!(level_extent(5, 40), 1);
    }

    #[test]
    fn test_round_modes() {
        assert_eq!(target_extents(100, 60, 1, &policy(None, RoundMode::ToNext)), (128, 64, 1));
        assert_eq!(target_extents(100, 60, 1, &policy(None, RoundMode::ToPrevious)), (64, 32, 1));
        assert_eq!(target_extents(100, 60, 1, &policy(None, RoundMode::ToNearest)), (128, 64, 1));
        assert_eq!(target_extents(90, 40, 1, &policy(None, RoundMode::ToNearest)), (64, 32, 1));
        assert_eq!(target_extents(100, 60, 1, &policy(None, RoundMode::None)), (100, 60, 1));
    }

    #[test]
    fn test_max_extent_keeps_aspect() {
        assert_eq!(target_extents(2048, 1024, 1, &policy(Some(512), RoundMode::None)), (512, 256, 1));
        assert_eq!(target_extents(300, 3, 1, &policy(Some(100), RoundMode::None)), (100, 1, 1));
        // Already within the clamp
        assert_eq!(target_extents(64, 32, 1, &policy(Some(512), RoundMode::None)), (64, 32, 1));
    }

    #[test]
    fn test_round_up_respects_max_extent() {
        assert_eq!(target_extents(300, 300, 1, &policy(Some(300), RoundMode::ToNext)), (256, 256, 1));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_chain_length_ends_at_one(w in 1u32..100_000, h in 1u32..100_000) {
                let n = full_chain_length(w, h, 1);
                let largest = w.max(h);
                prop_assert!(n >= 1);
                prop_assert_eq!(level_extent(largest, n - 1), 1);
                prop_assert!(n == 1 || level_extent(largest, n - 2) > 1);
            }

            #[test]
            fn test_target_extents_within_clamp(
                w in 1u32..10_000,
                h in 1u32..10_000,
                max in 1u32..4096,
            ) {
                for mode in [RoundMode::None, RoundMode::ToNext, RoundMode::ToNearest, RoundMode::ToPrevious] {
                    let (tw, th, td) = target_extents(w, h, 1, &policy(Some(max), mode));
                    prop_assert!(tw >= 1 && th >= 1 && td == 1);
                    prop_assert!(tw <= max && th <= max);
                }
            }
        }
    }
}
