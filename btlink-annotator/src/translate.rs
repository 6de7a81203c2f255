//! Address translation between independently relocated address spaces.

/// Rebase `value` from an address space loaded at `from_base` into one loaded
/// at `to_base`.
///
/// Total over u64: the arithmetic wraps, so a `value` below `from_base` is not
/// rejected here. Callers expect `value >= from_base`; out-of-domain inputs
/// simply produce an address that resolves to nothing downstream.
#[must_use]
pub fn rebase(value: u64, from_base: u64, to_base: u64) -> u64 {
    value.wrapping_sub(from_base).wrapping_add(to_base)
}

#[cfg(test)]
mod tests {
    use super::rebase;

    #[test]
    fn test_rebase_into_image_space() {
        // Module captured at 0x7fff_0000_0000, image analyzed at 0x1_0000_0000
        assert_eq!(
            rebase(0x7fff_0000_0180, 0x7fff_0000_0000, 0x1_0000_0000),
            0x1_0000_0180
        );
    }

    #[test]
    fn test_rebase_identity_when_bases_match() {
        assert_eq!(rebase(0x1234, 0x1000, 0x1000), 0x1234);
    }

    #[test]
    fn test_rebase_round_trip() {
        for value in [0u64, 1, 0x1_0000_0180, u64::MAX, 0x8000_0000_0000_0000] {
            for (base1, base2) in [(0x1000u64, 0x2000u64), (u64::MAX, 0), (0, u64::MAX)] {
                assert_eq!(rebase(rebase(value, base1, base2), base2, base1), value);
            }
        }
    }

    #[test]
    fn test_rebase_wraps_below_base() {
        // value < from_base wraps instead of failing
        assert_eq!(rebase(0x10, 0x20, 0x0), u64::MAX - 0xF);
    }
}
