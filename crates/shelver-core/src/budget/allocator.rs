//! Progressive-tax token allocation.
//!
//! Distributes a token budget across N items of wildly different sizes while
//! keeping small items intact whenever possible. The deficit (total minus
//! target) is levied as a tax: in protection mode only the above-average
//! items pay, proportionally to their size; when even the below-average items
//! alone would overflow the target, everyone pays proportionally.

use shelver_types::organize::TruncationStats;

/// One item competing for the budget.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenWeight {
    pub name: String,
    pub tokens: u64,
}

impl TokenWeight {
    pub fn new(name: impl Into<String>, tokens: u64) -> Self {
        Self {
            name: name.into(),
            tokens,
        }
    }
}

/// Per-item allocation. `allocated` is fractional; callers floor it when
/// handing a budget to the truncator.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedTokens {
    pub name: String,
    pub original: u64,
    pub allocated: f64,
}

/// The full allocation plus the stats recorded on the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub items: Vec<AllocatedTokens>,
    pub stats: TruncationStats,
}

/// Distribute `target` tokens across `items`.
///
/// When the items already fit, every item keeps its original count. Otherwise
/// the deficit is taxed away:
///
/// 1. Partition on the average deficit share (`deficit / N`): items below it
///    are candidates for protection, items at or above it are taxable.
/// 2. If the protected set alone fits inside the target, only taxable items
///    pay, proportionally to their size (protection mode).
/// 3. Otherwise every item pays proportionally (fallback mode).
///
/// Invariants (see tests): the allocations sum to `target` up to rounding,
/// each allocation stays within `[0, original]`, protected items are
/// untouched in protection mode, and equal inputs get equal outputs.
pub fn allocate(items: &[TokenWeight], target: u64) -> Allocation {
    let total: u64 = items.iter().map(|i| i.tokens).sum();

    if items.is_empty() || total <= target {
        return Allocation {
            items: items
                .iter()
                .map(|i| AllocatedTokens {
                    name: i.name.clone(),
                    original: i.tokens,
                    allocated: i.tokens as f64,
                })
                .collect(),
            stats: TruncationStats {
                applied: false,
                total_original_tokens: total,
                target_tokens: target,
                deficit: 0,
                protection_mode_used: false,
                protected_count: 0,
                truncated_count: 0,
            },
        };
    }

    let deficit = total - target;
    let avg_share = deficit as f64 / items.len() as f64;

    let below: Vec<&TokenWeight> = items.iter().filter(|i| (i.tokens as f64) < avg_share).collect();
    let sum_below: u64 = below.iter().map(|i| i.tokens).sum();
    let sum_above: u64 = total - sum_below;

    let protection_feasible = sum_below <= target && sum_above > 0;

    let mut truncated_count = 0usize;
    let allocated: Vec<AllocatedTokens> = if protection_feasible {
        items
            .iter()
            .map(|i| {
                let allocated = if (i.tokens as f64) < avg_share {
                    i.tokens as f64
                } else {
                    let tax = (i.tokens as f64 / sum_above as f64) * deficit as f64;
                    let kept = (i.tokens as f64 - tax).max(0.0);
                    if kept < i.tokens as f64 {
                        truncated_count += 1;
                    }
                    kept
                };
                AllocatedTokens {
                    name: i.name.clone(),
                    original: i.tokens,
                    allocated,
                }
            })
            .collect()
    } else {
        items
            .iter()
            .map(|i| {
                let tax = (i.tokens as f64 / total as f64) * deficit as f64;
                let kept = (i.tokens as f64 - tax).max(0.0);
                if kept < i.tokens as f64 {
                    truncated_count += 1;
                }
                AllocatedTokens {
                    name: i.name.clone(),
                    original: i.tokens,
                    allocated: kept,
                }
            })
            .collect()
    };

    Allocation {
        items: allocated,
        stats: TruncationStats {
            applied: true,
            total_original_tokens: total,
            target_tokens: target,
            deficit,
            protection_mode_used: protection_feasible,
            protected_count: if protection_feasible { below.len() } else { 0 },
            truncated_count,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, u64)]) -> Vec<TokenWeight> {
        pairs.iter().map(|(n, t)| TokenWeight::new(*n, *t)).collect()
    }

    fn total_allocated(allocation: &Allocation) -> f64 {
        allocation.items.iter().map(|i| i.allocated).sum()
    }

    #[test]
    fn no_deficit_means_no_change() {
        let items = weights(&[("a", 100), ("b", 200)]);
        let allocation = allocate(&items, 1_000);
        assert!(!allocation.stats.applied);
        assert_eq!(allocation.stats.deficit, 0);
        assert_eq!(allocation.items[0].allocated, 100.0);
        assert_eq!(allocation.items[1].allocated, 200.0);
    }

    #[test]
    fn one_giant_file_pays_the_whole_tax() {
        // Scenario: three modest files and one huge one.
        let items = weights(&[("a", 1_000), ("b", 1_000), ("c", 10_000), ("d", 300_000)]);
        let allocation = allocate(&items, 100_000);

        assert!(allocation.stats.protection_mode_used);
        assert_eq!(allocation.stats.protected_count, 3);
        assert_eq!(allocation.stats.truncated_count, 1);
        assert_eq!(allocation.stats.deficit, 212_000);

        assert_eq!(allocation.items[0].allocated, 1_000.0);
        assert_eq!(allocation.items[1].allocated, 1_000.0);
        assert_eq!(allocation.items[2].allocated, 10_000.0);
        assert!((allocation.items[3].allocated - 88_000.0).abs() < 1.0);
        assert!((total_allocated(&allocation) - 100_000.0).abs() < 1.0);
    }

    #[test]
    fn two_large_items_share_the_tax_proportionally() {
        let items = weights(&[("a", 1_000), ("b", 1_000), ("c", 100_000), ("d", 200_000)]);
        let allocation = allocate(&items, 100_000);

        assert!(allocation.stats.protection_mode_used);
        assert_eq!(allocation.items[0].allocated, 1_000.0);
        assert_eq!(allocation.items[1].allocated, 1_000.0);
        assert!((allocation.items[2].allocated - 32_666.67).abs() < 1.0);
        assert!((allocation.items[3].allocated - 65_333.33).abs() < 1.0);

        // Both taxed items keep the same share of their original size.
        let kept_c = allocation.items[2].allocated / 100_000.0;
        let kept_d = allocation.items[3].allocated / 200_000.0;
        assert!((kept_c - kept_d).abs() < 1e-9);
        assert!((total_allocated(&allocation) - 100_000.0).abs() < 1.0);
    }

    #[test]
    fn fallback_taxes_everyone_when_protection_is_infeasible() {
        let items = weights(&[("a", 149), ("b", 251)]);
        let allocation = allocate(&items, 100);

        assert!(!allocation.stats.protection_mode_used);
        assert_eq!(allocation.stats.protected_count, 0);
        assert!((allocation.items[0].allocated - 37.25).abs() < 1e-9);
        assert!((allocation.items[1].allocated - 62.75).abs() < 1e-9);
        assert!((total_allocated(&allocation) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn allocations_stay_within_bounds() {
        let cases: Vec<(Vec<TokenWeight>, u64)> = vec![
            (weights(&[("a", 1), ("b", 1_000_000)]), 10),
            (weights(&[("a", 50), ("b", 50), ("c", 50)]), 0),
            (weights(&[("a", 7)]), 3),
            (weights(&[("a", 123), ("b", 456), ("c", 789), ("d", 12)]), 400),
        ];
        for (items, target) in cases {
            let allocation = allocate(&items, target);
            for item in &allocation.items {
                assert!(item.allocated >= 0.0, "{} went negative", item.name);
                assert!(
                    item.allocated <= item.original as f64 + 1e-9,
                    "{} grew past its original size",
                    item.name
                );
            }
            if allocation.stats.applied {
                assert!(
                    (total_allocated(&allocation) - target as f64).abs() < 1.0,
                    "sum missed target {target}"
                );
            }
        }
    }

    #[test]
    fn equal_inputs_get_equal_outputs() {
        let items = weights(&[("a", 500), ("b", 500), ("c", 500), ("d", 500)]);
        let allocation = allocate(&items, 1_000);
        let first = allocation.items[0].allocated;
        for item in &allocation.items {
            assert!((item.allocated - first).abs() < 1e-9);
        }
        assert!((total_allocated(&allocation) - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn protection_iff_below_sum_fits_target() {
        // sum_below (149) > target (100): must fall back.
        let infeasible = allocate(&weights(&[("a", 149), ("b", 251)]), 100);
        assert!(!infeasible.stats.protection_mode_used);

        // sum_below (12_000) <= target (100_000): protection holds.
        let feasible = allocate(
            &weights(&[("a", 1_000), ("b", 1_000), ("c", 10_000), ("d", 300_000)]),
            100_000,
        );
        assert!(feasible.stats.protection_mode_used);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let allocation = allocate(&[], 100);
        assert!(allocation.items.is_empty());
        assert!(!allocation.stats.applied);
    }
}
