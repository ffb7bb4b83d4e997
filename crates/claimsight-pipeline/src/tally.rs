//! Frequency tallies and rounding helpers for cluster aggregation.

use std::collections::HashMap;

/// Frequency map paired with an insertion-ordered key sequence.
///
/// Ties on count are broken by first appearance, so tallies are
/// deterministic for a given claim ordering.
#[derive(Debug, Default)]
pub struct FrequencyTally {
    counts: HashMap<String, usize>,
    order: Vec<String>,
}

impl FrequencyTally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `item`.
    pub fn add(&mut self, item: &str) {
        if !self.counts.contains_key(item) {
            self.order.push(item.to_string());
        }
        *self.counts.entry(item.to_string()).or_insert(0) += 1;
    }

    /// Whether nothing has been counted.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The most frequent item, earliest-seen on ties.
    pub fn most_common(&self) -> Option<&str> {
        // max_by_key keeps the last of equal maxima, so go through the
        // stable ordering in top() instead.
        self.top(1).into_iter().next()
    }

    /// The `k` most frequent items, count-descending, earliest-seen on ties.
    pub fn top(&self, k: usize) -> Vec<&str> {
        let mut items: Vec<(usize, &str)> = self
            .order
            .iter()
            .enumerate()
            .map(|(position, item)| (position, item.as_str()))
            .collect();
        items.sort_by(|(pos_a, a), (pos_b, b)| {
            let count_a = self.counts.get(*a).copied().unwrap_or(0);
            let count_b = self.counts.get(*b).copied().unwrap_or(0);
            count_b.cmp(&count_a).then(pos_a.cmp(pos_b))
        });
        items.into_iter().take(k).map(|(_, item)| item).collect()
    }
}

/// Deduplicate strings preserving first-appearance order.
pub fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            result.push(item);
        }
    }
    result
}

/// Round a dollar amount half-up to cents.
///
/// Applied to the raw sum of member costs, never to pre-rounded values, so
/// sub-cent inputs accumulate before the single rounding step.
pub fn round_half_up_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_common_breaks_ties_by_first_seen() {
        let mut tally = FrequencyTally::new();
        for item in ["beta", "alpha", "beta", "alpha"] {
            tally.add(item);
        }
        assert_eq!(tally.most_common(), Some("beta"));
    }

    #[test]
    fn top_orders_by_count_then_insertion() {
        let mut tally = FrequencyTally::new();
        for item in ["P0301", "P0420", "P0420", "P0171", "P0301", "P0420"] {
            tally.add(item);
        }
        assert_eq!(tally.top(2), vec!["P0420", "P0301"]);
        assert_eq!(tally.top(10), vec!["P0420", "P0301", "P0171"]);
    }

    #[test]
    fn empty_tally_has_no_most_common() {
        let tally = FrequencyTally::new();
        assert!(tally.is_empty());
        assert_eq!(tally.most_common(), None);
        assert!(tally.top(3).is_empty());
    }

    #[test]
    fn dedup_keeps_first_appearance() {
        let items = vec![
            "P0299".to_string(),
            "P0234".to_string(),
            "P0299".to_string(),
            "P0101".to_string(),
        ];
        assert_eq!(dedup_preserving_order(items), vec!["P0299", "P0234", "P0101"]);
    }

    #[test]
    fn sub_cent_costs_round_after_summing() {
        // Two 10.005 costs must round as a 20.01 total, not 20.00.
        let total = 10.005 + 10.005;
        assert_eq!(round_half_up_cents(total), 20.01);
    }

    #[test]
    fn exact_cent_sums_are_untouched() {
        assert_eq!(round_half_up_cents(1825.50), 1825.50);
        assert_eq!(round_half_up_cents(0.0), 0.0);
    }
}
