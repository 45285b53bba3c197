use std::ops::Range;

/// Default number of resources analyzed concurrently in one group.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Split `len` inventory positions into consecutive groups of `batch_size`.
/// The last group may be shorter. A zero batch size is treated as one.
pub fn plan_groups(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    let size = batch_size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

/// Percentage of processed resources, rounded to two decimals.
pub fn progress_percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = processed as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// A progress value is acceptable if it never moves backward and never passes the total.
pub fn progress_is_valid(current: usize, next: usize, total: usize) -> bool {
    next >= current && next <= total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_resources_in_groups_of_five() {
        assert_eq!(plan_groups(7, 5), vec![0..5, 5..7]);
    }

    #[test]
    fn exact_multiple_has_no_trailing_group() {
        assert_eq!(plan_groups(10, 5), vec![0..5, 5..10]);
        assert!(plan_groups(0, 5).is_empty());
    }

    #[test]
    fn zero_batch_size_degrades_to_one() {
        assert_eq!(plan_groups(3, 0), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn progress_rounds_to_two_places() {
        assert_eq!(progress_percent(1, 3), 33.33);
        assert_eq!(progress_percent(2, 3), 66.67);
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(4, 4), 100.0);
    }

    #[test]
    fn progress_validity() {
        assert!(progress_is_valid(0, 5, 7));
        assert!(progress_is_valid(5, 5, 7));
        assert!(!progress_is_valid(5, 4, 7));
        assert!(!progress_is_valid(5, 8, 7));
    }
}
