use gatewright_model::{BundleId, Confidence, CoverageReport, Disposition};
use proptest::prelude::*;

/// Build a disposition mix from generated `(kind, bundle_choice)` pairs.
///
/// Kind index: 0 = direct, 1 = bundled, 2 = custom, 3 = not-required. The
/// bundle choice picks one of three shared bundle ids so generated runs can
/// hold multi-member bundles.
fn dispositions_from(pairs: &[(usize, u8)]) -> Vec<Disposition> {
    let bundles = [BundleId::new(), BundleId::new(), BundleId::new()];
    pairs
        .iter()
        .enumerate()
        .map(|(i, (kind, choice))| {
            let id = format!("p{i}");
            match kind % 4 {
                0 => Disposition::direct(id, "key-auth", Confidence::DIRECT_BASELINE, "table hit"),
                1 => Disposition::bundled(
                    id,
                    "rate-limiting",
                    bundles[usize::from(*choice) % bundles.len()],
                    Confidence::DIRECT_BASELINE,
                    "merged",
                ),
                2 => Disposition::custom(id, "custom-thing", Confidence::ZERO, "no equivalent"),
                _ => Disposition::not_required(id, "native"),
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_buckets_always_conserve(
        pairs in proptest::collection::vec((0usize..4, any::<u8>()), 0..32)
    ) {
        let dispositions = dispositions_from(&pairs);
        let report = CoverageReport::from_dispositions(&dispositions);
        prop_assert!(report.is_conserved());
        prop_assert_eq!(report.total_policies, dispositions.len());
    }

    #[test]
    fn prop_percentages_stay_in_range(
        pairs in proptest::collection::vec((0usize..4, any::<u8>()), 0..32)
    ) {
        let dispositions = dispositions_from(&pairs);
        let report = CoverageReport::from_dispositions(&dispositions);
        prop_assert!((0.0..=100.0).contains(&report.coverage_percentage));
        // Efficiency never reaches 100: every bundle keeps one construct.
        prop_assert!((0.0..100.0).contains(&report.bundling_efficiency_percentage)
            || report.no_bundles);
    }

    #[test]
    fn prop_flags_match_counts(
        pairs in proptest::collection::vec((0usize..4, any::<u8>()), 0..32)
    ) {
        let dispositions = dispositions_from(&pairs);
        let report = CoverageReport::from_dispositions(&dispositions);
        prop_assert_eq!(report.no_policies, report.total_policies == 0);
        prop_assert_eq!(report.no_bundles, report.bundled_count == 0);
    }

    #[test]
    fn prop_clamped_confidence_is_always_usable(value in any::<f64>()) {
        let clamped = Confidence::clamped(value).value();
        prop_assert!(!clamped.is_nan());
        prop_assert!((0.0..=1.0).contains(&clamped));
    }
}
