use gatewright_bundling::BundlePlanner;
use gatewright_mapping::MappingTable;
use gatewright_model::{
    ExecutionPhase, PolicyDescriptor, PolicyFlow, ProxyModel, UpstreamService,
};
use proptest::prelude::*;
use std::sync::Arc;

const TYPE_POOL: [&str; 8] = [
    "VerifyAPIKey",
    "Quota",
    "SpikeArrest",
    "AssignMessage",
    "CORS",
    "MessageLogging",
    "StatisticsCollector",
    "MysteryPolicy",
];

fn proxy_from_type_indices(indices: &[usize]) -> ProxyModel {
    let mut flow = PolicyFlow::new("pre", ExecutionPhase::PreRequest);
    for (order, idx) in indices.iter().enumerate() {
        let ty = TYPE_POOL[idx % TYPE_POOL.len()];
        flow = flow.with_policy(PolicyDescriptor::new(
            format!("p{order}"),
            ty,
            ExecutionPhase::PreRequest,
            "pre",
            u32::try_from(order).unwrap(),
        ));
    }
    ProxyModel::new("prop-proxy", UpstreamService::new("up", "https://up.example"))
        .with_flow(flow)
}

proptest! {
    #[test]
    fn prop_bundles_have_at_least_two_ordered_members(
        indices in proptest::collection::vec(0..TYPE_POOL.len(), 0..24)
    ) {
        let proxy = proxy_from_type_indices(&indices);
        let planner = BundlePlanner::new(Arc::new(MappingTable::builtin()));
        let plan = planner.plan(&proxy);

        for bundle in plan.bundles() {
            prop_assert!(bundle.len() >= 2);
            // Members stay in ascending execution order.
            let orders: Vec<u32> = bundle
                .member_policy_ids()
                .iter()
                .map(|id| proxy.find_policy(id).unwrap().order_index)
                .collect();
            for pair in orders.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }

    #[test]
    fn prop_membership_is_disjoint(
        indices in proptest::collection::vec(0..TYPE_POOL.len(), 0..24)
    ) {
        let proxy = proxy_from_type_indices(&indices);
        let planner = BundlePlanner::new(Arc::new(MappingTable::builtin()));
        let plan = planner.plan(&proxy);

        let mut seen = std::collections::BTreeSet::new();
        for bundle in plan.bundles() {
            for member in bundle.member_policy_ids() {
                prop_assert!(seen.insert(member.clone()), "policy in two bundles");
            }
        }
        prop_assert_eq!(seen.len(), plan.bundled_policy_count());
    }

    #[test]
    fn prop_planning_is_deterministic(
        indices in proptest::collection::vec(0..TYPE_POOL.len(), 0..24)
    ) {
        let proxy = proxy_from_type_indices(&indices);
        let planner = BundlePlanner::new(Arc::new(MappingTable::builtin()));
        let one = planner.plan(&proxy);
        let two = planner.plan(&proxy);

        // Bundle ids are freshly generated, so compare structure instead.
        prop_assert_eq!(one.bundles().len(), two.bundles().len());
        for (a, b) in one.bundles().iter().zip(two.bundles().iter()) {
            prop_assert_eq!(a.member_policy_ids(), b.member_policy_ids());
            prop_assert_eq!(a.target_construct(), b.target_construct());
        }
    }

    #[test]
    fn prop_saved_constructs_matches_membership(
        indices in proptest::collection::vec(0..TYPE_POOL.len(), 0..24)
    ) {
        let proxy = proxy_from_type_indices(&indices);
        let planner = BundlePlanner::new(Arc::new(MappingTable::builtin()));
        let plan = planner.plan(&proxy);

        let member_total: usize = plan.bundles().iter().map(|b| b.len()).sum();
        prop_assert_eq!(member_total, plan.bundled_policy_count());
        prop_assert_eq!(
            plan.saved_constructs(),
            member_total - plan.bundles().len()
        );
    }
}

#[test]
fn ineligible_types_never_appear_in_bundles() {
    let indices: Vec<usize> = (0..TYPE_POOL.len()).collect();
    let proxy = proxy_from_type_indices(&indices);
    let planner = BundlePlanner::new(Arc::new(MappingTable::builtin()));
    let plan = planner.plan(&proxy);

    for bundle in plan.bundles() {
        for member in bundle.member_policy_ids() {
            let ty = &proxy.find_policy(member).unwrap().policy_type;
            let eligible = MappingTable::builtin()
                .lookup(ty)
                .is_some_and(|m| m.bundle_eligible);
            assert!(eligible, "{ty} bundled despite ineligibility");
        }
    }
}
