//! The greedy planner and advisory adoption.
//!
//! Greedy walk, per flow in execution order: keep extending the current
//! run while the whole candidate group stays legal; the first policy that
//! breaks a rule closes the run. Runs of two or more become bundles.
//! Closing on first failure means source order is never reshuffled to
//! chase a better grouping.

use crate::rules::{PolicyIndex, RuleSet, RuleViolation};
use gatewright_mapping::MappingTable;
use gatewright_model::{
    Bundle, BundleId, BundlingAdvice, PolicyDescriptor, PolicyId, ProxyModel,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// The outcome of planning one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundlePlan {
    bundles: Vec<Bundle>,
    membership: IndexMap<PolicyId, BundleId>,
    warnings: Vec<String>,
}

impl BundlePlan {
    /// Emitted bundles, each with two or more members.
    #[must_use]
    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    /// The bundle a policy belongs to, if any.
    #[must_use]
    pub fn bundle_for(&self, id: &PolicyId) -> Option<BundleId> {
        self.membership.get(id).copied()
    }

    /// Look up a bundle by id.
    #[must_use]
    pub fn bundle(&self, id: BundleId) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.id() == id)
    }

    /// Non-fatal notes accumulated while planning (discarded advice etc).
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Policies that ended up inside bundles.
    #[must_use]
    pub fn bundled_policy_count(&self) -> usize {
        self.membership.len()
    }

    /// How many emitted constructs bundling saves: members minus bundles.
    #[must_use]
    pub fn saved_constructs(&self) -> usize {
        self.membership.len().saturating_sub(self.bundles.len())
    }

    /// Size of the largest bundle; 0 when there are none.
    #[must_use]
    pub fn largest_bundle_len(&self) -> usize {
        self.bundles.iter().map(Bundle::len).max().unwrap_or(0)
    }

    fn push_bundle(&mut self, bundle: Bundle) {
        for member in bundle.member_policy_ids() {
            self.membership.insert(member.clone(), bundle.id());
        }
        self.bundles.push(bundle);
    }

    fn push_warning(&mut self, warning: String) {
        warn!(%warning, "bundling");
        self.warnings.push(warning);
    }
}

/// Plans consolidation bundles for a proxy.
#[derive(Debug, Clone)]
pub struct BundlePlanner {
    table: Arc<MappingTable>,
}

impl BundlePlanner {
    /// Bind the planner to a mapping table.
    #[must_use]
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self { table }
    }

    /// Pure greedy plan, no advisory input.
    #[must_use]
    pub fn plan(&self, proxy: &ProxyModel) -> BundlePlan {
        let index = PolicyIndex::build(proxy.all_policies());
        let rules = RuleSet::new(&self.table, &index);
        let mut plan = BundlePlan::default();
        self.greedy_into(&mut plan, proxy, &rules);
        plan
    }

    /// Greedy plan seeded with validated advisory groups.
    ///
    /// Every proposal runs through the hard rules; violators are dropped
    /// with a warning. The seeded plan is adopted only when it saves at
    /// least as many constructs as pure greedy, with ties broken toward
    /// the plan holding the larger bundle.
    #[must_use]
    pub fn plan_with_advice(&self, proxy: &ProxyModel, advice: &BundlingAdvice) -> BundlePlan {
        let greedy = self.plan(proxy);
        if advice.groups.is_empty() {
            return greedy;
        }

        let index = PolicyIndex::build(proxy.all_policies());
        let rules = RuleSet::new(&self.table, &index);
        let mut seeded = BundlePlan::default();

        for (n, group) in advice.groups.iter().enumerate() {
            match Self::resolve_members(&index, &seeded, &group.policy_ids) {
                Ok(mut members) => {
                    members.sort_by(|a, b| {
                        a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id))
                    });
                    match rules.validate_group(&members, 2) {
                        Ok(construct) => {
                            let ids: Vec<PolicyId> =
                                members.iter().map(|m| m.id.clone()).collect();
                            let rationale = if group.rationale.trim().is_empty() {
                                format!(
                                    "{} policies merge into a single '{construct}' construct",
                                    ids.len()
                                )
                            } else {
                                group.rationale.clone()
                            };
                            match Bundle::new(ids, construct, rationale) {
                                Ok(bundle) => seeded.push_bundle(bundle),
                                Err(e) => seeded
                                    .push_warning(format!("advisory group {} discarded: {e}", n + 1)),
                            }
                        }
                        Err(violation) => {
                            seeded.push_warning(format!(
                                "advisory group {} discarded: {violation}",
                                n + 1
                            ));
                        }
                    }
                }
                Err(violation) => {
                    seeded.push_warning(format!(
                        "advisory group {} discarded: {violation}",
                        n + 1
                    ));
                }
            }
        }

        // Whatever the advice did not claim still gets greedy treatment.
        self.greedy_into(&mut seeded, proxy, &rules);

        let seeded_saved = seeded.saved_constructs();
        let greedy_saved = greedy.saved_constructs();
        let adopt = seeded_saved > greedy_saved
            || (seeded_saved == greedy_saved
                && seeded.largest_bundle_len() >= greedy.largest_bundle_len());
        if adopt {
            debug!(
                bundles = seeded.bundles.len(),
                saved = seeded_saved,
                "adopted advisory-seeded plan"
            );
            seeded
        } else {
            let mut fallback = greedy;
            fallback.warnings.extend(seeded.warnings);
            fallback.push_warning(format!(
                "advisory-seeded plan saved {seeded_saved} construct(s) vs greedy {greedy_saved}; kept greedy"
            ));
            fallback
        }
    }

    /// Resolve advisory member ids, rejecting unknowns and double claims.
    fn resolve_members<'a>(
        index: &PolicyIndex<'a>,
        seeded: &BundlePlan,
        ids: &[PolicyId],
    ) -> Result<Vec<&'a PolicyDescriptor>, RuleViolation> {
        let mut members = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if seeded.membership.contains_key(id) || ids[..i].contains(id) {
                return Err(RuleViolation::DuplicateMembership {
                    policy_id: id.clone(),
                });
            }
            match index.get(id) {
                Some(policy) => members.push(policy),
                None => {
                    return Err(RuleViolation::UnknownMember {
                        policy_id: id.clone(),
                    })
                }
            }
        }
        Ok(members)
    }

    /// Run the greedy walk over every flow, skipping already-claimed ids.
    fn greedy_into(&self, plan: &mut BundlePlan, proxy: &ProxyModel, rules: &RuleSet<'_>) {
        for flow in &proxy.flows {
            let ordered: Vec<&PolicyDescriptor> = flow
                .ordered()
                .into_iter()
                .filter(|p| !plan.membership.contains_key(&p.id))
                .collect();
            let mut run: Vec<&PolicyDescriptor> = Vec::new();

            for policy in ordered {
                if run.is_empty() {
                    if rules.eligibility(policy).is_ok() {
                        run.push(policy);
                    }
                    continue;
                }
                let mut candidate = run.clone();
                candidate.push(policy);
                if rules.validate_group(&candidate, 2).is_ok() {
                    run = candidate;
                } else {
                    Self::close_run(plan, rules, &mut run, &flow.name);
                    if rules.eligibility(policy).is_ok() {
                        run.push(policy);
                    }
                }
            }
            Self::close_run(plan, rules, &mut run, &flow.name);
        }
    }

    /// Emit the current run as a bundle when it has two or more members.
    fn close_run(
        plan: &mut BundlePlan,
        rules: &RuleSet<'_>,
        run: &mut Vec<&PolicyDescriptor>,
        flow_name: &str,
    ) {
        if run.len() >= 2 {
            if let Ok(construct) = rules.validate_group(run, 2) {
                let ids: Vec<PolicyId> = run.iter().map(|p| p.id.clone()).collect();
                let rationale = format!(
                    "{} adjacent policies in flow '{flow_name}' collapse into one '{construct}' construct",
                    ids.len()
                );
                if let Ok(bundle) = Bundle::new(ids, construct, rationale) {
                    debug!(flow = flow_name, members = bundle.len(), "bundle closed");
                    plan.push_bundle(bundle);
                }
            }
        }
        run.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewright_model::{
        AdvisoryGroup, ExecutionPhase, PolicyFlow, RouteSpec, UpstreamService,
    };

    fn policy(id: &str, ty: &str, order: u32) -> PolicyDescriptor {
        PolicyDescriptor::new(id, ty, ExecutionPhase::PreRequest, "pre", order)
    }

    fn proxy_with(policies: Vec<PolicyDescriptor>) -> ProxyModel {
        let mut flow = PolicyFlow::new("pre", ExecutionPhase::PreRequest);
        flow.policies = policies;
        ProxyModel::new("orders-v1", UpstreamService::new("orders", "https://o.example"))
            .with_route(RouteSpec::new("default", "/orders"))
            .with_flow(flow)
    }

    fn planner() -> BundlePlanner {
        BundlePlanner::new(Arc::new(MappingTable::builtin()))
    }

    #[test]
    fn adjacent_eligible_policies_bundle_and_log_stays_out() {
        // Key verification + quota merge; the log policy is not eligible
        // and remains a singleton.
        let proxy = proxy_with(vec![
            policy("verify", "VerifyAPIKey", 0),
            policy("quota", "Quota", 1),
            policy("log", "MessageLogging", 2),
        ]);
        let plan = planner().plan(&proxy);

        assert_eq!(plan.bundles().len(), 1);
        let bundle = &plan.bundles()[0];
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.target_construct(), "rate-limiting");
        assert!(plan.bundle_for(&"verify".into()).is_some());
        assert!(plan.bundle_for(&"log".into()).is_none());
        assert_eq!(plan.saved_constructs(), 1);
    }

    #[test]
    fn rule_break_closes_the_run_without_reordering() {
        // verify(0), quota(1) bundle; cors(2) is ineligible and breaks the
        // run; spike(3), quota2(4) start a fresh bundle.
        let proxy = proxy_with(vec![
            policy("verify", "VerifyAPIKey", 0),
            policy("quota", "Quota", 1),
            policy("cors", "CORS", 2),
            policy("spike", "SpikeArrest", 3),
            policy("quota2", "Quota", 4),
        ]);
        let plan = planner().plan(&proxy);

        assert_eq!(plan.bundles().len(), 2);
        let members: Vec<&str> = plan.bundles()[0]
            .member_policy_ids()
            .iter()
            .map(PolicyId::as_str)
            .collect();
        assert_eq!(members, vec!["verify", "quota"]);
        let members: Vec<&str> = plan.bundles()[1]
            .member_policy_ids()
            .iter()
            .map(PolicyId::as_str)
            .collect();
        assert_eq!(members, vec!["spike", "quota2"]);
    }

    #[test]
    fn greedy_prefers_the_larger_run() {
        // Three compatible policies in a row become one 3-member bundle,
        // not a 2-member bundle plus a singleton.
        let proxy = proxy_with(vec![
            policy("verify", "VerifyAPIKey", 0),
            policy("quota", "Quota", 1),
            policy("spike", "SpikeArrest", 2),
        ]);
        let plan = planner().plan(&proxy);

        assert_eq!(plan.bundles().len(), 1);
        assert_eq!(plan.bundles()[0].len(), 3);
        assert_eq!(plan.saved_constructs(), 2);
    }

    #[test]
    fn singletons_never_become_bundles() {
        let proxy = proxy_with(vec![
            policy("verify", "VerifyAPIKey", 0),
            policy("cors", "CORS", 1),
            policy("quota", "Quota", 2),
        ]);
        let plan = planner().plan(&proxy);
        // verify and quota are both eligible but cors sits between them.
        assert!(plan.bundles().is_empty());
        assert_eq!(plan.bundled_policy_count(), 0);
    }

    #[test]
    fn advisory_groups_are_validated_not_trusted() {
        // The advice tries to bundle an ineligible log policy; the group
        // is discarded and greedy still finds the legal pair.
        let proxy = proxy_with(vec![
            policy("verify", "VerifyAPIKey", 0),
            policy("quota", "Quota", 1),
            policy("log", "MessageLogging", 2),
        ]);
        let advice = BundlingAdvice {
            groups: vec![AdvisoryGroup::new(
                vec!["quota".into(), "log".into()],
                "looks mergeable",
            )],
            confidences: IndexMap::new(),
        };
        let plan = planner().plan_with_advice(&proxy, &advice);

        assert_eq!(plan.bundles().len(), 1);
        assert!(plan.bundle_for(&"log".into()).is_none());
        assert!(plan
            .warnings()
            .iter()
            .any(|w| w.contains("discarded")));
    }

    #[test]
    fn advisory_never_worsens_the_plan() {
        // Advice proposes only a 2-member group where greedy finds 3 in a
        // row; the seeded plan saves fewer constructs, so greedy wins.
        let proxy = proxy_with(vec![
            policy("verify", "VerifyAPIKey", 0),
            policy("quota", "Quota", 1),
            policy("spike", "SpikeArrest", 2),
        ]);
        let advice = BundlingAdvice {
            groups: vec![AdvisoryGroup::new(
                vec!["verify".into(), "spike".into()],
                "skip the middle",
            )],
            confidences: IndexMap::new(),
        };
        let plan = planner().plan_with_advice(&proxy, &advice);

        // A verify+spike seed leaves quota stranded between them (greedy
        // cannot claim it contiguously), so the seeded plan saves 1 vs
        // greedy's 2 and is rejected.
        assert_eq!(plan.bundles().len(), 1);
        assert_eq!(plan.bundles()[0].len(), 3);
        assert!(plan.warnings().iter().any(|w| w.contains("kept greedy")));
    }

    #[test]
    fn advisory_members_are_sorted_by_execution_order() {
        let proxy = proxy_with(vec![
            policy("verify", "VerifyAPIKey", 0),
            policy("quota", "Quota", 1),
        ]);
        let advice = BundlingAdvice {
            groups: vec![AdvisoryGroup::new(
                vec!["quota".into(), "verify".into()],
                "reversed listing",
            )],
            confidences: IndexMap::new(),
        };
        let plan = planner().plan_with_advice(&proxy, &advice);

        assert_eq!(plan.bundles().len(), 1);
        let members: Vec<&str> = plan.bundles()[0]
            .member_policy_ids()
            .iter()
            .map(PolicyId::as_str)
            .collect();
        assert_eq!(members, vec!["verify", "quota"]);
    }

    #[test]
    fn unknown_advisory_member_discards_the_group() {
        let proxy = proxy_with(vec![
            policy("verify", "VerifyAPIKey", 0),
            policy("quota", "Quota", 1),
        ]);
        let advice = BundlingAdvice {
            groups: vec![AdvisoryGroup::new(
                vec!["verify".into(), "ghost".into()],
                "imaginary member",
            )],
            confidences: IndexMap::new(),
        };
        let plan = planner().plan_with_advice(&proxy, &advice);

        // The group is discarded; greedy still merges the real pair.
        assert_eq!(plan.bundles().len(), 1);
        assert!(plan.warnings().iter().any(|w| w.contains("does not exist")));
    }

    #[test]
    fn empty_proxy_plans_nothing() {
        let proxy = ProxyModel::new("empty", UpstreamService::new("e", "https://e"));
        let plan = planner().plan(&proxy);
        assert!(plan.bundles().is_empty());
        assert_eq!(plan.saved_constructs(), 0);
    }
}
