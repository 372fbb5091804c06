use std::collections::BTreeSet;

use lumen_scheduler::compute_levels;
use lumen_types::{AgentConfig, LumenError};
use proptest::prelude::*;

fn agent(id: usize, deps: &[usize]) -> AgentConfig {
    AgentConfig {
        id: format!("a{id}"),
        enabled: true,
        depends_on: deps.iter().map(|d| format!("a{d}")).collect::<BTreeSet<_>>(),
        timeout_ms: 1_000,
        retry: 0,
        conditions: vec![],
    }
}

/// Builds a random forest: agent `i` may depend on at most one strictly
/// lower-indexed agent, which rules out cycles by construction. Each slot
/// draws an unconstrained index and folds it into `[0, i]`, mapping `i`
/// itself to "no dependency".
fn forest(size: usize) -> impl Strategy<Value = Vec<AgentConfig>> {
    proptest::collection::vec(any::<u16>(), size).prop_map(move |raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, r)| {
                if i == 0 {
                    agent(i, &[])
                } else {
                    let parent = r as usize % (i + 1);
                    if parent == i { agent(i, &[]) } else { agent(i, &[parent]) }
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn every_agent_outranks_its_dependencies(agents in forest(12)) {
        let levels = compute_levels(&agents).unwrap();
        let level_of: std::collections::HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .flat_map(|(level, group)| group.iter().map(move |a| (a.id.as_str(), level)))
            .collect();

        for a in &agents {
            for dep in &a.depends_on {
                prop_assert!(level_of[a.id.as_str()] > level_of[dep.as_str()]);
            }
        }
    }

    #[test]
    fn a_cycle_among_otherwise_acyclic_agents_is_always_rejected(agents in forest(8)) {
        let mut agents = agents;
        // Force a cycle between the first two agents regardless of what the
        // forest strategy picked for them.
        agents[0].depends_on = BTreeSet::from([agents[1].id.clone()]);
        agents[1].depends_on = BTreeSet::from([agents[0].id.clone()]);

        let err = compute_levels(&agents).unwrap_err();
        prop_assert!(matches!(err, LumenError::CycleDetected { .. }));
    }
}
