//! Dependency-levelized topological ordering for Parallel mode.
//!
//! Grounded on the same wave-building idea as a classic Kahn's-algorithm
//! dependency resolver: repeatedly peel off the set of not-yet-placed,
//! enabled agents whose dependencies are already satisfied. An iteration
//! that places nothing while agents remain is a cycle.

use std::collections::HashSet;

use lumen_types::{AgentConfig, LumenError};

/// Group `agents` (already filtered to enabled-only by the caller) into
/// levels: level 0 holds every agent whose `depends_on` are all absent from
/// the enabled set or already placed; level k+1 holds agents whose
/// `depends_on` are all satisfied by levels `<= k`.
pub fn compute_levels(agents: &[AgentConfig]) -> Result<Vec<Vec<AgentConfig>>, LumenError> {
    let enabled_ids: HashSet<&str> = agents.iter().map(|a| a.id.as_str()).collect();
    let mut remaining: Vec<&AgentConfig> = agents.iter().collect();
    let mut completed: HashSet<String> = HashSet::new();
    let mut levels = Vec::new();

    while !remaining.is_empty() {
        let (ready, not_ready): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|a| {
            a.depends_on
                .iter()
                .all(|dep| !enabled_ids.contains(dep.as_str()) || completed.contains(dep))
        });

        if ready.is_empty() {
            let stuck: Vec<&str> = not_ready.iter().map(|a| a.id.as_str()).collect();
            return Err(LumenError::cycle_detected(format!(
                "no agent can be placed; unresolvable dependencies among: {}",
                stuck.join(", ")
            )));
        }

        for agent in &ready {
            completed.insert(agent.id.clone());
        }
        levels.push(ready.into_iter().cloned().collect());
        remaining = not_ready;
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn agent(id: &str, deps: &[&str]) -> AgentConfig {
        AgentConfig {
            id: id.to_string(),
            enabled: true,
            depends_on: deps.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            timeout_ms: 1_000,
            retry: 0,
            conditions: vec![],
        }
    }

    #[test]
    fn diamond_levelizes_correctly() {
        let agents = vec![
            agent("root", &[]),
            agent("left", &["root"]),
            agent("right", &["root"]),
            agent("merge", &["left", "right"]),
        ];
        let levels = compute_levels(&agents).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].len(), 1);
        assert_eq!(levels[0][0].id, "root");
        assert_eq!(levels[1].len(), 2);
        assert_eq!(levels[2][0].id, "merge");
    }

    #[test]
    fn cycle_is_detected() {
        let agents = vec![agent("a", &["b"]), agent("b", &["a"])];
        let err = compute_levels(&agents).unwrap_err();
        assert!(matches!(err, LumenError::CycleDetected { .. }));
    }

    #[test]
    fn independent_agents_share_one_level() {
        let agents = vec![agent("a", &[]), agent("b", &[]), agent("c", &[])];
        let levels = compute_levels(&agents).unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].len(), 3);
    }
}
