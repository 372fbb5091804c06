//! `AlertManager`: on-demand threshold checks over a `SessionCollector`
//! (spec §4.8).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lumen_types::BudgetConstraints;
use tokio::sync::Mutex;

use crate::collector::SessionCollector;

/// How severe a fired alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational; below the warn threshold.
    Info,
    /// Warn threshold crossed.
    Warn,
    /// Critical threshold crossed.
    Critical,
}

/// One fired alert.
#[derive(Debug, Clone)]
pub struct Alert {
    /// Stable identifier, stable across repeated firings of the same
    /// condition, used for deduplication and history lookups.
    pub id: String,
    /// How severe this firing is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// When this firing was recorded.
    pub fired_at: DateTime<Utc>,
}

/// Thresholds the `AlertManager` checks on every call. Defaults match
/// spec §4.8.
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    /// Fraction of `SessionBudgetUSD` that triggers an info alert.
    pub budget_info: f64,
    /// Fraction of `SessionBudgetUSD` that triggers a warn alert.
    pub budget_warn: f64,
    /// Fraction of `SessionBudgetUSD` that triggers a critical alert.
    pub budget_critical: f64,
    /// Per-agent duration (ms) that triggers a warn alert.
    pub agent_sla_warn_ms: u64,
    /// Per-agent duration (ms) that triggers a critical alert.
    pub agent_sla_critical_ms: u64,
    /// Whole-session duration (ms) that triggers a warn alert.
    pub session_sla_warn_ms: u64,
    /// Whole-session duration (ms) that triggers a critical alert.
    pub session_sla_critical_ms: u64,
    /// Per-agent error rate that triggers a warn alert.
    pub error_rate_warn: f64,
    /// Per-agent error rate that triggers a critical alert.
    pub error_rate_critical: f64,
    /// Average per-agent memory delta (MiB) that triggers a warn alert.
    pub memory_warn_mib: f64,
    /// Average per-agent memory delta (MiB) that triggers a critical alert.
    pub memory_critical_mib: f64,
    /// How long a fired alert ID is suppressed from firing again.
    pub dedup_window: Duration,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            budget_info: 0.50,
            budget_warn: 0.80,
            budget_critical: 1.00,
            agent_sla_warn_ms: 5_000,
            agent_sla_critical_ms: 15_000,
            session_sla_warn_ms: 30_000,
            session_sla_critical_ms: 60_000,
            error_rate_warn: 0.10,
            error_rate_critical: 0.25,
            memory_warn_mib: 100.0,
            memory_critical_mib: 500.0,
            dedup_window: Duration::from_secs(300),
        }
    }
}

/// Checks `SessionCollector` snapshots against `AlertThresholds`, deduplicates
/// repeated firings within a window, and retains resolved alerts in history.
pub struct AlertManager {
    thresholds: AlertThresholds,
    last_fired: Mutex<HashMap<String, DateTime<Utc>>>,
    history: Mutex<Vec<Alert>>,
}

impl AlertManager {
    /// Construct a manager with the given thresholds.
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds, last_fired: Mutex::new(HashMap::new()), history: Mutex::new(Vec::new()) }
    }

    /// Evaluate every threshold against `collector`'s current state plus the
    /// session's budget constraints and elapsed wall-clock duration,
    /// returning every newly-fired (non-deduplicated) alert.
    pub async fn check(
        &self,
        collector: &SessionCollector,
        budget: &BudgetConstraints,
        session_elapsed_ms: u64,
    ) -> Vec<Alert> {
        let mut candidates = Vec::new();
        self.check_budget(collector, budget, &mut candidates);
        self.check_session_sla(session_elapsed_ms, &mut candidates);
        self.check_agent_thresholds(collector, &mut candidates);

        let mut fired = Vec::new();
        let mut last_fired = self.last_fired.lock().await;
        let now = Utc::now();
        for alert in candidates {
            let due = match last_fired.get(&alert.id) {
                Some(prev) => now.signed_duration_since(*prev).to_std().unwrap_or(Duration::ZERO) >= self.thresholds.dedup_window,
                None => true,
            };
            if due {
                last_fired.insert(alert.id.clone(), now);
                fired.push(alert);
            }
        }
        drop(last_fired);

        if !fired.is_empty() {
            self.history.lock().await.extend(fired.iter().cloned());
        }
        fired
    }

    /// Every alert ever fired this manager's lifetime, resolved or not.
    pub async fn history(&self) -> Vec<Alert> {
        self.history.lock().await.clone()
    }

    fn check_budget(&self, collector: &SessionCollector, budget: &BudgetConstraints, out: &mut Vec<Alert>) {
        if budget.session_budget_usd <= 0.0 {
            return;
        }
        let fraction = collector.total_cost_usd() / budget.session_budget_usd;
        let (severity, threshold) = if fraction >= self.thresholds.budget_critical {
            (Severity::Critical, self.thresholds.budget_critical)
        } else if fraction >= self.thresholds.budget_warn {
            (Severity::Warn, self.thresholds.budget_warn)
        } else if fraction >= self.thresholds.budget_info {
            (Severity::Info, self.thresholds.budget_info)
        } else {
            return;
        };
        out.push(Alert {
            id: "budget".to_string(),
            severity,
            message: format!("session budget at {:.0}% (threshold {:.0}%)", fraction * 100.0, threshold * 100.0),
            fired_at: Utc::now(),
        });
    }

    fn check_session_sla(&self, session_elapsed_ms: u64, out: &mut Vec<Alert>) {
        let severity = if session_elapsed_ms >= self.thresholds.session_sla_critical_ms {
            Some(Severity::Critical)
        } else if session_elapsed_ms >= self.thresholds.session_sla_warn_ms {
            Some(Severity::Warn)
        } else {
            None
        };
        if let Some(severity) = severity {
            out.push(Alert {
                id: "session_sla".to_string(),
                severity,
                message: format!("session duration {session_elapsed_ms}ms exceeded SLA"),
                fired_at: Utc::now(),
            });
        }
    }

    fn check_agent_thresholds(&self, collector: &SessionCollector, out: &mut Vec<Alert>) {
        for (agent_id, stats) in collector.agent_stats() {
            if let Some(severity) = self.level(stats.max_ms, self.thresholds.agent_sla_warn_ms, self.thresholds.agent_sla_critical_ms) {
                out.push(Alert {
                    id: format!("agent_sla:{agent_id}"),
                    severity,
                    message: format!("agent {agent_id} max duration {}ms exceeded SLA", stats.max_ms),
                    fired_at: Utc::now(),
                });
            }
            if stats.count > 0 {
                if let Some(severity) = self.level_f64(stats.error_rate(), self.thresholds.error_rate_warn, self.thresholds.error_rate_critical) {
                    out.push(Alert {
                        id: format!("error_rate:{agent_id}"),
                        severity,
                        message: format!("agent {agent_id} error rate {:.0}%", stats.error_rate() * 100.0),
                        fired_at: Utc::now(),
                    });
                }
                if let Some(severity) = self.level_f64(stats.avg_memory_delta_mib(), self.thresholds.memory_warn_mib, self.thresholds.memory_critical_mib) {
                    out.push(Alert {
                        id: format!("memory:{agent_id}"),
                        severity,
                        message: format!("agent {agent_id} avg memory delta {:.1}MiB", stats.avg_memory_delta_mib()),
                        fired_at: Utc::now(),
                    });
                }
            }
        }
    }

    fn level(&self, value: u64, warn: u64, critical: u64) -> Option<Severity> {
        if value >= critical {
            Some(Severity::Critical)
        } else if value >= warn {
            Some(Severity::Warn)
        } else {
            None
        }
    }

    fn level_f64(&self, value: f64, warn: f64, critical: f64) -> Option<Severity> {
        if value >= critical {
            Some(Severity::Critical)
        } else if value >= warn {
            Some(Severity::Warn)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(session_budget_usd: f64) -> BudgetConstraints {
        BudgetConstraints {
            session_budget_usd,
            agent_budget_usd: 1.0,
            warning_threshold: 0.8,
            emergency_degradation_enabled: false,
            critical_agents: Default::default(),
        }
    }

    #[tokio::test]
    async fn budget_alert_fires_once_within_dedup_window() {
        let manager = AlertManager::new(AlertThresholds::default());
        let collector = SessionCollector::new();
        collector.record_call("openai", "gpt-4o", 100, 9.0);

        let first = manager.check(&collector, &budget(10.0), 0).await;
        assert!(first.iter().any(|a| a.id == "budget" && a.severity == Severity::Critical));

        let second = manager.check(&collector, &budget(10.0), 0).await;
        assert!(second.iter().all(|a| a.id != "budget"), "duplicate firing within dedup window");
    }

    #[tokio::test]
    async fn agent_error_rate_alert_fires_above_threshold() {
        let manager = AlertManager::new(AlertThresholds::default());
        let collector = SessionCollector::new();
        collector.record_agent_execution("flaky", 10, 0, true);
        collector.record_agent_execution("flaky", 10, 0, true);
        collector.record_agent_execution("flaky", 10, 0, false);

        let fired = manager.check(&collector, &budget(1000.0), 0).await;
        assert!(fired.iter().any(|a| a.id == "error_rate:flaky" && a.severity == Severity::Critical));
    }

    #[tokio::test]
    async fn history_retains_every_fired_alert() {
        let manager = AlertManager::new(AlertThresholds::default());
        let collector = SessionCollector::new();
        collector.record_call("openai", "gpt-4o", 100, 9.0);
        manager.check(&collector, &budget(10.0), 0).await;

        assert!(!manager.history().await.is_empty());
    }
}
