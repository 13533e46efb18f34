//! AlertGate - Dispatch Gating Policy
//!
//! ## Responsibilities
//!
//! - Cooldown enforcement (short for critical threats, longer otherwise)
//! - Score floor for non-critical dispatches
//! - Per-type deduplication via the composite type tag
//!
//! `should_dispatch` is a pure function of the assessment and recorded
//! state; mutation happens only through `record_dispatch`. The state sits
//! behind an RwLock so fusion and any other caller serialize on it.

use crate::models::ThreatAssessment;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// Cooldown policy
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Minimum gap between critical-threat alerts
    pub high_threat_cooldown: std::time::Duration,
    /// Minimum gap between normal alerts of the same type
    pub normal_cooldown: std::time::Duration,
    /// Non-critical assessments below this score are never dispatched
    pub dispatch_score_floor: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            high_threat_cooldown: std::time::Duration::from_secs(10),
            normal_cooldown: std::time::Duration::from_secs(30),
            dispatch_score_floor: 50,
        }
    }
}

/// Bookkeeping for the last dispatched alert
#[derive(Debug, Clone, Default)]
pub struct GateState {
    pub last_dispatched_at: Option<DateTime<Utc>>,
    pub last_dispatched_type: Option<String>,
}

/// Stateful dispatch gatekeeper, one per session
pub struct AlertGate {
    config: GateConfig,
    state: RwLock<GateState>,
}

impl AlertGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            state: RwLock::new(GateState::default()),
        }
    }

    /// Decide whether to dispatch this assessment now.
    pub async fn should_dispatch(&self, assessment: &ThreatAssessment, now: DateTime<Utc>) -> bool {
        let state = self.state.read().await;
        decide(&self.config, &state, assessment, now)
    }

    /// Record a dispatch decision. Called unconditionally on every positive
    /// decision, critical or not.
    pub async fn record_dispatch(&self, assessment: &ThreatAssessment, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.last_dispatched_at = Some(now);
        state.last_dispatched_type = Some(assessment.type_tag());
    }

    pub async fn state(&self) -> GateState {
        self.state.read().await.clone()
    }
}

/// Pure decision function over the gate policy.
fn decide(
    config: &GateConfig,
    state: &GateState,
    assessment: &ThreatAssessment,
    now: DateTime<Utc>,
) -> bool {
    let elapsed_exceeds = |cooldown: std::time::Duration| -> bool {
        match state.last_dispatched_at {
            None => true,
            Some(last) => {
                now - last > Duration::from_std(cooldown).unwrap_or(Duration::zero())
            }
        }
    };

    if assessment.has_critical_threat {
        return elapsed_exceeds(config.high_threat_cooldown);
    }

    if assessment.score < config.dispatch_score_floor {
        return false;
    }

    let type_changed = state
        .last_dispatched_type
        .as_deref()
        .map(|last| last != assessment.type_tag())
        .unwrap_or(true);

    elapsed_exceeds(config.normal_cooldown) || type_changed
}
