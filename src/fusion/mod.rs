//! FusionEngine - Composite Threat Scoring
//!
//! ## Responsibilities
//!
//! - Combine the latest reading from each source into one ThreatAssessment
//! - Additive numeric score with fixed per-category weights
//! - Qualitative severity from the weighted average of fired categories
//! - 1s fusion tick driving the alert gate and dispatcher
//!
//! Weights are fixed for reproducibility; they encode the consolidated
//! final-revision policy.

use crate::alert_gate::AlertGate;
use crate::dispatch::AlertDispatcher;
use crate::models::{SensorSnapshot, Severity, ThreatAssessment};
use crate::sensor_state::SharedSensorState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Weapon-class objects and their score contributions
const WEAPON_SCORES: [(&str, u32); 2] = [("knife", 150), ("scissors", 120)];

const FIRE_SCORE: u32 = 130;
const CROWD_SCORE: u32 = 60;

/// Acoustic event types that contribute regardless of intensity
const ACOUSTIC_MATCH_EVENTS: [&str; 2] = ["explosion", "gunshot"];
const ACOUSTIC_MATCH_SCORE: u32 = 70;
const ACOUSTIC_LOUD_DB: f64 = 70.0;
const ACOUSTIC_LOUD_SCORE: u32 = 40;
const ACOUSTIC_MODERATE_DB: f64 = 40.0;
const ACOUSTIC_MODERATE_SCORE: u32 = 20;
/// Below this an acoustic event is qualitatively "low"
const ACOUSTIC_LOW_DB: f64 = 20.0;

const FREQ_HIGH_HZ: f64 = 2000.0;
const FREQ_HIGH_SCORE: u32 = 30;
const FREQ_MID_HZ: f64 = 1200.0;
const FREQ_MID_SCORE: u32 = 20;
const FREQ_LOW_HZ: f64 = 700.0;
const FREQ_LOW_SCORE: u32 = 15;

/// Qualitative category weights used for severity averaging
const WEIGHT_LOW: f64 = 0.3;
const WEIGHT_MEDIUM: f64 = 0.6;
/// Frequency band 1200-2000 Hz sits between medium and high
const WEIGHT_MEDIUM_HIGH: f64 = 0.75;
const WEIGHT_HIGH: f64 = 0.9;

fn base_score(severity: Severity) -> u32 {
    match severity {
        Severity::None => 0,
        Severity::Low => 20,
        Severity::Medium => 50,
        Severity::High => 80,
    }
}

fn quantize(avg_weight: f64) -> Severity {
    if avg_weight >= 0.7 {
        Severity::High
    } else if avg_weight >= 0.4 {
        Severity::Medium
    } else if avg_weight > 0.0 {
        Severity::Low
    } else {
        Severity::None
    }
}

/// Compute a ThreatAssessment from one snapshot.
///
/// Pure: same snapshot and clock always yield the same assessment.
pub fn assess(snapshot: &SensorSnapshot, now: DateTime<Utc>) -> ThreatAssessment {
    let mut score: u32 = 0;
    let mut tags: Vec<String> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    let mut parts: Vec<String> = Vec::new();
    let mut weapon_present = false;
    let mut fire_present = false;

    if let Some(video) = &snapshot.video {
        for (object, points) in WEAPON_SCORES {
            if video.detected_objects.contains(object) {
                weapon_present = true;
                score += points;
                parts.push(format!("weapon object detected ({})", object));
            }
        }
        if weapon_present {
            tags.push("weapon".to_string());
            weights.push(WEIGHT_HIGH);
        }

        if video.is_fire {
            fire_present = true;
            score += FIRE_SCORE;
            tags.push("fire".to_string());
            weights.push(WEIGHT_HIGH);
            parts.push("fire detected".to_string());
        }

        if video.is_crowded {
            score += CROWD_SCORE;
            tags.push("crowd".to_string());
            weights.push(WEIGHT_MEDIUM);
            parts.push("crowded scene".to_string());
        }
    }

    if let Some(acoustic) = &snapshot.acoustic {
        let event_type = acoustic.event_type.to_lowercase();
        let contribution = if ACOUSTIC_MATCH_EVENTS.contains(&event_type.as_str()) {
            Some(ACOUSTIC_MATCH_SCORE)
        } else if acoustic.intensity_db > ACOUSTIC_LOUD_DB {
            Some(ACOUSTIC_LOUD_SCORE)
        } else if acoustic.intensity_db > ACOUSTIC_MODERATE_DB {
            Some(ACOUSTIC_MODERATE_SCORE)
        } else {
            None
        };

        if let Some(points) = contribution {
            score += points;
            tags.push("audio_anomaly".to_string());
            weights.push(if acoustic.intensity_db > ACOUSTIC_LOUD_DB {
                WEIGHT_HIGH
            } else if acoustic.intensity_db > ACOUSTIC_LOW_DB {
                WEIGHT_MEDIUM
            } else {
                WEIGHT_LOW
            });
            parts.push(format!(
                "acoustic event '{}' at {:.1} dB",
                acoustic.event_type, acoustic.intensity_db
            ));
        }
    }

    if let Some(frequency) = &snapshot.frequency {
        let contribution = if frequency.hz > FREQ_HIGH_HZ {
            Some((FREQ_HIGH_SCORE, WEIGHT_HIGH))
        } else if frequency.hz > FREQ_MID_HZ {
            Some((FREQ_MID_SCORE, WEIGHT_MEDIUM_HIGH))
        } else if frequency.hz > FREQ_LOW_HZ {
            Some((FREQ_LOW_SCORE, WEIGHT_MEDIUM))
        } else {
            None
        };

        if let Some((points, weight)) = contribution {
            score += points;
            tags.push("anomaly".to_string());
            weights.push(weight);
            parts.push(format!("frequency spike at {:.0} Hz", frequency.hz));
        }
    }

    let severity = if weights.is_empty() {
        Severity::None
    } else {
        quantize(weights.iter().sum::<f64>() / weights.len() as f64)
    };
    score += base_score(severity);

    let has_critical_threat = weapon_present || fire_present || severity == Severity::High;

    if tags.is_empty() {
        tags.push("none".to_string());
    }
    let description = if parts.is_empty() {
        "no threat indicators".to_string()
    } else {
        parts.join("; ")
    };

    ThreatAssessment {
        types: tags,
        severity,
        score,
        description,
        has_critical_threat,
        source: snapshot.clone(),
        computed_at: now,
    }
}

/// Fusion tick loop: expire staleness, assess, gate, dispatch.
///
/// The gate records every positive decision unconditionally, whether or not
/// the dispatch itself succeeded; transport failures are scoped to one tick.
pub async fn run_fusion_loop(
    shared: Arc<SharedSensorState>,
    gate: Arc<AlertGate>,
    dispatcher: Arc<AlertDispatcher>,
    tick_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(tick_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = Utc::now();
        shared.expire_stale(now).await;
        let snapshot = shared.snapshot(now).await;
        let assessment = assess(&snapshot, now);

        tracing::debug!(
            score = assessment.score,
            severity = assessment.severity.as_str(),
            types = %assessment.type_tag(),
            critical = assessment.has_critical_threat,
            "Fusion tick"
        );

        if gate.should_dispatch(&assessment, now).await {
            if let Err(e) = dispatcher.dispatch(&assessment).await {
                tracing::warn!(error = %e, "Alert dispatch failed");
            }
            gate.record_dispatch(&assessment, now).await;
        }
    }

    tracing::debug!("Fusion loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AcousticEvent, FrequencyReading, VideoDetection};
    use std::collections::BTreeSet;

    fn empty_snapshot(now: DateTime<Utc>) -> SensorSnapshot {
        SensorSnapshot {
            video: None,
            acoustic: None,
            frequency: None,
            camera_active: false,
            taken_at: now,
        }
    }

    fn video(objects: &[&str], crowded: bool, fire: bool, now: DateTime<Utc>) -> VideoDetection {
        VideoDetection {
            detected_objects: objects.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            is_crowded: crowded,
            is_fire: fire,
            captured_at: now,
        }
    }

    #[test]
    fn empty_snapshot_scores_zero() {
        let now = Utc::now();
        let a = assess(&empty_snapshot(now), now);
        assert_eq!(a.score, 0);
        assert_eq!(a.severity, Severity::None);
        assert!(!a.has_critical_threat);
        assert_eq!(a.types, vec!["none"]);
    }

    #[test]
    fn knife_is_critical() {
        let now = Utc::now();
        let mut snap = empty_snapshot(now);
        snap.video = Some(video(&["person", "knife"], false, false, now));

        let a = assess(&snap, now);
        assert!(a.has_critical_threat);
        assert!(a.score >= 150);
        // knife 150 + high base 80
        assert_eq!(a.score, 230);
        assert_eq!(a.severity, Severity::High);
        assert_eq!(a.types, vec!["weapon"]);
    }

    #[test]
    fn scissors_scores_below_knife() {
        let now = Utc::now();
        let mut snap = empty_snapshot(now);
        snap.video = Some(video(&["scissors"], false, false, now));

        let a = assess(&snap, now);
        assert_eq!(a.score, 200);
        assert!(a.has_critical_threat);
    }

    #[test]
    fn explosion_at_80_db_is_critical_high() {
        // acoustic match +70, intensity > 70 dB resolves the category to
        // high, avg 0.9 quantizes high, base +80 -> 150
        let now = Utc::now();
        let mut snap = empty_snapshot(now);
        snap.acoustic = Some(AcousticEvent {
            event_type: "Explosion".to_string(),
            intensity_db: 80.0,
            observed_at: now,
        });

        let a = assess(&snap, now);
        assert_eq!(a.score, 150);
        assert_eq!(a.severity, Severity::High);
        assert!(a.has_critical_threat);
        assert_eq!(a.types, vec!["audio_anomaly"]);
    }

    #[test]
    fn quiet_acoustic_event_does_not_fire() {
        let now = Utc::now();
        let mut snap = empty_snapshot(now);
        snap.acoustic = Some(AcousticEvent {
            event_type: "hum".to_string(),
            intensity_db: 35.0,
            observed_at: now,
        });

        let a = assess(&snap, now);
        assert_eq!(a.score, 0);
        assert_eq!(a.severity, Severity::None);
    }

    #[test]
    fn loud_unmatched_acoustic_contributes_forty() {
        let now = Utc::now();
        let mut snap = empty_snapshot(now);
        snap.acoustic = Some(AcousticEvent {
            event_type: "shout".to_string(),
            intensity_db: 75.0,
            observed_at: now,
        });

        let a = assess(&snap, now);
        // 40 + high base 80 (0.9 alone averages 0.9)
        assert_eq!(a.score, 120);
        assert!(a.has_critical_threat);
    }

    #[test]
    fn crowd_alone_is_medium_not_critical() {
        let now = Utc::now();
        let mut snap = empty_snapshot(now);
        snap.video = Some(video(&[], true, false, now));

        let a = assess(&snap, now);
        // crowd 60 + medium base 50
        assert_eq!(a.score, 110);
        assert_eq!(a.severity, Severity::Medium);
        assert!(!a.has_critical_threat);
        assert_eq!(a.types, vec!["crowd"]);
    }

    #[test]
    fn frequency_bands() {
        let now = Utc::now();
        for (hz, points, severity) in [
            (2400.0, FREQ_HIGH_SCORE, Severity::High),
            (1500.0, FREQ_MID_SCORE, Severity::High), // 0.75 quantizes high
            (900.0, FREQ_LOW_SCORE, Severity::Medium),
        ] {
            let mut snap = empty_snapshot(now);
            snap.frequency = Some(FrequencyReading {
                hz,
                observed_at: now,
            });
            let a = assess(&snap, now);
            assert_eq!(a.score, points + base_score(severity), "hz {}", hz);
            assert_eq!(a.severity, severity, "hz {}", hz);
        }

        // at or below 700 Hz nothing fires
        let mut snap = empty_snapshot(now);
        snap.frequency = Some(FrequencyReading {
            hz: 440.0,
            observed_at: now,
        });
        assert_eq!(assess(&snap, now).score, 0);
    }

    #[test]
    fn combined_categories_average_severity() {
        let now = Utc::now();
        let mut snap = empty_snapshot(now);
        // crowd (0.6) + moderate acoustic (0.6) -> avg 0.6 -> medium
        snap.video = Some(video(&[], true, false, now));
        snap.acoustic = Some(AcousticEvent {
            event_type: "chatter".to_string(),
            intensity_db: 50.0,
            observed_at: now,
        });

        let a = assess(&snap, now);
        assert_eq!(a.severity, Severity::Medium);
        // crowd 60 + acoustic 20 + base 50
        assert_eq!(a.score, 130);
        assert_eq!(a.types, vec!["crowd", "audio_anomaly"]);
        assert!(!a.has_critical_threat);
    }

    #[test]
    fn tag_priority_order_is_stable() {
        let now = Utc::now();
        let mut snap = empty_snapshot(now);
        snap.video = Some(video(&["knife"], true, true, now));
        snap.acoustic = Some(AcousticEvent {
            event_type: "gunshot".to_string(),
            intensity_db: 90.0,
            observed_at: now,
        });
        snap.frequency = Some(FrequencyReading {
            hz: 2500.0,
            observed_at: now,
        });

        let a = assess(&snap, now);
        assert_eq!(
            a.types,
            vec!["weapon", "fire", "crowd", "audio_anomaly", "anomaly"]
        );
        assert!(a.has_critical_threat);
        // 150 + 130 + 60 + 70 + 30 + high base 80
        assert_eq!(a.score, 520);
    }

    #[test]
    fn assessment_carries_source_snapshot() {
        let now = Utc::now();
        let mut snap = empty_snapshot(now);
        snap.frequency = Some(FrequencyReading {
            hz: 900.0,
            observed_at: now,
        });

        let a = assess(&snap, now);
        assert_eq!(a.source.frequency.unwrap().hz, 900.0);
        assert_eq!(a.computed_at, now);
    }
}
