//! Heuristic risk scoring: base score from the tool-name pattern table,
//! argument keyword boosts, and behavior-based escalation.

mod behavior;
mod patterns;

pub use behavior::{BehaviorStore, SqliteBehaviorStore};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::policy::glob_match;

const DEFAULT_WINDOW_MS: i64 = 5 * 60 * 1000;
const DEFAULT_DENY_THRESHOLD: u8 = 85;
const DEFAULT_FLAG_THRESHOLD: u8 = 60;
const DEFAULT_REVOKE_AFTER: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskVerdict {
    Allow,
    Flag,
    Deny,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskScore {
    pub score: u8,
    pub base: u8,
    pub arg_boost: u8,
    pub behavior_boost: u8,
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

impl RiskScore {
    pub fn verdict(&self, thresholds: &RiskThresholds) -> RiskVerdict {
        if self.score >= thresholds.deny {
            RiskVerdict::Deny
        } else if self.score >= thresholds.flag {
            RiskVerdict::Flag
        } else {
            RiskVerdict::Allow
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RiskThresholds {
    pub deny: u8,
    pub flag: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            deny: DEFAULT_DENY_THRESHOLD,
            flag: DEFAULT_FLAG_THRESHOLD,
        }
    }
}

/// `(tool-name glob pattern, base score)` pairs supplied by the operator,
/// consulted before the built-in table.
pub type CustomPattern = (String, u8);

pub struct RiskEngine<B: BehaviorStore> {
    custom_patterns: Vec<CustomPattern>,
    thresholds: RiskThresholds,
    window_ms: i64,
    revoke_after: u32,
    behavior: B,
}

impl<B: BehaviorStore> RiskEngine<B> {
    pub fn new(behavior: B) -> Self {
        Self {
            custom_patterns: Vec::new(),
            thresholds: RiskThresholds::default(),
            window_ms: DEFAULT_WINDOW_MS,
            revoke_after: DEFAULT_REVOKE_AFTER,
            behavior,
        }
    }

    pub fn with_custom_patterns(mut self, patterns: Vec<CustomPattern>) -> Self {
        self.custom_patterns = patterns;
        self
    }

    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> RiskThresholds {
        self.thresholds
    }

    fn base_score(&self, tool_name: &str) -> u8 {
        for (pattern, score) in &self.custom_patterns {
            if glob_match(pattern, tool_name) {
                return *score;
            }
        }
        for (pattern, score) in patterns::BUILTIN_BASE_PATTERNS {
            if glob_match(pattern, tool_name) {
                return *score;
            }
        }
        patterns::DEFAULT_BASE_SCORE
    }

    /// Compute a risk score for a single tool call. `now_ms` is the caller's
    /// current time (milliseconds since epoch), threaded through explicitly
    /// so the sliding window is deterministic in tests.
    pub fn score(
        &self,
        tool_name: &str,
        arguments_json: Option<&str>,
        subject_id: &str,
        now_ms: i64,
    ) -> Result<RiskScore> {
        let base = self.base_score(tool_name);
        let mut reasons = vec![format!("base score {base} from tool-name pattern")];

        let (arg_boost, arg_reasons) = arguments_json
            .map(patterns::argument_boost)
            .unwrap_or((0, Vec::new()));
        reasons.extend(arg_reasons);

        let cutoff_ms = now_ms - self.window_ms;
        let behavior_count = self.behavior.count(subject_id, cutoff_ms)?;
        let behavior_boost = (u32::from(behavior_count) * 5).min(100) as u8;
        if behavior_boost > 0 {
            reasons.push(format!(
                "{behavior_count} high-risk action(s) for this subject in the last window"
            ));
        }

        let total = u32::from(base) + u32::from(arg_boost) + u32::from(behavior_boost);
        let score = total.min(100) as u8;

        let level = if score >= self.thresholds.deny {
            RiskLevel::Critical
        } else if score >= self.thresholds.flag {
            RiskLevel::High
        } else if score >= 30 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        if score >= self.thresholds.flag {
            self.behavior.record(subject_id, now_ms)?;
        }

        Ok(RiskScore {
            score,
            base,
            arg_boost,
            behavior_boost,
            level,
            reasons,
        })
    }

    pub fn evaluate(&self, score: &RiskScore) -> RiskVerdict {
        score.verdict(&self.thresholds)
    }

    pub fn should_revoke(&self, subject_id: &str, now_ms: i64) -> Result<bool> {
        let cutoff_ms = now_ms - self.window_ms;
        Ok(self.behavior.count(subject_id, cutoff_ms)? >= self.revoke_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use behavior::SqliteBehaviorStore;

    fn engine() -> RiskEngine<SqliteBehaviorStore> {
        RiskEngine::new(SqliteBehaviorStore::open_in_memory().unwrap())
    }

    /// Read-only tools score low and are allowed.
    #[test]
    fn read_file_is_low_risk_and_allowed() {
        let engine = engine();
        let score = engine.score("ReadFile", None, "agent-1", 0).unwrap();
        assert!(score.score <= 20);
        assert_eq!(score.level, RiskLevel::Low);
        assert_eq!(engine.evaluate(&score), RiskVerdict::Allow);
    }

    /// A bare delete call is high risk and gets flagged.
    #[test]
    fn delete_file_is_high_risk_and_flagged() {
        let engine = engine();
        let score = engine.score("DeleteFile", None, "agent-2", 0).unwrap();
        assert!(score.score >= 60);
        assert_eq!(score.level, RiskLevel::High);
        assert_eq!(engine.evaluate(&score), RiskVerdict::Flag);
    }

    /// A delete call with a destructive argument crosses the deny threshold.
    #[test]
    fn delete_with_rm_rf_is_denied_at_lower_threshold() {
        let engine = engine().with_thresholds(RiskThresholds { deny: 70, flag: 60 });
        let score = engine
            .score("DeleteFile", Some(r#"{"cmd":"rm -rf /"}"#), "agent-3", 0)
            .unwrap();
        assert_eq!(engine.evaluate(&score), RiskVerdict::Deny);
    }

    /// Repeated high-risk actions escalate via the behavior boost.
    #[test]
    fn risk_monotonicity_under_repetition() {
        let engine = engine();
        let subject = "repeat-offender";

        let s1 = engine.score("DeleteFile", None, subject, 0).unwrap();
        let s2 = engine.score("DeleteFile", None, subject, 1_000).unwrap();
        let s3 = engine.score("DeleteFile", None, subject, 2_000).unwrap();

        assert!(s2.score >= s1.score);
        assert!(s3.score >= s2.score);
        assert!(s3.behavior_boost > 0);
    }

    #[test]
    fn should_revoke_after_threshold_events() {
        let engine = engine();
        let subject = "frequent-flyer";
        for i in 0..5 {
            engine
                .score("DeleteFile", None, subject, i * 1_000)
                .unwrap();
        }
        assert!(engine.should_revoke(subject, 5_000).unwrap());
    }

    #[test]
    fn custom_patterns_are_checked_before_builtins() {
        let engine = RiskEngine::new(SqliteBehaviorStore::open_in_memory().unwrap())
            .with_custom_patterns(vec![("ReadFile".to_string(), 95)]);
        let score = engine.score("ReadFile", None, "agent-4", 0).unwrap();
        assert_eq!(score.base, 95);
    }
}
