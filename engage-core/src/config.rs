//! Tunables for a single engagement run.
//!
//! All fields have defaults that match production operation; tests
//! typically override `max_cycles` and the per-loop budgets downward to
//! exercise exhaustion paths cheaply.

/// Budgets and limits for one engagement's processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementConfig {
    /// Maximum number of planner drain cycles before the engagement
    /// releases back to `idle` regardless of outcome.
    pub max_cycles: usize,
    /// Maximum validation-retry round trips before a planner turn's
    /// validation failure becomes fatal.
    pub max_validation_retries: usize,
    /// Maximum discussions included in a single context build; oldest
    /// dropped first.
    pub max_discussions: usize,
    /// Maximum concurrent `explore` tool calls within one planner turn.
    pub max_parallel_explorers: usize,
    /// Maximum model/tool round trips within one planner turn before a
    /// missing `submit_actions` call is treated as a retryable failure
    /// rather than looped on forever.
    pub max_explore_rounds: usize,
    /// Maximum spec-generator loop iterations before giving up and posting
    /// a partial spec with a budget-exhaustion note.
    pub max_spec_iterations: usize,
    /// Maximum `locate` tool calls across a spec-generator run.
    pub max_locate_calls: usize,
    /// Maximum concurrent `locate` tool calls within one spec-generator
    /// turn.
    pub max_parallel_spec_explorers: usize,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            max_cycles: 8,
            max_validation_retries: 2,
            max_discussions: 100,
            max_parallel_explorers: 4,
            max_explore_rounds: 6,
            max_spec_iterations: 30,
            max_locate_calls: 8,
            max_parallel_spec_explorers: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_budgets() {
        let cfg = EngagementConfig::default();
        assert_eq!(cfg.max_cycles, 8);
        assert_eq!(cfg.max_validation_retries, 2);
        assert_eq!(cfg.max_discussions, 100);
        assert_eq!(cfg.max_spec_iterations, 30);
        assert_eq!(cfg.max_locate_calls, 8);
    }
}
