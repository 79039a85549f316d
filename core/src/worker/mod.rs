//! Worker module - replay determinism rules

pub mod determinism;

pub use determinism::{
    decision_matches_event, is_decision_event, last_part_of_name, match_replay_with_history,
    DeterminismValidator, MatchMode,
};
