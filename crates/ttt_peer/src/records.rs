//! In-memory log of finished games, newest first.

use crate::config::GameMode;
use chrono::{DateTime, Local};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use ttt_engine::GameOutcome;

/// One finished game.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct GameRecord {
    /// When the game ended.
    finished_at: DateTime<Local>,
    /// How it was played.
    mode: GameMode,
    /// Final outcome.
    outcome: GameOutcome,
}

impl GameRecord {
    /// Creates a record stamped with the current local time.
    pub fn now(mode: GameMode, outcome: GameOutcome) -> Self {
        Self {
            finished_at: Local::now(),
            mode,
            outcome,
        }
    }
}

impl std::fmt::Display for GameRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.finished_at.format("%Y-%m-%d %H:%M"),
            self.mode,
            self.outcome
        )
    }
}

/// Finished games for the current process, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRecords {
    records: Vec<GameRecord>,
}

impl GameRecords {
    /// Records a finished game at the front of the list.
    #[instrument(skip(self))]
    pub fn push(&mut self, record: GameRecord) {
        debug!(total = self.records.len() + 1, "Game recorded");
        self.records.insert(0, record);
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Returns the records, newest first.
    pub fn as_slice(&self) -> &[GameRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttt_engine::Mark;

    #[test]
    fn test_newest_first() {
        let mut records = GameRecords::default();
        records.push(GameRecord::now(GameMode::HumanVsAi, GameOutcome::Draw));
        records.push(GameRecord::now(
            GameMode::HumanVsHumanOnline,
            GameOutcome::Won(Mark::O),
        ));
        assert_eq!(*records.as_slice()[0].outcome(), GameOutcome::Won(Mark::O));
        assert_eq!(*records.as_slice()[1].outcome(), GameOutcome::Draw);
        records.clear();
        assert!(records.as_slice().is_empty());
    }

    #[test]
    fn test_display_format() {
        let record = GameRecord::now(GameMode::HumanVsAi, GameOutcome::Won(Mark::X));
        let text = record.to_string();
        assert!(text.ends_with(" | HUMAN_VS_AI | WIN_X"), "{text}");
        // yyyy-MM-dd HH:mm
        assert_eq!(text.split(" | ").next().unwrap().len(), 16);
    }
}
