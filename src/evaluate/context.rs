use crate::error::{Result, RollError};

pub const DEFAULT_MAX_ROLLS: usize = 1000;

/// Counts the dice rolled during one evaluation so that every expression
/// halts, however many rerolls or explosions it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollContext {
    max_rolls: usize,
    rolls: usize,
}

impl RollContext {
    pub fn new(max_rolls: usize) -> Self {
        Self {
            max_rolls,
            rolls: 0,
        }
    }

    /// Must be called before every die is rolled.
    pub fn count_roll(&mut self) -> Result<()> {
        self.rolls += 1;

        if self.rolls > self.max_rolls {
            tracing::debug!(limit = self.max_rolls, "roll ceiling exceeded");
            return Err(RollError::TooManyRolls {
                limit: self.max_rolls,
            });
        }
        Ok(())
    }

    pub fn rolls(&self) -> usize {
        self.rolls
    }

    pub fn max_rolls(&self) -> usize {
        self.max_rolls
    }
}

impl Default for RollContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROLLS)
    }
}
