//! Parse and roll dice expressions like `4d6kh3`, `8d6mi2 [fire]` or
//! `(1d4 + 1, 3, 2d6kl1)kh1`.
//!
//! ```rust
//! # use dice_parser::{roll_with, AdvType, RollOptions, Roller};
//! # use rand::rngs::StdRng;
//! # use rand::SeedableRng;
//! #
//! # fn main() -> Result<(), dice_parser::RollError> {
//! // Roll 4 d6 and keep the highest 3.
//! let mut rng = StdRng::seed_from_u64(1);
//! let rolled = roll_with("4d6kh3", &mut rng)?;
//! assert!((3..=18).contains(&rolled.total()));
//!
//! // A roller caches parsed expressions and takes per call options.
//! let roller = Roller::default();
//! let options = RollOptions::new()
//!     .with_comments(true)
//!     .with_advantage(AdvType::Advantage);
//! let rolled = roller.roll_with("1d20 + 5 to hit", &options, &mut rng)?;
//! assert_eq!(rolled.notation().to_string(), "2d20kh1 + 5 to hit");
//! assert_eq!(rolled.comment(), Some("to hit"));
//!
//! // Every die stays in the result, dropped ones included.
//! let dice = rolled.tree().root().leftmost();
//! assert_eq!(dice.child_count(), 2);
//! assert_eq!(dice.children().filter(|die| die.kept()).count(), 1);
//! #
//! # Ok(())
//! # }
//! ```

mod cache;
mod error;
mod evaluate;
mod parse;
mod roller;

use std::sync::Arc;

pub use cache::{ParseCache, DEFAULT_CACHE_CAPACITY};
pub use error::{Result, RollError};
pub use evaluate::{
    Die, DieRoller, Evaluator, Inherit, NodeId, NodeKind, NodeRef, RollContext, RollTree,
    DEFAULT_MAX_ROLLS,
};
pub use parse::{
    BinaryOperator, Dice, DieSize, Expression, Notation, Operation, Selector, SelectorKind,
    SetOperator, UnaryOperator, MAX_DEPTH, MAX_NESTING,
};
pub use roller::{AdvType, CritType, RollOptions, RollResult, Roller, RollerConfig};

/// Parses the notation without rolling it. Trailing text is an error.
pub fn parse(notation: &str) -> Result<Notation> {
    Notation::parse(notation)
}

/// Parses and rolls the notation with the thread local generator.
pub fn roll(notation: &str) -> Result<RollResult> {
    roll_with(notation, &mut rand::thread_rng())
}

/// Same as `roll()` but with the generator of your choice.
pub fn roll_with<R: DieRoller + ?Sized>(notation: &str, rng: &mut R) -> Result<RollResult> {
    let notation = Arc::new(Notation::parse(notation)?);
    roller::roll_notation(notation, AdvType::None, DEFAULT_MAX_ROLLS, rng)
}
