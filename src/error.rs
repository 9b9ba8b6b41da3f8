pub type Result<T, E = RollError> = std::result::Result<T, E>;

/// Everything that can go wrong while parsing or rolling a dice expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RollError {
    /// The input is not a valid dice expression.
    #[error("unexpected input at position {position}: got {fragment:?}, expected {expected}")]
    Syntax {
        position: usize,
        fragment: String,
        expected: String,
    },

    /// The expression is well formed but asks for something impossible,
    /// like dividing by zero or rolling a die with no sides.
    #[error("{0}")]
    Value(String),

    /// More dice were rolled than the evaluation allows.
    #[error("too many dice rolled (the limit is {limit})")]
    TooManyRolls { limit: usize },
}

impl RollError {
    pub fn value(msg: impl Into<String>) -> Self {
        Self::Value(msg.into())
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn is_too_many_rolls(&self) -> bool {
        matches!(self, Self::TooManyRolls { .. })
    }
}
