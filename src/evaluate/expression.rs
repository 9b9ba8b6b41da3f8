use crate::error::{Result, RollError};
use crate::parse::{BinaryOperator, UnaryOperator};

impl UnaryOperator {
    pub fn evaluate(self, value: f64) -> f64 {
        match self {
            UnaryOperator::Plus => value,
            UnaryOperator::Minus => -value,
        }
    }
}

impl BinaryOperator {
    /// Fails on a zero divisor, otherwise the same as [`BinaryOperator::apply`].
    pub fn evaluate(self, lhs: f64, rhs: f64) -> Result<f64> {
        if self.is_division() {
            divisor(rhs)?;
        }
        Ok(self.apply(lhs, rhs))
    }

    /// A zero divisor gives an infinite or NaN result.
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOperator::Add => lhs + rhs,
            BinaryOperator::Sub => lhs - rhs,
            BinaryOperator::Mul => lhs * rhs,
            BinaryOperator::Div => lhs / rhs,
            BinaryOperator::FloorDiv => (lhs / rhs).floor(),
            BinaryOperator::Rem => modulo(lhs, rhs),
            BinaryOperator::Equal => truth(lhs == rhs),
            BinaryOperator::NotEqual => truth(lhs != rhs),
            BinaryOperator::GreaterThan => truth(lhs > rhs),
            BinaryOperator::GreaterThanOrEqual => truth(lhs >= rhs),
            BinaryOperator::LessThan => truth(lhs < rhs),
            BinaryOperator::LessThanOrEqual => truth(lhs <= rhs),
        }
    }

    pub fn is_division(self) -> bool {
        matches!(
            self,
            BinaryOperator::Div | BinaryOperator::FloorDiv | BinaryOperator::Rem
        )
    }

    pub fn is_multiplicative(self) -> bool {
        self == BinaryOperator::Mul || self.is_division()
    }
}

fn divisor(rhs: f64) -> Result<()> {
    if rhs == 0.0 {
        return Err(RollError::value("Cannot divide by zero."));
    }
    Ok(())
}

// The result takes the sign of the divisor, `-1 % 4` is 3.
fn modulo(lhs: f64, rhs: f64) -> f64 {
    let rem = lhs % rhs;
    if rem != 0.0 && (rem < 0.0) != (rhs < 0.0) {
        rem + rhs
    } else {
        rem
    }
}

fn truth(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}
