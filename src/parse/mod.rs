mod dice;
mod expression;

pub use dice::*;
pub use expression::{MAX_DEPTH, MAX_NESTING};
pub(crate) use expression::ws;

use winnow::{error::ErrMode, Parser};

use crate::error::{Result, RollError};

/// A parsed dice expression together with the free text that followed it,
/// if comments were allowed when parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Notation {
    pub expression: Expression,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `3` or `1.5`
    Literal(f64),
    /// `-1d4`
    Unary(UnaryOperator, Box<Expression>),
    /// `1d20 + 5`, left associative.
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),
    /// `(3d6)`\
    /// A single parenthesized expression without a trailing comma. It rolls
    /// exactly like its content.
    Parenthetical(Box<Expression>),
    /// `(1d4, 3, 2d6)` or `(3d6,)`
    Set(Vec<Expression>),
    /// `4d6` or `d%`
    Dice(Dice),
    /// A set or parenthetical followed by keep/drop operators.
    OperatedSet(Box<Expression>, Vec<SetOperator>),
    /// Dice followed by any dice operators.
    OperatedDice(Dice, Vec<SetOperator>),
    /// `8d6 [fire]`
    Annotated(Box<Expression>, Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Mul,
    Div,
    FloorDiv,
    Rem,
    Add,
    Sub,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Notation {
    /// Parses a dice expression, the whole input must be consumed.
    pub fn parse(input: &str) -> Result<Self> {
        let mut rest = input;
        let expression = run(input, &mut rest)?;

        if !rest.is_empty() {
            return Err(syntax_error(input, rest, "an operator or the end of the input"));
        }

        Ok(Notation {
            expression,
            comment: None,
        })
    }

    /// Parses a dice expression followed by an optional free text comment.
    /// The longest valid expression wins, whatever follows it is the comment.
    pub fn parse_commented(input: &str) -> Result<Self> {
        let mut rest = input;
        let expression = run(input, &mut rest)?;
        let comment = Some(rest.trim()).filter(|c| !c.is_empty());

        Ok(Notation {
            expression,
            comment: comment.map(str::to_string),
        })
    }
}

fn run<'i>(input: &'i str, rest: &mut &'i str) -> Result<Expression> {
    let mut parser = (expression::parse_expr, ws).map(|(expression, _)| expression);

    parser.parse_next(rest).map_err(|e| {
        let expected = match e {
            ErrMode::Backtrack(inner) | ErrMode::Cut(inner) => inner.to_string(),
            ErrMode::Incomplete(_) => String::new(),
        };
        let expected = if expected.trim().is_empty() {
            "a dice expression".to_string()
        } else {
            expected.replace('\n', ", ")
        };
        syntax_error(input, *rest, &expected)
    })
}

fn syntax_error(input: &str, rest: &str, expected: &str) -> RollError {
    let fragment: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();

    RollError::Syntax {
        position: input.len() - rest.len(),
        fragment,
        expected: expected.to_string(),
    }
}

/// Cache key for `input`. Runs of whitespace between tokens collapse to one
/// space, so `1 0` and `10` stay apart. Annotation text is kept verbatim.
pub(crate) fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_annotation = false;
    let mut pending_space = false;

    for c in input.trim().chars() {
        if c.is_whitespace() && !in_annotation {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        match c {
            '[' => in_annotation = true,
            ']' => in_annotation = false,
            _ => {}
        }
        out.push(c);
    }

    out
}

impl Expression {
    /// Direct subexpressions, left to right.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_) | Expression::Dice(_) | Expression::OperatedDice(_, _) => vec![],
            Expression::Unary(_, expr)
            | Expression::Parenthetical(expr)
            | Expression::OperatedSet(expr, _)
            | Expression::Annotated(expr, _) => vec![&**expr],
            Expression::Binary(_, lhs, rhs) => vec![&**lhs, &**rhs],
            Expression::Set(items) => items.iter().collect(),
        }
    }

    /// Nodes on the longest path from here down to a leaf.
    pub fn depth(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(Expression::depth)
            .max()
            .unwrap_or(0)
    }
}

impl std::fmt::Display for Notation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.comment {
            Some(comment) => write!(f, "{} {comment}", self.expression),
            None => write!(f, "{}", self.expression),
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(val) => write!(f, "{val}"),
            Expression::Unary(op, expr) => write!(f, "{op}{expr}"),
            Expression::Binary(op, lhs, rhs) => write!(f, "{lhs} {op} {rhs}"),
            Expression::Parenthetical(expr) => write!(f, "({expr})"),
            Expression::Set(items) => {
                let joined = items
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                if items.len() == 1 {
                    write!(f, "({joined},)")
                } else {
                    write!(f, "({joined})")
                }
            }
            Expression::Dice(dice) => write!(f, "{dice}"),
            Expression::OperatedSet(set, operators) => {
                write!(f, "{set}{}", SetOperator::join_all(operators))
            }
            Expression::OperatedDice(dice, operators) => {
                write!(f, "{dice}{}", SetOperator::join_all(operators))
            }
            Expression::Annotated(expr, annotations) => {
                write!(f, "{expr}")?;
                for annotation in annotations {
                    write!(f, " [{annotation}]")?;
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
        };
        write!(f, "{str}")
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Rem => "%",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
        };
        write!(f, "{str}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_parse_rejects_trailing_text() {
        let err = Notation::parse("1d20 foo bar").unwrap_err();

        let RollError::Syntax {
            position, fragment, ..
        } = err
        else {
            panic!("expected a syntax error, got {err:?}")
        };
        assert_eq!(position, 5);
        assert_eq!(fragment, "foo");
    }

    #[test]
    fn test_empty_input_is_a_syntax_error() {
        let err = Notation::parse("   ").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_commented_parse_captures_comment() {
        let notation = Notation::parse_commented("1d20 foo bar").unwrap();

        assert_eq!(notation.expression.to_string(), "1d20");
        assert_eq!(notation.comment.as_deref(), Some("foo bar"));
    }

    #[test]
    fn test_comments_that_look_like_operators() {
        #[rustfmt::skip]
        let inputs = [
            ("1d20 keep something", "keep something"),
            ("1d20 damage", "damage"),
            ("1d20 **bold**", "**bold**"),
            ("1d20 please save me from this parsing weirdness", "please save me from this parsing weirdness"),
            ("4d6 mighty blow", "mighty blow"),
        ];

        for (input, comment) in inputs {
            let notation = Notation::parse_commented(input).unwrap();
            assert_eq!(notation.comment.as_deref(), Some(comment), "{input}");
            assert!(Notation::parse(input).is_err(), "{input}");
        }
    }

    #[test]
    fn test_commented_parse_without_comment() {
        let notation = Notation::parse_commented("  1d20 + 5  ").unwrap();
        assert_eq!(notation.comment, None);
        assert_eq!(notation.to_string(), "1d20 + 5");
    }

    #[test]
    fn test_unclosed_set_is_an_error_even_with_comments() {
        assert!(Notation::parse_commented("1d20 + (1, 2").is_err());
        assert!(Notation::parse_commented("1d20 [fire").is_err());
    }

    #[test]
    fn test_normalize_keeps_annotation_whitespace() {
        assert_eq!(normalize(" 4d6  kh3 +\t2 "), "4d6 kh3 + 2");
        assert_eq!(normalize("8d6   [fire  ball]"), "8d6 [fire  ball]");
        assert_ne!(normalize("1 [a b]"), normalize("1 [ab]"));
        assert_ne!(normalize("1 0"), normalize("10"));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let n = 100_000;
        let inputs = [
            format!("{}1{}", "(".repeat(n), ")".repeat(n)),
            format!("{}1", "-".repeat(n)),
            format!("{}1", "- ".repeat(n)),
            format!("1{}", " + 1".repeat(n)),
            format!("{}1{}", "(1 + ".repeat(n), ")".repeat(n)),
        ];

        for input in &inputs {
            assert!(Notation::parse(input).unwrap_err().is_syntax());
            assert!(Notation::parse_commented(input).is_err());
        }
    }

    #[test]
    fn test_nesting_up_to_the_limit() {
        let depth = MAX_NESTING;
        let nested = format!("{}1d6{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(Notation::parse(&nested).unwrap().expression.depth(), depth + 1);

        let signs = format!("{}1", "-".repeat(depth));
        assert!(Notation::parse(&signs).is_ok());
        let signs = format!("{}1", "-".repeat(depth + 1));
        assert!(Notation::parse(&signs).is_err());

        let chain = format!("1{}", " + 1".repeat(MAX_DEPTH - 1));
        assert_eq!(Notation::parse(&chain).unwrap().expression.depth(), MAX_DEPTH);
    }

    #[test]
    fn test_children_and_depth() {
        let expression = Notation::parse("(1d4, 3) + -2").unwrap().expression;
        assert_eq!(expression.children().len(), 2);
        assert_eq!(expression.children()[0].children().len(), 2);
        assert_eq!(expression.depth(), 3);
    }

    #[test]
    fn test_display_round_trip() {
        let inputs = [
            "1d20 + 5",
            "4d6kh3",
            "(1d4 + 1, 3, 2d6kl1)kh1",
            "(3d6,)",
            "(3d6)",
            "-1d8 + 4 - (3, 1d4)kh1",
            "8d6 [fire]",
            "1d%",
            "10 // 3 % 2 == 1",
        ];

        for input in inputs {
            let notation = Notation::parse(input).unwrap();
            assert_eq!(notation.to_string(), input);
        }
    }
}
