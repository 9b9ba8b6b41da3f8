use winnow::{
    ascii::dec_uint,
    combinator::{alt, opt, preceded, repeat},
    error::StrContext::Label,
    PResult, Parser,
};

use super::{ws, Expression};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dice {
    pub count: u32,
    pub size: DieSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieSize {
    /// `d{sides}`
    Sides(u32),
    /// `d%`\
    /// Same range as a d100.
    Percentile,
}

impl DieSize {
    pub fn max_value(self) -> u32 {
        match self {
            DieSize::Sides(sides) => sides,
            DieSize::Percentile => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `k{selector}`\
    /// Drops every kept value that is not selected.
    Keep,
    /// `p{selector}`\
    /// Drops every selected value.
    Drop,
    /// `rr{selector}`\
    /// Rerolls selected dice until none of the kept dice is selected.
    Reroll,
    /// `ro{selector}`\
    /// Rerolls selected dice once.
    RerollOnce,
    /// `ra{selector}`\
    /// Rolls one more die for the first selected die, keeping both.
    RerollAndAdd,
    /// `e{selector}`\
    /// Rolls another die for every selected die, new dice can explode too.
    Explode,
    /// `mi{value}`\
    /// Raises every kept die below `value` up to it.
    Minimum,
    /// `ma{value}`\
    /// Lowers every kept die above `value` down to it.
    Maximum,
}

impl Operation {
    pub fn is_dice_only(self) -> bool {
        !matches!(self, Operation::Keep | Operation::Drop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    /// `{num}`, values equal to `num`
    Literal,
    /// `h{num}`, the `num` highest values
    Highest,
    /// `l{num}`, the `num` lowest values
    Lowest,
    /// `>{num}`, values greater than `num`
    GreaterThan,
    /// `<{num}`, values less than `num`
    LessThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    pub kind: SelectorKind,
    pub num: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOperator {
    pub operation: Operation,
    pub selector: Selector,
}

impl SetOperator {
    pub fn new(operation: Operation, kind: SelectorKind, num: u32) -> Self {
        Self {
            operation,
            selector: Selector { kind, num },
        }
    }

    pub fn join_all(operators: &[SetOperator]) -> String {
        operators
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join("")
    }
}

pub fn parse_dice(input: &mut &str) -> PResult<Expression> {
    let dice = parse_bare_dice(input)?;
    let operators: Vec<SetOperator> =
        repeat(0.., preceded(ws, parse_dice_operator)).parse_next(input)?;

    if operators.is_empty() {
        Ok(Expression::Dice(dice))
    } else {
        Ok(Expression::OperatedDice(dice, operators))
    }
}

fn parse_bare_dice(input: &mut &str) -> PResult<Dice> {
    (opt(dec_uint::<_, u32, _>), ws, 'd', ws, parse_die_size)
        .map(|(count, _, _, _, size)| Dice {
            count: count.unwrap_or(1),
            size,
        })
        .context(Label("dice"))
        .parse_next(input)
}

fn parse_die_size(input: &mut &str) -> PResult<DieSize> {
    alt((
        '%'.value(DieSize::Percentile),
        dec_uint::<_, u32, _>.map(DieSize::Sides),
    ))
    .context(Label("die size"))
    .parse_next(input)
}

fn parse_dice_operator(input: &mut &str) -> PResult<SetOperator> {
    let operation = alt((
        "rr".value(Operation::Reroll),
        "ro".value(Operation::RerollOnce),
        "ra".value(Operation::RerollAndAdd),
        'e'.value(Operation::Explode),
        "mi".value(Operation::Minimum),
        "ma".value(Operation::Maximum),
        'k'.value(Operation::Keep),
        'p'.value(Operation::Drop),
    ));

    (operation, parse_selector)
        .map(|(operation, selector)| SetOperator {
            operation,
            selector,
        })
        .parse_next(input)
}

pub fn parse_set_operator(input: &mut &str) -> PResult<SetOperator> {
    let operation = alt(('k'.value(Operation::Keep), 'p'.value(Operation::Drop)));

    (operation, parse_selector)
        .map(|(operation, selector)| SetOperator {
            operation,
            selector,
        })
        .parse_next(input)
}

fn parse_selector(input: &mut &str) -> PResult<Selector> {
    let kind = alt((
        'h'.value(SelectorKind::Highest),
        'l'.value(SelectorKind::Lowest),
        '>'.value(SelectorKind::GreaterThan),
        '<'.value(SelectorKind::LessThan),
    ));

    (ws, opt(kind), ws, dec_uint::<_, u32, _>)
        .map(|(_, kind, _, num)| Selector {
            kind: kind.unwrap_or(SelectorKind::Literal),
            num,
        })
        .context(Label("selector"))
        .parse_next(input)
}

impl std::fmt::Display for Dice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d{}", self.count, self.size)
    }
}
impl std::fmt::Display for DieSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DieSize::Sides(sides) => write!(f, "{sides}"),
            DieSize::Percentile => write!(f, "%"),
        }
    }
}
impl std::fmt::Display for SetOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.operation, self.selector)
    }
}
impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            Operation::Keep => "k",
            Operation::Drop => "p",
            Operation::Reroll => "rr",
            Operation::RerollOnce => "ro",
            Operation::RerollAndAdd => "ra",
            Operation::Explode => "e",
            Operation::Minimum => "mi",
            Operation::Maximum => "ma",
        };
        write!(f, "{str}")
    }
}
impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The literal selector has no prefix, `k3` keeps threes
        let prefix = match self.kind {
            SelectorKind::Literal => "",
            SelectorKind::Highest => "h",
            SelectorKind::Lowest => "l",
            SelectorKind::GreaterThan => ">",
            SelectorKind::LessThan => "<",
        };
        write!(f, "{prefix}{}", self.num)
    }
}
