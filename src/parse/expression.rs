use winnow::{
    ascii::{digit1, multispace0},
    combinator::{alt, cut_err, delimited, fail, opt, preceded, repeat},
    error::{
        ErrMode,
        StrContext::{Expected, Label},
        StrContextValue::{CharLiteral, Description},
    },
    stream::Stream,
    token::take_till,
    PResult, Parser,
};

use super::{parse_dice, parse_set_operator, BinaryOperator, Expression, SetOperator, UnaryOperator};

/// Parentheses and signs may nest this many levels deep.
pub const MAX_NESTING: usize = 64;

/// Longest path from the root of a parsed expression to a leaf, counted
/// where operator chains grow.
pub const MAX_DEPTH: usize = 256;

type Operand = fn(&mut &str, usize) -> PResult<Expression>;

pub fn ws(input: &mut &str) -> PResult<()> {
    multispace0.void().parse_next(input)
}

pub fn parse_expr(input: &mut &str) -> PResult<Expression> {
    parse_comparison(input, 0)
}

fn parse_comparison(input: &mut &str, nesting: usize) -> PResult<Expression> {
    parse_chain(input, nesting, comparison_operator, parse_additive)
}

fn parse_additive(input: &mut &str, nesting: usize) -> PResult<Expression> {
    parse_chain(input, nesting, additive_operator, parse_multiplicative)
}

fn parse_multiplicative(input: &mut &str, nesting: usize) -> PResult<Expression> {
    parse_chain(input, nesting, multiplicative_operator, parse_unary)
}

/// Left associative `operand (operator operand)*`. An operator without a
/// valid right operand is left unconsumed.
fn parse_chain(
    input: &mut &str,
    nesting: usize,
    operator: fn(&mut &str) -> PResult<BinaryOperator>,
    operand: Operand,
) -> PResult<Expression> {
    let mut expression = operand(input, nesting)?;
    let mut depth = expression.depth();

    loop {
        let start = input.checkpoint();
        let step = (preceded(ws, operator), |i: &mut &str| operand(i, nesting)).parse_next(input);
        let (op, rhs) = match step {
            Ok(step) => step,
            Err(ErrMode::Backtrack(_)) => {
                input.reset(&start);
                return Ok(expression);
            }
            Err(e) => return Err(e),
        };

        depth = depth.max(rhs.depth()) + 1;
        if depth > MAX_DEPTH {
            return too_deep(input);
        }
        expression = Expression::Binary(op, Box::new(expression), Box::new(rhs));
    }
}

fn parse_unary(input: &mut &str, nesting: usize) -> PResult<Expression> {
    ws(input)?;
    let Some(op) = opt(unary_operator).parse_next(input)? else {
        return parse_atom(input, nesting);
    };

    if nesting >= MAX_NESTING {
        return too_deep(input);
    }
    let expression = parse_unary(input, nesting + 1)?;
    Ok(Expression::Unary(op, Box::new(expression)))
}

fn too_deep(input: &mut &str) -> PResult<Expression> {
    cut_err(fail)
        .context(Label("expression"))
        .context(Expected(Description("an expression with less nesting")))
        .parse_next(input)
}

fn parse_atom(input: &mut &str, nesting: usize) -> PResult<Expression> {
    let expression = alt((
        parse_dice,
        |i: &mut &str| parse_set(i, nesting),
        parse_literal,
    ))
    .context(Label("atom"))
    .context(Expected(Description("dice, a set or a number")))
    .parse_next(input)?;
    let annotations: Vec<String> = repeat(0.., parse_annotation).parse_next(input)?;

    if annotations.is_empty() {
        Ok(expression)
    } else {
        Ok(Expression::Annotated(Box::new(expression), annotations))
    }
}

fn parse_literal(input: &mut &str) -> PResult<Expression> {
    (digit1, opt(('.', digit1)))
        .take()
        .try_map(str::parse::<f64>)
        .map(Expression::Literal)
        .context(Label("number"))
        .parse_next(input)
}

fn parse_annotation(input: &mut &str) -> PResult<String> {
    delimited(
        (ws, '['),
        take_till(0.., ']'),
        cut_err(']'.context(Expected(CharLiteral(']')))),
    )
    .map(|text: &str| text.trim().to_string())
    .parse_next(input)
}

fn parse_set(input: &mut &str, nesting: usize) -> PResult<Expression> {
    let set = parse_bare_set(input, nesting)?;
    let operators: Vec<SetOperator> =
        repeat(0.., preceded(ws, parse_set_operator)).parse_next(input)?;

    if operators.is_empty() {
        Ok(set)
    } else {
        Ok(Expression::OperatedSet(Box::new(set), operators))
    }
}

/// `()`, `(x)`, `(x,)` and `(x, y, ...)` with an optional trailing comma.
/// Only `(x)` is a parenthetical, everything else is a set.
fn parse_bare_set(input: &mut &str, nesting: usize) -> PResult<Expression> {
    '('.parse_next(input)?;
    if nesting >= MAX_NESTING {
        return too_deep(input);
    }
    ws(input)?;

    let mut items = Vec::new();
    let mut trailing_comma = false;

    if opt(')').parse_next(input)?.is_none() {
        loop {
            let item = cut_err(|i: &mut &str| parse_comparison(i, nesting + 1)).parse_next(input)?;
            items.push(item);
            ws(input)?;

            if opt(',').parse_next(input)?.is_none() {
                trailing_comma = false;
                cut_err(')'.context(Expected(CharLiteral(')')))).parse_next(input)?;
                break;
            }

            trailing_comma = true;
            ws(input)?;
            if opt(')').parse_next(input)?.is_some() {
                break;
            }
        }
    }

    if items.len() == 1 && !trailing_comma {
        let expression = items.remove(0);
        return Ok(Expression::Parenthetical(Box::new(expression)));
    }

    Ok(Expression::Set(items))
}

fn unary_operator(input: &mut &str) -> PResult<UnaryOperator> {
    alt(('+'.value(UnaryOperator::Plus), '-'.value(UnaryOperator::Minus))).parse_next(input)
}

fn additive_operator(input: &mut &str) -> PResult<BinaryOperator> {
    alt(('+'.value(BinaryOperator::Add), '-'.value(BinaryOperator::Sub))).parse_next(input)
}

fn multiplicative_operator(input: &mut &str) -> PResult<BinaryOperator> {
    alt((
        '*'.value(BinaryOperator::Mul),
        "//".value(BinaryOperator::FloorDiv),
        '/'.value(BinaryOperator::Div),
        '%'.value(BinaryOperator::Rem),
    ))
    .parse_next(input)
}

fn comparison_operator(input: &mut &str) -> PResult<BinaryOperator> {
    alt((
        "==".value(BinaryOperator::Equal),
        "!=".value(BinaryOperator::NotEqual),
        ">=".value(BinaryOperator::GreaterThanOrEqual),
        "<=".value(BinaryOperator::LessThanOrEqual),
        '>'.value(BinaryOperator::GreaterThan),
        '<'.value(BinaryOperator::LessThan),
    ))
    .parse_next(input)
}
