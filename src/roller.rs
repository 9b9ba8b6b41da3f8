use std::sync::Arc;

use crate::cache::{ParseCache, DEFAULT_CACHE_CAPACITY};
use crate::error::Result;
use crate::evaluate::{DieRoller, Evaluator, NodeKind, RollTree, DEFAULT_MAX_ROLLS};
use crate::parse::{normalize, DieSize, Expression, Notation, Operation, SelectorKind, SetOperator};

/// Settings for a [`Roller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollerConfig {
    /// Parsed expressions kept around for reuse. Zero disables the cache.
    pub cache_capacity: usize,
    /// Dice one evaluation may roll when a call does not say otherwise.
    pub max_rolls: usize,
}

impl Default for RollerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_rolls: DEFAULT_MAX_ROLLS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdvType {
    #[default]
    None,
    Advantage,
    Disadvantage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CritType {
    #[default]
    None,
    Crit,
    Fail,
}

/// Per call settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollOptions {
    /// Treat whatever follows the expression as a comment. Skips the cache.
    pub allow_comments: bool,
    /// Overrides the roller's ceiling.
    pub max_rolls: Option<usize>,
    /// Only has an effect when the leftmost dice are `1d20`.
    pub advantage: AdvType,
}

impl RollOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comments(mut self, allow_comments: bool) -> Self {
        self.allow_comments = allow_comments;
        self
    }

    pub fn with_max_rolls(mut self, max_rolls: usize) -> Self {
        self.max_rolls = Some(max_rolls);
        self
    }

    pub fn with_advantage(mut self, advantage: AdvType) -> Self {
        self.advantage = advantage;
        self
    }
}

/// Parses and rolls dice expressions, reusing parsed expressions between
/// calls. A roller can be shared between threads.
#[derive(Debug)]
pub struct Roller {
    cache: ParseCache,
    max_rolls: usize,
}

impl Roller {
    pub fn new(config: RollerConfig) -> Self {
        Self {
            cache: ParseCache::new(config.cache_capacity),
            max_rolls: config.max_rolls,
        }
    }

    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    pub fn max_rolls(&self) -> usize {
        self.max_rolls
    }

    /// Parses `input`, going through the cache unless comments are allowed.
    pub fn parse(&self, input: &str, allow_comments: bool) -> Result<Arc<Notation>> {
        if allow_comments {
            return Notation::parse_commented(input).map(Arc::new);
        }

        let key = normalize(input);
        if let Some(notation) = self.cache.get(&key) {
            return Ok(notation);
        }

        let notation = Arc::new(Notation::parse(input)?);
        self.cache.insert(key, Arc::clone(&notation));
        Ok(notation)
    }

    /// Rolls `input` with the thread local generator.
    pub fn roll(&self, input: &str, options: &RollOptions) -> Result<RollResult> {
        self.roll_with(input, options, &mut rand::thread_rng())
    }

    #[tracing::instrument(
        level = "debug",
        skip(self, options, rng),
        fields(
            allow_comments = options.allow_comments,
            max_rolls = options.max_rolls.unwrap_or(self.max_rolls)
        )
    )]
    pub fn roll_with<R: DieRoller + ?Sized>(
        &self,
        input: &str,
        options: &RollOptions,
        rng: &mut R,
    ) -> Result<RollResult> {
        let notation = self.parse(input, options.allow_comments)?;
        self.roll_shared(notation, options, rng)
    }

    /// Rolls an expression that was already parsed.
    pub fn roll_notation<R: DieRoller + ?Sized>(
        &self,
        notation: &Notation,
        options: &RollOptions,
        rng: &mut R,
    ) -> Result<RollResult> {
        self.roll_shared(Arc::new(notation.clone()), options, rng)
    }

    fn roll_shared<R: DieRoller + ?Sized>(
        &self,
        notation: Arc<Notation>,
        options: &RollOptions,
        rng: &mut R,
    ) -> Result<RollResult> {
        let max_rolls = options.max_rolls.unwrap_or(self.max_rolls);
        roll_notation(notation, options.advantage, max_rolls, rng)
    }
}

impl Default for Roller {
    fn default() -> Self {
        Self::new(RollerConfig::default())
    }
}

pub(crate) fn roll_notation<R: DieRoller + ?Sized>(
    notation: Arc<Notation>,
    advantage: AdvType,
    max_rolls: usize,
    rng: &mut R,
) -> Result<RollResult> {
    let notation = match with_advantage(&notation.expression, advantage) {
        Some(expression) => Arc::new(Notation {
            expression,
            comment: notation.comment.clone(),
        }),
        None => notation,
    };

    let tree = Evaluator::new(rng, max_rolls).evaluate(&notation)?;
    Ok(RollResult { notation, tree })
}

/// Rewrites a leading `1d20` into `2d20kh1` or `2d20kl1`. Returns `None`
/// when there is nothing to rewrite, the input is never touched.
fn with_advantage(expression: &Expression, advantage: AdvType) -> Option<Expression> {
    let kind = match advantage {
        AdvType::None => return None,
        AdvType::Advantage => SelectorKind::Highest,
        AdvType::Disadvantage => SelectorKind::Lowest,
    };
    let keep = SetOperator::new(Operation::Keep, kind, 1);
    let is_single_d20 = |count: u32, size: DieSize| count == 1 && size == DieSize::Sides(20);

    let mut copy = expression.clone();
    let leaf = leftmost_mut(&mut copy);
    match &mut *leaf {
        Expression::Dice(dice) if is_single_d20(dice.count, dice.size) => {
            let mut dice = *dice;
            dice.count = 2;
            *leaf = Expression::OperatedDice(dice, vec![keep]);
        }
        Expression::OperatedDice(dice, operators) if is_single_d20(dice.count, dice.size) => {
            dice.count = 2;
            operators.insert(0, keep);
        }
        _ => return None,
    }
    Some(copy)
}

fn leftmost_mut(expression: &mut Expression) -> &mut Expression {
    if matches!(expression, Expression::Set(items) if items.is_empty()) {
        return expression;
    }

    match expression {
        Expression::Unary(_, inner)
        | Expression::Parenthetical(inner)
        | Expression::OperatedSet(inner, _)
        | Expression::Annotated(inner, _)
        | Expression::Binary(_, inner, _) => leftmost_mut(inner),
        Expression::Set(items) => leftmost_mut(&mut items[0]),
        other => other,
    }
}

/// A rolled expression.
#[derive(Debug, Clone)]
pub struct RollResult {
    notation: Arc<Notation>,
    tree: RollTree,
}

impl RollResult {
    /// The expression that was rolled, after any advantage rewrite.
    pub fn notation(&self) -> &Notation {
        &self.notation
    }

    pub fn tree(&self) -> &RollTree {
        &self.tree
    }

    pub fn comment(&self) -> Option<&str> {
        self.tree.comment()
    }

    /// The total rounded towards zero.
    pub fn total(&self) -> i64 {
        self.tree.total().trunc() as i64
    }

    pub fn value(&self) -> f64 {
        self.tree.total()
    }

    /// Whether the leftmost dice were rolled as `2d20kh1` or `2d20kl1`.
    pub fn advantage(&self) -> AdvType {
        let NodeKind::Dice { dice, operators } = self.tree.root().leftmost().kind() else {
            return AdvType::None;
        };
        if dice.count != 2 || dice.size != DieSize::Sides(20) {
            return AdvType::None;
        }

        match operators.first() {
            Some(op) if *op == SetOperator::new(Operation::Keep, SelectorKind::Highest, 1) => {
                AdvType::Advantage
            }
            Some(op) if *op == SetOperator::new(Operation::Keep, SelectorKind::Lowest, 1) => {
                AdvType::Disadvantage
            }
            _ => AdvType::None,
        }
    }

    /// A natural 20 or natural 1 on leftmost d20s that kept a single die.
    pub fn crit(&self) -> CritType {
        let left = self.tree.root().leftmost();
        let NodeKind::Dice { dice, .. } = left.kind() else {
            return CritType::None;
        };
        if dice.size != DieSize::Sides(20) || left.children().filter(|d| d.kept()).count() != 1 {
            return CritType::None;
        }

        match left.total() {
            t if t == 20.0 => CritType::Crit,
            t if t == 1.0 => CritType::Fail,
            _ => CritType::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::evaluate::Scripted;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    fn rewrite(input: &str, advantage: AdvType) -> String {
        let expression = Notation::parse(input).unwrap().expression;
        match with_advantage(&expression, advantage) {
            Some(rewritten) => rewritten.to_string(),
            None => expression.to_string(),
        }
    }

    #[test]
    fn test_advantage_rewrite() {
        #[rustfmt::skip]
        let inputs = [
            ("1d20", AdvType::Advantage, "2d20kh1"),
            ("1d20 + 5", AdvType::Disadvantage, "2d20kl1 + 5"),
            ("1d20ro1 + 5", AdvType::Advantage, "2d20kh1ro1 + 5"),
            ("(1d20 [att], 3)kh1", AdvType::Advantage, "(2d20kh1 [att], 3)kh1"),
            ("-1d20", AdvType::Advantage, "-2d20kh1"),
            ("2d20", AdvType::Advantage, "2d20"),
            ("1d6 + 1d20", AdvType::Advantage, "1d6 + 1d20"),
            ("5 + 1d20", AdvType::Advantage, "5 + 1d20"),
            ("((1d20,), 2)", AdvType::Advantage, "((2d20kh1,), 2)"),
            ("() + 1d20", AdvType::Advantage, "() + 1d20"),
            ("1d20", AdvType::None, "1d20"),
        ];

        for (input, advantage, expected) in inputs {
            assert_eq!(rewrite(input, advantage), expected, "{input}");
        }
    }

    #[test]
    fn test_advantage_leaves_cached_tree_alone() {
        let roller = Roller::default();
        let options = RollOptions::new().with_advantage(AdvType::Advantage);

        let result = roller.roll_with("1d20 + 1", &options, &mut rng()).unwrap();
        assert_eq!(result.notation().to_string(), "2d20kh1 + 1");
        assert_eq!(result.advantage(), AdvType::Advantage);
        assert_eq!(result.tree().dice().count(), 2);

        let cached = roller.parse("1d20 + 1", false).unwrap();
        assert_eq!(cached.to_string(), "1d20 + 1");
    }

    #[test]
    fn test_advantage_classification() {
        let roller = Roller::default();
        let roll = |input: &str| {
            roller
                .roll_with(input, &RollOptions::new(), &mut rng())
                .unwrap()
                .advantage()
        };

        assert_eq!(roll("2d20kh1 + 3"), AdvType::Advantage);
        assert_eq!(roll("2d20kl1"), AdvType::Disadvantage);
        assert_eq!(roll("2d20kh1ro1"), AdvType::Advantage);
        assert_eq!(roll("2d20ro1kh1"), AdvType::None);
        assert_eq!(roll("1d20"), AdvType::None);
        assert_eq!(roll("3 + 2d20kh1"), AdvType::None);
    }

    #[test]
    fn test_crit_classification() {
        let roller = Roller::default();
        let crit = |input: &str, faces: &[u32]| {
            let notation = roller.parse(input, false).unwrap();
            let mut rng = Scripted::new(faces);
            roller
                .roll_notation(&notation, &RollOptions::new(), &mut rng)
                .unwrap()
                .crit()
        };

        assert_eq!(crit("1d20 + 5", &[20]), CritType::Crit);
        assert_eq!(crit("1d20 + 5", &[1]), CritType::Fail);
        assert_eq!(crit("1d20 + 5", &[12]), CritType::None);
        assert_eq!(crit("2d20kh1", &[20, 3]), CritType::Crit);
        assert_eq!(crit("2d20kl1", &[20, 1]), CritType::Fail);
        assert_eq!(crit("2d20", &[20, 20]), CritType::None);
        assert_eq!(crit("1d6", &[1]), CritType::None);
        assert_eq!(crit("5 + 1d20", &[20]), CritType::None);
    }

    #[test]
    fn test_total_truncates_towards_zero() {
        let roller = Roller::default();
        let options = RollOptions::new();

        let result = roller.roll_with("7 / 2", &options, &mut rng()).unwrap();
        assert_eq!(result.total(), 3);
        assert_eq!(result.value(), 3.5);

        let result = roller.roll_with("-7 / 2", &options, &mut rng()).unwrap();
        assert_eq!(result.total(), -3);
    }

    #[test]
    fn test_parse_uses_cache() {
        let roller = Roller::default();

        let first = roller.parse("4d6 kh3", false).unwrap();
        let second = roller.parse("4d6   kh3", false).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(roller.cache().len(), 1);
    }

    #[test]
    fn test_comments_bypass_cache() {
        let roller = Roller::default();

        let notation = roller.parse("1d20 to hit", true).unwrap();
        assert_eq!(notation.comment.as_deref(), Some("to hit"));
        assert!(roller.cache().is_empty());

        roller.parse("1d20", false).unwrap();
        let commented = roller.parse("1d20", true).unwrap();
        let cached = roller.parse("1d20", false).unwrap();
        assert!(!Arc::ptr_eq(&commented, &cached));
        assert_eq!(roller.cache().len(), 1);
    }

    #[test]
    fn test_syntax_errors_are_not_cached() {
        let roller = Roller::default();

        assert!(roller.parse("1 +", false).unwrap_err().is_syntax());
        assert!(roller.parse("1 0", false).unwrap_err().is_syntax());
        roller.parse("10", false).unwrap();
        assert!(roller.parse("1 0", false).unwrap_err().is_syntax());
        assert_eq!(roller.cache().len(), 1);
    }

    #[test]
    fn test_ceiling_override() {
        let roller = Roller::new(RollerConfig {
            cache_capacity: 0,
            max_rolls: 5,
        });

        let err = roller
            .roll_with("6d6", &RollOptions::new(), &mut rng())
            .unwrap_err();
        assert!(err.is_too_many_rolls());

        let options = RollOptions::new().with_max_rolls(6);
        assert!(roller.roll_with("6d6", &options, &mut rng()).is_ok());
        assert!(roller.cache().is_empty());
    }

    #[test]
    fn test_comment_reaches_result() {
        let roller = Roller::default();
        let options = RollOptions::new().with_comments(true);

        let result = roller.roll_with("1d20+3 stealth", &options, &mut rng()).unwrap();
        assert_eq!(result.comment(), Some("stealth"));
    }
}
