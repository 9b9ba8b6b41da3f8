use std::collections::HashSet;

use super::context::RollContext;
use super::roll::{Die, DieRoller};
use super::tree::{NodeId, NodeKind, RollNode, RollTree};
use crate::error::{Result, RollError};
use crate::parse::{DieSize, Operation, Selector, SelectorKind, SetOperator};

impl Selector {
    /// Picks among the kept values of `target`. Highest and lowest sort by
    /// value, ties go to whichever came first in the set.
    pub(crate) fn select(self, tree: &RollTree, target: NodeId) -> Vec<NodeId> {
        let kept = tree.kept_set(target);
        let num = f64::from(self.num);
        let value = |id: &NodeId| tree.total_of(*id);

        match self.kind {
            SelectorKind::Literal => kept.into_iter().filter(|id| value(id) == num).collect(),
            SelectorKind::GreaterThan => kept.into_iter().filter(|id| value(id) > num).collect(),
            SelectorKind::LessThan => kept.into_iter().filter(|id| value(id) < num).collect(),
            SelectorKind::Highest => {
                let mut sorted = kept;
                sorted.sort_by(|a, b| value(b).total_cmp(&value(a)));
                sorted.truncate(self.num as usize);
                sorted
            }
            SelectorKind::Lowest => {
                let mut sorted = kept;
                sorted.sort_by(|a, b| value(a).total_cmp(&value(b)));
                sorted.truncate(self.num as usize);
                sorted
            }
        }
    }
}

impl SetOperator {
    /// Applies the operator to the node `target` in place. New dice are
    /// appended to `target`'s children, nothing is ever removed.
    pub(crate) fn apply<R: DieRoller + ?Sized>(
        self,
        tree: &mut RollTree,
        target: NodeId,
        context: &mut RollContext,
        rng: &mut R,
    ) -> Result<()> {
        if self.operation.is_dice_only() {
            return DiceTarget::new(tree, target, self.operation, context, rng)?.apply(self);
        }

        match self.operation {
            Operation::Drop => apply_drop(tree, target, self.selector),
            _ => apply_keep(tree, target, self.selector),
        }
        Ok(())
    }
}

fn apply_keep(tree: &mut RollTree, target: NodeId, selector: Selector) {
    let selected: HashSet<NodeId> = selector.select(tree, target).into_iter().collect();

    for id in tree.kept_set(target) {
        if !selected.contains(&id) {
            tree.get_mut(id).kept = false;
        }
    }
}

fn apply_drop(tree: &mut RollTree, target: NodeId, selector: Selector) {
    for id in selector.select(tree, target) {
        tree.get_mut(id).kept = false;
    }
}

/// Dice that an operator may roll more of.
struct DiceTarget<'a, R: ?Sized> {
    tree: &'a mut RollTree,
    target: NodeId,
    size: DieSize,
    context: &'a mut RollContext,
    rng: &'a mut R,
}

impl<'a, R: DieRoller + ?Sized> DiceTarget<'a, R> {
    fn new(
        tree: &'a mut RollTree,
        target: NodeId,
        operation: Operation,
        context: &'a mut RollContext,
        rng: &'a mut R,
    ) -> Result<Self> {
        let size = match &tree.get(target).kind {
            NodeKind::Dice { dice, .. } => dice.size,
            _ => {
                return Err(RollError::value(format!(
                    "The {operation} operator can only be applied to dice."
                )))
            }
        };

        Ok(Self {
            tree,
            target,
            size,
            context,
            rng,
        })
    }

    fn apply(&mut self, operator: SetOperator) -> Result<()> {
        let selector = operator.selector;
        match operator.operation {
            Operation::Keep => apply_keep(self.tree, self.target, selector),
            Operation::Drop => apply_drop(self.tree, self.target, selector),
            Operation::Reroll => self.apply_reroll(selector, false)?,
            Operation::RerollOnce => self.apply_reroll(selector, true)?,
            Operation::RerollAndAdd => self.apply_reroll_and_add(selector)?,
            Operation::Explode => self.apply_explode(selector)?,
            Operation::Minimum => self.apply_clamp(selector, "minimums", |die, min| {
                (die.value < min).then_some(min)
            })?,
            Operation::Maximum => self.apply_clamp(selector, "maximums", |die, max| {
                (die.value > max).then_some(max)
            })?,
        }
        Ok(())
    }

    fn roll_another(&mut self) -> Result<NodeId> {
        let die = Die::roll(self.size, self.context, self.rng)?;
        let id = self.tree.push(RollNode::new(NodeKind::Die(die), vec![]));
        self.tree.get_mut(self.target).children.push(id);
        Ok(id)
    }

    fn mark_exploded(&mut self, id: NodeId) {
        if let NodeKind::Die(die) = &mut self.tree.get_mut(id).kind {
            die.exploded = true;
        }
    }

    /// `rr` keeps going until no kept die matches, the roll ceiling stops
    /// selectors every face satisfies.
    fn apply_reroll(&mut self, selector: Selector, once: bool) -> Result<()> {
        loop {
            let selected = selector.select(self.tree, self.target);
            if selected.is_empty() {
                return Ok(());
            }

            for id in selected {
                self.tree.get_mut(id).kept = false;
                self.roll_another()?;
            }

            if once {
                return Ok(());
            }
        }
    }

    fn apply_reroll_and_add(&mut self, selector: Selector) -> Result<()> {
        if let Some(&id) = selector.select(self.tree, self.target).first() {
            self.mark_exploded(id);
            self.roll_another()?;
        }
        Ok(())
    }

    fn apply_explode(&mut self, selector: Selector) -> Result<()> {
        let mut exploded = HashSet::new();

        loop {
            let selected: Vec<_> = selector
                .select(self.tree, self.target)
                .into_iter()
                .filter(|id| !exploded.contains(id))
                .collect();
            if selected.is_empty() {
                return Ok(());
            }

            for id in selected {
                self.mark_exploded(id);
                exploded.insert(id);
                self.roll_another()?;
            }
        }
    }

    fn apply_clamp(
        &mut self,
        selector: Selector,
        name: &str,
        clamp: impl Fn(&Die, i64) -> Option<i64>,
    ) -> Result<()> {
        if selector.kind != SelectorKind::Literal {
            return Err(RollError::value(format!(
                "{selector} is not a valid selector for {name}."
            )));
        }
        let bound = i64::from(selector.num);

        for id in self.tree.kept_set(self.target) {
            if let NodeKind::Die(die) = &mut self.tree.get_mut(id).kind {
                if let Some(value) = clamp(die, bound) {
                    die.clamp_to(value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::evaluate::{roll_scripted, Evaluator};
    use crate::parse::{Expression, Notation};

    fn kept_values(tree: &RollTree) -> Vec<i64> {
        let mut values = vec![];
        let mut stack = vec![tree.root()];
        while let Some(node) = stack.pop() {
            if !node.kept() {
                continue;
            }
            if let Some(die) = node.die() {
                values.push(die.value());
            }
            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev());
        }
        values
    }

    #[test]
    fn test_keep_highest() {
        let tree = roll_scripted("4d6kh3", &[4, 4, 6, 3]).unwrap();
        assert_eq!(tree.total(), 14.0);
        assert_eq!(kept_values(&tree), vec![4, 4, 6]);
    }

    #[test]
    fn test_keep_lowest_tie_goes_left() {
        let tree = roll_scripted("4d6kl1", &[4, 2, 2, 5]).unwrap();
        let dice = tree.root();

        let kept: Vec<_> = dice.children().map(|die| die.kept()).collect();
        assert_eq!(kept, vec![false, true, false, false]);
        assert_eq!(tree.total(), 2.0);
    }

    #[test]
    fn test_keep_and_drop_filters() {
        let tree = roll_scripted("4d6k>4", &[5, 2, 6, 1]).unwrap();
        assert_eq!(kept_values(&tree), vec![5, 6]);

        let tree = roll_scripted("4d6p<3", &[1, 2, 3, 4]).unwrap();
        assert_eq!(tree.total(), 7.0);

        let tree = roll_scripted("4d6ph1", &[1, 6, 6, 3]).unwrap();
        assert_eq!(kept_values(&tree), vec![1, 6, 3]);
    }

    #[test]
    fn test_operators_apply_left_to_right() {
        let tree = roll_scripted("4d6kh3ph1", &[1, 2, 3, 4]).unwrap();
        assert_eq!(kept_values(&tree), vec![2, 3]);
    }

    #[test]
    fn test_reroll_until_no_match() {
        let tree = roll_scripted("2d6rr1", &[1, 4, 1, 1, 5]).unwrap();

        assert_eq!(tree.dice().count(), 5);
        assert_eq!(tree.root().child_count(), 5);
        assert_eq!(kept_values(&tree), vec![4, 5]);
    }

    #[test]
    fn test_reroll_once() {
        let tree = roll_scripted("2d6ro1", &[1, 1, 1, 1]).unwrap();

        assert_eq!(tree.dice().count(), 4);
        assert_eq!(kept_values(&tree), vec![1, 1]);
    }

    #[test]
    fn test_reroll_and_add_only_once() {
        let tree = roll_scripted("3d6ra6", &[6, 6, 2, 6]).unwrap();

        assert_eq!(tree.total(), 20.0);
        let exploded: Vec<_> = tree.dice().map(Die::exploded).collect();
        assert_eq!(exploded, vec![true, false, false, false]);
    }

    #[test]
    fn test_explode_chains() {
        let tree = roll_scripted("2d6e6", &[6, 3, 6, 2]).unwrap();

        assert_eq!(tree.total(), 17.0);
        let exploded: Vec<_> = tree.dice().map(Die::exploded).collect();
        assert_eq!(exploded, vec![true, false, true, false]);
    }

    #[test]
    fn test_minimum() {
        let tree = roll_scripted("8d6mi2", &[1, 6, 4, 2, 6, 2, 5, 6]).unwrap();
        assert_eq!(tree.total(), 33.0);

        let first = tree.dice().next().unwrap();
        assert_eq!(first.value(), 2);
        assert_eq!(first.original(), Some(1));
        assert!(tree.dice().skip(1).all(|die| die.original().is_none()));
    }

    #[test]
    fn test_maximum() {
        let tree = roll_scripted("4d6ma3", &[1, 6, 4, 3]).unwrap();
        assert_eq!(tree.total(), 10.0);
    }

    #[test]
    fn test_clamp_requires_literal_selector() {
        let err = roll_scripted("4d6mih2", &[1, 2, 3, 4]).unwrap_err();
        assert!(err.is_value());
        assert_eq!(err.to_string(), "h2 is not a valid selector for minimums.");
    }

    #[test]
    fn test_set_keep_tie_goes_left() {
        let tree = roll_scripted("(1d4 + 1, 3, 2d6kl1)kh1", &[2, 2, 5]).unwrap();
        assert_eq!(tree.total(), 3.0);

        let kept: Vec<_> = tree.root().children().map(|item| item.kept()).collect();
        assert_eq!(kept, vec![true, false, false]);
    }

    #[test]
    fn test_parenthetical_operators_reach_inside() {
        let tree = roll_scripted("(4d6)kh1", &[2, 5, 3, 1]).unwrap();
        assert_eq!(tree.total(), 5.0);

        let tree = roll_scripted("(5)p5", &[]).unwrap();
        assert_eq!(tree.total(), 0.0);
    }

    #[test]
    fn test_dice_operator_on_set_is_a_value_error() {
        let notation = Notation {
            expression: Expression::OperatedSet(
                Box::new(Expression::Set(vec![Expression::Literal(1.0)])),
                vec![SetOperator::new(Operation::Reroll, SelectorKind::Literal, 1)],
            ),
            comment: None,
        };
        let mut rng = StdRng::seed_from_u64(1);

        let err = Evaluator::new(&mut rng, 1000).evaluate(&notation).unwrap_err();
        assert!(err.is_value());
        assert!(Operation::Reroll.is_dice_only());
        assert!(!Operation::Drop.is_dice_only());
    }

    #[test]
    fn test_endless_reroll_hits_ceiling() {
        let notation = Notation::parse("10d1rr1").unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let err = Evaluator::new(&mut rng, 1000).evaluate(&notation).unwrap_err();
        assert_eq!(err, RollError::TooManyRolls { limit: 1000 });
    }
}
