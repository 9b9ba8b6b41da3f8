mod context;
mod expression;
mod operator;
mod roll;
mod tree;

pub use context::{RollContext, DEFAULT_MAX_ROLLS};
pub use roll::{Die, DieRoller};
pub use tree::{Inherit, NodeId, NodeKind, NodeRef, RollTree};

use tree::RollNode;

#[cfg(test)]
pub(crate) use roll::tests::Scripted;

use crate::error::Result;
use crate::parse::{Dice, Expression, Notation, SetOperator};

/// Rolls a parsed expression into a [`RollTree`]. One evaluator rolls one
/// expression, the roll ceiling is not shared between evaluations.
pub struct Evaluator<'a, R: ?Sized> {
    tree: RollTree,
    context: RollContext,
    rng: &'a mut R,
}

impl<'a, R: DieRoller + ?Sized> Evaluator<'a, R> {
    pub fn new(rng: &'a mut R, max_rolls: usize) -> Self {
        Self {
            tree: RollTree::default(),
            context: RollContext::new(max_rolls),
            rng,
        }
    }

    pub fn evaluate(mut self, notation: &Notation) -> Result<RollTree> {
        let root = self.eval(&notation.expression)?;
        self.tree.finish(root, notation.comment.clone());
        Ok(self.tree)
    }

    fn eval(&mut self, expression: &Expression) -> Result<NodeId> {
        match expression {
            Expression::Literal(value) => Ok(self.push(NodeKind::Literal(*value), vec![])),
            Expression::Unary(op, expr) => {
                let child = self.eval(expr)?;
                Ok(self.push(NodeKind::Unary { op: *op }, vec![child]))
            }
            Expression::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                op.evaluate(self.tree.total_of(lhs), self.tree.total_of(rhs))?;
                Ok(self.push(NodeKind::Binary { op: *op }, vec![lhs, rhs]))
            }
            Expression::Parenthetical(expr) => {
                let child = self.eval(expr)?;
                let kind = NodeKind::Parenthetical { operators: vec![] };
                Ok(self.push(kind, vec![child]))
            }
            Expression::Set(items) => {
                let children = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.push(NodeKind::Set { operators: vec![] }, children))
            }
            Expression::Dice(dice) => self.eval_dice(dice),
            Expression::OperatedSet(set, operators) => {
                let target = self.eval(set)?;
                self.operate(target, operators)?;
                Ok(target)
            }
            Expression::OperatedDice(dice, operators) => {
                let target = self.eval_dice(dice)?;
                self.operate(target, operators)?;
                Ok(target)
            }
            Expression::Annotated(expr, annotations) => {
                let id = self.eval(expr)?;
                let node = self.tree.get_mut(id);
                node.annotations.extend(annotations.iter().cloned());
                Ok(id)
            }
        }
    }

    fn eval_dice(&mut self, dice: &Dice) -> Result<NodeId> {
        let mut children = Vec::new();
        for _ in 0..dice.count {
            let die = Die::roll(dice.size, &mut self.context, self.rng)?;
            children.push(self.push(NodeKind::Die(die), vec![]));
        }

        let kind = NodeKind::Dice {
            dice: *dice,
            operators: vec![],
        };
        Ok(self.push(kind, children))
    }

    fn operate(&mut self, target: NodeId, operators: &[SetOperator]) -> Result<()> {
        for operator in operators {
            operator.apply(&mut self.tree, target, &mut self.context, self.rng)?;

            match &mut self.tree.get_mut(target).kind {
                NodeKind::Parenthetical { operators }
                | NodeKind::Set { operators }
                | NodeKind::Dice { operators, .. } => operators.push(*operator),
                _ => {}
            }
        }
        Ok(())
    }

    fn push(&mut self, kind: NodeKind, children: Vec<NodeId>) -> NodeId {
        self.tree.push(RollNode::new(kind, children))
    }
}

#[cfg(test)]
pub(crate) fn roll_scripted(input: &str, faces: &[u32]) -> Result<RollTree> {
    let notation = Notation::parse_commented(input)?;
    let mut rng = Scripted::new(faces);
    Evaluator::new(&mut rng, DEFAULT_MAX_ROLLS).evaluate(&notation)
}
