use super::roll::Die;
use crate::parse::{BinaryOperator, Dice, SetOperator, UnaryOperator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Literal(f64),
    Unary { op: UnaryOperator },
    Binary { op: BinaryOperator },
    /// Operators applied to it reach through to its content.
    Parenthetical { operators: Vec<SetOperator> },
    Set { operators: Vec<SetOperator> },
    Dice { dice: Dice, operators: Vec<SetOperator> },
    Die(Die),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RollNode {
    pub(crate) kind: NodeKind,
    pub(crate) kept: bool,
    pub(crate) annotations: Vec<String>,
    pub(crate) children: Vec<NodeId>,
}

impl RollNode {
    pub(crate) fn new(kind: NodeKind, children: Vec<NodeId>) -> Self {
        Self {
            kind,
            kept: true,
            annotations: Vec::new(),
            children,
        }
    }
}

/// The outcome of rolling an expression. Nodes live in one arena and refer
/// to their children by id, the root is the last node evaluated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RollTree {
    nodes: Vec<RollNode>,
    root: NodeId,
    comment: Option<String>,
}

impl RollTree {
    pub fn root(&self) -> NodeRef<'_> {
        self.node(self.root)
    }

    /// # Panics
    /// If `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        assert!(id.0 < self.nodes.len(), "{id:?} is not part of this tree");
        NodeRef { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn total(&self) -> f64 {
        self.total_of(self.root)
    }

    /// Every die in the tree, dropped ones included, in roll order.
    pub fn dice(&self) -> impl Iterator<Item = &Die> {
        self.nodes.iter().filter_map(|node| match &node.kind {
            NodeKind::Die(die) => Some(die),
            _ => None,
        })
    }

    /// Moves annotations as high up the tree as they go unambiguously. A
    /// node whose subtree carries exactly one distinct annotation takes it
    /// over from its children. Where a node sees several, `inherit` decides
    /// which one its unannotated children take, the right operand of `*`,
    /// `/`, `//` and `%` never inherits.
    pub fn simplify_annotations(&mut self, inherit: Option<Inherit>) {
        if !self.is_empty() {
            self.bubble_annotations(self.root, inherit);
        }
    }

    /// A copy with annotations simplified and every annotated branch
    /// collapsed into a literal of its total. Unannotated siblings of an
    /// annotated branch collapse too, so `1 [a] + 2 + 3 [b] + 4` becomes
    /// `3 [a] + 3 [b] + 4`. Without any annotation the copy is a single
    /// literal.
    pub fn simplified(&self, inherit: Option<Inherit>) -> RollTree {
        let mut source = self.clone();
        source.simplify_annotations(inherit);

        let mut out = RollTree::default();
        if self.is_empty() {
            return out;
        }
        let annotated = source.annotated_subtrees();
        let root = if annotated[source.root.0] {
            source.collapse_into(&mut out, source.root, &annotated)
        } else {
            out.push(RollNode::new(NodeKind::Literal(source.total()), vec![]))
        };
        out.finish(root, self.comment.clone());
        out
    }

    /// A copy of the tree where every node's kind is replaced by
    /// `f(node)`. Children are visited before their parents and totals of
    /// the copy follow the new kinds.
    pub fn map<F>(&self, mut f: F) -> RollTree
    where
        F: FnMut(NodeRef<'_>) -> NodeKind,
    {
        let mut out = RollTree::default();
        if !self.is_empty() {
            let root = self.map_into(&mut out, self.root, &mut f);
            out.finish(root, self.comment.clone());
        }
        out
    }

    pub(crate) fn push(&mut self, node: RollNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn finish(&mut self, root: NodeId, comment: Option<String>) {
        self.root = root;
        self.comment = comment;
    }

    pub(crate) fn get(&self, id: NodeId) -> &RollNode {
        &self.nodes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut RollNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn number_of(&self, id: NodeId) -> f64 {
        let node = self.get(id);
        match &node.kind {
            NodeKind::Literal(value) => *value,
            NodeKind::Unary { op } => match node.children.first() {
                Some(&child) => op.evaluate(self.total_of(child)),
                None => 0.0,
            },
            NodeKind::Binary { op } => match node.children[..] {
                [lhs, rhs] => op.apply(self.total_of(lhs), self.total_of(rhs)),
                _ => 0.0,
            },
            NodeKind::Die(die) => die.value as f64,
            NodeKind::Parenthetical { .. } | NodeKind::Set { .. } | NodeKind::Dice { .. } => {
                node.children.iter().map(|&child| self.total_of(child)).sum()
            }
        }
    }

    /// A dropped node contributes nothing to its parent.
    pub(crate) fn total_of(&self, id: NodeId) -> f64 {
        if self.get(id).kept {
            self.number_of(id)
        } else {
            0.0
        }
    }

    fn bubble_annotations(&mut self, id: NodeId, inherit: Option<Inherit>) -> Vec<String> {
        let children = self.get(id).children.clone();
        let mut possible: Vec<String> = Vec::new();
        let mut child_annotated = Vec::with_capacity(children.len());

        for &child in &children {
            let found = self.bubble_annotations(child, inherit);
            child_annotated.push(!found.is_empty());
            push_unique(&mut possible, found);
        }
        let own = self.get(id).annotations.clone();
        push_unique(&mut possible, own);

        if possible.len() == 1 {
            self.get_mut(id).annotations = possible.clone();
            for &child in &children {
                self.get_mut(child).annotations.clear();
            }
            return possible;
        }

        let inherited = match inherit {
            Some(Inherit::Left) => possible.first(),
            Some(Inherit::Right) => possible.last(),
            None => None,
        };
        if let Some(inherited) = inherited {
            let skip_rhs = matches!(self.get(id).kind, NodeKind::Binary { op } if op.is_multiplicative());
            for (i, &child) in children.iter().enumerate() {
                if child_annotated[i] || (skip_rhs && i > 0) {
                    continue;
                }
                self.get_mut(child).annotations = vec![inherited.clone()];
            }
        }
        possible
    }

    /// Whether each node has an annotation somewhere in its subtree.
    fn annotated_subtrees(&self) -> Vec<bool> {
        fn visit(tree: &RollTree, id: NodeId, out: &mut [bool]) -> bool {
            let node = tree.get(id);
            let mut annotated = !node.annotations.is_empty();
            for &child in &node.children {
                annotated |= visit(tree, child, out);
            }
            out[id.0] = annotated;
            annotated
        }

        let mut out = vec![false; self.nodes.len()];
        visit(self, self.root, &mut out);
        out
    }

    fn collapse_into(&self, out: &mut RollTree, id: NodeId, annotated: &[bool]) -> NodeId {
        let node = self.get(id);
        if !node.annotations.is_empty() {
            let mut literal = RollNode::new(NodeKind::Literal(self.total_of(id)), vec![]);
            literal.annotations = node.annotations.clone();
            return out.push(literal);
        }

        let children = node
            .children
            .iter()
            .map(|&child| {
                if annotated[child.0] {
                    self.collapse_into(out, child, annotated)
                } else {
                    let total = self.total_of(child);
                    out.push(RollNode::new(NodeKind::Literal(total), vec![]))
                }
            })
            .collect();

        out.push(RollNode {
            kind: node.kind.clone(),
            kept: node.kept,
            annotations: Vec::new(),
            children,
        })
    }

    fn map_into<F>(&self, out: &mut RollTree, id: NodeId, f: &mut F) -> NodeId
    where
        F: FnMut(NodeRef<'_>) -> NodeKind,
    {
        let node = self.get(id);
        let children = node
            .children
            .iter()
            .map(|&child| self.map_into(out, child, f))
            .collect();

        out.push(RollNode {
            kind: f(self.node(id)),
            kept: node.kept,
            annotations: node.annotations.clone(),
            children,
        })
    }

    /// The values set operators act on. A parenthetical is transparent, any
    /// other leaf is a set of one.
    pub(crate) fn set_view(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.get(id);
        match &node.kind {
            NodeKind::Parenthetical { .. } => match node.children.first() {
                Some(&inner) => self.set_view(inner),
                None => vec![],
            },
            NodeKind::Set { .. } | NodeKind::Dice { .. } => node.children.clone(),
            _ => vec![id],
        }
    }

    pub(crate) fn kept_set(&self, id: NodeId) -> Vec<NodeId> {
        self.set_view(id)
            .into_iter()
            .filter(|&child| self.get(child).kept)
            .collect()
    }
}

/// Which annotation an unannotated node takes when its parent sees several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inherit {
    /// The first one found, reading left to right.
    Left,
    /// The last one found.
    Right,
}

fn push_unique(into: &mut Vec<String>, annotations: Vec<String>) {
    for annotation in annotations {
        if !into.contains(&annotation) {
            into.push(annotation);
        }
    }
}

/// A borrowed view of one node in a [`RollTree`].
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a RollTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &'a NodeKind {
        &self.tree.get(self.id).kind
    }

    /// The node's value, ignoring whether the node itself was dropped.
    pub fn number(&self) -> f64 {
        self.tree.number_of(self.id)
    }

    /// What the node adds to its parent: its number if kept, zero otherwise.
    pub fn total(&self) -> f64 {
        self.tree.total_of(self.id)
    }

    pub fn kept(&self) -> bool {
        self.tree.get(self.id).kept
    }

    pub fn annotations(&self) -> &'a [String] {
        &self.tree.get(self.id).annotations
    }

    pub fn die(&self) -> Option<&'a Die> {
        match self.kind() {
            NodeKind::Die(die) => Some(die),
            _ => None,
        }
    }

    pub fn is_dice(&self) -> bool {
        matches!(self.kind(), NodeKind::Dice { .. })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.get(self.id)
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    pub fn child_count(&self) -> usize {
        self.tree.get(self.id).children.len()
    }

    /// Follows first children down to a leaf. Dice count as a leaf so their
    /// individual dice are never returned.
    pub fn leftmost(&self) -> NodeRef<'a> {
        let mut node = *self;
        while !node.is_dice() {
            match node.children().next() {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    /// Like [`NodeRef::leftmost`] but following last children.
    pub fn rightmost(&self) -> NodeRef<'a> {
        let mut node = *self;
        while !node.is_dice() {
            match node.children().last() {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    /// Depth first, parents before children, left to right.
    pub fn find<P>(&self, mut predicate: P) -> Option<NodeRef<'a>>
    where
        P: FnMut(&NodeRef<'a>) -> bool,
    {
        let mut stack = vec![*self];
        while let Some(node) = stack.pop() {
            if predicate(&node) {
                return Some(node);
            }
            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev());
        }
        None
    }
}
