use crate::variable::VarId;

index_vec::define_index_type! {
    pub struct NodeId = usize;
    MAX_INDEX = usize::MAX;
    DISABLE_MAX_INDEX_CHECK = cfg!(not(debug_assertions));
}

/// Tag distinguishing the three node shapes of an NNF graph.
/// Literal nodes carry their variable and polarity directly instead of
/// pointing at a separate literal object, since polarity never changes
/// once a literal node is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    And,
    Or,
    Literal(VarId, bool),
}

impl NodeKind {
    pub fn is_literal(&self) -> bool {
        matches!(self, NodeKind::Literal(..))
    }

    pub fn is_and(&self) -> bool {
        matches!(self, NodeKind::And)
    }

    pub fn is_or(&self) -> bool {
        matches!(self, NodeKind::Or)
    }

    /// The value that makes this operator kind true without consulting any
    /// child (true as soon as one child is true for OR, only when all
    /// children are true for AND).
    pub fn dominating_value(&self) -> bool {
        matches!(self, NodeKind::Or)
    }
}

/// A node of the mutable NNF DAG. Children of operator nodes are kept
/// ordered with literal children before operator children.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub level: u32,
    pub size_subformula: u32,
}

impl Node {
    pub fn new_literal(var: VarId, positive: bool) -> Self {
        Node {
            kind: NodeKind::Literal(var, positive),
            children: Vec::new(),
            parent: None,
            level: 0,
            size_subformula: 1,
        }
    }

    pub fn new_operator(kind: NodeKind, children: Vec<NodeId>) -> Self {
        debug_assert!(!kind.is_literal());
        Node {
            kind,
            children,
            parent: None,
            level: 0,
            size_subformula: 1,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.kind.is_literal()
    }

    pub fn is_and(&self) -> bool {
        self.kind.is_and()
    }

    pub fn is_or(&self) -> bool {
        self.kind.is_or()
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn literal(&self) -> Option<(VarId, bool)> {
        match self.kind {
            NodeKind::Literal(var, positive) => Some((var, positive)),
            _ => None,
        }
    }
}
