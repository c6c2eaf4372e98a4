// SPDX-License-Identifier: Apache-2.0

//! A small, closed syntax tree for the parts of Solidity that can produce an address.
//!
//! The parse tree of `solang-parser` is lowered into this shape by [`crate::parse`]. Nodes
//! live in an arena and refer to each other by [`NodeId`], so a reference can point back at
//! its enclosing node without owning it.

use serde::Serialize;

/// Index of a node in its [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// Byte range in the original source, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    SourceUnit,
    Contract {
        name: Option<String>,
    },
    Function {
        name: Option<String>,
    },
    Block,
    /// Declaration of local variables inside a function body, possibly a tuple
    /// destructuring declaration with more than one variable.
    VariableDeclarationStatement {
        variables: Vec<NodeId>,
        initial_value: Option<NodeId>,
    },
    /// Declaration of a contract storage variable
    StateVariableDeclaration {
        variable: NodeId,
        initial_value: Option<NodeId>,
    },
    /// The declared variable itself; `identifier` is the declaring identifier node
    VariableDeclaration {
        name: Option<String>,
        identifier: Option<NodeId>,
    },
    Identifier {
        name: String,
    },
    /// Decimal or hex number, as written
    NumberLiteral {
        number: String,
    },
    StringLiteral {
        value: String,
    },
    FunctionCall {
        expression: NodeId,
        arguments: Vec<NodeId>,
    },
    MemberAccess {
        expression: NodeId,
        member_name: String,
    },
    /// Any other expression; its operands are its children
    Expression,
    /// Any other statement; its parts are its children
    Statement,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Option<Span>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Tree {
    /// Create a tree holding only its [`NodeKind::SourceUnit`] root
    pub fn new() -> Self {
        Tree {
            nodes: vec![Node {
                kind: NodeKind::SourceUnit,
                span: None,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.nodes[id.0].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Parent chain of a node, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |id| self.parent(*id))
    }

    /// Add a node as the last child of `parent`
    pub fn push(&mut self, parent: NodeId, span: Option<Span>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());

        self.nodes.push(Node {
            kind,
            span,
            parent: Some(parent),
            children: Vec::new(),
        });

        self.nodes[parent.0].children.push(id);

        id
    }

    /// Nodes referring to their children are created before the children exist; this
    /// fills in the final kind once they do.
    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.0].kind = kind;
    }

    /// Visit every node of the tree in source order
    pub fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        self.walk_from(self.root(), visitor);
    }

    /// Visit `start` and all its descendants, parents before children
    pub fn walk_from<V: Visitor + ?Sized>(&self, start: NodeId, visitor: &mut V) {
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            self.dispatch(id, visitor);

            stack.extend(self.nodes[id.0].children.iter().rev());
        }
    }

    fn dispatch<V: Visitor + ?Sized>(&self, id: NodeId, visitor: &mut V) {
        match &self.nodes[id.0].kind {
            NodeKind::VariableDeclarationStatement {
                variables,
                initial_value,
            } => visitor.visit_variable_declaration_statement(self, id, variables, *initial_value),
            NodeKind::StateVariableDeclaration {
                variable,
                initial_value,
            } => visitor.visit_state_variable_declaration(self, id, *variable, *initial_value),
            NodeKind::Identifier { name } => visitor.visit_identifier(self, id, name),
            NodeKind::NumberLiteral { number } => visitor.visit_number_literal(self, id, number),
            NodeKind::MemberAccess {
                expression,
                member_name,
            } => visitor.visit_member_access(self, id, *expression, member_name),
            NodeKind::SourceUnit
            | NodeKind::Block
            | NodeKind::FunctionCall { .. }
            | NodeKind::Contract { .. }
            | NodeKind::Function { .. }
            | NodeKind::VariableDeclaration { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::Expression
            | NodeKind::Statement => (),
        }
    }
}

/// Callbacks for the node kinds the collectors care about. Every method defaults to doing
/// nothing; the traversal itself lives in [`Tree::walk`].
#[allow(unused_variables)]
pub trait Visitor {
    fn visit_variable_declaration_statement(
        &mut self,
        tree: &Tree,
        id: NodeId,
        variables: &[NodeId],
        initial_value: Option<NodeId>,
    ) {
    }

    fn visit_state_variable_declaration(
        &mut self,
        tree: &Tree,
        id: NodeId,
        variable: NodeId,
        initial_value: Option<NodeId>,
    ) {
    }

    fn visit_identifier(&mut self, tree: &Tree, id: NodeId, name: &str) {}

    fn visit_number_literal(&mut self, tree: &Tree, id: NodeId, number: &str) {}

    fn visit_member_access(
        &mut self,
        tree: &Tree,
        id: NodeId,
        expression: NodeId,
        member_name: &str,
    ) {
    }
}
