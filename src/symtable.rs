// SPDX-License-Identifier: Apache-2.0

//! Variables initialized with an address literal, and the passes that find them.

use crate::address::is_address_like;
use crate::ast::{NodeId, NodeKind, Span, Tree, Visitor};
use std::collections::{BTreeMap, HashMap};

/// A declaration whose initializer is an address literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    /// The declaring identifier
    pub identifier: NodeId,
    /// The enclosing block or declaration statement
    pub parent: Option<NodeId>,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub address: String,
    /// Span of the declaring identifier
    pub declaration: Span,
}

/// Local variables, keyed by name and the start offset of the block they are declared in
#[derive(Debug, Default)]
pub struct LocalVariables {
    vars: HashMap<(String, usize), LocalVariable>,
}

impl LocalVariables {
    pub fn add(&mut self, name: &str, block_start: usize, var: LocalVariable) {
        self.vars.insert((name.to_owned(), block_start), var);
    }

    pub fn get(&self, name: &str, block_start: usize) -> Option<&LocalVariable> {
        self.vars.get(&(name.to_owned(), block_start))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// The declaration governing an identifier: the innermost enclosing block which declares
    /// a variable of that name. The declaring identifier resolves to its own declaration.
    pub fn find(&self, tree: &Tree, id: NodeId, name: &str) -> Option<&LocalVariable> {
        tree.ancestors(id)
            .filter(|ancestor| *tree.kind(*ancestor) == NodeKind::Block)
            .filter_map(|block| tree.span(block))
            .find_map(|block| self.get(name, block.start))
    }
}

/// Contract storage variables. Each name maps the start offset of every declaration of that
/// name to the address it was initialized with.
#[derive(Debug, Default)]
pub struct StateVariables {
    vars: BTreeMap<String, BTreeMap<usize, String>>,
}

impl StateVariables {
    pub fn add(&mut self, name: &str, offset: usize, address: &str) {
        self.vars
            .entry(name.to_owned())
            .or_default()
            .insert(offset, address.to_owned());
    }

    pub fn len(&self) -> usize {
        self.vars.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Find the declaration an identifier at `offset` refers to: of all declarations with
    /// this name which start at or before `offset`, the one starting last. Returns the
    /// declaration offset and its address. This does not look at scopes at all.
    pub fn find(&self, name: &str, offset: usize) -> Option<(usize, &str)> {
        self.vars
            .get(name)?
            .range(..=offset)
            .next_back()
            .map(|(start, address)| (*start, address.as_str()))
    }
}

/// The variable name, declaring identifier and address of a declaration of exactly one
/// variable initialized with an address-like number literal
fn address_declaration(
    tree: &Tree,
    variables: &[NodeId],
    initial_value: Option<NodeId>,
) -> Option<(String, NodeId, String)> {
    let NodeKind::NumberLiteral { number } = tree.kind(initial_value?) else {
        return None;
    };

    if !is_address_like(number) {
        return None;
    }

    // only `address a = 0x1234...`, destructuring is not followed
    let [variable] = variables else {
        return None;
    };

    match tree.kind(*variable) {
        NodeKind::VariableDeclaration {
            name: Some(name),
            identifier: Some(identifier),
        } => Some((name.to_owned(), *identifier, number.to_owned())),
        _ => None,
    }
}

#[derive(Default)]
struct LocalPass {
    vars: LocalVariables,
    declarations: Vec<Declaration>,
}

impl Visitor for LocalPass {
    fn visit_variable_declaration_statement(
        &mut self,
        tree: &Tree,
        id: NodeId,
        variables: &[NodeId],
        initial_value: Option<NodeId>,
    ) {
        let Some((name, identifier, address)) = address_declaration(tree, variables, initial_value)
        else {
            return;
        };

        let parent = tree.parent(id);

        // only a declaration directly inside a block has a scope we can search
        if let Some(block) = parent.filter(|parent| *tree.kind(*parent) == NodeKind::Block) {
            if let (Some(block), Some(declaration)) = (tree.span(block), tree.span(identifier)) {
                self.vars.add(
                    &name,
                    block.start,
                    LocalVariable {
                        address: address.clone(),
                        declaration,
                    },
                );
            }
        }

        self.declarations.push(Declaration {
            name,
            identifier,
            parent,
            address,
        });
    }
}

#[derive(Default)]
struct StatePass {
    vars: StateVariables,
    declarations: Vec<Declaration>,
}

impl Visitor for StatePass {
    fn visit_state_variable_declaration(
        &mut self,
        tree: &Tree,
        id: NodeId,
        variable: NodeId,
        initial_value: Option<NodeId>,
    ) {
        let Some((name, identifier, address)) =
            address_declaration(tree, &[variable], initial_value)
        else {
            return;
        };

        if let Some(span) = tree.span(identifier) {
            self.vars.add(&name, span.start, &address);
        }

        self.declarations.push(Declaration {
            name,
            identifier,
            parent: tree.parent(id),
            address,
        });
    }
}

/// Find local variables declared with an address literal
pub fn local_variables(tree: &Tree) -> (LocalVariables, Vec<Declaration>) {
    let mut pass = LocalPass::default();

    tree.walk(&mut pass);

    (pass.vars, pass.declarations)
}

/// Find contract storage variables declared with an address literal
pub fn state_variables(tree: &Tree) -> (StateVariables, Vec<Declaration>) {
    let mut pass = StatePass::default();

    tree.walk(&mut pass);

    (pass.vars, pass.declarations)
}
