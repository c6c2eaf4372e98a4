// SPDX-License-Identifier: Apache-2.0

//! Turn the address producing nodes of a [`Tree`] into [`AddressReference`]s.

use crate::address::is_address_like;
use crate::ast::{NodeId, NodeKind, Span, Tree, Visitor};
use crate::file::LineIndex;
use crate::library::LinkedLibrary;
use crate::references::{AddressReference, CallRequest, Resolution, Source};
use crate::symtable::{Declaration, LocalVariables, StateVariables};
use std::collections::BTreeMap;
use tracing::debug;

/// A node producing an address, before its position is known
struct Found {
    node: NodeId,
    parent: Option<NodeId>,
    resolution: Resolution,
    source: Source,
}

pub struct Collector<'a> {
    tree: &'a Tree,
    lines: LineIndex,
    contract_path: &'a str,
    contract_name: &'a str,
    references: Vec<AddressReference>,
    skipped: usize,
}

impl<'a> Collector<'a> {
    pub fn new(tree: &'a Tree, source: &str, contract_path: &'a str, contract_name: &'a str) -> Self {
        Collector {
            tree,
            lines: LineIndex::new(source),
            contract_path,
            contract_name,
            references: Vec::new(),
            skipped: 0,
        }
    }

    /// Emit a reference for a node. A node without a source location cannot be shown to
    /// anyone, so it is counted and left out.
    fn emit(&mut self, found: Found) {
        let Some(span) = self.tree.span(found.node) else {
            debug!("no location for {:?}, skipping {} reference", found.node, found.source);
            self.skipped += 1;
            return;
        };

        let (start, end) = self.lines.span_positions(span);

        self.references.push(AddressReference {
            contract_path: self.contract_path.to_owned(),
            contract_name: self.contract_name.to_owned(),
            resolution: found.resolution,
            loc_start_line: start.line,
            loc_start_col: start.column,
            loc_end_line: end.line,
            loc_end_col: end.column,
            range_from: span.start,
            range_to: span.end,
            source: found.source,
            parent: found.parent,
        });
    }

    fn emit_all(&mut self, found: Vec<Found>) {
        for found in found {
            self.emit(found);
        }
    }

    /// Every address-like number literal, wherever it appears
    pub fn hardcoded(&mut self) {
        let mut pass = Hardcoded::default();

        self.tree.walk(&mut pass);

        self.emit_all(pass.found);
    }

    /// Each local declaration, followed by the uses of it in its block
    pub fn local_variables(&mut self, locals: &LocalVariables, declarations: &[Declaration]) {
        for decl in declarations {
            self.emit(Found {
                node: decl.identifier,
                parent: decl.parent,
                resolution: Resolution::Resolved(decl.address.clone()),
                source: Source::Variable,
            });

            let (Some(block), Some(declaration)) = (decl.parent, self.tree.span(decl.identifier))
            else {
                continue;
            };

            if *self.tree.kind(block) != NodeKind::Block {
                continue;
            }

            let mut pass = LocalUses {
                locals,
                decl,
                declaration,
                found: Vec::new(),
            };

            self.tree.walk_from(block, &mut pass);

            self.emit_all(pass.found);
        }
    }

    /// Each state declaration, then every identifier which refers to one of them. An
    /// identifier refers to the nearest state declaration of its name at or before it, even
    /// when a local of the same name is in scope.
    pub fn state_variables(&mut self, state: &StateVariables, declarations: &[Declaration]) {
        for decl in declarations {
            self.emit(Found {
                node: decl.identifier,
                parent: decl.parent,
                resolution: Resolution::Resolved(decl.address.clone()),
                source: Source::State,
            });
        }

        let mut pass = StateUses {
            state,
            found: Vec::new(),
        };

        self.tree.walk(&mut pass);

        self.emit_all(pass.found);
    }

    /// Calls returning an address which can be made without running the contract: casts
    /// such as `IFactory(0x1234...).pool(a)`, and calls of linked libraries like
    /// `Pools.pool(a)`. These are pending until the call is made.
    pub fn calls(
        &mut self,
        locals: &LocalVariables,
        state: &StateVariables,
        libraries: &BTreeMap<String, LinkedLibrary>,
    ) {
        let mut pass = Calls {
            values: Values { locals, state },
            libraries,
            found: Vec::new(),
        };

        self.tree.walk(&mut pass);

        self.emit_all(pass.found);
    }

    /// The references collected so far, and the number of nodes skipped for lack of a
    /// location
    pub fn finish(self) -> (Vec<AddressReference>, usize) {
        (self.references, self.skipped)
    }
}

#[derive(Default)]
struct Hardcoded {
    found: Vec<Found>,
}

impl Visitor for Hardcoded {
    fn visit_number_literal(&mut self, tree: &Tree, id: NodeId, number: &str) {
        if is_address_like(number) {
            self.found.push(Found {
                node: id,
                parent: tree.parent(id),
                resolution: Resolution::Resolved(number.to_owned()),
                source: Source::Hardcoded,
            });
        }
    }
}

struct LocalUses<'a> {
    locals: &'a LocalVariables,
    decl: &'a Declaration,
    /// span of the declaring identifier
    declaration: Span,
    found: Vec<Found>,
}

impl Visitor for LocalUses<'_> {
    fn visit_identifier(&mut self, tree: &Tree, id: NodeId, name: &str) {
        if name != self.decl.name || tree.span(id) == Some(self.declaration) {
            return;
        }

        // a nested block may declare the same name again
        let governed = self
            .locals
            .find(tree, id, name)
            .is_some_and(|var| var.declaration == self.declaration);

        if governed {
            self.found.push(Found {
                node: id,
                parent: tree.parent(id),
                resolution: Resolution::Resolved(self.decl.address.clone()),
                source: Source::Variable,
            });
        }
    }
}

struct StateUses<'a> {
    state: &'a StateVariables,
    found: Vec<Found>,
}

impl Visitor for StateUses<'_> {
    fn visit_identifier(&mut self, tree: &Tree, id: NodeId, name: &str) {
        let Some(span) = tree.span(id) else {
            return;
        };

        match self.state.find(name, span.start) {
            // the declaration itself
            Some((offset, _)) if offset == span.start => (),
            Some((_, address)) => self.found.push(Found {
                node: id,
                parent: tree.parent(id),
                resolution: Resolution::Resolved(address.to_owned()),
                source: Source::State,
            }),
            None => (),
        }
    }
}

/// Values of call arguments known from the source alone
struct Values<'a> {
    locals: &'a LocalVariables,
    state: &'a StateVariables,
}

impl Values<'_> {
    fn identifier(&self, tree: &Tree, id: NodeId, name: &str) -> Option<String> {
        if let Some(var) = self.locals.find(tree, id, name) {
            return Some(var.address.clone());
        }

        let offset = tree.span(id)?.start;

        self.state
            .find(name, offset)
            .map(|(_, address)| address.to_owned())
    }

    fn argument(&self, tree: &Tree, id: NodeId) -> Option<String> {
        match tree.kind(id) {
            NodeKind::NumberLiteral { number } => Some(number.to_owned()),
            NodeKind::StringLiteral { value } => Some(value.to_owned()),
            NodeKind::Identifier { name } => self.identifier(tree, id, name),
            _ => None,
        }
    }
}

struct Calls<'a> {
    values: Values<'a>,
    libraries: &'a BTreeMap<String, LinkedLibrary>,
    found: Vec<Found>,
}

impl Calls<'_> {
    /// The contract a member is called on, if the source says which one
    fn target(&self, tree: &Tree, object: NodeId, member_name: &str) -> Option<String> {
        match tree.kind(object) {
            NodeKind::FunctionCall {
                expression,
                arguments,
            } if matches!(tree.kind(*expression), NodeKind::Identifier { .. }) => {
                let [address] = arguments.as_slice() else {
                    return None;
                };

                match tree.kind(*address) {
                    NodeKind::NumberLiteral { number } => Some(number.to_owned()),
                    NodeKind::Identifier { name } => self.values.identifier(tree, *address, name),
                    _ => None,
                }
            }
            NodeKind::Identifier { name } => self
                .libraries
                .get(name)
                .filter(|library| library.address_functions.contains(member_name))
                .map(|library| library.address.clone()),
            _ => None,
        }
    }

    fn call(
        &self,
        tree: &Tree,
        id: NodeId,
        object: NodeId,
        member_name: &str,
    ) -> Option<Found> {
        let call = tree.parent(id)?;

        let NodeKind::FunctionCall {
            expression,
            arguments,
        } = tree.kind(call)
        else {
            return None;
        };

        // `f(a.b)` passes a member, it does not call it
        if *expression != id {
            return None;
        }

        let target = self.target(tree, object, member_name)?;

        let args = arguments
            .iter()
            .map(|arg| self.values.argument(tree, *arg))
            .collect::<Option<Vec<_>>>()?;

        Some(Found {
            node: id,
            parent: Some(call),
            resolution: Resolution::Pending(CallRequest {
                target,
                function: member_name.to_owned(),
                args,
            }),
            source: Source::PublicFunction,
        })
    }
}

impl Visitor for Calls<'_> {
    fn visit_member_access(
        &mut self,
        tree: &Tree,
        id: NodeId,
        expression: NodeId,
        member_name: &str,
    ) {
        if let Some(found) = self.call(tree, id, expression, member_name) {
            self.found.push(found);
        }
    }
}
