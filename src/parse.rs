// SPDX-License-Identifier: Apache-2.0

//! Parse Solidity source with `solang-parser` and lower its parse tree into [`ast::Tree`].

use crate::ast::{NodeId, NodeKind, Span, Tree};
use solang_parser::pt;
use tracing::{debug, warn};

/// Parse a source file. Syntax errors are logged and give `None`; the caller should treat
/// that as "nothing to extract from this file".
pub fn parse(src: &str) -> Option<Tree> {
    match solang_parser::parse(src, 0) {
        Ok((unit, _comments)) => {
            let mut lowering = Lowering::default();
            let root = lowering.tree.root();

            for part in &unit.0 {
                lowering.source_unit_part(part, root);
            }

            Some(lowering.tree)
        }
        Err(diagnostics) => {
            for diagnostic in &diagnostics {
                debug!("{:?}: {}", diagnostic.loc, diagnostic.message);
            }
            warn!("source does not parse, {} errors", diagnostics.len());

            None
        }
    }
}

fn span(loc: &pt::Loc) -> Option<Span> {
    match loc {
        pt::Loc::File(_, start, end) => Some(Span::new(*start, *end)),
        _ => None,
    }
}

fn join(first: Option<Span>, last: Option<Span>) -> Option<Span> {
    match (first, last) {
        (Some(first), Some(last)) => Some(Span::new(first.start, last.end)),
        _ => None,
    }
}

/// Something in the parse tree that lowers to zero or more nodes under `parent`
trait Lower {
    fn lower(&self, cx: &mut Lowering, parent: NodeId);
}

impl Lower for pt::Expression {
    fn lower(&self, cx: &mut Lowering, parent: NodeId) {
        cx.expression(self, parent);
    }
}

impl Lower for pt::Statement {
    fn lower(&self, cx: &mut Lowering, parent: NodeId) {
        cx.statement(self, parent);
    }
}

impl<T: Lower> Lower for Box<T> {
    fn lower(&self, cx: &mut Lowering, parent: NodeId) {
        self.as_ref().lower(cx, parent);
    }
}

impl<T: Lower> Lower for Option<T> {
    fn lower(&self, cx: &mut Lowering, parent: NodeId) {
        if let Some(inner) = self {
            inner.lower(cx, parent);
        }
    }
}

impl<T: Lower> Lower for Vec<T> {
    fn lower(&self, cx: &mut Lowering, parent: NodeId) {
        for item in self {
            item.lower(cx, parent);
        }
    }
}

#[derive(Default)]
struct Lowering {
    tree: Tree,
}

impl Lowering {
    fn source_unit_part(&mut self, part: &pt::SourceUnitPart, parent: NodeId) {
        match part {
            pt::SourceUnitPart::ContractDefinition(def) => self.contract(def, parent),
            pt::SourceUnitPart::FunctionDefinition(def) => self.function(def, parent),
            pt::SourceUnitPart::VariableDefinition(def) => {
                // file level constants are not contract storage
                let id = self.tree.push(parent, span(&def.loc), NodeKind::Statement);

                self.declaration(&def.loc, def.name.as_ref(), id);
                def.initializer.lower(self, id);
            }
            _ => (),
        }
    }

    fn contract(&mut self, def: &pt::ContractDefinition, parent: NodeId) {
        let id = self.tree.push(
            parent,
            span(&def.loc),
            NodeKind::Contract {
                name: def.name.as_ref().map(|id| id.name.to_owned()),
            },
        );

        for base in &def.base {
            base.args.lower(self, id);
        }

        for part in &def.parts {
            match part {
                pt::ContractPart::VariableDefinition(var) => self.state_variable(var, id),
                pt::ContractPart::FunctionDefinition(func) => self.function(func, id),
                _ => (),
            }
        }
    }

    fn state_variable(&mut self, def: &pt::VariableDefinition, parent: NodeId) {
        let id = self
            .tree
            .push(parent, span(&def.loc), NodeKind::Statement);

        let variable = self.declaration(&def.loc, def.name.as_ref(), id);

        let initial_value = def.initializer.as_ref().map(|init| self.expression(init, id));

        self.tree.set_kind(
            id,
            NodeKind::StateVariableDeclaration {
                variable,
                initial_value,
            },
        );
    }

    fn function(&mut self, def: &pt::FunctionDefinition, parent: NodeId) {
        let id = self.tree.push(
            parent,
            span(&def.loc),
            NodeKind::Function {
                name: def.name.as_ref().map(|id| id.name.to_owned()),
            },
        );

        self.parameters(&def.params, id);

        for attr in &def.attributes {
            if let pt::FunctionAttribute::BaseOrModifier(_, base) = attr {
                base.args.lower(self, id);
            }
        }

        self.parameters(&def.returns, id);

        def.body.lower(self, id);
    }

    fn parameters(&mut self, params: &pt::ParameterList, parent: NodeId) {
        for (loc, param) in params {
            if let Some(param) = param {
                self.declaration(loc, param.name.as_ref(), parent);
            }
        }
    }

    /// A declared variable and its declaring identifier. The type expression is not lowered;
    /// type names are not uses of a value.
    fn declaration(
        &mut self,
        loc: &pt::Loc,
        name: Option<&pt::Identifier>,
        parent: NodeId,
    ) -> NodeId {
        let id = self.tree.push(
            parent,
            span(loc),
            NodeKind::VariableDeclaration {
                name: None,
                identifier: None,
            },
        );

        if let Some(name) = name {
            let identifier = self.identifier(name, id);

            self.tree.set_kind(
                id,
                NodeKind::VariableDeclaration {
                    name: Some(name.name.to_owned()),
                    identifier: Some(identifier),
                },
            );
        }

        id
    }

    fn identifier(&mut self, id: &pt::Identifier, parent: NodeId) -> NodeId {
        self.tree.push(
            parent,
            span(&id.loc),
            NodeKind::Identifier {
                name: id.name.to_owned(),
            },
        )
    }

    fn statement(&mut self, stmt: &pt::Statement, parent: NodeId) {
        match stmt {
            pt::Statement::Block {
                loc, statements, ..
            } => {
                let id = self.tree.push(parent, span(loc), NodeKind::Block);

                statements.lower(self, id);
            }
            pt::Statement::VariableDefinition(loc, decl, initializer) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                let variable = self.declaration(&decl.loc, decl.name.as_ref(), id);
                let initial_value = initializer.as_ref().map(|init| self.expression(init, id));

                self.tree.set_kind(
                    id,
                    NodeKind::VariableDeclarationStatement {
                        variables: vec![variable],
                        initial_value,
                    },
                );
            }
            pt::Statement::Expression(loc, expr) => {
                if let pt::Expression::Assign(_, left, right) = expr {
                    if let pt::Expression::List(_, params) = left.as_ref() {
                        if params
                            .iter()
                            .any(|(_, param)| matches!(param, Some(p) if p.name.is_some()))
                        {
                            self.destructuring(loc, params, right, parent);
                            return;
                        }
                    }
                }

                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                self.expression(expr, id);
            }
            pt::Statement::If(loc, cond, then, otherwise) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                self.expression(cond, id);
                then.lower(self, id);
                otherwise.lower(self, id);
            }
            pt::Statement::While(loc, cond, body) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                self.expression(cond, id);
                body.lower(self, id);
            }
            pt::Statement::DoWhile(loc, body, cond) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                body.lower(self, id);
                self.expression(cond, id);
            }
            pt::Statement::For(loc, init, cond, next, body) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                init.lower(self, id);
                cond.lower(self, id);
                next.lower(self, id);
                body.lower(self, id);
            }
            pt::Statement::Return(loc, value) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                value.lower(self, id);
            }
            pt::Statement::Emit(loc, event) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                self.expression(event, id);
            }
            pt::Statement::Revert(loc, _, args) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                args.lower(self, id);
            }
            pt::Statement::Args(loc, args) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                for arg in args {
                    self.expression(&arg.expr, id);
                }
            }
            pt::Statement::Try(loc, expr, returns, clauses) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Statement);

                self.expression(expr, id);

                if let Some((params, body)) = returns {
                    self.parameters(params, id);
                    body.lower(self, id);
                }

                for clause in clauses {
                    match clause {
                        pt::CatchClause::Simple(_, _, body) => body.lower(self, id),
                        pt::CatchClause::Named(_, _, _, body) => body.lower(self, id),
                    }
                }
            }
            // assembly and the remaining statements cannot hold Solidity expressions
            _ => {
                self.tree.push(parent, None, NodeKind::Statement);
            }
        }
    }

    /// `(address a, , uint b) = f();` declares several variables at once
    fn destructuring(
        &mut self,
        loc: &pt::Loc,
        params: &pt::ParameterList,
        init: &pt::Expression,
        parent: NodeId,
    ) {
        let id = self.tree.push(parent, span(loc), NodeKind::Statement);

        let variables = params
            .iter()
            .filter_map(|(loc, param)| param.as_ref().map(|param| (loc, param)))
            .map(|(loc, param)| self.declaration(loc, param.name.as_ref(), id))
            .collect();

        let initial_value = Some(self.expression(init, id));

        self.tree.set_kind(
            id,
            NodeKind::VariableDeclarationStatement {
                variables,
                initial_value,
            },
        );
    }

    fn expression(&mut self, expr: &pt::Expression, parent: NodeId) -> NodeId {
        match expr {
            pt::Expression::Variable(id) => self.identifier(id, parent),
            pt::Expression::NumberLiteral(loc, integer, exp, _) => {
                let number = if exp.is_empty() {
                    integer.to_owned()
                } else {
                    format!("{integer}e{exp}")
                };

                self.tree
                    .push(parent, span(loc), NodeKind::NumberLiteral { number })
            }
            pt::Expression::HexNumberLiteral(loc, number, _) => self.tree.push(
                parent,
                span(loc),
                NodeKind::NumberLiteral {
                    number: number.to_owned(),
                },
            ),
            pt::Expression::StringLiteral(parts) => {
                let value = parts.iter().map(|part| part.string.as_str()).collect();
                let loc = join(
                    parts.first().and_then(|part| span(&part.loc)),
                    parts.last().and_then(|part| span(&part.loc)),
                );

                self.tree.push(parent, loc, NodeKind::StringLiteral { value })
            }
            // parentheses have no node of their own
            pt::Expression::Parenthesis(_, inner) => self.expression(inner, parent),
            pt::Expression::FunctionCall(loc, callee, args) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                let expression = self.expression(callee, id);
                let arguments = args.iter().map(|arg| self.expression(arg, id)).collect();

                self.tree.set_kind(
                    id,
                    NodeKind::FunctionCall {
                        expression,
                        arguments,
                    },
                );

                id
            }
            pt::Expression::MemberAccess(loc, object, member) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                let expression = self.expression(object, id);

                self.tree.set_kind(
                    id,
                    NodeKind::MemberAccess {
                        expression,
                        member_name: member.name.to_owned(),
                    },
                );

                id
            }
            pt::Expression::NamedFunctionCall(loc, callee, args) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                self.expression(callee, id);
                for arg in args {
                    self.expression(&arg.expr, id);
                }

                id
            }
            pt::Expression::FunctionCallBlock(loc, callee, block) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                self.expression(callee, id);
                block.lower(self, id);

                id
            }
            pt::Expression::List(loc, params) => {
                // tuples such as `(a, b)` are parameter lists whose types are the values
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                for param in params.iter().filter_map(|(_, param)| param.as_ref()) {
                    self.expression(&param.ty, id);
                    if let Some(name) = &param.name {
                        self.identifier(name, id);
                    }
                }

                id
            }
            pt::Expression::ArrayLiteral(loc, items) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                items.lower(self, id);

                id
            }
            pt::Expression::PostIncrement(loc, e)
            | pt::Expression::PostDecrement(loc, e)
            | pt::Expression::New(loc, e)
            | pt::Expression::Not(loc, e)
            | pt::Expression::BitwiseNot(loc, e)
            | pt::Expression::Delete(loc, e)
            | pt::Expression::PreIncrement(loc, e)
            | pt::Expression::PreDecrement(loc, e)
            | pt::Expression::UnaryPlus(loc, e)
            | pt::Expression::Negate(loc, e) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                self.expression(e, id);

                id
            }
            pt::Expression::Power(loc, l, r)
            | pt::Expression::Multiply(loc, l, r)
            | pt::Expression::Divide(loc, l, r)
            | pt::Expression::Modulo(loc, l, r)
            | pt::Expression::Add(loc, l, r)
            | pt::Expression::Subtract(loc, l, r)
            | pt::Expression::ShiftLeft(loc, l, r)
            | pt::Expression::ShiftRight(loc, l, r)
            | pt::Expression::BitwiseAnd(loc, l, r)
            | pt::Expression::BitwiseXor(loc, l, r)
            | pt::Expression::BitwiseOr(loc, l, r)
            | pt::Expression::Less(loc, l, r)
            | pt::Expression::More(loc, l, r)
            | pt::Expression::LessEqual(loc, l, r)
            | pt::Expression::MoreEqual(loc, l, r)
            | pt::Expression::Equal(loc, l, r)
            | pt::Expression::NotEqual(loc, l, r)
            | pt::Expression::And(loc, l, r)
            | pt::Expression::Or(loc, l, r)
            | pt::Expression::Assign(loc, l, r)
            | pt::Expression::AssignOr(loc, l, r)
            | pt::Expression::AssignAnd(loc, l, r)
            | pt::Expression::AssignXor(loc, l, r)
            | pt::Expression::AssignShiftLeft(loc, l, r)
            | pt::Expression::AssignShiftRight(loc, l, r)
            | pt::Expression::AssignAdd(loc, l, r)
            | pt::Expression::AssignSubtract(loc, l, r)
            | pt::Expression::AssignMultiply(loc, l, r)
            | pt::Expression::AssignDivide(loc, l, r)
            | pt::Expression::AssignModulo(loc, l, r) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                self.expression(l, id);
                self.expression(r, id);

                id
            }
            pt::Expression::ConditionalOperator(loc, cond, l, r) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                self.expression(cond, id);
                self.expression(l, id);
                self.expression(r, id);

                id
            }
            pt::Expression::ArraySubscript(loc, array, index) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                self.expression(array, id);
                index.lower(self, id);

                id
            }
            pt::Expression::ArraySlice(loc, array, from, to) => {
                let id = self.tree.push(parent, span(loc), NodeKind::Expression);

                self.expression(array, id);
                from.lower(self, id);
                to.lower(self, id);

                id
            }
            // bool, rational, hex string and address literals, and types
            _ => self.tree.push(parent, None, NodeKind::Expression),
        }
    }
}
