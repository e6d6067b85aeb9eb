//! Semantic actions.
//!
//! The parser calls one `act_on_*` method per grammar reduction. Each
//! method both builds the typed node and enforces the semantic rules,
//! so the grammar and the type system are validated together in a
//! single pass. The first violation aborts the compilation.
use std::{collections::HashSet, rc::Rc};

use smol_str::SmolStr;

use crate::error::{CminError, CminResult};

use super::{
    ast::*,
    scope::Scope,
    symbol::Symbol,
    tokens::Token,
    types::TypeInfo,
};

/// Name, position and derived type of a declarator, plus the parameter
/// symbols when the declared name is directly a function.
struct Derived {
    name: SmolStr,
    line: usize,
    type_info: Rc<TypeInfo>,
    params: Vec<(Rc<Symbol>, usize)>,
}

/// Context carried between the beginning and end of a function
/// definition.
pub struct FunctionContext {
    line: usize,
    symbol: Rc<Symbol>,
    params: Vec<Rc<Symbol>>,
    scope: Rc<Scope>,
}

pub struct Semantics {
    file: String,
    int_type: Rc<TypeInfo>,
    current_scope: Rc<Scope>,
    /// Return type of the function currently being defined.
    return_type: Option<Rc<TypeInfo>>,
    /// Functions that already have a body.
    defined: HashSet<SmolStr>,
}

impl Semantics {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            int_type: Rc::new(TypeInfo::Int),
            current_scope: Scope::new(None),
            return_type: None,
            defined: HashSet::new(),
        }
    }

    pub fn current_scope(&self) -> Rc<Scope> {
        Rc::clone(&self.current_scope)
    }

    // ------------------------------------------------------------------------
    // Declarations

    // root:
    //     external-declaration*
    pub fn act_on_root_ended(&mut self, declarations: Vec<Declaration>) -> Program {
        Program {
            filename: self.file.clone(),
            scope: Rc::clone(&self.current_scope),
            declarations,
        }
    }

    // integer-type:
    //     'int'
    pub fn act_on_integer_type(&self, token: &Token) -> TypeSpecifier {
        TypeSpecifier {
            line: token.line,
            type_info: Rc::clone(&self.int_type),
        }
    }

    // parameter-declaration:
    //     type declarator
    pub fn act_on_parameter_declaration(
        &mut self,
        specifier: TypeSpecifier,
        mut declarator: Declarator,
    ) -> ParameterDeclaration {
        let derived = derive(&declarator, Rc::clone(&specifier.type_info));
        let symbol = Symbol::new(derived.name, derived.type_info);
        set_declarator_symbol(&mut declarator, &symbol);

        ParameterDeclaration {
            line: derived.line,
            specifier,
            declarator,
            symbol,
        }
    }

    // declaration:
    //     type declarator ';'
    pub fn act_on_simple_declaration(
        &mut self,
        specifier: TypeSpecifier,
        mut declarator: Declarator,
    ) -> CminResult<Declaration> {
        let derived = derive(&declarator, Rc::clone(&specifier.type_info));

        if derived.type_info.is_function() {
            let symbol = self.declare_function(&derived)?;
            set_declarator_symbol(&mut declarator, &symbol);

            Ok(Declaration::Prototype(FunctionPrototype {
                line: derived.line,
                specifier,
                declarator,
                symbol,
            }))
        } else {
            let symbol = self.declare_variable(&derived)?;
            set_declarator_symbol(&mut declarator, &symbol);

            Ok(Declaration::Variable(VariableDeclaration {
                line: derived.line,
                specifier,
                declarator,
                symbol,
            }))
        }
    }

    // function-definition:
    //     type declarator compound-statement
    pub fn act_on_function_definition_began(
        &mut self,
        specifier: &TypeSpecifier,
        declarator: &mut Declarator,
    ) -> CminResult<FunctionContext> {
        let derived = derive(declarator, Rc::clone(&specifier.type_info));

        let ret = match &*derived.type_info {
            TypeInfo::Function { ret, .. } => Rc::clone(ret),
            _ => {
                return Err(self.error(
                    derived.line,
                    format!("`{}' is not a function.", derived.name),
                ))
            }
        };

        let symbol = self.declare_function(&derived)?;
        set_declarator_symbol(declarator, &symbol);

        if !self.defined.insert(derived.name.clone()) {
            return Err(self.error(
                derived.line,
                format!("redefinition of function `{}'.", derived.name),
            ));
        }

        // The function scope holds the parameters and is shared with
        // the body's compound statement.
        let scope = self.push_scope();

        let mut params = Vec::with_capacity(derived.params.len());
        for (param, line) in derived.params {
            if !scope.try_register(Rc::clone(&param)) {
                return Err(self.error(
                    line,
                    format!("`{}' is already declared in this scope.", param.name()),
                ));
            }
            params.push(param);
        }

        self.return_type = Some(ret);

        Ok(FunctionContext {
            line: derived.line,
            symbol,
            params,
            scope,
        })
    }

    pub fn act_on_function_definition_ended(
        &mut self,
        context: FunctionContext,
        specifier: TypeSpecifier,
        declarator: Declarator,
        body: CompoundStatement,
    ) -> Declaration {
        self.pop_scope();
        self.return_type = None;

        Declaration::Function(FunctionDefinition {
            line: context.line,
            specifier,
            declarator,
            symbol: context.symbol,
            params: context.params,
            scope: context.scope,
            body,
        })
    }

    // ------------------------------------------------------------------------
    // Statements

    // compound-statement:
    //     '{' statement* '}'
    pub fn act_on_compound_began(&mut self) -> Rc<Scope> {
        self.push_scope()
    }

    pub fn act_on_compound_ended(&mut self) {
        self.pop_scope();
    }

    // empty-statement:
    //     ';'
    pub fn act_on_empty_statement(&self, token: &Token) -> Statement {
        Statement::Empty { line: token.line }
    }

    // if-statement:
    //     'if' '(' expression ')' statement
    //     'if' '(' expression ')' statement 'else' statement
    pub fn act_on_if_statement(
        &self,
        token: &Token,
        condition: Expression,
        then: Statement,
        otherwise: Option<Statement>,
    ) -> CminResult<Statement> {
        self.check_condition("if", &condition)?;

        Ok(Statement::If {
            line: token.line,
            condition,
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        })
    }

    // while-statement:
    //     'while' '(' expression ')' statement
    pub fn act_on_while_statement(
        &self,
        token: &Token,
        condition: Expression,
        body: Statement,
    ) -> CminResult<Statement> {
        self.check_condition("while", &condition)?;

        Ok(Statement::While {
            line: token.line,
            condition,
            body: Box::new(body),
        })
    }

    // return-statement:
    //     'return' expression? ';'
    pub fn act_on_return_statement(
        &self,
        token: &Token,
        value: Option<Expression>,
    ) -> CminResult<Statement> {
        // A bare `return` is accepted unconditionally.
        if let Some(value) = &value {
            let expected = self
                .return_type
                .as_ref()
                .expect("return statement outside a function");

            if value.type_info != *expected {
                return Err(self.error(
                    value.line,
                    format!(
                        "incompatible return type `{}', expected `{}'.",
                        value.type_info, expected
                    ),
                ));
            }
        }

        Ok(Statement::Return {
            line: token.line,
            value,
        })
    }

    // expression-statement:
    //     expression ';'
    pub fn act_on_expression_statement(&self, expression: Expression) -> Statement {
        Statement::Expression {
            line: expression.line,
            expression,
        }
    }

    // ------------------------------------------------------------------------
    // Expressions

    // expression:
    //     assignment {',' assignment}*
    pub fn act_on_comma_expression(&self, lhs: Expression, rhs: Expression) -> Expression {
        Expression {
            line: lhs.line,
            type_info: Rc::clone(&rhs.type_info),
            category: ValueCategory::Rvalue,
            kind: ExprKind::Comma {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    // assignment:
    //     unary '=' assignment
    pub fn act_on_assignment(&self, lhs: Expression, rhs: Expression) -> CminResult<Expression> {
        if !lhs.is_lvalue() {
            return Err(self.error(lhs.line, "lvalue required as left operand of `='."));
        }

        if lhs.type_info != rhs.type_info {
            return Err(self.error(
                lhs.line,
                format!(
                    "incompatible types in assignment of `{}' to `{}'.",
                    rhs.type_info, lhs.type_info
                ),
            ));
        }

        Ok(Expression {
            line: lhs.line,
            type_info: Rc::clone(&lhs.type_info),
            category: ValueCategory::Rvalue,
            kind: ExprKind::Assign {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        })
    }

    // additive / bitwise:
    //     lhs op rhs, both operands exactly `int`
    pub fn act_on_binary_expression(
        &self,
        op: BinaryOp,
        lhs: Expression,
        rhs: Expression,
    ) -> CminResult<Expression> {
        if !lhs.type_info.is_int() || !rhs.type_info.is_int() {
            return Err(self.error(
                lhs.line,
                format!(
                    "invalid operands to binary `{}' (have `{}' and `{}').",
                    op.text(),
                    lhs.type_info,
                    rhs.type_info
                ),
            ));
        }

        Ok(Expression {
            line: lhs.line,
            type_info: Rc::clone(&self.int_type),
            category: ValueCategory::Rvalue,
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        })
    }

    // unary:
    //     ('+' | '-') unary
    pub fn act_on_unary_expression(
        &self,
        op: UnaryOp,
        token: &Token,
        operand: Expression,
    ) -> CminResult<Expression> {
        if !operand.type_info.is_int() {
            return Err(self.error(
                token.line,
                format!(
                    "invalid operand to unary `{}' (have `{}').",
                    op.text(),
                    operand.type_info
                ),
            ));
        }

        Ok(Expression {
            line: token.line,
            type_info: Rc::clone(&self.int_type),
            category: ValueCategory::Rvalue,
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    // unary:
    //     '&' unary
    pub fn act_on_address_of(&self, token: &Token, operand: Expression) -> CminResult<Expression> {
        if !operand.is_lvalue() {
            return Err(self.error(token.line, "lvalue required as operand of unary `&'."));
        }

        Ok(Expression {
            line: token.line,
            type_info: Rc::new(TypeInfo::Pointer(Rc::clone(&operand.type_info))),
            category: ValueCategory::Rvalue,
            kind: ExprKind::AddressOf {
                operand: Box::new(operand),
            },
        })
    }

    // unary:
    //     '*' unary
    pub fn act_on_dereference(&self, token: &Token, operand: Expression) -> CminResult<Expression> {
        let pointee = match operand.type_info.pointee() {
            Some(pointee) => Rc::clone(pointee),
            None => {
                return Err(self.error(
                    token.line,
                    format!(
                        "invalid operand to unary `*' (have `{}').",
                        operand.type_info
                    ),
                ))
            }
        };

        Ok(Expression {
            line: token.line,
            type_info: pointee,
            category: ValueCategory::Lvalue,
            kind: ExprKind::Dereference {
                operand: Box::new(operand),
            },
        })
    }

    // postfix:
    //     callee '(' argument-list ')'
    pub fn act_on_call_expression(
        &self,
        callee: Expression,
        arguments: Vec<Expression>,
    ) -> CminResult<Expression> {
        let (ret, params) = match &*callee.type_info {
            TypeInfo::Function { ret, params } => (Rc::clone(ret), params.clone()),
            _ => {
                return Err(self.error(
                    callee.line,
                    format!(
                        "called object is not a function (have `{}').",
                        callee.type_info
                    ),
                ))
            }
        };

        if params.len() != arguments.len() {
            return Err(self.error(
                callee.line,
                format!(
                    "wrong number of arguments to function call (expected {}, got {}).",
                    params.len(),
                    arguments.len()
                ),
            ));
        }

        for (position, (param, argument)) in params.iter().zip(&arguments).enumerate() {
            if argument.type_info != *param {
                return Err(self.error(
                    argument.line,
                    format!(
                        "incompatible type for argument {} (expected `{}', got `{}').",
                        position + 1,
                        param,
                        argument.type_info
                    ),
                ));
            }
        }

        Ok(Expression {
            line: callee.line,
            type_info: ret,
            category: ValueCategory::Rvalue,
            kind: ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
        })
    }

    // paren-expression:
    //     '(' expression ')'
    pub fn act_on_paren_expression(&self, token: &Token, inner: Expression) -> Expression {
        Expression {
            line: token.line,
            type_info: Rc::clone(&inner.type_info),
            category: inner.category,
            kind: ExprKind::Paren {
                inner: Box::new(inner),
            },
        }
    }

    // identifier-expression:
    //     identifier
    pub fn act_on_identifier_expression(&self, token: &Token) -> CminResult<Expression> {
        let symbol = match self.current_scope.find(&token.text) {
            Some(symbol) => symbol,
            None => {
                return Err(self.error(
                    token.line,
                    format!("undeclared identifier `{}'.", token.text),
                ))
            }
        };

        Ok(Expression {
            line: token.line,
            type_info: Rc::clone(symbol.type_info()),
            category: ValueCategory::Lvalue,
            kind: ExprKind::Identifier {
                name: token.text.clone(),
                symbol,
            },
        })
    }

    // integer-expression:
    //     integer-literal
    pub fn act_on_integer_expression(&self, token: &Token) -> Expression {
        Expression {
            line: token.line,
            type_info: Rc::clone(&self.int_type),
            category: ValueCategory::Rvalue,
            kind: ExprKind::Integer {
                value: token.integer(),
            },
        }
    }

    // ------------------------------------------------------------------------
    // Internals

    fn push_scope(&mut self) -> Rc<Scope> {
        let scope = Scope::new(Some(Rc::clone(&self.current_scope)));
        self.current_scope = Rc::clone(&scope);
        scope
    }

    fn pop_scope(&mut self) {
        let parent = self
            .current_scope
            .parent()
            .cloned()
            .expect("scope popped below the global scope");
        self.current_scope = parent;
    }

    /// Register a variable in the current scope. Redeclaration in the
    /// same scope is an error; shadowing an outer scope is not.
    fn declare_variable(&mut self, derived: &Derived) -> CminResult<Rc<Symbol>> {
        if self.current_scope.find_local(&derived.name).is_some() {
            return Err(self.error(
                derived.line,
                format!("`{}' is already declared in this scope.", derived.name),
            ));
        }

        let symbol = Symbol::new(derived.name.clone(), Rc::clone(&derived.type_info));
        self.current_scope.try_register(Rc::clone(&symbol));
        Ok(symbol)
    }

    /// Register or re-use a function symbol.
    ///
    /// A repeated declaration must match the earlier type exactly and
    /// yields the same symbol, so forward references all patch through
    /// one address.
    fn declare_function(&mut self, derived: &Derived) -> CminResult<Rc<Symbol>> {
        if let Some(existing) = self.current_scope.find_local(&derived.name) {
            return if existing.type_info().is_function() {
                if *existing.type_info() == derived.type_info {
                    Ok(existing)
                } else {
                    Err(self.error(
                        derived.line,
                        format!("`{}' redeclared as a different type.", derived.name),
                    ))
                }
            } else {
                Err(self.error(
                    derived.line,
                    format!("`{}' is already declared in this scope.", derived.name),
                ))
            };
        }

        if let Some(existing) = self.current_scope.find(&derived.name) {
            if existing.type_info().is_function() {
                return if *existing.type_info() == derived.type_info {
                    Ok(existing)
                } else {
                    Err(self.error(
                        derived.line,
                        format!("`{}' redeclared as a different type.", derived.name),
                    ))
                };
            }
        }

        let symbol = Symbol::new(derived.name.clone(), Rc::clone(&derived.type_info));
        self.current_scope.try_register(Rc::clone(&symbol));
        Ok(symbol)
    }

    fn check_condition(&self, statement: &str, condition: &Expression) -> CminResult<()> {
        if condition.type_info.is_int() {
            Ok(())
        } else {
            Err(self.error(
                condition.line,
                format!(
                    "condition of `{}' statement must have type `int' (have `{}').",
                    statement, condition.type_info
                ),
            ))
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> CminError {
        CminError::Semantic {
            file: self.file.clone(),
            line,
            message: message.into(),
        }
    }
}

/// Fold a declarator tree over the base type to get the declared name
/// and type.
fn derive(declarator: &Declarator, base: Rc<TypeInfo>) -> Derived {
    match declarator {
        Declarator::Identifier { line, name, .. } => Derived {
            name: name.clone(),
            line: *line,
            type_info: base,
            params: vec![],
        },
        Declarator::Pointer { inner, .. } => derive(inner, Rc::new(TypeInfo::Pointer(base))),
        Declarator::Paren { inner, .. } => derive(inner, base),
        Declarator::Function { inner, params, .. } => {
            let param_types = params
                .iter()
                .map(|param| Rc::clone(param.symbol.type_info()))
                .collect();
            let function = Rc::new(TypeInfo::Function {
                ret: base,
                params: param_types,
            });

            let mut derived = derive(inner, function);

            // The parameter list directly attached to the declared name
            // is the one the function body will see.
            if matches!(unwrap_parens(inner), Declarator::Identifier { .. }) {
                derived.params = params
                    .iter()
                    .map(|param| (Rc::clone(&param.symbol), param.line))
                    .collect();
            }

            derived
        }
    }
}

fn unwrap_parens(declarator: &Declarator) -> &Declarator {
    match declarator {
        Declarator::Paren { inner, .. } => unwrap_parens(inner),
        other => other,
    }
}

/// Attach the resolved symbol to the identifier at the declarator core.
fn set_declarator_symbol(declarator: &mut Declarator, symbol: &Rc<Symbol>) {
    match declarator {
        Declarator::Identifier { symbol: slot, .. } => *slot = Some(Rc::clone(symbol)),
        Declarator::Pointer { inner, .. }
        | Declarator::Paren { inner, .. }
        | Declarator::Function { inner, .. } => set_declarator_symbol(inner, symbol),
    }
}
