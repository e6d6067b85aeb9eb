//! Recursive-descent parser.
//!
//! One function per grammar production; expressions run through the
//! standard precedence cascade. Levels whose operators the language
//! does not support yet (ternary, logical, equality, relational, shift,
//! multiplicative) are passthroughs kept so the cascade reads like the
//! grammar.
use crate::error::{CminError, CminResult};

use super::{
    ast::*,
    lexer::Lexer,
    sema::Semantics,
    token_stream::TokenStream,
    tokens::{Keyword, Punct, Token, TokenKind},
};

pub struct Parser {
    stream: TokenStream,
    sema: Semantics,
}

impl Parser {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        let lexer = Lexer::new(name, code);
        Self {
            sema: Semantics::new(lexer.name()),
            stream: TokenStream::new(lexer),
        }
    }

    /// Parse a whole translation unit into a typed, resolved tree.
    ///
    /// root:
    ///     external-declaration*
    pub fn parse(mut self) -> CminResult<Program> {
        let mut declarations = vec![];

        while self.peek_kind()? != TokenKind::EndOfFile {
            declarations.push(self.parse_declaration(true)?);
        }

        Ok(self.sema.act_on_root_ended(declarations))
    }

    // ------------------------------------------------------------------------
    // Declarations

    // declaration:
    //     type declarator compound-statement
    //     type declarator ';'
    //
    // Function definitions are only accepted at file scope.
    fn parse_declaration(&mut self, accept_function: bool) -> CminResult<Declaration> {
        // type
        let specifier = self.parse_type_specifier()?;

        // declarator
        let mut declarator = self.parse_declarator()?;

        // compound-statement
        if accept_function && self.peek_kind()? == punct(Punct::LeftBrace) {
            let context = self
                .sema
                .act_on_function_definition_began(&specifier, &mut declarator)?;

            // The body shares the function scope with the parameters.
            let body = self.parse_compound_statement(false)?;

            return Ok(self
                .sema
                .act_on_function_definition_ended(context, specifier, declarator, body));
        }

        // ';'
        self.match_token(punct(Punct::Semicolon))?;

        self.sema.act_on_simple_declaration(specifier, declarator)
    }

    // type:
    //     'int'
    fn parse_type_specifier(&mut self) -> CminResult<TypeSpecifier> {
        let token = self.match_token(keyword(Keyword::Int))?;
        Ok(self.sema.act_on_integer_type(&token))
    }

    // declarator:
    //     pointer-declarator
    //     direct-declarator function-declarator*
    fn parse_declarator(&mut self) -> CminResult<Declarator> {
        // pointer-declarator:
        //     '*' declarator
        if let Some(token) = self.consume_token_if(punct(Punct::Star))? {
            let inner = self.parse_declarator()?;
            return Ok(Declarator::Pointer {
                line: token.line,
                inner: Box::new(inner),
            });
        }

        let mut declarator = self.parse_direct_declarator()?;

        // function-declarator:
        //     declarator '(' parameter-list ')'
        while let Some(token) = self.consume_token_if(punct(Punct::LeftParen))? {
            let params = self.parse_parameter_list()?;
            declarator = Declarator::Function {
                line: token.line,
                inner: Box::new(declarator),
                params,
            };
        }

        Ok(declarator)
    }

    // direct-declarator:
    //     paren-declarator
    //     identifier-declarator
    fn parse_direct_declarator(&mut self) -> CminResult<Declarator> {
        // paren-declarator:
        //     '(' declarator ')'
        if let Some(token) = self.consume_token_if(punct(Punct::LeftParen))? {
            let inner = self.parse_declarator()?;
            self.match_token(punct(Punct::RightParen))?;
            return Ok(Declarator::Paren {
                line: token.line,
                inner: Box::new(inner),
            });
        }

        // identifier-declarator:
        //     identifier
        let token = self.match_token(TokenKind::Identifier)?;
        Ok(Declarator::Identifier {
            line: token.line,
            name: token.text.clone(),
            symbol: None,
        })
    }

    // parameter-list:
    //     'void' ')'
    //     parameter-declaration {',' parameter-declaration}* ')'
    //
    // The opening parenthesis is already consumed.
    fn parse_parameter_list(&mut self) -> CminResult<Vec<ParameterDeclaration>> {
        // '(' 'void' ')'
        if self.peek_kind()? == keyword(Keyword::Void)
            && self.stream.peek(1)?.kind == punct(Punct::RightParen)
        {
            self.consume_token()?;
            self.consume_token()?;
            return Ok(vec![]);
        }

        let mut params = vec![];
        loop {
            let specifier = self.parse_type_specifier()?;
            let declarator = self.parse_declarator()?;
            params.push(self.sema.act_on_parameter_declaration(specifier, declarator));

            if self.consume_token_if(punct(Punct::Comma))?.is_none() {
                break;
            }
        }

        self.match_token(punct(Punct::RightParen))?;
        Ok(params)
    }

    // ------------------------------------------------------------------------
    // Statements

    // statement:
    //     empty-statement
    //     compound-statement
    //     if-statement
    //     while-statement
    //     return-statement
    //     declaration
    //     expression-statement
    fn parse_statement(&mut self) -> CminResult<Statement> {
        match self.peek_kind()? {
            kind if kind == punct(Punct::Semicolon) => self.parse_empty_statement(),
            kind if kind == punct(Punct::LeftBrace) => {
                let compound = self.parse_compound_statement(true)?;
                Ok(Statement::Compound(compound))
            }
            kind if kind == keyword(Keyword::If) => self.parse_if_statement(),
            kind if kind == keyword(Keyword::While) => self.parse_while_statement(),
            kind if kind == keyword(Keyword::Return) => self.parse_return_statement(),
            kind if kind == keyword(Keyword::Int) => {
                Ok(Statement::Declaration(self.parse_declaration(false)?))
            }
            _ => self.parse_expression_statement(),
        }
    }

    // empty-statement:
    //     ';'
    fn parse_empty_statement(&mut self) -> CminResult<Statement> {
        let token = self.match_token(punct(Punct::Semicolon))?;
        Ok(self.sema.act_on_empty_statement(&token))
    }

    // compound-statement:
    //     '{' statement* '}'
    //
    // `new_scope` is false for a function body, which re-uses the
    // function scope holding the parameters.
    fn parse_compound_statement(&mut self, new_scope: bool) -> CminResult<CompoundStatement> {
        // '{'
        let token = self.match_token(punct(Punct::LeftBrace))?;

        let scope = if new_scope {
            self.sema.act_on_compound_began()
        } else {
            self.sema.current_scope()
        };

        // statement*
        let mut statements = vec![];
        while !matches!(self.peek_kind()?, TokenKind::EndOfFile)
            && self.peek_kind()? != punct(Punct::RightBrace)
        {
            statements.push(self.parse_statement()?);
        }

        // '}'
        self.match_token(punct(Punct::RightBrace))?;

        if new_scope {
            self.sema.act_on_compound_ended();
        }

        Ok(CompoundStatement {
            line: token.line,
            scope,
            statements,
        })
    }

    // if-statement:
    //     'if' '(' expression ')' statement
    //     'if' '(' expression ')' statement 'else' statement
    fn parse_if_statement(&mut self) -> CminResult<Statement> {
        // 'if'
        let token = self.match_token(keyword(Keyword::If))?;

        // '(' expression ')'
        self.match_token(punct(Punct::LeftParen))?;
        let condition = self.parse_expression()?;
        self.match_token(punct(Punct::RightParen))?;

        // statement
        let then = self.parse_statement()?;

        // 'else' statement
        let otherwise = if self.consume_token_if(keyword(Keyword::Else))?.is_some() {
            Some(self.parse_statement()?)
        } else {
            None
        };

        self.sema
            .act_on_if_statement(&token, condition, then, otherwise)
    }

    // while-statement:
    //     'while' '(' expression ')' statement
    fn parse_while_statement(&mut self) -> CminResult<Statement> {
        // 'while'
        let token = self.match_token(keyword(Keyword::While))?;

        // '(' expression ')'
        self.match_token(punct(Punct::LeftParen))?;
        let condition = self.parse_expression()?;
        self.match_token(punct(Punct::RightParen))?;

        // statement
        let body = self.parse_statement()?;

        self.sema.act_on_while_statement(&token, condition, body)
    }

    // return-statement:
    //     'return' ';'
    //     'return' expression ';'
    fn parse_return_statement(&mut self) -> CminResult<Statement> {
        // 'return'
        let token = self.match_token(keyword(Keyword::Return))?;

        // expression?
        let value = if self.peek_kind()? == punct(Punct::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        // ';'
        self.match_token(punct(Punct::Semicolon))?;

        self.sema.act_on_return_statement(&token, value)
    }

    // expression-statement:
    //     expression ';'
    fn parse_expression_statement(&mut self) -> CminResult<Statement> {
        let expression = self.parse_expression()?;
        self.match_token(punct(Punct::Semicolon))?;
        Ok(self.sema.act_on_expression_statement(expression))
    }

    // ------------------------------------------------------------------------
    // Expressions

    // expression:
    //     assignment {',' assignment}*
    fn parse_expression(&mut self) -> CminResult<Expression> {
        let mut expression = self.parse_assignment()?;

        while self.consume_token_if(punct(Punct::Comma))?.is_some() {
            let rhs = self.parse_assignment()?;
            expression = self.sema.act_on_comma_expression(expression, rhs);
        }

        Ok(expression)
    }

    // assignment:
    //     unary '=' assignment
    //     conditional
    fn parse_assignment(&mut self) -> CminResult<Expression> {
        let lhs = self.parse_conditional()?;

        if self.consume_token_if(punct(Punct::Assign))?.is_some() {
            let rhs = self.parse_assignment()?;
            return self.sema.act_on_assignment(lhs, rhs);
        }

        Ok(lhs)
    }

    // conditional:
    //     logical-or
    //
    // The ternary operator is unimplemented.
    fn parse_conditional(&mut self) -> CminResult<Expression> {
        self.parse_logical_or()
    }

    // logical-or:
    //     logical-and
    fn parse_logical_or(&mut self) -> CminResult<Expression> {
        self.parse_logical_and()
    }

    // logical-and:
    //     bitwise-or
    fn parse_logical_and(&mut self) -> CminResult<Expression> {
        self.parse_bitwise_or()
    }

    // bitwise-or:
    //     bitwise-xor {'|' bitwise-xor}*
    fn parse_bitwise_or(&mut self) -> CminResult<Expression> {
        let mut lhs = self.parse_bitwise_xor()?;

        while self.consume_token_if(punct(Punct::Pipe))?.is_some() {
            let rhs = self.parse_bitwise_xor()?;
            lhs = self
                .sema
                .act_on_binary_expression(BinaryOp::BitOr, lhs, rhs)?;
        }

        Ok(lhs)
    }

    // bitwise-xor:
    //     bitwise-and {'^' bitwise-and}*
    fn parse_bitwise_xor(&mut self) -> CminResult<Expression> {
        let mut lhs = self.parse_bitwise_and()?;

        while self.consume_token_if(punct(Punct::Caret))?.is_some() {
            let rhs = self.parse_bitwise_and()?;
            lhs = self
                .sema
                .act_on_binary_expression(BinaryOp::BitXor, lhs, rhs)?;
        }

        Ok(lhs)
    }

    // bitwise-and:
    //     equality {'&' equality}*
    fn parse_bitwise_and(&mut self) -> CminResult<Expression> {
        let mut lhs = self.parse_equality()?;

        while self.consume_token_if(punct(Punct::Amp))?.is_some() {
            let rhs = self.parse_equality()?;
            lhs = self
                .sema
                .act_on_binary_expression(BinaryOp::BitAnd, lhs, rhs)?;
        }

        Ok(lhs)
    }

    // equality:
    //     relational
    fn parse_equality(&mut self) -> CminResult<Expression> {
        self.parse_relational()
    }

    // relational:
    //     shift
    fn parse_relational(&mut self) -> CminResult<Expression> {
        self.parse_shift()
    }

    // shift:
    //     additive
    fn parse_shift(&mut self) -> CminResult<Expression> {
        self.parse_additive()
    }

    // additive:
    //     multiplicative {('+' | '-') multiplicative}*
    fn parse_additive(&mut self) -> CminResult<Expression> {
        let mut lhs = self.parse_multiplicative()?;

        loop {
            let op = if self.consume_token_if(punct(Punct::Plus))?.is_some() {
                BinaryOp::Add
            } else if self.consume_token_if(punct(Punct::Minus))?.is_some() {
                BinaryOp::Sub
            } else {
                break;
            };

            let rhs = self.parse_multiplicative()?;
            lhs = self.sema.act_on_binary_expression(op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    // multiplicative:
    //     unary
    fn parse_multiplicative(&mut self) -> CminResult<Expression> {
        self.parse_unary()
    }

    // unary:
    //     ('+' | '-' | '&' | '*') unary
    //     postfix
    fn parse_unary(&mut self) -> CminResult<Expression> {
        if let Some(token) = self.consume_token_if(punct(Punct::Plus))? {
            let operand = self.parse_unary()?;
            return self
                .sema
                .act_on_unary_expression(UnaryOp::Plus, &token, operand);
        }

        if let Some(token) = self.consume_token_if(punct(Punct::Minus))? {
            let operand = self.parse_unary()?;
            return self
                .sema
                .act_on_unary_expression(UnaryOp::Minus, &token, operand);
        }

        if let Some(token) = self.consume_token_if(punct(Punct::Amp))? {
            let operand = self.parse_unary()?;
            return self.sema.act_on_address_of(&token, operand);
        }

        if let Some(token) = self.consume_token_if(punct(Punct::Star))? {
            let operand = self.parse_unary()?;
            return self.sema.act_on_dereference(&token, operand);
        }

        self.parse_postfix()
    }

    // postfix:
    //     primary {'(' argument-list ')'}*
    fn parse_postfix(&mut self) -> CminResult<Expression> {
        let mut expression = self.parse_primary()?;

        while self.consume_token_if(punct(Punct::LeftParen))?.is_some() {
            // argument-list:
            //     assignment {',' assignment}*
            let mut arguments = vec![];
            if self.peek_kind()? != punct(Punct::RightParen) {
                loop {
                    arguments.push(self.parse_assignment()?);
                    if self.consume_token_if(punct(Punct::Comma))?.is_none() {
                        break;
                    }
                }
            }
            self.match_token(punct(Punct::RightParen))?;

            expression = self.sema.act_on_call_expression(expression, arguments)?;
        }

        Ok(expression)
    }

    // primary:
    //     paren-expression
    //     identifier-expression
    //     integer-expression
    fn parse_primary(&mut self) -> CminResult<Expression> {
        match self.peek_kind()? {
            kind if kind == punct(Punct::LeftParen) => {
                // '(' expression ')'
                let token = self.consume_token()?;
                let inner = self.parse_expression()?;
                self.match_token(punct(Punct::RightParen))?;
                Ok(self.sema.act_on_paren_expression(&token, inner))
            }
            TokenKind::Identifier => {
                let token = self.consume_token()?;
                self.sema.act_on_identifier_expression(&token)
            }
            TokenKind::IntegerLiteral => {
                let token = self.consume_token()?;
                Ok(self.sema.act_on_integer_expression(&token))
            }
            _ => {
                let token = self.peek_token()?;
                Err(self.syntax_error(
                    token.line,
                    format!("unexpected token `{}', expected expression.", token.text),
                ))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Token plumbing

    fn peek_token(&mut self) -> CminResult<Token> {
        self.stream.peek(0)
    }

    fn peek_kind(&mut self) -> CminResult<TokenKind> {
        Ok(self.stream.peek(0)?.kind)
    }

    fn consume_token(&mut self) -> CminResult<Token> {
        self.stream.consume()
    }

    fn consume_token_if(&mut self, kind: TokenKind) -> CminResult<Option<Token>> {
        self.stream.consume_if(kind)
    }

    /// Consume a token of the given kind or fail with a syntax error.
    fn match_token(&mut self, kind: TokenKind) -> CminResult<Token> {
        if let Some(token) = self.consume_token_if(kind)? {
            return Ok(token);
        }

        let token = self.peek_token()?;
        Err(self.syntax_error(
            token.line,
            format!("unexpected token `{}', expected `{}'.", token.text, kind),
        ))
    }

    fn syntax_error(&self, line: usize, message: impl Into<String>) -> CminError {
        CminError::Syntax {
            file: self.stream.name().to_owned(),
            line,
            message: message.into(),
        }
    }
}

fn punct(p: Punct) -> TokenKind {
    TokenKind::Punct(p)
}

fn keyword(k: Keyword) -> TokenKind {
    TokenKind::Keyword(k)
}
