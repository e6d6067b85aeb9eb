//! Syntax tree dump, for troubleshooting the front end.
use std::fmt::{self, Write};

use super::ast::*;

/// Renders a typed tree as an indented outline.
pub struct Printer {
    buf: String,
    depth: usize,
}

impl Printer {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            depth: 0,
        }
    }

    pub fn print(mut self, program: &Program) -> Result<String, fmt::Error> {
        writeln!(self.buf, "translation-unit `{}'", program.filename)?;
        self.depth += 1;
        for declaration in &program.declarations {
            self.print_declaration(declaration)?;
        }
        Ok(self.buf)
    }

    fn print_declaration(&mut self, declaration: &Declaration) -> fmt::Result {
        match declaration {
            Declaration::Variable(decl) => {
                self.line(format_args!(
                    "variable-declaration `{}' {}",
                    decl.symbol.name(),
                    decl.symbol.type_info()
                ))?;
            }
            Declaration::Prototype(decl) => {
                self.line(format_args!(
                    "function-declaration `{}' {}",
                    decl.symbol.name(),
                    decl.symbol.type_info()
                ))?;
            }
            Declaration::Function(def) => {
                self.line(format_args!(
                    "function-definition `{}' {}",
                    def.symbol.name(),
                    def.symbol.type_info()
                ))?;
                self.depth += 1;
                for param in &def.params {
                    self.line(format_args!(
                        "parameter `{}' {}",
                        param.name(),
                        param.type_info()
                    ))?;
                }
                self.print_compound(&def.body)?;
                self.depth -= 1;
            }
        }
        Ok(())
    }

    fn print_compound(&mut self, compound: &CompoundStatement) -> fmt::Result {
        self.line(format_args!("compound-statement"))?;
        self.depth += 1;
        for statement in &compound.statements {
            self.print_statement(statement)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn print_statement(&mut self, statement: &Statement) -> fmt::Result {
        match statement {
            Statement::Empty { .. } => self.line(format_args!("empty-statement")),
            Statement::Compound(compound) => self.print_compound(compound),
            Statement::If {
                condition,
                then,
                otherwise,
                ..
            } => {
                self.line(format_args!("if-statement"))?;
                self.depth += 1;
                self.print_expression(condition)?;
                self.print_statement(then)?;
                if let Some(otherwise) = otherwise {
                    self.print_statement(otherwise)?;
                }
                self.depth -= 1;
                Ok(())
            }
            Statement::While {
                condition, body, ..
            } => {
                self.line(format_args!("while-statement"))?;
                self.depth += 1;
                self.print_expression(condition)?;
                self.print_statement(body)?;
                self.depth -= 1;
                Ok(())
            }
            Statement::Return { value, .. } => {
                self.line(format_args!("return-statement"))?;
                if let Some(value) = value {
                    self.depth += 1;
                    self.print_expression(value)?;
                    self.depth -= 1;
                }
                Ok(())
            }
            Statement::Expression { expression, .. } => {
                self.line(format_args!("expression-statement"))?;
                self.depth += 1;
                self.print_expression(expression)?;
                self.depth -= 1;
                Ok(())
            }
            Statement::Declaration(declaration) => self.print_declaration(declaration),
        }
    }

    fn print_expression(&mut self, expression: &Expression) -> fmt::Result {
        let ty = &expression.type_info;
        match &expression.kind {
            ExprKind::Comma { lhs, rhs } => {
                self.line(format_args!("comma-expression {}", ty))?;
                self.children(&[lhs, rhs])
            }
            ExprKind::Assign { lhs, rhs } => {
                self.line(format_args!("assignment-expression {}", ty))?;
                self.children(&[lhs, rhs])
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.line(format_args!("binary-expression `{}' {}", op.text(), ty))?;
                self.children(&[lhs, rhs])
            }
            ExprKind::Unary { op, operand } => {
                self.line(format_args!("unary-expression `{}' {}", op.text(), ty))?;
                self.children(&[operand])
            }
            ExprKind::AddressOf { operand } => {
                self.line(format_args!("address-of-expression {}", ty))?;
                self.children(&[operand])
            }
            ExprKind::Dereference { operand } => {
                self.line(format_args!("dereference-expression {}", ty))?;
                self.children(&[operand])
            }
            ExprKind::Call { callee, arguments } => {
                self.line(format_args!("call-expression {}", ty))?;
                self.depth += 1;
                self.print_expression(callee)?;
                for argument in arguments {
                    self.print_expression(argument)?;
                }
                self.depth -= 1;
                Ok(())
            }
            ExprKind::Paren { inner } => {
                self.line(format_args!("paren-expression {}", ty))?;
                self.children(&[inner])
            }
            ExprKind::Identifier { name, .. } => {
                self.line(format_args!("identifier-expression `{}' {}", name, ty))
            }
            ExprKind::Integer { value } => {
                self.line(format_args!("integer-expression {} {}", value, ty))
            }
        }
    }

    fn children(&mut self, expressions: &[&Expression]) -> fmt::Result {
        self.depth += 1;
        for expression in expressions {
            self.print_expression(expression)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn line(&mut self, args: fmt::Arguments) -> fmt::Result {
        for _ in 0..self.depth {
            self.buf.push_str("  ");
        }
        self.buf.write_fmt(args)?;
        self.buf.push('\n');
        Ok(())
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cc::parser::Parser;

    #[test]
    fn test_print_outline() {
        let source = "int x; int main(void) { x = 42; return x; }";
        let program = Parser::new("test.c", source).parse().unwrap();
        let outline = Printer::new().print(&program).unwrap();

        assert!(outline.starts_with("translation-unit `test.c'\n"));
        assert!(outline.contains("variable-declaration `x' int"));
        assert!(outline.contains("function-definition `main' Func<int, ()>"));
        assert!(outline.contains("assignment-expression int"));
        assert!(outline.contains("integer-expression 42 int"));
        assert!(outline.contains("identifier-expression `x' int"));
    }
}
