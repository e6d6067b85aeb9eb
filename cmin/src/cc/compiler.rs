//! Code generator.
//!
//! A post-order walk over the typed tree, emitting words into the
//! growing program buffer. Expression results land in GR1; GR2 is the
//! scratch register for binary operations, GR0 stays zero for the
//! addressing-mode trick, and GR7 is the frame pointer.
use std::rc::Rc;

use crate::{
    constants::{Word, UNRESOLVED},
    error::{CminError, CminResult},
    isa::{instruction, op, Register, FRAME_POINTER, SVC_EXIT},
};

use super::{ast::*, symbol::Symbol};

pub struct Compiler {
    program: Vec<Word>,
    /// Next free frame slot, relative to the frame pointer. Reset per
    /// function, restored on leaving nested blocks so sibling blocks
    /// reuse their parent's remaining slots.
    frame_offset: Word,
    /// Operand words still waiting for a function's entry address.
    pending: Vec<(Rc<Symbol>, usize)>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            program: Vec::with_capacity(256),
            frame_offset: 0,
            pending: vec![],
        }
    }

    /// Compile a translation unit into a word image, ready to be loaded
    /// at address 0.
    pub fn compile(mut self, program: &Program) -> CminResult<Vec<Word>> {
        // Entry sequence.
        //
        // XOR GR0, GR0
        self.emit_rr(op::XOR_R, Register::Gr0, Register::Gr0)?;

        // LAD GR7, .frame-base -- patched once the image size is known.
        let frame_base_slot = self.emit_adr(op::LAD, FRAME_POINTER, UNRESOLVED, Register::Gr0)?;

        // CALL .main -- patched when the definition is reached.
        let main = program
            .scope
            .find("main")
            .filter(|symbol| symbol.type_info().is_function())
            .ok_or_else(|| CminError::Codegen("missing function `main'.".into()))?;
        let main_slot = self.emit_adr(op::CALL, Register::Gr0, UNRESOLVED, Register::Gr0)?;
        self.pending.push((Rc::clone(&main), main_slot));

        // SVC 1 -- exit with main's return value still in GR1.
        self.emit_adr(op::SVC, Register::Gr0, SVC_EXIT, Register::Gr0)?;

        // external-declaration*
        for declaration in &program.declarations {
            self.compile_declaration(declaration, true)?;
        }

        if let Some((symbol, _)) = self.pending.first() {
            return Err(CminError::Codegen(format!(
                "undefined function `{}'.",
                symbol.name()
            )));
        }

        // The local-variable frames start right past the program image.
        let frame_base = self.position();
        self.patch(frame_base_slot, frame_base);

        Ok(self.program)
    }

    // ------------------------------------------------------------------------
    // Declarations

    fn compile_declaration(&mut self, declaration: &Declaration, global: bool) -> CminResult<()> {
        match declaration {
            // Globals reserve zero-initialized words inline in the
            // program stream; locals take the next frame slots and
            // emit nothing.
            Declaration::Variable(decl) => {
                let size = decl.symbol.type_info().size();
                if global {
                    decl.symbol.bind(true, self.position());
                    for _ in 0..size {
                        self.emit(0)?;
                    }
                } else {
                    decl.symbol.bind(false, self.frame_offset);
                    self.frame_offset = self.frame_offset.wrapping_add(size);
                }
                Ok(())
            }
            Declaration::Prototype(_) => Ok(()),
            Declaration::Function(def) => self.compile_function(def),
        }
    }

    fn compile_function(&mut self, def: &FunctionDefinition) -> CminResult<()> {
        let entry = self.position();
        def.symbol.bind(true, entry);
        self.resolve_pending(&def.symbol, entry);

        // Parameters occupy the first frame slots; the caller stored
        // the arguments there before adjusting the frame pointer.
        self.frame_offset = 0;
        for param in &def.params {
            param.bind(false, self.frame_offset);
            self.frame_offset = self.frame_offset.wrapping_add(param.type_info().size());
        }

        self.compile_compound(&def.body)?;

        // Falling off the end returns with whatever GR1 holds.
        self.emit(op::RET)?;

        Ok(())
    }

    fn resolve_pending(&mut self, symbol: &Rc<Symbol>, address: Word) {
        let mut index = 0;
        while index < self.pending.len() {
            if Rc::ptr_eq(&self.pending[index].0, symbol) {
                let (_, slot) = self.pending.swap_remove(index);
                self.patch(slot, address);
            } else {
                index += 1;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Statements

    fn compile_statement(&mut self, statement: &Statement) -> CminResult<()> {
        match statement {
            Statement::Empty { .. } => self.emit(op::NOP),

            Statement::Compound(compound) => self.compile_compound(compound),

            Statement::Declaration(declaration) => self.compile_declaration(declaration, false),

            // condition; OR GR1, GR1; JZE .else; then; JUMP .endif; else
            Statement::If {
                condition,
                then,
                otherwise,
                ..
            } => {
                self.compile_rvalue(condition)?;
                // Cheap zero test to refresh the flags.
                self.emit_rr(op::OR_R, Register::Gr1, Register::Gr1)?;
                let else_slot = self.emit_adr(op::JZE, Register::Gr0, UNRESOLVED, Register::Gr0)?;

                self.compile_statement(then)?;

                match otherwise {
                    Some(otherwise) => {
                        let endif_slot =
                            self.emit_adr(op::JUMP, Register::Gr0, UNRESOLVED, Register::Gr0)?;
                        let else_label = self.position();
                        self.patch(else_slot, else_label);

                        self.compile_statement(otherwise)?;

                        let endif_label = self.position();
                        self.patch(endif_slot, endif_label);
                    }
                    None => {
                        let else_label = self.position();
                        self.patch(else_slot, else_label);
                    }
                }
                Ok(())
            }

            // .top; condition; OR GR1, GR1; JZE .exit; body; JUMP .top
            Statement::While {
                condition, body, ..
            } => {
                let top_label = self.position();

                self.compile_rvalue(condition)?;
                self.emit_rr(op::OR_R, Register::Gr1, Register::Gr1)?;
                let exit_slot = self.emit_adr(op::JZE, Register::Gr0, UNRESOLVED, Register::Gr0)?;

                self.compile_statement(body)?;
                self.emit_adr(op::JUMP, Register::Gr0, top_label, Register::Gr0)?;

                let exit_label = self.position();
                self.patch(exit_slot, exit_label);
                Ok(())
            }

            Statement::Return { value, .. } => {
                if let Some(value) = value {
                    self.compile_rvalue(value)?;
                }
                self.emit(op::RET)
            }

            Statement::Expression { expression, .. } => self.compile_rvalue(expression),
        }
    }

    fn compile_compound(&mut self, compound: &CompoundStatement) -> CminResult<()> {
        // Blocks hand their frame slots back on exit, so sibling
        // blocks overlap in frame offsets.
        let saved_offset = self.frame_offset;

        for statement in &compound.statements {
            self.compile_statement(statement)?;
        }

        self.frame_offset = saved_offset;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Expressions

    /// Compile an expression for its value, left in GR1.
    fn compile_rvalue(&mut self, expression: &Expression) -> CminResult<()> {
        match &expression.kind {
            // LAD GR1, value
            ExprKind::Integer { value } => {
                self.emit_adr(op::LAD, Register::Gr1, *value, Register::Gr0)?;
                Ok(())
            }

            ExprKind::Identifier { symbol, .. } => self.compile_identifier(symbol, false),

            ExprKind::Paren { inner } => self.compile_rvalue(inner),

            ExprKind::Comma { lhs, rhs } => {
                self.compile_rvalue(lhs)?;
                self.compile_rvalue(rhs)
            }

            // value; PUSH; address; POP GR2; ST GR2, 0, GR1
            ExprKind::Assign { lhs, rhs } => {
                self.compile_rvalue(rhs)?;
                self.emit_adr(op::PUSH, Register::Gr0, 0, Register::Gr1)?;
                self.compile_lvalue(lhs)?;
                self.emit_rr(op::POP, Register::Gr2, Register::Gr0)?;
                self.emit_adr(op::ST, Register::Gr2, 0, Register::Gr1)?;
                // The value of the whole expression is the stored one.
                self.emit_rr(op::LD_R, Register::Gr1, Register::Gr2)?;
                Ok(())
            }

            // right; PUSH; left; POP GR2; op GR1, GR2
            ExprKind::Binary { op: operator, lhs, rhs } => {
                self.compile_rvalue(rhs)?;
                self.emit_adr(op::PUSH, Register::Gr0, 0, Register::Gr1)?;
                self.compile_rvalue(lhs)?;
                self.emit_rr(op::POP, Register::Gr2, Register::Gr0)?;

                let opcode = match operator {
                    BinaryOp::Add => op::ADDA_R,
                    BinaryOp::Sub => op::SUBA_R,
                    BinaryOp::BitAnd => op::AND_R,
                    BinaryOp::BitOr => op::OR_R,
                    BinaryOp::BitXor => op::XOR_R,
                };
                self.emit_rr(opcode, Register::Gr1, Register::Gr2)
            }

            ExprKind::Unary { op: operator, operand } => {
                self.compile_rvalue(operand)?;
                match operator {
                    // No-op passthrough.
                    UnaryOp::Plus => Ok(()),
                    // 0 - operand
                    UnaryOp::Minus => {
                        self.emit_rr(op::LD_R, Register::Gr2, Register::Gr1)?;
                        self.emit_adr(op::LAD, Register::Gr1, 0, Register::Gr0)?;
                        self.emit_rr(op::SUBA_R, Register::Gr1, Register::Gr2)
                    }
                }
            }

            // The address is exactly what is wanted.
            ExprKind::AddressOf { operand } => self.compile_lvalue(operand),

            // pointer value; LD GR1, 0, GR1
            ExprKind::Dereference { operand } => {
                self.compile_rvalue(operand)?;
                self.emit_adr(op::LD_ADR, Register::Gr1, 0, Register::Gr1)?;
                Ok(())
            }

            ExprKind::Call { callee, arguments } => self.compile_call(callee, arguments),
        }
    }

    /// Compile an expression for its address, left in GR1.
    fn compile_lvalue(&mut self, expression: &Expression) -> CminResult<()> {
        match &expression.kind {
            ExprKind::Identifier { symbol, .. } => self.compile_identifier(symbol, true),

            // The pointer value is the address.
            ExprKind::Dereference { operand } => self.compile_rvalue(operand),

            ExprKind::Paren { inner } => self.compile_lvalue(inner),

            _ => unreachable!("the analyzer only marks identifiers, dereferences and parens as lvalues"),
        }
    }

    /// Arguments go into the frame slots just past the live locals;
    /// those slots become the callee's parameter frame once the frame
    /// pointer is moved forward.
    fn compile_call(&mut self, callee: &Expression, arguments: &[Expression]) -> CminResult<()> {
        let live_slots = self.frame_offset;

        // Bump the frame cursor while storing, so a nested call in a
        // later argument allocates above the slots already filled.
        for argument in arguments {
            self.compile_rvalue(argument)?;
            self.emit_adr(op::ST, Register::Gr1, self.frame_offset, FRAME_POINTER)?;
            self.frame_offset = self.frame_offset.wrapping_add(1);
        }

        // Callee address lands in GR1, computed against the old frame.
        self.compile_lvalue(callee)?;
        self.frame_offset = live_slots;

        // ADDL FP, .live-slots; CALL 0, GR1; SUBL FP, .live-slots
        // expressed through LAD, the address-arithmetic instruction.
        self.emit_adr(op::LAD, FRAME_POINTER, live_slots, FRAME_POINTER)?;
        self.emit_adr(op::CALL, Register::Gr0, 0, Register::Gr1)?;
        self.emit_adr(
            op::LAD,
            FRAME_POINTER,
            0u16.wrapping_sub(live_slots),
            FRAME_POINTER,
        )?;

        Ok(())
    }

    fn compile_identifier(&mut self, symbol: &Rc<Symbol>, lvalue: bool) -> CminResult<()> {
        // Loads produce the value, address mode produces the location.
        let opcode = if lvalue { op::LAD } else { op::LD_ADR };

        match symbol.storage() {
            Some(storage) if storage.global => {
                self.emit_adr(opcode, Register::Gr1, storage.address, Register::Gr0)?;
            }
            Some(storage) => {
                self.emit_adr(opcode, Register::Gr1, storage.address, FRAME_POINTER)?;
            }
            None => {
                // Function not yet reached in the stream; leave a
                // placeholder word and record it for backpatching.
                let slot = self.emit_adr(opcode, Register::Gr1, UNRESOLVED, Register::Gr0)?;
                self.pending.push((Rc::clone(symbol), slot));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Word buffer

    fn emit(&mut self, word: Word) -> CminResult<()> {
        if self.program.len() >= 0xFFFF {
            return Err(CminError::Codegen("too large program.".into()));
        }
        self.program.push(word);
        Ok(())
    }

    fn emit_rr(&mut self, opcode: Word, r1: Register, r2: Register) -> CminResult<()> {
        self.emit(instruction(opcode, r1, r2))
    }

    /// Emit an instruction with an operand word; returns the operand's
    /// index for backpatching.
    fn emit_adr(&mut self, opcode: Word, r: Register, adr: Word, x: Register) -> CminResult<usize> {
        self.emit_rr(opcode, r, x)?;
        let slot = self.program.len();
        self.emit(adr)?;
        Ok(slot)
    }

    fn position(&self) -> Word {
        self.program.len() as Word
    }

    fn patch(&mut self, slot: usize, value: Word) {
        self.program[slot] = value;
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cc::parser::Parser;

    fn compile(source: &str) -> CminResult<Vec<Word>> {
        let program = Parser::new("test.c", source).parse()?;
        Compiler::new().compile(&program)
    }

    #[test]
    fn test_entry_sequence_shape() {
        let words = compile("int main(void) { return 0; }").unwrap();

        // XOR GR0, GR0
        assert_eq!(words[0], instruction(op::XOR_R, Register::Gr0, Register::Gr0));
        // LAD GR7, .frame-base
        assert_eq!(words[1], instruction(op::LAD, Register::Gr7, Register::Gr0));
        assert_eq!(words[2] as usize, words.len());
        // CALL .main
        assert_eq!(words[3], instruction(op::CALL, Register::Gr0, Register::Gr0));
        assert_eq!(words[4], 7);
        // SVC 1
        assert_eq!(words[5], instruction(op::SVC, Register::Gr0, Register::Gr0));
        assert_eq!(words[6], 1);
        // main: LAD GR1, 0; RET; implicit RET
        assert_eq!(words[7], instruction(op::LAD, Register::Gr1, Register::Gr0));
        assert_eq!(words[8], 0);
        assert_eq!(words[9], op::RET);
        assert_eq!(words[10], op::RET);
        assert_eq!(words.len(), 11);
    }

    #[test]
    fn test_global_reserves_inline_word() {
        let source = "int x; int main(void) { return 0; }";
        let program = Parser::new("test.c", source).parse().unwrap();
        let words = Compiler::new().compile(&program).unwrap();

        let x = program.scope.find("x").unwrap();
        let storage = x.storage().unwrap();
        assert!(storage.global);
        // Right after the 7-word entry sequence.
        assert_eq!(storage.address, 7);
        assert_eq!(words[7], 0);

        // main starts past the data word.
        let main = program.scope.find("main").unwrap();
        assert_eq!(main.storage().unwrap().address, 8);
        assert_eq!(words[4], 8);
    }

    #[test]
    fn test_forward_call_backpatched() {
        let source = "
            int later(void);
            int main(void) { return later(); }
            int later(void) { return 3; }
        ";
        let program = Parser::new("test.c", source).parse().unwrap();
        let words = Compiler::new().compile(&program).unwrap();

        let later = program.scope.find("later").unwrap();
        let entry = later.storage().unwrap().address;

        // The call site inside main loaded the patched address.
        let main_entry = program.scope.find("main").unwrap().storage().unwrap().address;
        // main: LAD GR1, .later; LAD FP, 0, FP; CALL 0, GR1; ...
        assert_eq!(
            words[main_entry as usize],
            instruction(op::LAD, Register::Gr1, Register::Gr0)
        );
        assert_eq!(words[main_entry as usize + 1], entry);
    }

    #[test]
    fn test_missing_main() {
        let err = compile("int x;").unwrap_err();
        assert!(err.to_string().contains("missing function `main'."));
    }

    #[test]
    fn test_main_must_be_a_function() {
        let err = compile("int main;").unwrap_err();
        assert!(err.to_string().contains("missing function `main'."));
    }

    #[test]
    fn test_undefined_function() {
        let err = compile("int f(void); int main(void) { return f(); }").unwrap_err();
        assert!(err.to_string().contains("undefined function `f'."));
    }

    #[test]
    fn test_locals_get_frame_offsets() {
        let source = "int main(void) { int a; int b; a = 1; b = 2; return a; }";
        let program = Parser::new("test.c", source).parse().unwrap();
        Compiler::new().compile(&program).unwrap();

        let main = match &program.declarations[0] {
            Declaration::Function(def) => def,
            _ => panic!("expected a function definition"),
        };
        let a = main.scope.find("a").unwrap().storage().unwrap();
        let b = main.scope.find("b").unwrap().storage().unwrap();
        assert!(!a.global);
        assert_eq!(a.address, 0);
        assert_eq!(b.address, 1);
    }

    #[test]
    fn test_parameters_precede_locals() {
        let source = "int f(int a, int b) { int c; c = a; return c; } int main(void) { return f(1, 2); }";
        let program = Parser::new("test.c", source).parse().unwrap();
        Compiler::new().compile(&program).unwrap();

        let f = match &program.declarations[0] {
            Declaration::Function(def) => def,
            _ => panic!("expected a function definition"),
        };
        assert_eq!(f.params[0].storage().unwrap().address, 0);
        assert_eq!(f.params[1].storage().unwrap().address, 1);
        assert_eq!(f.scope.find("c").unwrap().storage().unwrap().address, 2);
    }

    #[test]
    fn test_sibling_blocks_share_frame_slots() {
        let source = "int main(void) { { int a; a = 1; } { int b; b = 2; } return 0; }";
        let program = Parser::new("test.c", source).parse().unwrap();
        Compiler::new().compile(&program).unwrap();

        let main = match &program.declarations[0] {
            Declaration::Function(def) => def,
            _ => panic!("expected a function definition"),
        };
        let blocks: Vec<_> = main
            .body
            .statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::Compound(compound) => Some(compound),
                _ => None,
            })
            .collect();
        let a = blocks[0].scope.find("a").unwrap().storage().unwrap();
        let b = blocks[1].scope.find("b").unwrap().storage().unwrap();
        assert_eq!(a.address, b.address);
    }

    #[test]
    fn test_empty_statement_emits_nop() {
        let with_empty = compile("int main(void) { ; return 0; }").unwrap();
        let without = compile("int main(void) { return 0; }").unwrap();
        assert_eq!(with_empty.len(), without.len() + 1);
        assert_eq!(with_empty[7], op::NOP);
    }
}
