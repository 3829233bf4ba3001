//! IR generation for Mini
//!
//! Walks the bound tree and emits textual LLVM IR by hand, one instruction
//! per line. Generation must only run when binding reported no diagnostics;
//! the bound tree then contains no fallback nodes and every conversion the
//! generator is asked for is a legal one.
//!
//! Registers and labels come from the shared [`Context`], continuing the
//! sequence the binding pass started, so the output is byte-for-byte
//! reproducible for a given source.

use crate::context::Context;
use crate::semantic::{
    ArithOp, BitOp, BoundBlock, BoundExpr, BoundProgram, BoundStmt, BoundTarget, CmpOp, LogicOp,
    Symbol,
};
use crate::types::Type;

/// Generate the complete IR module for a bound program.
pub fn generate(program: &BoundProgram, ctx: &mut Context) -> String {
    debug_assert!(
        !ctx.diagnostics.has_errors(),
        "generation ran on a program with semantic errors"
    );
    let mut generator = Generator {
        ctx,
        out: String::new(),
        terminated: false,
    };
    generator.module(program);
    generator.out
}

struct Generator<'a> {
    ctx: &'a mut Context,
    out: String,
    /// Set after emitting a terminator. The next ordinary instruction
    /// opens a fresh (unreachable) block first, keeping the output well
    /// formed when statements follow a `break`, `continue` or `return`.
    terminated: bool,
}

impl Generator<'_> {
    // =========================================================================
    // Line-level emission
    // =========================================================================

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn inst(&mut self, text: String) {
        if self.terminated {
            let label = self.ctx.fresh_label();
            self.out.push_str(&label);
            self.out.push_str(":\n");
            self.terminated = false;
        }
        self.raw(&text);
    }

    fn term(&mut self, text: String) {
        self.inst(text);
        self.terminated = true;
    }

    fn place_label(&mut self, label: &str) {
        self.out.push_str(label);
        self.out.push_str(":\n");
        self.terminated = false;
    }

    // =========================================================================
    // Module frame
    // =========================================================================

    fn module(&mut self, program: &BoundProgram) {
        self.raw("; prolog");
        self.raw("@int_res = constant [3 x i8] c\"%d\\00\"");
        self.raw("@double_res = constant [4 x i8] c\"%lf\\00\"");
        self.raw("@hex_res = constant [5 x i8] c\"0X%X\\00\"");
        self.raw("@true_res = constant [5 x i8] c\"True\\00\"");
        self.raw("@false_res = constant [6 x i8] c\"False\\00\"");
        for literal in self.ctx.strings().to_vec() {
            self.raw(&format!(
                "@{} = constant [{} x i8] c\"{}\\00\"",
                literal.name, literal.byte_len, literal.text
            ));
        }
        self.raw("declare i32 @printf(i8* noalias nocapture, ...)");
        self.raw("declare i32 @scanf(i8* noalias nocapture, ...)");
        self.raw("define i32 @main()");
        self.raw("{");

        self.block(&program.block);

        self.inst("ret i32 0".to_string());
        self.raw("}");
    }

    fn block(&mut self, block: &BoundBlock) {
        for local in &block.locals {
            if local.is_array() {
                self.inst(format!(
                    "%{} = alloca [{} x {}]",
                    local.storage,
                    local.total_elements(),
                    local.ty.ir_name()
                ));
            } else {
                self.inst(format!("%{} = alloca {}", local.storage, local.ty.ir_name()));
            }
        }
        for stmt in &block.statements {
            self.stmt(stmt);
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn stmt(&mut self, stmt: &BoundStmt) {
        match stmt {
            BoundStmt::Block(block) => self.block(block),

            BoundStmt::Expr(expr) => {
                self.expr(expr);
            }

            BoundStmt::If {
                condition,
                then_body,
                else_body,
            } => self.if_stmt(condition, then_body, else_body.as_deref()),

            BoundStmt::While {
                condition,
                body,
                labels,
            } => {
                self.term(format!("br label %{}", labels.start));
                self.place_label(&labels.start);
                let cond = self.expr(condition);
                self.term(format!(
                    "br i1 {}, label %{}, label %{}",
                    cond, labels.body, labels.end
                ));
                self.place_label(&labels.body);
                self.stmt(body);
                self.term(format!("br label %{}", labels.start));
                self.place_label(&labels.end);
            }

            BoundStmt::Read { symbol, hex } => self.read(symbol, *hex),

            BoundStmt::Write { expr, hex } => self.write(expr, *hex),

            BoundStmt::WriteString(literal) => {
                self.inst(format!(
                    "call i32 (i8*, ...) @printf(i8* bitcast ([{} x i8]* @{} to i8*))",
                    literal.byte_len, literal.name
                ));
            }

            BoundStmt::Return => self.term("ret i32 0".to_string()),

            BoundStmt::Break { target } | BoundStmt::Continue { target } => {
                self.term(format!("br label %{}", target));
            }
        }
    }

    fn if_stmt(
        &mut self,
        condition: &BoundExpr,
        then_body: &BoundStmt,
        else_body: Option<&BoundStmt>,
    ) {
        let then_label = self.ctx.fresh_label();
        let end_label = self.ctx.fresh_label();
        let cond = self.expr(condition);

        match else_body {
            None => {
                self.term(format!(
                    "br i1 {}, label %{}, label %{}",
                    cond, then_label, end_label
                ));
                self.place_label(&then_label);
                self.stmt(then_body);
                self.term(format!("br label %{}", end_label));
                self.place_label(&end_label);
            }
            Some(else_body) => {
                let else_label = self.ctx.fresh_label();
                self.term(format!(
                    "br i1 {}, label %{}, label %{}",
                    cond, then_label, else_label
                ));
                self.place_label(&then_label);
                self.stmt(then_body);
                self.term(format!("br label %{}", end_label));
                self.place_label(&else_label);
                self.stmt(else_body);
                self.term(format!("br label %{}", end_label));
                self.place_label(&end_label);
            }
        }
    }

    fn read(&mut self, symbol: &Symbol, hex: bool) {
        let (fmt, fmt_len, ptr_ty) = if hex {
            ("hex_res", 5, "i32*")
        } else {
            match symbol.ty {
                Type::Int => ("int_res", 3, "i32*"),
                Type::Double => ("double_res", 4, "double*"),
                Type::Bool => unreachable!("read of a bool variable passed type checking"),
            }
        };
        self.inst(format!(
            "call i32 (i8*, ...) @scanf(i8* bitcast ([{} x i8]* @{} to i8*), {} %{})",
            fmt_len, fmt, ptr_ty, symbol.storage
        ));
    }

    fn write(&mut self, expr: &BoundExpr, hex: bool) {
        if hex {
            let value = self.expr(expr);
            self.inst(format!(
                "call i32 (i8*, ...) @printf(i8* bitcast ([5 x i8]* @hex_res to i8*), i32 {})",
                value
            ));
            return;
        }
        match expr.ty() {
            Type::Int => {
                let value = self.expr(expr);
                self.inst(format!(
                    "call i32 (i8*, ...) @printf(i8* bitcast ([3 x i8]* @int_res to i8*), i32 {})",
                    value
                ));
            }
            Type::Double => {
                let value = self.expr(expr);
                self.inst(format!(
                    "call i32 (i8*, ...) @printf(i8* bitcast ([4 x i8]* @double_res to i8*), double {})",
                    value
                ));
            }
            // Branch to one of two printf calls; i1 has no format directive.
            Type::Bool => {
                let true_label = self.ctx.fresh_label();
                let false_label = self.ctx.fresh_label();
                let end_label = self.ctx.fresh_label();
                let value = self.expr(expr);
                self.term(format!(
                    "br i1 {}, label %{}, label %{}",
                    value, true_label, false_label
                ));
                self.place_label(&true_label);
                self.inst(
                    "call i32 (i8*, ...) @printf(i8* bitcast ([5 x i8]* @true_res to i8*))"
                        .to_string(),
                );
                self.term(format!("br label %{}", end_label));
                self.place_label(&false_label);
                self.inst(
                    "call i32 (i8*, ...) @printf(i8* bitcast ([6 x i8]* @false_res to i8*))"
                        .to_string(),
                );
                self.term(format!("br label %{}", end_label));
                self.place_label(&end_label);
            }
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Emit code for an expression and return the operand holding its value:
    /// either a literal spelling or a virtual register.
    fn expr(&mut self, expr: &BoundExpr) -> String {
        match expr {
            BoundExpr::IntLit(value) => value.to_string(),
            BoundExpr::DoubleLit(value) => format_double(*value),
            BoundExpr::BoolLit(value) => if *value { "1" } else { "0" }.to_string(),

            BoundExpr::Load(symbol) => {
                let ty = symbol.ty.ir_name();
                let reg = self.ctx.fresh_register();
                self.inst(format!("{} = load {}, {}* %{}", reg, ty, ty, symbol.storage));
                reg
            }

            BoundExpr::LoadElement { symbol, indices } => {
                let ptr = self.element_ptr(symbol, indices);
                let ty = symbol.ty.ir_name();
                let reg = self.ctx.fresh_register();
                self.inst(format!("{} = load {}, {}* {}", reg, ty, ty, ptr));
                reg
            }

            BoundExpr::Neg(operand) => {
                let value = self.expr(operand);
                let reg = self.ctx.fresh_register();
                match operand.ty() {
                    Type::Int => self.inst(format!("{} = mul i32 -1, {}", reg, value)),
                    Type::Double => self.inst(format!("{} = fneg double {}", reg, value)),
                    Type::Bool => unreachable!("negation of a bool passed type checking"),
                }
                reg
            }

            BoundExpr::BitNot(operand) => {
                let value = self.expr(operand);
                let reg = self.ctx.fresh_register();
                self.inst(format!("{} = xor i32 {}, -1", reg, value));
                reg
            }

            BoundExpr::Not(operand) => {
                let value = self.expr(operand);
                let reg = self.ctx.fresh_register();
                self.inst(format!("{} = xor i1 {}, true", reg, value));
                reg
            }

            BoundExpr::Convert { to, operand } => {
                let value = self.expr(operand);
                self.convert(operand.ty(), *to, value)
            }

            BoundExpr::Arith {
                op,
                left,
                right,
                ty,
            } => {
                let lhs = self.expr(left);
                let rhs = self.expr(right);
                let lhs = self.convert(left.ty(), *ty, lhs);
                let rhs = self.convert(right.ty(), *ty, rhs);
                let mnemonic = match (op, ty) {
                    (ArithOp::Add, Type::Double) => "fadd",
                    (ArithOp::Sub, Type::Double) => "fsub",
                    (ArithOp::Mul, Type::Double) => "fmul",
                    (ArithOp::Div, Type::Double) => "fdiv",
                    (ArithOp::Add, _) => "add",
                    (ArithOp::Sub, _) => "sub",
                    (ArithOp::Mul, _) => "mul",
                    (ArithOp::Div, _) => "sdiv",
                };
                let reg = self.ctx.fresh_register();
                self.inst(format!(
                    "{} = {} {} {}, {}",
                    reg,
                    mnemonic,
                    ty.ir_name(),
                    lhs,
                    rhs
                ));
                reg
            }

            BoundExpr::Bit { op, left, right } => {
                let lhs = self.expr(left);
                let rhs = self.expr(right);
                let mnemonic = if *op == BitOp::Or { "or" } else { "and" };
                let reg = self.ctx.fresh_register();
                self.inst(format!("{} = {} i32 {}, {}", reg, mnemonic, lhs, rhs));
                reg
            }

            BoundExpr::Cmp {
                op,
                left,
                right,
                operand_ty,
            } => {
                let lhs = self.expr(left);
                let rhs = self.expr(right);
                let lhs = self.convert(left.ty(), *operand_ty, lhs);
                let rhs = self.convert(right.ty(), *operand_ty, rhs);
                let inst = if *operand_ty == Type::Double {
                    let cond = match op {
                        CmpOp::Eq => "oeq",
                        CmpOp::Ne => "une",
                        CmpOp::Gt => "ogt",
                        CmpOp::Ge => "oge",
                        CmpOp::Lt => "olt",
                        CmpOp::Le => "ole",
                    };
                    format!("fcmp {} double {}, {}", cond, lhs, rhs)
                } else {
                    let cond = match op {
                        CmpOp::Eq => "eq",
                        CmpOp::Ne => "ne",
                        CmpOp::Gt => "sgt",
                        CmpOp::Ge => "sge",
                        CmpOp::Lt => "slt",
                        CmpOp::Le => "sle",
                    };
                    format!("icmp {} {} {}, {}", cond, operand_ty.ir_name(), lhs, rhs)
                };
                let reg = self.ctx.fresh_register();
                self.inst(format!("{} = {}", reg, inst));
                reg
            }

            // Short circuit: the right operand only runs when the left one
            // does not decide the result; a phi merges the two paths.
            BoundExpr::Logic { op, left, right } => {
                let start = self.ctx.fresh_label();
                let rhs_label = self.ctx.fresh_label();
                let rhs_end = self.ctx.fresh_label();
                let merge = self.ctx.fresh_label();

                let lhs = self.expr(left);
                self.term(format!("br label %{}", start));
                self.place_label(&start);
                match op {
                    LogicOp::And => self.term(format!(
                        "br i1 {}, label %{}, label %{}",
                        lhs, rhs_label, merge
                    )),
                    LogicOp::Or => self.term(format!(
                        "br i1 {}, label %{}, label %{}",
                        lhs, merge, rhs_label
                    )),
                }
                self.place_label(&rhs_label);
                let rhs = self.expr(right);
                self.term(format!("br label %{}", rhs_end));
                self.place_label(&rhs_end);
                self.term(format!("br label %{}", merge));
                self.place_label(&merge);

                let reg = self.ctx.fresh_register();
                self.inst(format!(
                    "{} = phi i1 [{}, %{}], [{}, %{}]",
                    reg, lhs, start, rhs, rhs_end
                ));
                reg
            }

            BoundExpr::Assign { target, value } => {
                let raw = self.expr(value);
                let converted = self.convert(value.ty(), target.ty(), raw);
                let ty = target.ty().ir_name();
                let ptr = match target {
                    BoundTarget::Scalar(symbol) => format!("%{}", symbol.storage),
                    BoundTarget::Element { symbol, indices } => self.element_ptr(symbol, indices),
                };
                self.inst(format!("store {} {}, {}* {}", ty, converted, ty, ptr));
                // The assignment's value is read back from the target, so
                // chained assignments observe the converted value.
                let reg = self.ctx.fresh_register();
                self.inst(format!("{} = load {}, {}* {}", reg, ty, ty, ptr));
                reg
            }
        }
    }

    /// Row-major address of one array element: fold the indices into a flat
    /// offset, then index the backing allocation with getelementptr.
    fn element_ptr(&mut self, symbol: &Symbol, indices: &[BoundExpr]) -> String {
        let elem = symbol.ty.ir_name();
        let array_ty = format!("[{} x {}]", symbol.total_elements(), elem);

        let mut offset = "0".to_string();
        for (k, index) in indices.iter().enumerate() {
            let value = self.expr(index);
            let stride: i64 = symbol.dims.iter().skip(k + 1).product();
            let scaled = self.ctx.fresh_register();
            self.inst(format!("{} = mul i32 {}, {}", scaled, value, stride));
            let sum = self.ctx.fresh_register();
            self.inst(format!("{} = add i32 {}, {}", sum, offset, scaled));
            offset = sum;
        }

        let ptr = self.ctx.fresh_register();
        self.inst(format!(
            "{} = getelementptr {}, {}* %{}, i32 0, i32 {}",
            ptr, array_ty, array_ty, symbol.storage, offset
        ));
        ptr
    }

    /// Emit the conversion from `from` to `to`, returning the operand of the
    /// converted value. Identity conversions emit nothing.
    fn convert(&mut self, from: Type, to: Type, value: String) -> String {
        if from == to {
            return value;
        }
        let inst = match (from, to) {
            (Type::Int, Type::Double) => format!("sitofp i32 {} to double", value),
            (Type::Double, Type::Int) => format!("fptosi double {} to i32", value),
            (Type::Bool, Type::Int) => format!("zext i1 {} to i32", value),
            (from, to) => unreachable!("no conversion from {} to {}", from, to),
        };
        let reg = self.ctx.fresh_register();
        self.inst(format!("{} = {}", reg, inst));
        reg
    }
}

/// Spell an `f64` so the IR parser reads it back as the same value. Display
/// formatting never uses scientific notation, so restoring the decimal point
/// on whole values is the only adjustment needed.
fn format_double(value: f64) -> String {
    let mut text = format!("{}", value);
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::semantic::bind;

    fn ir(source: &str) -> String {
        let program = parse(source).unwrap();
        let mut ctx = Context::new();
        let bound = bind(&program, &mut ctx);
        assert!(
            !ctx.diagnostics.has_errors(),
            "unexpected diagnostics: {:?}",
            ctx.diagnostics.errors()
        );
        generate(&bound, &mut ctx)
    }

    #[test]
    fn module_frame() {
        let out = ir("int a;");
        assert!(out.starts_with("; prolog\n"));
        assert!(out.contains("@int_res = constant [3 x i8] c\"%d\\00\""));
        assert!(out.contains("declare i32 @printf(i8* noalias nocapture, ...)"));
        assert!(out.contains("define i32 @main()"));
        assert!(out.ends_with("ret i32 0\n}\n"));
    }

    #[test]
    fn scalar_assign_and_write() {
        let out = ir("int a; a = 5; write a;");
        assert!(out.contains("%v1_a = alloca i32"));
        assert!(out.contains("store i32 5, i32* %v1_a"));
        assert!(out.contains("%t1 = load i32, i32* %v1_a"));
        assert!(out.contains("%t2 = load i32, i32* %v1_a"));
        assert!(out.contains(
            "call i32 (i8*, ...) @printf(i8* bitcast ([3 x i8]* @int_res to i8*), i32 %t2)"
        ));
    }

    #[test]
    fn assignment_reloads_converted_value() {
        let out = ir("double d; d = 1;");
        assert!(out.contains("%t1 = sitofp i32 1 to double"));
        assert!(out.contains("store double %t1, double* %v1_d"));
        assert!(out.contains("%t2 = load double, double* %v1_d"));
    }

    #[test]
    fn double_literals_carry_a_decimal_point() {
        assert_eq!(format_double(5.0), "5.0");
        assert_eq!(format_double(3.14), "3.14");
        assert_eq!(format_double(0.5), "0.5");
        let out = ir("write 2.0;");
        assert!(out.contains("double 2.0)"));
    }

    #[test]
    fn arithmetic_promotion_converts_the_int_side() {
        let out = ir("write 1 + 2.5;");
        assert!(out.contains("%t1 = sitofp i32 1 to double"));
        assert!(out.contains("%t2 = fadd double %t1, 2.5"));
    }

    #[test]
    fn int_division_is_signed() {
        let out = ir("write 7 / 2;");
        assert!(out.contains("%t1 = sdiv i32 7, 2"));
    }

    #[test]
    fn bool_write_branches_to_string_constants() {
        let out = ir("write true;");
        assert!(out.contains("br i1 1, label %label1, label %label2"));
        assert!(out.contains("@printf(i8* bitcast ([5 x i8]* @true_res to i8*))"));
        assert!(out.contains("@printf(i8* bitcast ([6 x i8]* @false_res to i8*))"));
        assert!(out.contains("label3:"));
    }

    #[test]
    fn hex_io_uses_the_hex_format() {
        let out = ir("int a; read a, hex; write a, hex;");
        assert!(out.contains(
            "call i32 (i8*, ...) @scanf(i8* bitcast ([5 x i8]* @hex_res to i8*), i32* %v1_a)"
        ));
        assert!(out.contains(
            "call i32 (i8*, ...) @printf(i8* bitcast ([5 x i8]* @hex_res to i8*), i32 %t1)"
        ));
    }

    #[test]
    fn read_double_uses_lf_format() {
        let out = ir("double d; read d;");
        assert!(out.contains(
            "call i32 (i8*, ...) @scanf(i8* bitcast ([4 x i8]* @double_res to i8*), double* %v1_d)"
        ));
    }

    #[test]
    fn string_write_references_the_pool() {
        let out = ir(r#"write "hi\n";"#);
        assert!(out.contains("@str1 = constant [4 x i8] c\"hi\\0A\\00\""));
        assert!(out.contains("call i32 (i8*, ...) @printf(i8* bitcast ([4 x i8]* @str1 to i8*))"));
    }

    #[test]
    fn array_element_addressing_is_row_major() {
        let out = ir("int a[2][3]; a[1][2] = 7;");
        assert!(out.contains("%v1_a = alloca [6 x i32]"));
        // offset = 1*3 + 2*1
        assert!(out.contains("%t1 = mul i32 1, 3"));
        assert!(out.contains("%t2 = add i32 0, %t1"));
        assert!(out.contains("%t3 = mul i32 2, 1"));
        assert!(out.contains("%t4 = add i32 %t2, %t3"));
        assert!(out.contains("%t5 = getelementptr [6 x i32], [6 x i32]* %v1_a, i32 0, i32 %t4"));
        assert!(out.contains("store i32 7, i32* %t5"));
    }

    #[test]
    fn while_loop_wires_its_bound_labels() {
        let out = ir("int a; a = 0; while (a < 3) { a = a + 1; }");
        assert!(out.contains("br label %label1"));
        assert!(out.contains("label1:"));
        assert!(out.contains("br i1 %t3, label %label2, label %label3"));
        assert!(out.contains("label2:"));
        assert!(out.contains("label3:"));
    }

    #[test]
    fn break_two_jumps_to_the_outer_end_label() {
        let out = ir("while (true) { while (true) { break 2; } }");
        // Outer labels label1..3, inner label4..6; break 2 exits the outer loop.
        assert!(out.contains("br label %label3"));
        // The inner loop's back edge after the break opens a fresh block.
        assert!(out.contains("label7:\nbr label %label4"));
    }

    #[test]
    fn statements_after_return_open_a_dead_block() {
        let out = ir("int a; return; write 1;");
        let first = out.find("ret i32 0").unwrap();
        let rest = &out[first + 1..];
        assert!(rest.contains("ret i32 0"));
        assert!(out.contains("label1:"));
    }

    #[test]
    fn short_circuit_and_merges_with_phi() {
        let out = ir("bool a; bool b; write a && b;");
        assert!(out.contains("br i1 %t1, label %label5, label %label7"));
        assert!(out.contains("%t3 = phi i1 [%t1, %label4], [%t2, %label6]"));
    }

    #[test]
    fn short_circuit_or_branches_straight_to_merge() {
        let out = ir("bool a; bool b; write a || b;");
        assert!(out.contains("br i1 %t1, label %label7, label %label5"));
    }

    #[test]
    fn logic_negation_flips_the_bit() {
        let out = ir("bool b; write !b;");
        assert!(out.contains("%t2 = xor i1 %t1, true"));
    }

    #[test]
    fn output_is_deterministic() {
        let source = "int a[2]; double d; a[0] = 1; d = 0.5;\nwhile (a[0] < 4) { a[0] = a[0] + 1; if (d > 0.1) write a[0]; }";
        assert_eq!(ir(source), ir(source));
    }
}
