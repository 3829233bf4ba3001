//! minic — a compiler for the Mini language
//!
//! Mini is a small imperative language with `int`, `double` and `bool`
//! scalars, multidimensional arrays, the usual expression operators,
//! `if`/`while` control flow with multi-level `break`/`continue`, and
//! formatted `read`/`write` I/O. The compiler targets textual LLVM IR,
//! emitted directly as strings.
//!
//! The pipeline is lexer -> parser -> binding -> generation. Lexer and
//! parser errors abort immediately; the binding pass instead collects
//! every semantic error it can find before the compilation is rejected.
//! Generation only ever runs on a cleanly bound program.

pub mod ast;
pub mod codegen;
pub mod context;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod types;

use crate::context::Context;
use crate::error::{CompileError, Result};

/// Compile Mini source text to an LLVM IR module.
///
/// The output is deterministic: compiling the same source twice yields
/// byte-identical IR.
pub fn compile(source: &str) -> Result<String> {
    let program = parser::parse(source)?;

    let mut ctx = Context::new();
    let bound = semantic::bind(&program, &mut ctx);
    if ctx.diagnostics.has_errors() {
        return Err(CompileError::Semantic {
            errors: ctx.diagnostics.into_errors(),
        });
    }

    Ok(codegen::generate(&bound, &mut ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_program_compiles() {
        let out = compile("int a; a = 2 + 3; write a;").unwrap();
        assert!(out.starts_with("; prolog"));
        assert!(out.contains("define i32 @main()"));
        assert!(out.contains("add i32 2, 3"));
    }

    #[test]
    fn control_flow_program_compiles() {
        let source = "
int i; int sum;
i = 0; sum = 0;
while (i < 10) {
    i = i + 1;
    if (i == 5) continue;
    sum = sum + i;
}
write sum;
";
        let out = compile(source).unwrap();
        assert!(out.contains("icmp eq i32"));
        assert!(out.contains("br label %label1"));
    }

    #[test]
    fn semantic_errors_collect_before_rejection() {
        let err = compile("int a;\nwrite x;\na = true;\nbreak;").unwrap_err();
        match &err {
            CompileError::Semantic { errors } => {
                assert_eq!(errors.len(), 3);
                assert_eq!(errors[0].to_string(), "Undeclared variable \"x\" at line 2");
                assert_eq!(errors[1].to_string(), "Cannot assign bool to int at line 3");
                assert_eq!(errors[2].to_string(), "Break not inside a loop at line 4");
            }
            other => panic!("expected semantic errors, got {:?}", other),
        }
    }

    #[test]
    fn parse_errors_abort_immediately() {
        assert!(matches!(
            compile("int a; a = ;").unwrap_err(),
            CompileError::Parse { .. }
        ));
    }

    #[test]
    fn lexer_errors_abort_immediately() {
        assert!(matches!(
            compile("int a; a = #;").unwrap_err(),
            CompileError::Lexer { .. }
        ));
    }

    #[test]
    fn repeated_string_literals_share_one_constant() {
        let out = compile("write \"go\"; write \"go\";").unwrap();
        assert_eq!(out.matches("@str1 = constant").count(), 1);
        assert!(!out.contains("@str2"));
        assert_eq!(out.matches("@str1 to i8*").count(), 2);
    }

    #[test]
    fn compilation_is_deterministic() {
        let source = "
int m[3][4]; int i; int j;
i = 0;
while (i < 3) {
    j = 0;
    while (j < 4) {
        m[i][j] = i * 4 + j;
        if (m[i][j] == 7) break 2;
        j = j + 1;
    }
    i = i + 1;
}
write m[1][3];
";
        assert_eq!(compile(source).unwrap(), compile(source).unwrap());
    }
}
