//! Error types for the Mini compiler
//!
//! Lexer and parser errors abort compilation immediately. Semantic errors
//! are recovered locally: they are collected in a [`Diagnostics`] sink so a
//! single binding pass can report every problem in the program.

use std::fmt::Display;

use thiserror::Error;

/// A single recovered semantic error, tied to a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at line {}", self.message, self.line)
    }
}

/// Accumulates semantic diagnostics in traversal order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, line: u32, message: impl Into<String>) {
        self.errors.push(Diagnostic {
            line,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Diagnostic> {
        self.errors
    }
}

/// Compiler error
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexer error at line {line}: {message}")]
    Lexer { line: u32, message: String },

    #[error("Parse error at line {line}: {message}")]
    Parse { line: u32, message: String },

    #[error("{}", format_semantic(.errors))]
    Semantic { errors: Vec<Diagnostic> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub fn lexer(line: u32, message: impl Into<String>) -> Self {
        Self::Lexer {
            line,
            message: message.into(),
        }
    }

    pub fn parse(line: u32, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

fn format_semantic(errors: &[Diagnostic]) -> String {
    errors
        .iter()
        .map(Diagnostic::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display() {
        let mut sink = Diagnostics::new();
        sink.report(7, "Undeclared variable \"x\"");
        assert_eq!(
            sink.errors()[0].to_string(),
            "Undeclared variable \"x\" at line 7"
        );
    }

    #[test]
    fn semantic_error_lists_every_diagnostic() {
        let mut sink = Diagnostics::new();
        sink.report(1, "first");
        sink.report(2, "second");
        let err = CompileError::Semantic {
            errors: sink.into_errors(),
        };
        assert_eq!(err.to_string(), "first at line 1\nsecond at line 2");
    }
}
