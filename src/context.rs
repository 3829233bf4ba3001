//! Per-compilation state shared by the binding and generation passes
//!
//! One [`Context`] value is threaded through both passes instead of global
//! counters, so independent compilations are isolated and name generation is
//! reproducible: counters only ever increase, in fixed traversal order.

use crate::error::Diagnostics;

/// A string literal admitted to the pool, ready for IR emission.
///
/// `text` holds the processed form that goes inside the `c"..."` constant
/// (IR hex escapes like `\0A` included); `byte_len` is the length of the
/// emitted byte array including the trailing NUL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub text: String,
    pub name: String,
    pub byte_len: usize,
}

/// Compilation context: name counters, the string literal pool, and the
/// semantic diagnostics sink.
#[derive(Debug, Default)]
pub struct Context {
    registers: u32,
    labels: u32,
    storages: u32,
    strings: Vec<StringLiteral>,
    pub diagnostics: Diagnostics,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next virtual register name (`%t1`, `%t2`, ...).
    pub fn fresh_register(&mut self) -> String {
        self.registers += 1;
        format!("%t{}", self.registers)
    }

    /// Next basic block label (`label1`, `label2`, ...).
    pub fn fresh_label(&mut self) -> String {
        self.labels += 1;
        format!("label{}", self.labels)
    }

    /// Unique storage name for a declared variable. The source name is kept
    /// as a suffix so the IR stays readable.
    pub fn fresh_storage(&mut self, name: &str) -> String {
        self.storages += 1;
        format!("v{}_{}", self.storages, name)
    }

    /// Admit a raw, still-quoted string token to the pool, reusing the
    /// existing entry if an identical literal was seen before.
    pub fn intern_string(&mut self, raw: &str) -> StringLiteral {
        let text = process_escapes(raw);
        if let Some(existing) = self.strings.iter().find(|s| s.text == text) {
            return existing.clone();
        }
        let literal = StringLiteral {
            byte_len: emitted_byte_len(&text),
            name: format!("str{}", self.strings.len() + 1),
            text,
        };
        self.strings.push(literal.clone());
        literal
    }

    pub fn strings(&self) -> &[StringLiteral] {
        &self.strings
    }
}

/// Turn a quoted source token into the byte text of the IR constant.
///
/// The substitution chain runs in a fixed order and each step operates on
/// the output of the previous one; the exact output bytes are a contract,
/// reproduced from worked examples (see the tests below). First every
/// backslash is doubled, then the doubled two-character escapes collapse to
/// IR hex escapes, and finally any stray doubled backslash is dropped.
fn process_escapes(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let s = inner.replace('\\', "\\\\");
    let s = s.replace("\\\\n", "\\0A");
    let s = s.replace("\\\\\"", "\\22");
    let s = s.replace("\\\\\\\\", "\\5C");
    s.replace("\\\\", "")
}

/// Length of the emitted `[N x i8]` array: every remaining backslash starts
/// a three-character hex escape encoding one byte, plus the trailing NUL.
fn emitted_byte_len(text: &str) -> usize {
    let backslashes = text.chars().filter(|&c| c == '\\').count();
    text.len() + 1 - backslashes * 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_monotonic() {
        let mut ctx = Context::new();
        assert_eq!(ctx.fresh_register(), "%t1");
        assert_eq!(ctx.fresh_register(), "%t2");
        assert_eq!(ctx.fresh_label(), "label1");
        assert_eq!(ctx.fresh_label(), "label2");
        assert_eq!(ctx.fresh_storage("a"), "v1_a");
        assert_eq!(ctx.fresh_storage("a"), "v2_a");
    }

    #[test]
    fn plain_string() {
        let mut ctx = Context::new();
        let s = ctx.intern_string("\"abc\"");
        assert_eq!(s.text, "abc");
        assert_eq!(s.byte_len, 4);
        assert_eq!(s.name, "str1");
    }

    #[test]
    fn newline_escape() {
        let mut ctx = Context::new();
        let s = ctx.intern_string(r#""a\nb""#);
        assert_eq!(s.text, "a\\0Ab");
        assert_eq!(s.byte_len, 4); // a, LF, b, NUL
    }

    #[test]
    fn quote_escape() {
        let mut ctx = Context::new();
        let s = ctx.intern_string(r#""say \"hi\"""#);
        assert_eq!(s.text, "say \\22hi\\22");
        assert_eq!(s.byte_len, 9); // say "hi" + NUL
    }

    #[test]
    fn backslash_escape() {
        let mut ctx = Context::new();
        let s = ctx.intern_string(r#""a\\b""#);
        assert_eq!(s.text, "a\\5Cb");
        assert_eq!(s.byte_len, 4); // a, backslash, b, NUL
    }

    #[test]
    fn stray_backslash_is_dropped() {
        let mut ctx = Context::new();
        let s = ctx.intern_string(r#""a\b""#);
        assert_eq!(s.text, "ab");
        assert_eq!(s.byte_len, 3);
    }

    #[test]
    fn pool_is_distinct_and_ordered() {
        let mut ctx = Context::new();
        let first = ctx.intern_string("\"x\"");
        let second = ctx.intern_string("\"y\"");
        let again = ctx.intern_string("\"x\"");
        assert_eq!(first.name, "str1");
        assert_eq!(second.name, "str2");
        assert_eq!(again, first);
        assert_eq!(ctx.strings().len(), 2);
    }
}
