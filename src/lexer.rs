//! Mini lexer
//!
//! Tokenizes Mini source code. Tokens carry the 1-based source line they
//! start on; every diagnostic downstream is reported against these lines.

use logos::Logos;

use crate::error::{CompileError, Result};

/// Mini tokens
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // === Literals ===
    /// Double literal (must carry a decimal point)
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse().ok())]
    Double(f64),

    /// Integer literal
    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    Int(i64),

    #[token("true")]
    True,

    #[token("false")]
    False,

    /// String literal, kept raw with its surrounding quotes; escape
    /// processing happens when the literal enters the string pool.
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| lex.slice().to_string())]
    String(String),

    // === Keywords ===
    #[token("int")]
    KwInt,

    #[token("double")]
    KwDouble,

    #[token("bool")]
    KwBool,

    #[token("if")]
    If,

    #[token("else")]
    Else,

    #[token("while")]
    While,

    #[token("read")]
    Read,

    #[token("write")]
    Write,

    #[token("hex")]
    Hex,

    #[token("return")]
    Return,

    #[token("break")]
    Break,

    #[token("continue")]
    Continue,

    /// Identifier
    #[regex(r"[A-Za-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // === Operators ===
    #[token("=")]
    Assign,

    #[token("==")]
    Eq,

    #[token("!=")]
    Ne,

    #[token(">=")]
    Ge,

    #[token(">")]
    Gt,

    #[token("<=")]
    Le,

    #[token("<")]
    Lt,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("|")]
    Pipe,

    #[token("&")]
    Amp,

    #[token("||")]
    OrOr,

    #[token("&&")]
    AndAnd,

    #[token("!")]
    Bang,

    #[token("~")]
    Tilde,

    // === Delimiters ===
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token("\n")]
    Newline,
}

/// Token with the source line it starts on
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: u32,
}

/// Tokenize source code, dropping newline tokens after counting them.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>> {
    let mut tokens = Vec::new();
    let mut line = 1u32;

    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(Token::Newline) => line += 1,
            Ok(token) => tokens.push(SpannedToken { token, line }),
            Err(_) => {
                return Err(CompileError::lexer(
                    line,
                    format!("Unrecognised token `{}`", &source[span]),
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_tokens() {
        let tokens = tokenize("int a; a = 5;").unwrap();
        assert_eq!(tokens.len(), 7);
        assert!(matches!(tokens[0].token, Token::KwInt));
        assert!(matches!(&tokens[1].token, Token::Identifier(s) if s == "a"));
        assert!(matches!(tokens[2].token, Token::Semicolon));
        assert!(matches!(tokens[4].token, Token::Assign));
        assert!(matches!(tokens[5].token, Token::Int(5)));
    }

    #[test]
    fn keyword_prefix_is_an_identifier() {
        let tokens = tokenize("intx double2").unwrap();
        assert!(matches!(&tokens[0].token, Token::Identifier(s) if s == "intx"));
        assert!(matches!(&tokens[1].token, Token::Identifier(s) if s == "double2"));
    }

    #[test]
    fn doubles_and_ints() {
        let tokens = tokenize("3.14 42").unwrap();
        assert!(matches!(tokens[0].token, Token::Double(v) if v == 3.14));
        assert!(matches!(tokens[1].token, Token::Int(42)));
    }

    #[test]
    fn line_numbers() {
        let tokens = tokenize("int a;\na = 1;\n\nwrite a;").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[3].line, 2);
        assert_eq!(tokens.last().unwrap().line, 4);
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = tokenize("a // the rest vanishes ; = +\nb").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn string_literal_keeps_quotes() {
        let tokens = tokenize(r#"write "hi\n";"#).unwrap();
        assert!(matches!(&tokens[1].token, Token::String(s) if s == r#""hi\n""#));
    }

    #[test]
    fn compound_operators() {
        let tokens = tokenize("== != <= >= && || = < >").unwrap();
        assert!(matches!(tokens[0].token, Token::Eq));
        assert!(matches!(tokens[1].token, Token::Ne));
        assert!(matches!(tokens[2].token, Token::Le));
        assert!(matches!(tokens[3].token, Token::Ge));
        assert!(matches!(tokens[4].token, Token::AndAnd));
        assert!(matches!(tokens[5].token, Token::OrOr));
        assert!(matches!(tokens[6].token, Token::Assign));
    }

    #[test]
    fn unknown_character_is_an_error() {
        let err = tokenize("int a;\n#").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
