//! Hand-written lexer for the `var NAME = OP(ARG, ...)` script language.
//!
//! **Supplemented from `original_source`.** The original embeds ChaiScript
//! (`src/libcvpg/imageproc/scripting/detail/parser.cpp` calls `m_chai.eval`)
//! — spec.md §9 explicitly recommends a hand-written recursive-descent
//! parser instead, since the grammar is tiny and pulling in a scripting
//! language host for it would be the wrong tool.

use tilework_core::error::{Error, Result};

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// The `var` keyword.
    Var,
    /// An identifier: a variable name or operation name.
    Ident(String),
    /// `=`
    Equals,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`, treated as an optional statement terminator.
    Semicolon,
    /// Integer literal.
    Int(i64),
    /// Real literal.
    Real(f64),
    /// Boolean literal.
    Bool(bool),
    /// Double-quoted string literal, unescaped.
    Str(String),
    /// End of input.
    Eof,
}

/// Tokenizes `source` into a flat token stream, discarding whitespace and comments.
///
/// `#`-to-end-of-line comments are supported even though spec.md doesn't
/// mention them, matching the teacher's habit of accepting harmless lexical
/// conveniences that don't change the grammar.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '=' => {
                tokens.push(Token::Equals);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '"' => {
                let start = i;
                i += 1;
                let mut value = String::new();
                while i < chars.len() && chars[i] != '"' {
                    value.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(Error::invalid_parameter(
                        "script",
                        format!("unterminated string literal starting at byte {start}"),
                    ));
                }
                i += 1; // closing quote
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit()) {
                    i += 1;
                }
                let mut is_real = false;
                if i < chars.len() && chars[i] == '.' {
                    is_real = true;
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                if is_real {
                    let v: f64 = text.parse().map_err(|_| {
                        Error::invalid_parameter("script", format!("invalid real literal '{text}'"))
                    })?;
                    tokens.push(Token::Real(v));
                } else {
                    let v: i64 = text.parse().map_err(|_| {
                        Error::invalid_parameter("script", format!("invalid integer literal '{text}'"))
                    })?;
                    tokens.push(Token::Int(v));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                match text.as_str() {
                    "var" => tokens.push(Token::Var),
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    _ => tokens.push(Token::Ident(text)),
                }
            }
            other => {
                return Err(Error::invalid_parameter(
                    "script",
                    format!("unexpected character '{other}' at byte {i}"),
                ));
            }
        }
    }
    tokens.push(Token::Eof);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_simple_statement() {
        let tokens = tokenize(r#"var g = input("gray", 8)"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Var,
                Token::Ident("g".into()),
                Token::Equals,
                Token::Ident("input".into()),
                Token::LParen,
                Token::Str("gray".into()),
                Token::Comma,
                Token::Int(8),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_real_and_bool_literals() {
        let tokens = tokenize("multiply_add(a, 1.5, true)").unwrap();
        assert!(tokens.contains(&Token::Real(1.5)));
        assert!(tokens.contains(&Token::Bool(true)));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(tokenize(r#"var x = op("oops)"#).is_err());
    }

    #[test]
    fn skips_comments() {
        let tokens = tokenize("# a comment\nvar x = op()").unwrap();
        assert_eq!(tokens[0], Token::Var);
    }
}
