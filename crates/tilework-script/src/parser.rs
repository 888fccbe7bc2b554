//! Recursive-descent parser for the `var NAME = OP(ARG, ...)` script
//! language, producing a flat, already-validated list of items.
//!
//! Grounded on `original_source/.../scripting/detail/parser.cpp`'s
//! `register_item`/`register_link` bookkeeping, minus the ChaiScript host:
//! each statement is parsed, its operation looked up in the
//! [`crate::registry::AlgorithmRegistry`], its arguments resolved against
//! previously bound names, and validated before the next statement is even
//! tokenized — a script either parses into a fully valid item list or fails
//! at the first bad statement, matching S4's "compile fails, no
//! `compile_id` allocated" requirement.

use tilework_core::error::{Error, Result};

use crate::item::{Arg, ItemKind, Literal};
use crate::lexer::{tokenize, Token};
use crate::registry::AlgorithmRegistry;

/// One parsed `var NAME = OP(ARG, ...)` statement, fully resolved and validated.
#[derive(Debug, Clone)]
pub struct ParsedItem {
    /// Strictly-increasing id assigned in declaration order.
    pub id: u32,
    /// The script-source variable name this item is bound to.
    pub name: String,
    /// Operation name, already confirmed to exist in the registry.
    pub op: &'static str,
    /// Resolved argument list: literals inline, earlier variables as `Ref(id)`.
    pub args: Vec<Arg>,
    /// This item's result type.
    pub result_kind: ItemKind,
}

/// A fully parsed script: its items in declaration order.
#[derive(Debug, Clone)]
pub struct ParsedScript {
    /// Every `var` statement, in source order.
    pub items: Vec<ParsedItem>,
}

impl ParsedScript {
    /// The id of the last statement's result — what `ImageProcessor::evaluate` returns.
    pub fn result_id(&self) -> Result<u32> {
        self.items
            .last()
            .map(|item| item.id)
            .ok_or_else(|| Error::invalid_parameter("script", "script has no statements"))
    }

    /// Ids of every `input(...)` statement, in source order — what
    /// `ImageProcessor::evaluate`/`evaluate_two` seed with the caller's image(s).
    pub fn input_ids(&self) -> Vec<u32> {
        self.items
            .iter()
            .filter(|item| item.op == "input")
            .map(|item| item.id)
            .collect()
    }
}

struct Parser<'r> {
    tokens: Vec<Token>,
    pos: usize,
    registry: &'r AlgorithmRegistry,
    bindings: std::collections::HashMap<String, (u32, ItemKind)>,
    items: Vec<ParsedItem>,
    next_id: u32,
}

/// Parses `source` against `registry`, resolving, type-checking, and
/// operation-validating every statement.
pub fn parse(source: &str, registry: &AlgorithmRegistry) -> Result<ParsedScript> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        registry,
        bindings: std::collections::HashMap::new(),
        items: Vec::new(),
        next_id: 0,
    };
    parser.parse_script()
}

impl<'r> Parser<'r> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(Error::invalid_parameter(
                "script",
                format!("expected {expected:?}, found {:?}", self.peek()),
            ))
        }
    }

    fn parse_script(&mut self) -> Result<ParsedScript> {
        while *self.peek() != Token::Eof {
            self.parse_statement()?;
            while *self.peek() == Token::Semicolon {
                self.advance();
            }
        }
        if self.items.is_empty() {
            return Err(Error::invalid_parameter("script", "script has no statements"));
        }
        Ok(ParsedScript {
            items: std::mem::take(&mut self.items),
        })
    }

    fn parse_statement(&mut self) -> Result<()> {
        self.expect(&Token::Var)?;
        let name = match self.advance() {
            Token::Ident(name) => name,
            other => {
                return Err(Error::invalid_parameter(
                    "script",
                    format!("expected a variable name, found {other:?}"),
                ))
            }
        };
        self.expect(&Token::Equals)?;
        let (op_name, args) = self.parse_call()?;

        let spec = self.registry.get(&op_name)?;
        if args.len() != spec.params.len() {
            return Err(Error::invalid_parameter(
                op_name.clone(),
                format!(
                    "expected {} argument(s), found {}",
                    spec.params.len(),
                    args.len()
                ),
            ));
        }

        let mut kinds = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(spec.params.iter()) {
            let kind = match arg {
                Arg::Literal(lit) => lit.kind(),
                Arg::Ref(id) => self
                    .items
                    .iter()
                    .find(|item| item.id == *id)
                    .map(|item| item.result_kind)
                    .ok_or_else(|| Error::invalid_parameter(op_name.clone(), "dangling reference"))?,
            };
            if !param.admissible.contains(&kind) {
                return Err(Error::invalid_parameter(
                    op_name.clone(),
                    format!(
                        "parameter '{}' does not accept a {kind} argument",
                        param.name
                    ),
                ));
            }
            kinds.push(kind);
        }

        (spec.validate)(&args, &kinds)?;

        let result_kind = if op_name == "input" {
            match &args[0] {
                Arg::Literal(Literal::String(s)) if s == "rgb" => ItemKind::Rgb8,
                _ => ItemKind::Gray8,
            }
        } else {
            spec.result_kind
        };

        let id = self.next_id;
        self.next_id += 1;
        self.items.push(ParsedItem {
            id,
            name: name.clone(),
            op: spec.name,
            args,
            result_kind,
        });
        self.bindings.insert(name, (id, result_kind));
        Ok(())
    }

    fn parse_call(&mut self) -> Result<(String, Vec<Arg>)> {
        let op_name = match self.advance() {
            Token::Ident(name) => name,
            other => {
                return Err(Error::invalid_parameter(
                    "script",
                    format!("expected an operation name, found {other:?}"),
                ))
            }
        };
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                args.push(self.parse_arg()?);
                if *self.peek() == Token::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok((op_name, args))
    }

    fn parse_arg(&mut self) -> Result<Arg> {
        match self.advance() {
            Token::Int(v) => Ok(Arg::Literal(Literal::Int(v))),
            Token::Real(v) => Ok(Arg::Literal(Literal::Real(v))),
            Token::Bool(v) => Ok(Arg::Literal(Literal::Bool(v))),
            Token::Str(v) => Ok(Arg::Literal(Literal::String(v))),
            Token::Ident(name) => {
                let (id, _) = self.bindings.get(&name).copied().ok_or_else(|| {
                    Error::invalid_parameter("script", format!("undefined variable '{name}'"))
                })?;
                Ok(Arg::Ref(id))
            }
            other => Err(Error::invalid_parameter(
                "script",
                format!("expected an argument, found {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AlgorithmRegistry;

    #[test]
    fn parses_otsu_scenario() {
        let reg = AlgorithmRegistry::with_builtins();
        let parsed = parse(
            r#"var g = input("gray", 8); var h = histogram(g); var t = otsu_threshold(h)"#,
            &reg,
        )
        .unwrap();
        assert_eq!(parsed.items.len(), 3);
        assert_eq!(parsed.items[2].op, "otsu_threshold");
        assert_eq!(parsed.result_id().unwrap(), 2);
    }

    #[test]
    fn convert_to_gray_bad_mode_fails_to_parse() {
        let reg = AlgorithmRegistry::with_builtins();
        let err = parse(
            r#"var rgb = input("rgb", 8); var g = convert_to_gray(rgb, "mauve")"#,
            &reg,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn reference_to_undefined_variable_fails() {
        let reg = AlgorithmRegistry::with_builtins();
        let err = parse("var g = convert_to_gray(missing, \"use_red\")", &reg).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let reg = AlgorithmRegistry::with_builtins();
        let err = parse(
            r#"var g = input("gray", 8); var bad = convert_to_gray(g, "use_red")"#,
            &reg,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }
}
