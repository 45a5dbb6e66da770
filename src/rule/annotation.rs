//! Recursive-descent parser for the annotation rule dialect.
//!
//! Grammar, per side:
//!
//! ```text
//! side ::= '[' expr ']'
//! expr ::= operand (('&' operand)* | ('|' operand)*)
//! operand ::= term | '(' expr ')'
//! term ::= foundry '/' layer '=' key [':' value]
//!        | foundry '/*=' key
//!        | foundry '/' key
//!        | layer '=' key [':' value]          (layer must be a list default)
//!        | key [(':'|'=') value]
//! ```
//!
//! `&` and `|` share one precedence level; mixing them without parentheses
//! is rejected. Repeated application of one operator flattens into a
//! single group. The `layer=key` form is context-sensitive: the first
//! identifier is only read as a layer when it names one of the mapping
//! list's default layers, otherwise the term reparses as `key=value`.

use smol_str::SmolStr;
use tracing::debug;

use crate::koral::{QueryNode, Relation, Term, TermGroup};

use super::error::RuleParseError;
use super::lexer::{tokenize, unescape, Token, TokenKind};
use super::{AnnotationRule, ListDefaults, Side};

/// Parse one annotation rule, filling unspecified foundries and layers
/// from the list defaults.
pub fn parse_annotation_rule(
    rule: &str,
    defaults: &ListDefaults,
) -> Result<AnnotationRule, RuleParseError> {
    let tokens = tokenize(rule)?;
    let mut parser = Parser {
        rule,
        defaults,
        tokens: &tokens,
        pos: 0,
    };

    let upper = parser.parse_side(Side::A)?;
    parser.expect(TokenKind::MapsTo, "expected '<>'")?;
    let lower = parser.parse_side(Side::B)?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.syntax("trailing input after rule"));
    }

    Ok(AnnotationRule { upper, lower })
}

struct Parser<'a> {
    rule: &'a str,
    defaults: &'a ListDefaults,
    tokens: &'a [Token<'a>],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<&Token<'a>> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<&Token<'a>, RuleParseError> {
        match self.tokens.get(self.pos) {
            Some(token) if token.kind == kind => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.syntax(message)),
        }
    }

    fn expect_ident(&mut self, message: &str) -> Result<String, RuleParseError> {
        let token = self.expect(TokenKind::Ident, message)?;
        Ok(unescape(token.text))
    }

    fn syntax(&self, message: impl Into<String>) -> RuleParseError {
        RuleParseError::syntax(self.rule, message)
    }

    fn parse_side(&mut self, side: Side) -> Result<QueryNode, RuleParseError> {
        self.expect(TokenKind::LBracket, "expected '['")?;
        let expr = self.parse_expr(side)?;
        self.expect(TokenKind::RBracket, "expected ']'")?;
        Ok(expr)
    }

    fn parse_expr(&mut self, side: Side) -> Result<QueryNode, RuleParseError> {
        let mut operands = vec![self.parse_operand(side)?];
        let mut relation: Option<Relation> = None;

        loop {
            let next = match self.peek() {
                Some(TokenKind::Amp) => Relation::And,
                Some(TokenKind::Pipe) => Relation::Or,
                _ => break,
            };
            match relation {
                None => relation = Some(next),
                Some(existing) if existing != next => {
                    return Err(self.syntax("mixed '&' and '|' require parentheses"));
                }
                Some(_) => {}
            }
            self.advance();
            operands.push(self.parse_operand(side)?);
        }

        match relation {
            None => Ok(operands.pop().expect("at least one operand")),
            Some(relation) => Ok(QueryNode::TermGroup(TermGroup::new(relation, operands))),
        }
    }

    fn parse_operand(&mut self, side: Side) -> Result<QueryNode, RuleParseError> {
        match self.peek() {
            Some(TokenKind::LParen) => {
                self.advance();
                let expr = self.parse_expr(side)?;
                self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(expr)
            }
            Some(TokenKind::Ident) => Ok(QueryNode::Term(self.parse_term(side)?)),
            _ => Err(self.syntax("expected a term or '('")),
        }
    }

    fn parse_term(&mut self, side: Side) -> Result<Term, RuleParseError> {
        let first = self.expect_ident("expected an identifier")?;

        let (term, explicit_foundry, explicit_layer) = match self.peek() {
            // foundry/*=key - wildcard layer, explicitly any
            Some(TokenKind::WildcardLayer) => {
                self.advance();
                let key = self.expect_ident("expected a key after '/*='")?;
                (term(&first, "", &key, ""), true, true)
            }
            Some(TokenKind::Slash) => {
                self.advance();
                let second = self.expect_ident("expected a layer or key after '/'")?;
                if self.peek() == Some(TokenKind::Eq) {
                    // foundry/layer=key[:value]
                    self.advance();
                    let key = self.expect_ident("expected a key after '='")?;
                    let value = self.parse_optional_value()?;
                    (term(&first, &second, &key, &value), true, true)
                } else {
                    // foundry/key
                    (term(&first, "", &second, ""), true, false)
                }
            }
            Some(TokenKind::Eq) => {
                self.advance();
                let second = self.expect_ident("expected a value after '='")?;
                if self.defaults.is_default_layer(&first) {
                    // layer=key[:value], layer named a list default
                    debug!(layer = %first, "resolved identifier as default layer");
                    let value = self.parse_optional_value()?;
                    (term("", &first, &second, &value), false, true)
                } else {
                    // key=value
                    let value = self.parse_value_tail(second)?;
                    (term("", "", &first, &value), false, false)
                }
            }
            Some(TokenKind::Colon) => {
                // key:value
                self.advance();
                let value = self.expect_ident("expected a value after ':'")?;
                let value = self.parse_value_tail(value)?;
                (term("", "", &first, &value), false, false)
            }
            // bare key
            _ => (term("", "", &first, ""), false, false),
        };

        Ok(self.fill_defaults(side, term, explicit_foundry, explicit_layer))
    }

    fn parse_optional_value(&mut self) -> Result<String, RuleParseError> {
        if self.peek() != Some(TokenKind::Colon) {
            return Ok(String::new());
        }
        self.advance();
        let value = self.expect_ident("expected a value after ':'")?;
        self.parse_value_tail(value)
    }

    /// Join further `:`-separated segments into the value, so values that
    /// happen to contain colons survive without escaping.
    fn parse_value_tail(&mut self, mut value: String) -> Result<String, RuleParseError> {
        while self.peek() == Some(TokenKind::Colon) {
            self.advance();
            value.push(':');
            value.push_str(&self.expect_ident("expected a value after ':'")?);
        }
        Ok(value)
    }

    fn fill_defaults(
        &self,
        side: Side,
        mut term: Term,
        explicit_foundry: bool,
        explicit_layer: bool,
    ) -> Term {
        let (foundry, layer) = match side {
            Side::A => (&self.defaults.foundry_a, &self.defaults.layer_a),
            Side::B => (&self.defaults.foundry_b, &self.defaults.layer_b),
        };
        if !explicit_foundry {
            term.implicit_foundry = true;
            if term.foundry.is_empty() {
                term.foundry = foundry.clone();
            }
        }
        if !explicit_layer {
            term.implicit_layer = true;
            if term.layer.is_empty() {
                term.layer = layer.clone();
            }
        }
        term
    }
}

fn term(foundry: &str, layer: &str, key: &str, value: &str) -> Term {
    Term {
        foundry: SmolStr::new(foundry),
        layer: SmolStr::new(layer),
        key: SmolStr::new(key),
        value: SmolStr::new(value),
        ..Term::default()
    }
}
