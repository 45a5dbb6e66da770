//! Logos-based lexer for the annotation rule dialect.
//!
//! Rules look like `[opennlp/p=PIDAT] <> [opennlp/p=PIDAT & opennlp/p=AdjType:Pdt]`.
//! Identifiers cover `[A-Za-z$,.]` (`$,` and `$.` are real STTS tags) and a
//! backslash escapes any single character; everything else is structural.

use logos::Logos;

use super::error::RuleParseError;

/// A token with its kind and source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Token kinds of the annotation rule dialect.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TokenKind {
    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("&")]
    Amp,

    #[token("|")]
    Pipe,

    #[token("<>")]
    MapsTo,

    /// The wildcard-layer operator in `foundry/*=key`.
    #[token("/*=")]
    WildcardLayer,

    #[token("/")]
    Slash,

    #[token("=")]
    Eq,

    #[token(":")]
    Colon,

    #[regex(r"([A-Za-z$,.]|\\.)+")]
    Ident,
}

/// Tokenize a whole rule string.
pub fn tokenize(rule: &str) -> Result<Vec<Token<'_>>, RuleParseError> {
    let mut lexer = TokenKind::lexer(rule);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                text: lexer.slice(),
            }),
            Err(()) => return Err(RuleParseError::lex(rule, lexer.span().start)),
        }
    }
    Ok(tokens)
}

/// Remove backslash escapes from an identifier: `\&` becomes `&`.
pub fn unescape(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(rule: &str) -> Vec<TokenKind> {
        tokenize(rule).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_a_full_rule() {
        assert_eq!(
            kinds("[PIDAT] <> [opennlp/p=PIDAT & opennlp/p=AdjType:Pdt]"),
            vec![
                TokenKind::LBracket,
                TokenKind::Ident,
                TokenKind::RBracket,
                TokenKind::MapsTo,
                TokenKind::LBracket,
                TokenKind::Ident,
                TokenKind::Slash,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Ident,
                TokenKind::Amp,
                TokenKind::Ident,
                TokenKind::Slash,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn wildcard_layer_wins_over_slash() {
        assert_eq!(
            kinds("x/*=y"),
            vec![TokenKind::Ident, TokenKind::WildcardLayer, TokenKind::Ident]
        );
    }

    #[test]
    fn punctuation_tags_are_identifiers() {
        let tokens = tokenize("[$,]").unwrap();
        assert_eq!(tokens[1].text, "$,");
    }

    #[test]
    fn escapes_cover_structural_characters() {
        let tokens = tokenize(r"a\&b").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(unescape(tokens[0].text), "a&b");
    }

    #[test]
    fn rejects_foreign_characters() {
        assert!(matches!(
            tokenize("[!x]"),
            Err(RuleParseError::Lex { offset: 1, .. })
        ));
    }
}
