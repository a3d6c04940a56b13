//! Expression segmentation.
//!
//! Groups a formula's tokens into the parts the evaluator resolves one at a
//! time: operator/literal text, address-like words, bracketed groups and
//! function calls. Only the outermost brackets are recognized here; the
//! evaluator re-segments a group's or call's inner text when it needs it.

use super::lexer::{LexOptions, Lexer, Token, TokenKind, tokenize};

/// One evaluable part of an expression. All text borrows from the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Part<'a> {
    /// Operators, separators, quoted strings and stray brackets.
    Literal(&'a str),
    /// A bare alphanumeric word: a cell address, a number or an identifier.
    AddressLike(&'a str),
    /// Text between a bracket pair with no name in front of it.
    Group(&'a str),
    /// `name(args)`; `args` is the text between the brackets.
    Call { name: &'a str, args: &'a str },
}

/// Split `text` into parts.
///
/// A word immediately followed by an opening bracket becomes the name of a
/// [`Part::Call`]. Unbalanced opening brackets leave the remainder of the text
/// as a single literal, which will fail to evaluate.
pub fn segment(text: &str) -> Vec<Part<'_>> {
    let tokens = tokenize(text);
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut open: Option<Token<'_>> = None;

    for token in &tokens {
        match token.kind {
            TokenKind::Open => {
                if depth == 0 {
                    open = Some(*token);
                }
                depth += 1;
            }
            TokenKind::Close if depth > 0 => {
                depth -= 1;
                if depth > 0 {
                    continue;
                }
                let Some(open_token) = open.take() else {
                    continue;
                };
                let inner = &text[open_token.end()..token.start];
                match parts.last() {
                    Some(Part::AddressLike(name)) if precedes(&tokens, open_token) => {
                        let name = *name;
                        parts.pop();
                        parts.push(Part::Call { name, args: inner });
                    }
                    _ => parts.push(Part::Group(inner)),
                }
            }
            _ if depth > 0 => {}
            TokenKind::AlphaNum => parts.push(Part::AddressLike(token.text)),
            _ => parts.push(Part::Literal(token.text)),
        }
    }

    if let Some(open_token) = open {
        parts.push(Part::Literal(&text[open_token.start..]));
    }
    parts
}

/// Whether the token right before `open` is an alphanumeric word.
fn precedes(tokens: &[Token<'_>], open: Token<'_>) -> bool {
    tokens
        .iter()
        .take_while(|t| t.start < open.start)
        .last()
        .is_some_and(|t| t.kind == TokenKind::AlphaNum)
}

/// Split function-call argument text on top-level commas.
///
/// Commas inside nested brackets or quoted strings do not split. Arguments
/// are trimmed; an empty trailing argument (`f(a,)`) is dropped.
pub fn split_arguments(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for token in Lexer::new(args, LexOptions::default()) {
        match token.kind {
            TokenKind::Open => depth += 1,
            TokenKind::Close => depth = depth.saturating_sub(1),
            TokenKind::Symbol if depth == 0 && token.is_symbol(',') => {
                out.push(args[start..token.start].trim());
                start = token.end();
            }
            _ => {}
        }
    }
    let last = args[start..].trim();
    if !last.is_empty() {
        out.push(last);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_expression() {
        assert_eq!(
            segment("A1 + 2*B3"),
            vec![
                Part::AddressLike("A1"),
                Part::Literal("+"),
                Part::AddressLike("2"),
                Part::Literal("*"),
                Part::AddressLike("B3"),
            ]
        );
    }

    #[test]
    fn test_function_call_and_group() {
        assert_eq!(
            segment("sum(A1:A3) / (B1 + (C1))"),
            vec![
                Part::Call {
                    name: "sum",
                    args: "A1:A3"
                },
                Part::Literal("/"),
                Part::Group("B1 + (C1)"),
            ]
        );
    }

    #[test]
    fn test_call_after_operator_is_group() {
        assert_eq!(
            segment("2*(3)"),
            vec![
                Part::AddressLike("2"),
                Part::Literal("*"),
                Part::Group("3"),
            ]
        );
    }

    #[test]
    fn test_quoted_text_is_literal() {
        assert_eq!(
            segment("'a (b' + A1"),
            vec![
                Part::Literal("'a (b'"),
                Part::Literal("+"),
                Part::AddressLike("A1"),
            ]
        );
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert_eq!(
            segment("1 + (2 * 3"),
            vec![
                Part::AddressLike("1"),
                Part::Literal("+"),
                Part::Literal("(2 * 3"),
            ]
        );
        assert_eq!(
            segment("1)"),
            vec![Part::AddressLike("1"), Part::Literal(")")]
        );
    }

    #[test]
    fn test_split_arguments() {
        assert_eq!(split_arguments("1, 2 ,3"), vec!["1", "2", "3"]);
        assert_eq!(split_arguments("pow(A1, 2), 'x, y', [B1:B2]"), vec![
            "pow(A1, 2)",
            "'x, y'",
            "[B1:B2]"
        ]);
        assert_eq!(split_arguments("a,"), vec!["a"]);
        assert_eq!(split_arguments("a,,b"), vec!["a", "", "b"]);
        assert!(split_arguments("  ").is_empty());
    }
}
