use std::ops::Range;

use crate::parser::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Str(String),

    // Identifiers & keywords
    Ident(String),
    True,
    False,
    Null,
    If,
    Else,
    For,
    In,
    Fn,
    Return,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,     // =
    EqEq,   // ==
    BangEq, // !=
    Lt,
    Gt,
    LtEq,
    GtEq,
    AmpAmp,   // &&
    PipePipe, // ||
    Bang,     // !

    // Grouping & punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,

    /// Statement terminator. Suppressed inside `(...)` and `[...]` so a
    /// multi-line call or list literal lexes as one statement.
    Newline,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
    /// 1-based source line the token starts on.
    pub line: usize,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    match ident {
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        "null" => Some(TokenKind::Null),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "for" => Some(TokenKind::For),
        "in" => Some(TokenKind::In),
        "fn" => Some(TokenKind::Fn),
        "return" => Some(TokenKind::Return),
        _ => None,
    }
}

/// Lex `source` into a token stream. `#` starts a line comment. Newlines
/// become `Newline` tokens except inside parentheses or brackets.
pub fn tokenize(source: &str, file_id: usize) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    let mut line = 1usize;
    let mut group_depth = 0usize;

    while let Some((start, c)) = chars.next() {
        let mut push = |kind: TokenKind, end: usize| {
            tokens.push(Token {
                kind,
                span: start..end,
                line,
            });
        };

        match c {
            ' ' | '\t' | '\r' => {}
            '\n' => {
                if group_depth == 0 {
                    push(TokenKind::Newline, start + 1);
                }
                line += 1;
            }
            '#' => {
                while let Some(&(_, next)) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '"' => {
                let mut text = String::new();
                let mut end = None;
                while let Some((i, next)) = chars.next() {
                    match next {
                        '"' => {
                            end = Some(i + 1);
                            break;
                        }
                        '\n' => break,
                        '\\' => match chars.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, 't')) => text.push('\t'),
                            Some((_, '\\')) => text.push('\\'),
                            Some((_, '"')) => text.push('"'),
                            Some((j, other)) => {
                                return Err(ParseError::new(
                                    format!("unknown escape '\\{}'", other),
                                    j - 1..j + other.len_utf8(),
                                    line,
                                    file_id,
                                ));
                            }
                            None => break,
                        },
                        other => text.push(other),
                    }
                }
                match end {
                    Some(end) => push(TokenKind::Str(text), end),
                    None => {
                        return Err(ParseError::new(
                            "unterminated string literal",
                            start..source.len(),
                            line,
                            file_id,
                        ));
                    }
                }
            }
            '0'..='9' => {
                let mut end = start + 1;
                let mut seen_dot = false;
                while let Some(&(i, next)) = chars.peek() {
                    if next.is_ascii_digit() {
                        chars.next();
                        end = i + 1;
                    } else if next == '.' && !seen_dot {
                        // a dot is part of the number only when a digit follows
                        let mut ahead = chars.clone();
                        ahead.next();
                        match ahead.peek() {
                            Some(&(_, d)) if d.is_ascii_digit() => {
                                seen_dot = true;
                                chars.next();
                                end = i + 1;
                            }
                            _ => break,
                        }
                    } else {
                        break;
                    }
                }
                let text = &source[start..end];
                let value = text.parse::<f64>().map_err(|_| {
                    ParseError::new(
                        format!("invalid number literal '{}'", text),
                        start..end,
                        line,
                        file_id,
                    )
                })?;
                push(TokenKind::Number(value), end);
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        chars.next();
                        end = i + next.len_utf8();
                    } else {
                        break;
                    }
                }
                let text = &source[start..end];
                let kind = keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()));
                push(kind, end);
            }
            '+' => push(TokenKind::Plus, start + 1),
            '-' => push(TokenKind::Minus, start + 1),
            '*' => push(TokenKind::Star, start + 1),
            '/' => push(TokenKind::Slash, start + 1),
            '%' => push(TokenKind::Percent, start + 1),
            ',' => push(TokenKind::Comma, start + 1),
            '{' => push(TokenKind::LBrace, start + 1),
            '}' => push(TokenKind::RBrace, start + 1),
            '(' => {
                group_depth += 1;
                push(TokenKind::LParen, start + 1);
            }
            ')' => {
                group_depth = group_depth.saturating_sub(1);
                push(TokenKind::RParen, start + 1);
            }
            '[' => {
                group_depth += 1;
                push(TokenKind::LBracket, start + 1);
            }
            ']' => {
                group_depth = group_depth.saturating_sub(1);
                push(TokenKind::RBracket, start + 1);
            }
            '=' => {
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    push(TokenKind::EqEq, start + 2);
                } else {
                    push(TokenKind::Eq, start + 1);
                }
            }
            '!' => {
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    push(TokenKind::BangEq, start + 2);
                } else {
                    push(TokenKind::Bang, start + 1);
                }
            }
            '<' => {
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    push(TokenKind::LtEq, start + 2);
                } else {
                    push(TokenKind::Lt, start + 1);
                }
            }
            '>' => {
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    push(TokenKind::GtEq, start + 2);
                } else {
                    push(TokenKind::Gt, start + 1);
                }
            }
            '&' => {
                if matches!(chars.peek(), Some(&(_, '&'))) {
                    chars.next();
                    push(TokenKind::AmpAmp, start + 2);
                } else {
                    return Err(ParseError::new(
                        "unexpected character '&' (did you mean '&&'?)",
                        start..start + 1,
                        line,
                        file_id,
                    ));
                }
            }
            '|' => {
                if matches!(chars.peek(), Some(&(_, '|'))) {
                    chars.next();
                    push(TokenKind::PipePipe, start + 2);
                } else {
                    return Err(ParseError::new(
                        "unexpected character '|' (did you mean '||'?)",
                        start..start + 1,
                        line,
                        file_id,
                    ));
                }
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected character '{}'", other),
                    start..start + other.len_utf8(),
                    line,
                    file_id,
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, 0)
            .expect("lex failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn numbers_and_operators() {
        assert_eq!(
            kinds("1 + 2.5"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.5)
            ]
        );
    }

    #[test]
    fn dot_without_digit_is_not_a_fraction() {
        assert!(tokenize("1.x", 0).is_err());
    }

    #[test]
    fn line_numbers_track_newlines() {
        let tokens = tokenize("a\nb\n\nc", 0).expect("lex failed");
        let lines: Vec<(TokenKind, usize)> =
            tokens.into_iter().map(|t| (t.kind, t.line)).collect();
        assert_eq!(
            lines,
            vec![
                (TokenKind::Ident("a".into()), 1),
                (TokenKind::Newline, 1),
                (TokenKind::Ident("b".into()), 2),
                (TokenKind::Newline, 2),
                (TokenKind::Newline, 3),
                (TokenKind::Ident("c".into()), 4),
            ]
        );
    }

    #[test]
    fn newlines_suppressed_inside_brackets() {
        let tokens = kinds("[1,\n2]");
        assert!(!tokens.contains(&TokenKind::Newline));
    }

    #[test]
    fn newlines_kept_inside_braces() {
        let tokens = kinds("{\n}");
        assert_eq!(
            tokens,
            vec![TokenKind::LBrace, TokenKind::Newline, TokenKind::RBrace]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("1 # a comment\n2"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Newline,
                TokenKind::Number(2.0)
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\nb\"c""#),
            vec![TokenKind::Str("a\nb\"c".into())]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("\"abc", 0).expect_err("should fail");
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            kinds("for x in xs"),
            vec![
                TokenKind::For,
                TokenKind::Ident("x".into()),
                TokenKind::In,
                TokenKind::Ident("xs".into()),
            ]
        );
    }
}
