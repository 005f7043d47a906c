//! Expression lexer.
//!
//! Converts expression source into a flat token stream with byte offsets
//! for diagnostics.

use crate::error::ExprError;

/// Token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Question,
    Colon,
    Semicolon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    AndAnd,
    OrOr,
    Assign,
}

impl Token {
    /// Source-like rendering for error messages.
    pub(crate) fn describe(&self) -> String {
        let text = match self {
            Self::Ident(name) => return name.clone(),
            Self::Number(n) => return n.to_string(),
            Self::Str(s) => return format!("'{s}'"),
            Self::Dot => ".",
            Self::Comma => ",",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Question => "?",
            Self::Colon => ":",
            Self::Semicolon => ";",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Assign => "=",
        };
        text.to_owned()
    }
}

/// Token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize an expression or script body.
pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if is_ident_start(c) {
            let mut name = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !is_ident_continue(c) {
                    break;
                }
                name.push(c);
                chars.next();
            }
            tokens.push(Spanned {
                token: Token::Ident(name),
                offset,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let mut literal = String::new();
            let mut seen_dot = false;
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_digit() {
                    literal.push(c);
                } else if c == '.' && !seen_dot {
                    seen_dot = true;
                    literal.push(c);
                } else {
                    break;
                }
                chars.next();
            }
            let value = literal
                .parse::<f64>()
                .map_err(|_| ExprError::UnexpectedChar { ch: c, offset })?;
            tokens.push(Spanned {
                token: Token::Number(value),
                offset,
            });
            continue;
        }

        if c == '\'' || c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, c2)) = chars.next() {
                match c2 {
                    '\\' => match chars.next() {
                        Some((_, 'n')) => value.push('\n'),
                        Some((_, 't')) => value.push('\t'),
                        Some((_, escaped)) => value.push(escaped),
                        None => break,
                    },
                    q if q == c => {
                        closed = true;
                        break;
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(ExprError::UnterminatedString(offset));
            }
            tokens.push(Spanned {
                token: Token::Str(value),
                offset,
            });
            continue;
        }

        chars.next();
        let next = chars.peek().map(|&(_, c)| c);
        let token = match (c, next) {
            ('=', Some('=')) => {
                chars.next();
                if chars.peek().is_some_and(|&(_, c)| c == '=') {
                    chars.next();
                    Token::StrictEq
                } else {
                    Token::EqEq
                }
            }
            ('!', Some('=')) => {
                chars.next();
                if chars.peek().is_some_and(|&(_, c)| c == '=') {
                    chars.next();
                    Token::StrictNotEq
                } else {
                    Token::NotEq
                }
            }
            ('<', Some('=')) => {
                chars.next();
                Token::Le
            }
            ('>', Some('=')) => {
                chars.next();
                Token::Ge
            }
            ('&', Some('&')) => {
                chars.next();
                Token::AndAnd
            }
            ('|', Some('|')) => {
                chars.next();
                Token::OrOr
            }
            ('=', _) => Token::Assign,
            ('!', _) => Token::Bang,
            ('<', _) => Token::Lt,
            ('>', _) => Token::Gt,
            ('.', _) => Token::Dot,
            (',', _) => Token::Comma,
            ('(', _) => Token::LParen,
            (')', _) => Token::RParen,
            ('[', _) => Token::LBracket,
            (']', _) => Token::RBracket,
            ('?', _) => Token::Question,
            (':', _) => Token::Colon,
            (';', _) => Token::Semicolon,
            ('+', _) => Token::Plus,
            ('-', _) => Token::Minus,
            ('*', _) => Token::Star,
            ('/', _) => Token::Slash,
            ('%', _) => Token::Percent,
            (ch, _) => return Err(ExprError::UnexpectedChar { ch, offset }),
        };
        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_identifiers_and_members() {
        assert_eq!(
            kinds("user.name[0]"),
            vec![
                Token::Ident("user".to_owned()),
                Token::Dot,
                Token::Ident("name".to_owned()),
                Token::LBracket,
                Token::Number(0.0),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_dollar_identifiers() {
        assert_eq!(kinds("$res"), vec![Token::Ident("$res".to_owned())]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a >= 1 && b !== c || !d"),
            vec![
                Token::Ident("a".to_owned()),
                Token::Ge,
                Token::Number(1.0),
                Token::AndAnd,
                Token::Ident("b".to_owned()),
                Token::StrictNotEq,
                Token::Ident("c".to_owned()),
                Token::OrOr,
                Token::Bang,
                Token::Ident("d".to_owned()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r"'it\'s'"), vec![Token::Str("it's".to_owned())]);
        assert_eq!(kinds(r#""a\nb""#), vec![Token::Str("a\nb".to_owned())]);
    }

    #[test]
    fn test_decimal_number() {
        assert_eq!(kinds("2.5"), vec![Token::Number(2.5)]);
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("'open"),
            Err(ExprError::UnterminatedString(0))
        ));
    }

    #[test]
    fn test_unexpected_char() {
        assert!(matches!(
            tokenize("a # b"),
            Err(ExprError::UnexpectedChar { ch: '#', offset: 2 })
        ));
    }

    #[test]
    fn test_offsets() {
        let tokens = tokenize("ab + c").unwrap();
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 3, 5]);
    }
}
