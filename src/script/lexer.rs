//! Dialect lexer.
//!
//! Produces positioned tokens for the parser and for the policy scanner.
//! The scanner needs tokens even from source it will ultimately reject, so
//! the core entry point ([`tokenize_collect`]) returns everything lexed up
//! to the first hard error alongside the error itself; [`tokenize`] is the
//! strict wrapper used by the parser.

use super::ScriptError;

/// Source position, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    // Keywords
    True,
    False,
    Null,
    And,
    Or,
    Not,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    /// Statement separator (newline or `;`).
    Newline,
}

impl Token {
    /// Display form used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("'{name}'"),
            Token::Int(i) => format!("'{i}'"),
            Token::Float(f) => format!("'{f}'"),
            Token::Str(_) => "string literal".to_string(),
            Token::Newline => "end of statement".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Assign => "=",
            Token::Eq => "==",
            Token::Ne => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            _ => "?",
        }
    }
}

/// A token with the position where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: Pos,
}

/// Lexes as much of `source` as possible.
///
/// Returns the tokens produced before the first hard error, and the error
/// itself if one occurred. Comments (`#` to end of line) are skipped;
/// newlines and `;` become [`Token::Newline`].
pub fn tokenize_collect(source: &str) -> (Vec<Spanned>, Option<ScriptError>) {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        match lexer.next_token() {
            Ok(Some(spanned)) => tokens.push(spanned),
            Ok(None) => return (tokens, None),
            Err(e) => return (tokens, Some(e)),
        }
    }
}

/// Strict lexing for the parser: any lex error fails the whole source.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    let (tokens, error) = tokenize_collect(source);
    match error {
        None => Ok(tokens),
        Some(e) => Err(e),
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, pos: Pos, message: impl Into<String>) -> ScriptError {
        ScriptError::Syntax {
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, ScriptError> {
        // Skip horizontal whitespace and comments
        loop {
            match self.chars.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }

        let pos = self.pos();
        let c = match self.chars.peek() {
            Some(&c) => c,
            None => return Ok(None),
        };

        let token = match c {
            '\n' | ';' => {
                self.bump();
                Token::Newline
            }
            '(' => self.punct(Token::LParen),
            ')' => self.punct(Token::RParen),
            '[' => self.punct(Token::LBracket),
            ']' => self.punct(Token::RBracket),
            ',' => self.punct(Token::Comma),
            '.' => self.punct(Token::Dot),
            '+' => self.punct(Token::Plus),
            '-' => self.punct(Token::Minus),
            '*' => self.punct(Token::Star),
            '/' => self.punct(Token::Slash),
            '%' => self.punct(Token::Percent),
            '=' => {
                self.bump();
                if self.chars.peek() == Some(&'=') {
                    self.bump();
                    Token::Eq
                } else {
                    Token::Assign
                }
            }
            '!' => {
                self.bump();
                if self.chars.peek() == Some(&'=') {
                    self.bump();
                    Token::Ne
                } else {
                    return Err(self.error(pos, "unexpected character '!'"));
                }
            }
            '<' => {
                self.bump();
                if self.chars.peek() == Some(&'=') {
                    self.bump();
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                self.bump();
                if self.chars.peek() == Some(&'=') {
                    self.bump();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '"' | '\'' => self.string(pos)?,
            c if c.is_ascii_digit() => self.number(pos)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.ident(),
            other => {
                return Err(self.error(pos, format!("unexpected character '{other}'")));
            }
        };

        Ok(Some(Spanned { token, pos }))
    }

    fn punct(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn ident(&mut self) -> Token {
        let mut name = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match name.as_str() {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Ident(name),
        }
    }

    fn number(&mut self, pos: Pos) -> Result<Token, ScriptError> {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        // A dot only belongs to the number if a digit follows; otherwise it
        // is a method-call dot (e.g. a trailing `2.` is rejected downstream).
        let mut is_float = false;
        if self.chars.peek() == Some(&'.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                text.push('.');
                self.bump();
                while let Some(&c) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }

        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(pos, format!("invalid number literal '{text}'")))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.error(pos, format!("integer literal '{text}' out of range")))
        }
    }

    fn string(&mut self, pos: Pos) -> Result<Token, ScriptError> {
        let quote = self.bump().expect("peeked");
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error(pos, "unterminated string literal")),
                Some('\n') => return Err(self.error(pos, "unterminated string literal")),
                Some(c) if c == quote => return Ok(Token::Str(text)),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some('\'') => text.push('\''),
                    Some(other) => {
                        return Err(self.error(pos, format!("invalid escape '\\{other}'")))
                    }
                    None => return Err(self.error(pos, "unterminated string literal")),
                },
                Some(c) => text.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_idents_and_keywords() {
        assert_eq!(
            kinds("dataframe and x_1 not true"),
            vec![
                Token::Ident("dataframe".into()),
                Token::And,
                Token::Ident("x_1".into()),
                Token::Not,
                Token::True,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.25 0.5"),
            vec![Token::Int(42), Token::Float(3.25), Token::Float(0.5)]
        );
    }

    #[test]
    fn test_int_then_method_dot() {
        // The dot is a call dot, not part of the literal
        assert_eq!(
            kinds("2.abs"),
            vec![Token::Int(2), Token::Dot, Token::Ident("abs".into())]
        );
    }

    #[test]
    fn test_strings_both_quotes() {
        assert_eq!(
            kinds(r#""age" 'name'"#),
            vec![Token::Str("age".into()), Token::Str("name".into())]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\nb\"c""#), vec![Token::Str("a\nb\"c".into())]);
    }

    #[test]
    fn test_unterminated_string_is_error() {
        assert!(tokenize("\"abc").is_err());
        assert!(tokenize("\"abc\nd\"").is_err());
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("= == != < <= > >= + - * / %"),
            vec![
                Token::Assign,
                Token::Eq,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
            ]
        );
    }

    #[test]
    fn test_comments_and_separators() {
        assert_eq!(
            kinds("a # trailing\nb; c"),
            vec![
                Token::Ident("a".into()),
                Token::Newline,
                Token::Ident("b".into()),
                Token::Newline,
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a\n  b").unwrap();
        assert_eq!(tokens[0].pos, Pos { line: 1, column: 1 });
        assert_eq!(tokens[2].pos, Pos { line: 2, column: 3 });
    }

    #[test]
    fn test_bang_alone_is_error() {
        let err = tokenize("a ! b").unwrap_err();
        assert!(err.to_string().contains("unexpected character"));
    }

    #[test]
    fn test_collect_keeps_prefix_on_error() {
        let (tokens, error) = tokenize_collect("abc $");
        assert_eq!(tokens.len(), 1);
        assert!(error.is_some());
    }

    #[test]
    fn test_dunder_ident_lexes() {
        // The lexer accepts it; rejecting it is the policy scanner's job
        assert_eq!(kinds("__class__"), vec![Token::Ident("__class__".into())]);
    }
}
