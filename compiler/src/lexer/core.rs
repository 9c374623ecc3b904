use miette::Result;
use tracing::debug;

use crate::lexer::error::LexError;
use crate::lexer::tokens::{Token, TokenKind, keyword};
use crate::utils::loc::span_at;

/// Lex a whole source file into a token vector terminated by `Eof`.
///
/// A sticky lexical error (unterminated literal, out-of-range number) is
/// surfaced once the whole input has been scanned; the token stream itself
/// is still produced best-effort.
pub fn lex(filename: &str, contents: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(filename, contents);
    let mut tokens = Vec::new();

    loop {
        let token = lexer.next_token();
        let done = token.is_eof();
        tokens.push(token);
        if done {
            break;
        }
    }

    if let Some(err) = lexer.take_error() {
        return Err(err.into());
    }

    debug!(tokens = tokens.len(), "lexed {filename}");
    Ok(tokens)
}

/// A restartable, one-token-at-a-time scanner.
///
/// `next_token` never fails: malformed input records a sticky [`LexError`]
/// and still yields a best-effort token, and once the input is exhausted
/// every further call returns `Eof`.
pub struct Lexer {
    filename: String,
    source: String,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    had_error: bool,
    last_error: Option<LexError>,
}

impl Lexer {
    pub fn new(filename: &str, source: &str) -> Self {
        Self {
            filename: filename.to_owned(),
            source: source.to_owned(),
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            had_error: false,
            last_error: None,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn last_error(&self) -> Option<&LexError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<LexError> {
        self.last_error.take()
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let (line, column) = (self.line, self.column);

        let Some(c) = self.current() else {
            return Token::new(TokenKind::Eof, "", line, column);
        };

        if c == '\n' {
            self.advance();
            return Token::new(TokenKind::Newline, "\n", line, column);
        }

        if c.is_ascii_alphabetic() || c == '_' {
            return self.read_identifier();
        }

        if c.is_ascii_digit() {
            return self.read_number();
        }

        if c == '"' {
            return self.read_string();
        }

        if c == '\'' {
            return self.read_char();
        }

        self.read_operator()
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn record_error(&mut self, line: usize, column: usize, width: usize, message: &str) {
        self.had_error = true;
        self.last_error = Some(LexError::new(
            &self.filename,
            &self.source,
            span_at(&self.source, line, column, width.max(1)),
            "here",
            message,
        ));
    }

    fn read_identifier(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let mut lexeme = String::new();

        while let Some(c) = self.current() {
            if c.is_ascii_alphanumeric() || c == '_' {
                lexeme.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = keyword(&lexeme).unwrap_or_else(|| TokenKind::Identifier(lexeme.clone()));
        Token::new(kind, lexeme, line, column)
    }

    fn read_number(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let mut lexeme = String::new();
        let mut has_decimal = false;

        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                self.advance();
            } else if c == '.' && !has_decimal {
                lexeme.push(c);
                has_decimal = true;
                self.advance();
            } else {
                break;
            }
        }

        let kind = if has_decimal {
            match lexeme.parse::<f64>() {
                Ok(v) => TokenKind::Float(v),
                Err(_) => {
                    self.record_error(line, column, lexeme.len(), "malformed float literal");
                    TokenKind::Float(0.0)
                }
            }
        } else {
            match lexeme.parse::<i64>() {
                Ok(v) => TokenKind::Int(v),
                Err(_) => {
                    self.record_error(line, column, lexeme.len(), "integer literal out of range");
                    TokenKind::Int(0)
                }
            }
        };

        Token::new(kind, lexeme, line, column)
    }

    fn read_string(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote

        let mut content = String::new();
        while let Some(c) = self.current() {
            if c == '"' {
                break;
            }
            if c == '\\' {
                self.advance();
                if let Some(escaped) = self.current() {
                    content.push(unescape(escaped));
                }
            } else {
                content.push(c);
            }
            self.advance();
        }

        if self.current() == Some('"') {
            self.advance(); // closing quote
        } else {
            self.record_error(line, column, content.len() + 1, "unterminated string literal");
        }

        let lexeme = format!("\"{content}\"");
        Token::new(TokenKind::Str(content), lexeme, line, column)
    }

    fn read_char(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote

        let Some(c) = self.current() else {
            self.record_error(line, column, 1, "unterminated character literal");
            return Token::new(TokenKind::Unknown, "'", line, column);
        };

        let content = if c == '\\' {
            self.advance();
            self.current().map(unescape).unwrap_or('\0')
        } else {
            c
        };
        self.advance(); // the character itself

        if self.current() == Some('\'') {
            self.advance(); // closing quote
        } else {
            self.record_error(line, column, 2, "unterminated character literal");
            return Token::new(TokenKind::Unknown, "'", line, column);
        }

        let lexeme = format!("'{content}'");
        Token::new(TokenKind::Char(content), lexeme, line, column)
    }

    fn read_operator(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let current = self.current().unwrap_or('\0');
        let next = self.peek();

        // Two-character operators need one character of lookahead.
        let two = match (current, next) {
            ('=', Some('=')) => Some(TokenKind::EqEq),
            ('!', Some('=')) => Some(TokenKind::NotEq),
            ('<', Some('=')) => Some(TokenKind::Le),
            ('>', Some('=')) => Some(TokenKind::Ge),
            ('<', Some('<')) => Some(TokenKind::Shl),
            ('>', Some('>')) => Some(TokenKind::Shr),
            ('&', Some('&')) => Some(TokenKind::AndAnd),
            ('|', Some('|')) => Some(TokenKind::OrOr),
            ('+', Some('+')) => Some(TokenKind::PlusPlus),
            ('-', Some('-')) => Some(TokenKind::MinusMinus),
            _ => None,
        };

        if let Some(kind) = two {
            let lexeme: String = [current, next.unwrap_or('\0')].iter().collect();
            self.advance();
            self.advance();
            return Token::new(kind, lexeme, line, column);
        }

        let kind = match current {
            '=' => TokenKind::Assign,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => TokenKind::Not,
            '&' => TokenKind::Amp,
            '|' => TokenKind::Pipe,
            '^' => TokenKind::Caret,
            '~' => TokenKind::Tilde,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            _ => TokenKind::Unknown,
        };

        self.advance();
        Token::new(kind, current.to_string(), line, column)
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '\\' => '\\',
        '"' => '"',
        '\'' => '\'',
        other => other,
    }
}
