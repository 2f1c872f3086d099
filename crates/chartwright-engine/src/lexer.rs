//! Template tokenizer
//!
//! Two modes: text mode copies bytes until `{{`, action mode splits the
//! action into tokens until `}}`. Trim markers (`{{- ` and ` -}}`) are applied
//! here by shortening the surrounding text tokens, so the parser never sees
//! them.

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_COMMENT: &str = "/*";
const RIGHT_COMMENT: &str = "*/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    End,
    Range,
    With,
    Define,
    Block,
    Template,
    Break,
    Continue,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "if" => Self::If,
            "else" => Self::Else,
            "end" => Self::End,
            "range" => Self::Range,
            "with" => Self::With,
            "define" => Self::Define,
            "block" => Self::Block,
            "template" => Self::Template,
            "break" => Self::Break,
            "continue" => Self::Continue,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Else => "else",
            Self::End => "end",
            Self::Range => "range",
            Self::With => "with",
            Self::Define => "define",
            Self::Block => "block",
            Self::Template => "template",
            Self::Break => "break",
            Self::Continue => "continue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    LeftDelim,
    RightDelim,
    LeftParen,
    RightParen,
    Space,
    Identifier,
    /// `.name`, one segment per token
    Field,
    /// `$` or `$name`
    Variable,
    Dot,
    String,
    RawString,
    Char,
    Number,
    Bool,
    Nil,
    Pipe,
    Assign,
    Declare,
    Comma,
    Keyword(Keyword),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset into the template source
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub pos: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(src).run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token<'a>>,
    paren_depth: usize,
    /// Leading whitespace of the next text token must be dropped
    trim_next: bool,
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
            paren_depth: 0,
            trim_next: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset..)?.chars().next()
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            pos: self.pos,
        }
    }

    fn emit(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            text: &self.src[start..self.pos],
            pos: start,
        });
    }

    fn run(mut self) -> Result<Vec<Token<'a>>, LexError> {
        loop {
            let text_start = self.pos;
            match self.rest().find(LEFT_DELIM) {
                Some(offset) => {
                    let delim_pos = self.pos + offset;
                    let trim_left = self.src[delim_pos + LEFT_DELIM.len()..].starts_with('-')
                        && self.src[delim_pos + LEFT_DELIM.len() + 1..]
                            .chars()
                            .next()
                            .is_some_and(is_space);
                    let mut text = &self.src[text_start..delim_pos];
                    if trim_left {
                        text = text.trim_end_matches(is_space);
                    }
                    self.push_text(text, text_start);
                    self.pos = delim_pos;
                    self.lex_left_delim(trim_left)?;
                }
                None => {
                    let text = &self.src[text_start..];
                    self.push_text(text, text_start);
                    self.pos = self.src.len();
                    let end = self.pos;
                    self.tokens.push(Token {
                        kind: TokenKind::Eof,
                        text: "",
                        pos: end,
                    });
                    return Ok(self.tokens);
                }
            }
        }
    }

    fn push_text(&mut self, mut text: &'a str, mut start: usize) {
        if self.trim_next {
            let trimmed = text.trim_start_matches(is_space);
            start += text.len() - trimmed.len();
            text = trimmed;
            self.trim_next = false;
        }
        if !text.is_empty() {
            self.tokens.push(Token {
                kind: TokenKind::Text,
                text,
                pos: start,
            });
        }
    }

    fn lex_left_delim(&mut self, trim: bool) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += LEFT_DELIM.len();
        if trim {
            self.pos += 2;
        }

        if self.rest().starts_with(LEFT_COMMENT) {
            return self.lex_comment();
        }

        self.emit(TokenKind::LeftDelim, start);
        self.paren_depth = 0;
        self.lex_inside_action()
    }

    fn lex_comment(&mut self) -> Result<(), LexError> {
        self.pos += LEFT_COMMENT.len();
        let end = self
            .rest()
            .find(RIGHT_COMMENT)
            .ok_or_else(|| self.error("unclosed comment"))?;
        self.pos += end + RIGHT_COMMENT.len();
        match self.at_right_delim() {
            Some(trim) => {
                self.consume_right_delim(trim);
                Ok(())
            }
            None => Err(self.error("comment ends before closing delimiter")),
        }
    }

    /// `Some(trim)` when positioned at ` -}}` or `}}`
    fn at_right_delim(&self) -> Option<bool> {
        let rest = self.rest();
        if rest.len() >= 2
            && rest.chars().next().is_some_and(is_space)
            && rest[1..].starts_with('-')
            && rest[2..].starts_with(RIGHT_DELIM)
        {
            return Some(true);
        }
        if rest.starts_with(RIGHT_DELIM) {
            return Some(false);
        }
        None
    }

    fn consume_right_delim(&mut self, trim: bool) {
        if trim {
            self.pos += 2;
        }
        self.pos += RIGHT_DELIM.len();
        self.trim_next = trim;
    }

    fn lex_inside_action(&mut self) -> Result<(), LexError> {
        loop {
            if let Some(trim) = self.at_right_delim() {
                if self.paren_depth > 0 {
                    return Err(self.error("unclosed left paren"));
                }
                let start = self.pos;
                self.consume_right_delim(trim);
                let end = self.pos;
                self.tokens.push(Token {
                    kind: TokenKind::RightDelim,
                    text: &self.src[start..end],
                    pos: start,
                });
                return Ok(());
            }

            let start = self.pos;
            let c = match self.peek() {
                Some(c) => c,
                None => return Err(self.error("unclosed action")),
            };

            match c {
                c if is_space(c) => self.lex_space(),
                '=' => {
                    self.pos += 1;
                    self.emit(TokenKind::Assign, start);
                }
                ':' => {
                    if self.peek_at(1) != Some('=') {
                        return Err(self.error("expected :="));
                    }
                    self.pos += 2;
                    self.emit(TokenKind::Declare, start);
                }
                '|' => {
                    self.pos += 1;
                    self.emit(TokenKind::Pipe, start);
                }
                ',' => {
                    self.pos += 1;
                    self.emit(TokenKind::Comma, start);
                }
                '"' => self.lex_quote()?,
                '`' => self.lex_raw_quote()?,
                '\'' => self.lex_char()?,
                '$' => {
                    self.pos += 1;
                    self.scan_word();
                    self.check_terminator()?;
                    self.emit(TokenKind::Variable, start);
                }
                '.' => {
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.lex_number()?;
                    } else {
                        self.pos += 1;
                        if self.peek().is_some_and(is_alphanumeric) {
                            self.scan_word();
                            self.check_terminator()?;
                            self.emit(TokenKind::Field, start);
                        } else {
                            self.emit(TokenKind::Dot, start);
                        }
                    }
                }
                '+' | '-' | '0'..='9' => self.lex_number()?,
                '(' => {
                    self.pos += 1;
                    self.paren_depth += 1;
                    self.emit(TokenKind::LeftParen, start);
                }
                ')' => {
                    if self.paren_depth == 0 {
                        return Err(self.error("unexpected right paren"));
                    }
                    self.pos += 1;
                    self.paren_depth -= 1;
                    self.emit(TokenKind::RightParen, start);
                }
                c if is_alphanumeric(c) => {
                    self.scan_word();
                    self.check_terminator()?;
                    let word = &self.src[start..self.pos];
                    let kind = match word {
                        "true" | "false" => TokenKind::Bool,
                        "nil" => TokenKind::Nil,
                        _ => match Keyword::from_word(word) {
                            Some(k) => TokenKind::Keyword(k),
                            None => TokenKind::Identifier,
                        },
                    };
                    self.emit(kind, start);
                }
                c => {
                    return Err(self.error(format!(
                        "unrecognized character in action: U+{:04X} '{}'",
                        c as u32, c
                    )));
                }
            }
        }
    }

    fn lex_space(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_space(c) {
                break;
            }
            // a trim marker owns the space in front of it
            if self.at_right_delim() == Some(true) {
                break;
            }
            self.pos += c.len_utf8();
        }
        if self.pos > start {
            self.emit(TokenKind::Space, start);
        }
    }

    fn scan_word(&mut self) {
        while let Some(c) = self.peek() {
            if !is_alphanumeric(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn check_terminator(&self) -> Result<(), LexError> {
        match self.peek() {
            None => Ok(()),
            Some(c) if is_space(c) || matches!(c, '.' | ',' | '|' | ':' | ')' | '(' | '=') => {
                Ok(())
            }
            Some(_) if self.rest().starts_with(RIGHT_DELIM) => Ok(()),
            Some(c) => Err(self.error(format!("bad character U+{:04X} '{}'", c as u32, c))),
        }
    }

    fn lex_quote(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) if c != '\n' => self.pos += c.len_utf8(),
                        _ => return Err(self.error("unterminated quoted string")),
                    }
                }
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some('\n') | None => return Err(self.error("unterminated quoted string")),
                Some(c) => self.pos += c.len_utf8(),
            }
        }
        self.emit(TokenKind::String, start);
        Ok(())
    }

    fn lex_raw_quote(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        let end = self
            .rest()
            .find('`')
            .ok_or_else(|| self.error("unterminated raw quoted string"))?;
        self.pos += end + 1;
        self.emit(TokenKind::RawString, start);
        Ok(())
    }

    fn lex_char(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) if c != '\n' => self.pos += c.len_utf8(),
                        _ => return Err(self.error("unterminated character constant")),
                    }
                }
                Some('\'') => {
                    self.pos += 1;
                    break;
                }
                Some('\n') | None => return Err(self.error("unterminated character constant")),
                Some(c) => self.pos += c.len_utf8(),
            }
        }
        self.emit(TokenKind::Char, start);
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.pos += 1;
        }
        let mut digits: fn(char) -> bool = |c| c.is_ascii_digit() || c == '_';
        let mut hex = false;
        if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some('x') | Some('X') => {
                    self.pos += 2;
                    digits = |c| c.is_ascii_hexdigit() || c == '_';
                    hex = true;
                }
                Some('o') | Some('O') => {
                    self.pos += 2;
                    digits = |c| matches!(c, '0'..='7' | '_');
                }
                Some('b') | Some('B') => {
                    self.pos += 2;
                    digits = |c| matches!(c, '0' | '1' | '_');
                }
                _ => {}
            }
        }
        self.accept_run(digits);
        if self.peek() == Some('.') {
            self.pos += 1;
            self.accept_run(digits);
        }
        let exponent = if hex { ['p', 'P'] } else { ['e', 'E'] };
        if self.peek().is_some_and(|c| exponent.contains(&c)) {
            self.pos += 1;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.pos += 1;
            }
            self.accept_run(|c| c.is_ascii_digit() || c == '_');
        }
        if self.peek().is_some_and(is_alphanumeric) || self.peek() == Some('.') {
            self.pos += self.peek().map_or(0, char::len_utf8);
            return Err(LexError {
                message: format!("bad number syntax: {:?}", &self.src[start..self.pos]),
                pos: start,
            });
        }
        self.emit(TokenKind::Number, start);
        Ok(())
    }

    fn accept_run(&mut self, valid: fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !valid(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_text_and_field_chain() {
        let tokens = tokenize("a {{ .Values.name }} b").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["a ", "{{", " ", ".Values", ".name", " ", "}}", " b", ""]);
    }

    #[test]
    fn test_trim_markers() {
        let tokens = tokenize("a  \n{{- .x -}}\n  b").unwrap();
        assert_eq!(tokens[0].text, "a");
        assert_eq!(tokens.iter().rev().nth(1).unwrap().text, "b");
    }

    #[test]
    fn test_negative_number_is_not_trim() {
        assert_eq!(
            kinds("{{-3}}"),
            vec![TokenKind::LeftDelim, TokenKind::Number, TokenKind::RightDelim, TokenKind::Eof]
        );
    }

    #[test]
    fn test_comment_is_dropped() {
        let tokens = tokenize("a {{- /* note */ -}} b").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["a", "b", ""]);
    }

    #[test]
    fn test_comment_must_touch_delimiter() {
        let err = tokenize("{{/* x */ }}").unwrap_err();
        assert_eq!(err.message, "comment ends before closing delimiter");
    }

    #[test]
    fn test_declaration_and_keywords() {
        assert_eq!(
            kinds("{{range $i, $v := .items}}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Keyword(Keyword::Range),
                TokenKind::Space,
                TokenKind::Variable,
                TokenKind::Comma,
                TokenKind::Space,
                TokenKind::Variable,
                TokenKind::Space,
                TokenKind::Declare,
                TokenKind::Space,
                TokenKind::Field,
                TokenKind::RightDelim,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_errors() {
        assert_eq!(tokenize("{{ .x ").unwrap_err().message, "unclosed action");
        assert_eq!(
            tokenize("{{ \"abc }}").unwrap_err().message,
            "unterminated quoted string"
        );
        assert_eq!(tokenize("{{ (.x }}").unwrap_err().message, "unclosed left paren");
    }

    #[test]
    fn test_string_containing_delimiter() {
        let tokens = tokenize(r#"{{ "}}" }}"#).unwrap();
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].text, "\"}}\"");
    }
}
