use crate::{JSError, raise_syntax_error};
use std::rc::Rc;

/// Byte range of a token or node in the source, plus its 1-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    /// Span covering `self` through `other`, keeping `self`'s position.
    pub fn to(&self, other: &Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.start),
            line: self.line,
            column: self.column,
        }
    }
}

/// The exact source text covered by `span`.
pub fn source_slice<'a>(source: &'a str, span: &Span) -> &'a str {
    source.get(span.start..span.end).unwrap_or("")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateQuasi {
    /// `None` when the chunk holds an invalid escape (only legal in tagged templates).
    pub cooked: Option<Rc<str>>,
    pub raw: Rc<str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// BigInt literal digits without the `n` suffix
    BigInt(String),
    String(Rc<str>),
    Template {
        quasis: Vec<TemplateQuasi>,
        exprs: Vec<Vec<TokenData>>,
    },
    Regex {
        pattern: String,
        flags: String,
    },
    Identifier(Rc<str>),
    PrivateName(Rc<str>),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
    Dot,
    Spread,
    Question,
    OptionalChain,
    Colon,
    Arrow,
    Assign,
    CompoundAssign(AssignOp),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Exponent,
    Increment,
    Decrement,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    BitAnd,
    BitOr,
    BitXor,
    LogicalNot,
    BitNot,
    LogicalAnd,
    LogicalOr,
    NullishCoalescing,
    Eof,
}

impl Token {
    pub fn is_identifier(&self, name: &str) -> bool {
        matches!(self, Token::Identifier(s) if &**s == name)
    }

    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::BigInt(s) => format!("bigint {s}n"),
            Token::String(_) => "string".to_string(),
            Token::Template { .. } => "template string".to_string(),
            Token::Regex { .. } => "regular expression".to_string(),
            Token::Identifier(s) => format!("'{s}'"),
            Token::PrivateName(s) => format!("'#{s}'"),
            Token::Eof => "end of input".to_string(),
            other => format!("'{}'", punctuator_text(other)),
        }
    }
}

fn punctuator_text(token: &Token) -> &'static str {
    match token {
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::LBrace => "{",
        Token::RBrace => "}",
        Token::Semicolon => ";",
        Token::Comma => ",",
        Token::Dot => ".",
        Token::Spread => "...",
        Token::Question => "?",
        Token::OptionalChain => "?.",
        Token::Colon => ":",
        Token::Arrow => "=>",
        Token::Assign => "=",
        Token::CompoundAssign(_) => "op=",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Slash => "/",
        Token::Percent => "%",
        Token::Exponent => "**",
        Token::Increment => "++",
        Token::Decrement => "--",
        Token::LessThan => "<",
        Token::GreaterThan => ">",
        Token::LessEqual => "<=",
        Token::GreaterEqual => ">=",
        Token::Equal => "==",
        Token::NotEqual => "!=",
        Token::StrictEqual => "===",
        Token::StrictNotEqual => "!==",
        Token::ShiftLeft => "<<",
        Token::ShiftRight => ">>",
        Token::UnsignedShiftRight => ">>>",
        Token::BitAnd => "&",
        Token::BitOr => "|",
        Token::BitXor => "^",
        Token::LogicalNot => "!",
        Token::BitNot => "~",
        Token::LogicalAnd => "&&",
        Token::LogicalOr => "||",
        Token::NullishCoalescing => "??",
        _ => "?",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenData {
    pub token: Token,
    pub span: Span,
    /// A line terminator separates this token from the previous one.
    pub newline_before: bool,
}

const KEYWORDS_BEFORE_EXPRESSION: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

struct Lexer {
    chars: Vec<char>,
    /// Byte offset of every char, plus the source length at the end.
    offsets: Vec<usize>,
    pos: usize,
    line: u32,
    column: u32,
    pending_newline: bool,
}

pub fn tokenize(source: &str) -> Result<Vec<TokenData>, JSError> {
    let mut lexer = Lexer::new(source);
    if source.starts_with("#!") {
        while lexer.pos < lexer.chars.len() && !is_line_terminator(lexer.chars[lexer.pos]) {
            lexer.advance();
        }
    }
    let mut tokens = lexer.lex_tokens(false)?;
    let end = lexer.span_from(lexer.pos, lexer.line, lexer.column);
    let newline_before = lexer.pending_newline;
    tokens.push(TokenData {
        token: Token::Eof,
        span: end,
        newline_before,
    });
    log::trace!("tokenize produced {} tokens", tokens.len());
    Ok(tokens)
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_id_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn is_id_continue(c: char) -> bool {
    c == '$' || c == '_' || c == '\u{200c}' || c == '\u{200d}' || c.is_alphanumeric()
}

impl Lexer {
    fn new(source: &str) -> Self {
        let mut chars = Vec::with_capacity(source.len());
        let mut offsets = Vec::with_capacity(source.len() + 1);
        for (i, c) in source.char_indices() {
            chars.push(c);
            offsets.push(i);
        }
        offsets.push(source.len());
        Lexer {
            chars,
            offsets,
            pos: 0,
            line: 1,
            column: 1,
            pending_newline: false,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' || c == '\u{2028}' || c == '\u{2029}' || (c == '\r' && self.peek(0) != Some('\n')) {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn span_from(&self, start: usize, line: u32, column: u32) -> Span {
        Span {
            start: self.offsets[start.min(self.chars.len())],
            end: self.offsets[self.pos.min(self.chars.len())],
            line,
            column,
        }
    }

    fn here(&self) -> Span {
        self.span_from(self.pos, self.line, self.column)
    }

    fn regex_allowed(prev: Option<&Token>) -> bool {
        match prev {
            None => true,
            Some(Token::Identifier(name)) => KEYWORDS_BEFORE_EXPRESSION.contains(&&**name),
            Some(
                Token::Number(_)
                | Token::BigInt(_)
                | Token::String(_)
                | Token::Template { .. }
                | Token::Regex { .. }
                | Token::PrivateName(_)
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Increment
                | Token::Decrement,
            ) => false,
            Some(_) => true,
        }
    }

    /// Lex until end of input, or until an unmatched `}` when `in_template` is set.
    fn lex_tokens(&mut self, in_template: bool) -> Result<Vec<TokenData>, JSError> {
        let mut tokens: Vec<TokenData> = Vec::new();
        let mut depth = 0usize;
        let mut newline_before = false;
        loop {
            newline_before |= self.skip_trivia()?;
            let Some(c) = self.peek(0) else {
                if in_template {
                    return Err(raise_syntax_error!(self.here(), "Unterminated template literal"));
                }
                self.pending_newline = newline_before;
                return Ok(tokens);
            };
            if in_template && c == '}' && depth == 0 {
                self.advance();
                return Ok(tokens);
            }
            let (start, line, column) = (self.pos, self.line, self.column);
            let prev = tokens.last().map(|t| &t.token);
            let token = if is_id_start(c) || c == '\\' {
                Token::Identifier(self.read_identifier()?.into())
            } else if c.is_ascii_digit() || (c == '.' && self.peek(1).is_some_and(|d| d.is_ascii_digit())) {
                self.read_number()?
            } else if c == '"' || c == '\'' {
                Token::String(self.read_string(c)?.into())
            } else if c == '`' {
                self.read_template()?
            } else if c == '#' {
                self.advance();
                if !self.peek(0).is_some_and(|c| is_id_start(c) || c == '\\') {
                    return Err(raise_syntax_error!(self.span_from(start, line, column), "Invalid or unexpected token"));
                }
                Token::PrivateName(self.read_identifier()?.into())
            } else if c == '/' && Self::regex_allowed(prev) {
                self.read_regex()?
            } else {
                let token = self.read_punctuator()?;
                match token {
                    Token::LBrace => depth += 1,
                    Token::RBrace => depth = depth.saturating_sub(1),
                    _ => {}
                }
                token
            };
            tokens.push(TokenData {
                token,
                span: self.span_from(start, line, column),
                newline_before,
            });
            newline_before = false;
        }
    }

    /// Skips whitespace and comments, reporting whether a line terminator was crossed.
    fn skip_trivia(&mut self) -> Result<bool, JSError> {
        let mut newline = false;
        while let Some(c) = self.peek(0) {
            if is_line_terminator(c) {
                newline = true;
                self.advance();
            } else if c.is_whitespace() || c == '\u{feff}' {
                self.advance();
            } else if c == '/' && self.peek(1) == Some('/') {
                while let Some(c) = self.peek(0) {
                    if is_line_terminator(c) {
                        break;
                    }
                    self.advance();
                }
            } else if c == '/' && self.peek(1) == Some('*') {
                let start = self.here();
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek(0) == Some('/') => {
                            self.advance();
                            break;
                        }
                        Some(c) if is_line_terminator(c) => newline = true,
                        Some(_) => {}
                        None => return Err(raise_syntax_error!(start, "Invalid or unexpected token")),
                    }
                }
            } else {
                break;
            }
        }
        Ok(newline)
    }

    fn read_identifier(&mut self) -> Result<String, JSError> {
        let mut name = String::new();
        while let Some(c) = self.peek(0) {
            if c == '\\' {
                let span = self.here();
                self.advance();
                if self.advance() != Some('u') {
                    return Err(raise_syntax_error!(span, "Invalid Unicode escape sequence"));
                }
                let ch = self.read_unicode_escape(span)?;
                name.push(ch);
            } else if is_id_continue(c) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(name)
    }

    fn read_number(&mut self) -> Result<Token, JSError> {
        let start = self.here();
        let mut text = String::new();
        let radix = match (self.peek(0), self.peek(1)) {
            (Some('0'), Some('x' | 'X')) => 16,
            (Some('0'), Some('o' | 'O')) => 8,
            (Some('0'), Some('b' | 'B')) => 2,
            _ => 10,
        };
        if radix != 10 {
            self.advance();
            self.advance();
            while let Some(c) = self.peek(0) {
                if c == '_' {
                    self.advance();
                } else if c.is_digit(radix) {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            if text.is_empty() {
                return Err(raise_syntax_error!(start, "Invalid or unexpected token"));
            }
            if self.peek(0) == Some('n') {
                self.advance();
                return Ok(Token::BigInt(text));
            }
            let mut value = 0f64;
            for c in text.chars() {
                value = value * radix as f64 + c.to_digit(radix).unwrap_or(0) as f64;
            }
            return self.finish_number(start, value);
        }

        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else if c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        // Legacy octal literal such as 017
        if text.len() > 1 && text.starts_with('0') && text.chars().all(|c| ('0'..='7').contains(&c)) && self.peek(0) != Some('.') {
            let value = text.chars().fold(0f64, |acc, c| acc * 8.0 + c.to_digit(8).unwrap_or(0) as f64);
            return self.finish_number(start, value);
        }
        if self.peek(0) == Some('n') {
            self.advance();
            return Ok(Token::BigInt(text));
        }
        if self.peek(0) == Some('.') {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek(0) {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else if c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(0), Some('e' | 'E')) {
            let sign_ok = matches!(self.peek(1), Some('+' | '-')) && self.peek(2).is_some_and(|c| c.is_ascii_digit());
            if sign_ok || self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
                text.push('e');
                self.advance();
                if matches!(self.peek(0), Some('+' | '-')) {
                    text.push(self.advance().unwrap_or('+'));
                }
                while let Some(c) = self.peek(0) {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }
        let value = if text.starts_with('.') {
            format!("0{text}").parse::<f64>()
        } else {
            text.trim_end_matches('.').parse::<f64>()
        }
        .map_err(|_| raise_syntax_error!(start, "Invalid number literal"))?;
        self.finish_number(start, value)
    }

    fn finish_number(&self, start: Span, value: f64) -> Result<Token, JSError> {
        if self.peek(0).is_some_and(is_id_start) {
            return Err(raise_syntax_error!(start, "Invalid or unexpected token"));
        }
        Ok(Token::Number(value))
    }

    fn read_hex_digits(&mut self, count: usize, span: Span) -> Result<u32, JSError> {
        let mut value = 0u32;
        for _ in 0..count {
            let digit = self
                .peek(0)
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| raise_syntax_error!(span, "Invalid hexadecimal escape sequence"))?;
            self.advance();
            value = value * 16 + digit;
        }
        Ok(value)
    }

    /// Reads the part of a `\u` escape after the `u`.
    fn read_unicode_escape(&mut self, span: Span) -> Result<char, JSError> {
        let code = if self.peek(0) == Some('{') {
            self.advance();
            let mut value = 0u32;
            let mut digits = 0;
            while let Some(d) = self.peek(0).and_then(|c| c.to_digit(16)) {
                self.advance();
                value = value.saturating_mul(16).saturating_add(d);
                digits += 1;
            }
            if digits == 0 || self.advance() != Some('}') || value > 0x10FFFF {
                return Err(raise_syntax_error!(span, "Invalid Unicode escape sequence"));
            }
            value
        } else {
            let high = self.read_hex_digits(4, span)?;
            if (0xD800..0xDC00).contains(&high) && self.peek(0) == Some('\\') && self.peek(1) == Some('u') {
                let save = (self.pos, self.line, self.column);
                self.advance();
                self.advance();
                let low = self.read_hex_digits(4, span)?;
                if (0xDC00..0xE000).contains(&low) {
                    return Ok(char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)).unwrap_or('\u{fffd}'));
                }
                (self.pos, self.line, self.column) = save;
            }
            high
        };
        Ok(char::from_u32(code).unwrap_or('\u{fffd}'))
    }

    /// Reads an escape sequence after the backslash. `None` means a line continuation.
    fn read_escape(&mut self, span: Span) -> Result<Option<char>, JSError> {
        let Some(c) = self.advance() else {
            return Err(raise_syntax_error!(span, "Invalid or unexpected token"));
        };
        let ch = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' if !self.peek(0).is_some_and(|c| c.is_ascii_digit()) => '\0',
            'x' => char::from_u32(self.read_hex_digits(2, span)?).unwrap_or('\u{fffd}'),
            'u' => self.read_unicode_escape(span)?,
            '\r' => {
                if self.peek(0) == Some('\n') {
                    self.advance();
                }
                return Ok(None);
            }
            '\n' | '\u{2028}' | '\u{2029}' => return Ok(None),
            d @ '0'..='7' => {
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek(0).and_then(|c| c.to_digit(8)) {
                        Some(next) if value * 8 + next <= 0o377 => {
                            value = value * 8 + next;
                            self.advance();
                        }
                        _ => break,
                    }
                }
                char::from_u32(value).unwrap_or('\u{fffd}')
            }
            other => other,
        };
        Ok(Some(ch))
    }

    fn read_string(&mut self, quote: char) -> Result<String, JSError> {
        let start = self.here();
        self.advance();
        let mut out = String::new();
        loop {
            match self.peek(0) {
                None => return Err(raise_syntax_error!(start, "Invalid or unexpected token")),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(out);
                }
                Some('\\') => {
                    let span = self.here();
                    self.advance();
                    if let Some(ch) = self.read_escape(span)? {
                        out.push(ch);
                    }
                }
                Some('\n' | '\r') => return Err(raise_syntax_error!(start, "Invalid or unexpected token")),
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_template(&mut self) -> Result<Token, JSError> {
        let start = self.here();
        self.advance();
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let mut cooked = Some(String::new());
        let mut raw = String::new();
        loop {
            match self.peek(0) {
                None => return Err(raise_syntax_error!(start, "Unterminated template literal")),
                Some('`') => {
                    self.advance();
                    quasis.push(TemplateQuasi {
                        cooked: cooked.map(Rc::from),
                        raw: raw.into(),
                    });
                    return Ok(Token::Template { quasis, exprs });
                }
                Some('$') if self.peek(1) == Some('{') => {
                    self.advance();
                    self.advance();
                    quasis.push(TemplateQuasi {
                        cooked: cooked.take().map(Rc::from),
                        raw: std::mem::take(&mut raw).into(),
                    });
                    cooked = Some(String::new());
                    let inner = self.lex_tokens(true)?;
                    exprs.push(inner);
                }
                Some('\\') => {
                    let span = self.here();
                    let escape_start = self.pos;
                    self.advance();
                    let escaped = self.read_escape(span);
                    raw.extend(self.chars[escape_start..self.pos].iter());
                    match escaped {
                        Ok(Some(ch)) => {
                            if let Some(c) = cooked.as_mut() {
                                c.push(ch);
                            }
                        }
                        Ok(None) => {}
                        Err(_) => cooked = None,
                    }
                }
                Some('\r') => {
                    self.advance();
                    if self.peek(0) == Some('\n') {
                        self.advance();
                    }
                    raw.push('\n');
                    if let Some(c) = cooked.as_mut() {
                        c.push('\n');
                    }
                }
                Some(c) => {
                    self.advance();
                    raw.push(c);
                    if let Some(cooked) = cooked.as_mut() {
                        cooked.push(c);
                    }
                }
            }
        }
    }

    fn read_regex(&mut self) -> Result<Token, JSError> {
        let start = self.here();
        self.advance();
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.advance() {
                None => return Err(raise_syntax_error!(start, "Invalid regular expression: missing /")),
                Some(c) if is_line_terminator(c) => {
                    return Err(raise_syntax_error!(start, "Invalid regular expression: missing /"));
                }
                Some('\\') => {
                    pattern.push('\\');
                    if let Some(c) = self.advance() {
                        pattern.push(c);
                    }
                }
                Some('[') => {
                    in_class = true;
                    pattern.push('[');
                }
                Some(']') => {
                    in_class = false;
                    pattern.push(']');
                }
                Some('/') if !in_class => break,
                Some(c) => pattern.push(c),
            }
        }
        let mut flags = String::new();
        while let Some(c) = self.peek(0) {
            if is_id_continue(c) {
                flags.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(Token::Regex { pattern, flags })
    }

    fn read_punctuator(&mut self) -> Result<Token, JSError> {
        let start = self.here();
        let c = self.peek(0).unwrap_or('\0');
        let c1 = self.peek(1);
        let c2 = self.peek(2);
        let c3 = self.peek(3);
        let (token, len) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '{' => (Token::LBrace, 1),
            '}' => (Token::RBrace, 1),
            ';' => (Token::Semicolon, 1),
            ',' => (Token::Comma, 1),
            ':' => (Token::Colon, 1),
            '~' => (Token::BitNot, 1),
            '.' if c1 == Some('.') && c2 == Some('.') => (Token::Spread, 3),
            '.' => (Token::Dot, 1),
            '?' => match (c1, c2) {
                (Some('?'), Some('=')) => (Token::CompoundAssign(AssignOp::Nullish), 3),
                (Some('?'), _) => (Token::NullishCoalescing, 2),
                (Some('.'), d) if !d.is_some_and(|d| d.is_ascii_digit()) => (Token::OptionalChain, 2),
                _ => (Token::Question, 1),
            },
            '=' => match (c1, c2) {
                (Some('='), Some('=')) => (Token::StrictEqual, 3),
                (Some('='), _) => (Token::Equal, 2),
                (Some('>'), _) => (Token::Arrow, 2),
                _ => (Token::Assign, 1),
            },
            '!' => match (c1, c2) {
                (Some('='), Some('=')) => (Token::StrictNotEqual, 3),
                (Some('='), _) => (Token::NotEqual, 2),
                _ => (Token::LogicalNot, 1),
            },
            '+' => match c1 {
                Some('+') => (Token::Increment, 2),
                Some('=') => (Token::CompoundAssign(AssignOp::Add), 2),
                _ => (Token::Plus, 1),
            },
            '-' => match c1 {
                Some('-') => (Token::Decrement, 2),
                Some('=') => (Token::CompoundAssign(AssignOp::Sub), 2),
                _ => (Token::Minus, 1),
            },
            '*' => match (c1, c2) {
                (Some('*'), Some('=')) => (Token::CompoundAssign(AssignOp::Exp), 3),
                (Some('*'), _) => (Token::Exponent, 2),
                (Some('='), _) => (Token::CompoundAssign(AssignOp::Mul), 2),
                _ => (Token::Star, 1),
            },
            '/' => match c1 {
                Some('=') => (Token::CompoundAssign(AssignOp::Div), 2),
                _ => (Token::Slash, 1),
            },
            '%' => match c1 {
                Some('=') => (Token::CompoundAssign(AssignOp::Mod), 2),
                _ => (Token::Percent, 1),
            },
            '<' => match (c1, c2) {
                (Some('<'), Some('=')) => (Token::CompoundAssign(AssignOp::Shl), 3),
                (Some('<'), _) => (Token::ShiftLeft, 2),
                (Some('='), _) => (Token::LessEqual, 2),
                _ => (Token::LessThan, 1),
            },
            '>' => match (c1, c2, c3) {
                (Some('>'), Some('>'), Some('=')) => (Token::CompoundAssign(AssignOp::UShr), 4),
                (Some('>'), Some('>'), _) => (Token::UnsignedShiftRight, 3),
                (Some('>'), Some('='), _) => (Token::CompoundAssign(AssignOp::Shr), 3),
                (Some('>'), _, _) => (Token::ShiftRight, 2),
                (Some('='), _, _) => (Token::GreaterEqual, 2),
                _ => (Token::GreaterThan, 1),
            },
            '&' => match (c1, c2) {
                (Some('&'), Some('=')) => (Token::CompoundAssign(AssignOp::And), 3),
                (Some('&'), _) => (Token::LogicalAnd, 2),
                (Some('='), _) => (Token::CompoundAssign(AssignOp::BitAnd), 2),
                _ => (Token::BitAnd, 1),
            },
            '|' => match (c1, c2) {
                (Some('|'), Some('=')) => (Token::CompoundAssign(AssignOp::Or), 3),
                (Some('|'), _) => (Token::LogicalOr, 2),
                (Some('='), _) => (Token::CompoundAssign(AssignOp::BitOr), 2),
                _ => (Token::BitOr, 1),
            },
            '^' => match c1 {
                Some('=') => (Token::CompoundAssign(AssignOp::BitXor), 2),
                _ => (Token::BitXor, 1),
            },
            _ => return Err(raise_syntax_error!(start, "Invalid or unexpected token")),
        };
        for _ in 0..len {
            self.advance();
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_track_lines_and_columns() {
        let tokens = tokenize("let a = 1;\n  a++").unwrap();
        let inc = tokens.iter().find(|t| t.token == Token::Increment).unwrap();
        assert_eq!((inc.span.line, inc.span.column), (2, 4));
        let second_a = &tokens[5];
        assert!(second_a.newline_before);
        assert_eq!(source_slice("let a = 1;\n  a++", &second_a.span), "a");
    }

    #[test]
    fn slash_after_identifier_is_division() {
        let tokens = tokenize("a / b / c").unwrap();
        assert!(tokens.iter().all(|t| !matches!(t.token, Token::Regex { .. })));
        let tokens = tokenize("x = /ab+c/gi").unwrap();
        assert!(matches!(&tokens[2].token, Token::Regex { pattern, flags } if pattern == "ab+c" && flags == "gi"));
    }

    #[test]
    fn template_collects_nested_expressions() {
        let tokens = tokenize("`a${ {b: 1}.b }c`").unwrap();
        match &tokens[0].token {
            Token::Template { quasis, exprs } => {
                assert_eq!(quasis.len(), 2);
                assert_eq!(exprs.len(), 1);
                assert_eq!(quasis[1].raw.as_ref(), "c");
            }
            other => panic!("unexpected token {other:?}"),
        }
    }
}
