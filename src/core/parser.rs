use crate::core::expr::{
    Argument, ArrayElement, BinaryOp, ClassElement, ClassNode, Expr, ExprKind, FunctionBody, FunctionKind, FunctionNode, LogicalOp,
    MemberProperty, MethodKind, ObjectMember, Param, Pattern, PatternProperty, PropertyName, UnaryOp,
};
use crate::core::statement::{
    CatchClause, ForHead, ForInit, Program, Statement, StatementKind, SwitchCase, VarDeclaration, VarDeclarator, VarKind,
};
use crate::core::token::{Span, Token, TokenData, source_slice, tokenize};
use crate::core::value::number_to_string;
use crate::{JSError, raise_syntax_error, raise_unsupported};
use std::rc::Rc;

const RESERVED_WORDS: &[&str] = &[
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "new",
    "null",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
];

/// Parse a whole script.
pub fn parse_program(source: &str) -> Result<Program, JSError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(source, tokens);
    let body = parser.parse_statement_list_until_eof()?;
    let strict = has_use_strict(source, &body);
    log::trace!("parsed program with {} top-level statements (strict: {strict})", body.len());
    Ok(Program {
        body,
        strict,
        has_top_level_await: parser.saw_top_level_await,
    })
}

/// Parse a function from parameter and body source text, as `Function(...)` does.
pub fn parse_function_source(params: &str, body: &str, is_async: bool) -> Result<(Rc<FunctionNode>, String), JSError> {
    let prefix = if is_async { "async " } else { "" };
    let source = format!("({prefix}function anonymous({params}\n) {{\n{body}\n}})");
    let tokens = tokenize(&source)?;
    let mut parser = Parser::new(&source, tokens);
    let expr = parser.parse_expression()?;
    parser.expect(&Token::Eof)?;
    match expr.kind {
        ExprKind::Function(f) => Ok((f, source)),
        _ => Err(raise_syntax_error!(expr.span, "Invalid function source")),
    }
}

/// `if (x) function f() {}` behaves as if the declaration were in braces.
fn braced_if_function(stmt: Statement) -> Statement {
    if matches!(stmt.kind, StatementKind::FunctionDecl(_)) {
        let span = stmt.span;
        Statement::new(StatementKind::Block(vec![stmt]), span)
    } else {
        stmt
    }
}

fn has_use_strict(source: &str, body: &[Statement]) -> bool {
    for stmt in body {
        match &stmt.kind {
            StatementKind::Expr(Expr {
                kind: ExprKind::String(_),
                span,
            }) => {
                let raw = source_slice(source, span);
                if raw == "\"use strict\"" || raw == "'use strict'" {
                    return true;
                }
            }
            _ => return false,
        }
    }
    false
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<TokenData>,
    pos: usize,
    last_span: Span,
    in_async: bool,
    in_generator: bool,
    function_depth: usize,
    no_in: bool,
    saw_top_level_await: bool,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<TokenData>) -> Self {
        Parser {
            source,
            tokens,
            pos: 0,
            last_span: Span::default(),
            in_async: false,
            in_generator: false,
            function_depth: 0,
            no_in: false,
            saw_top_level_await: false,
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn peek_data(&self) -> &TokenData {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_data_at(&self, n: usize) -> &TokenData {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn span(&self) -> Span {
        self.peek_data().span
    }

    fn advance(&mut self) -> TokenData {
        let data = self.peek_data().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        self.last_span = data.span;
        data
    }

    fn finish(&self, start: Span) -> Span {
        start.to(&self.last_span)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_ident(&self, name: &str) -> bool {
        self.peek().is_identifier(name)
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.is_ident(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> JSError {
        let data = self.peek_data();
        match &data.token {
            Token::Eof => raise_syntax_error!(data.span, "Unexpected end of input"),
            Token::Template { .. } => raise_syntax_error!(data.span, "Unexpected template string"),
            Token::String(_) => raise_syntax_error!(data.span, "Unexpected string"),
            Token::Number(_) => raise_syntax_error!(data.span, "Unexpected number"),
            Token::Identifier(name) if !RESERVED_WORDS.contains(&&**name) => {
                raise_syntax_error!(data.span, "Unexpected identifier '{name}'")
            }
            other => raise_syntax_error!(data.span, "Unexpected token {}", other.describe()),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<Span, JSError> {
        if self.peek() == token {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_ident(&mut self, name: &str) -> Result<Span, JSError> {
        if self.is_ident(name) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected())
        }
    }

    fn consume_semicolon(&mut self) -> Result<(), JSError> {
        if self.eat(&Token::Semicolon) {
            return Ok(());
        }
        let data = self.peek_data();
        if matches!(data.token, Token::RBrace | Token::Eof) || data.newline_before {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn with_in<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, JSError>) -> Result<T, JSError> {
        let saved = self.no_in;
        self.no_in = false;
        let result = f(self);
        self.no_in = saved;
        result
    }

    fn await_allowed(&self) -> bool {
        self.in_async || self.function_depth == 0
    }

    fn binding_identifier(&mut self) -> Result<(Rc<str>, Span), JSError> {
        let data = self.peek_data().clone();
        match &data.token {
            Token::Identifier(name) if !RESERVED_WORDS.contains(&&**name) => {
                if (&**name == "await" && self.in_async) || (&**name == "yield" && self.in_generator) {
                    return Err(self.unexpected());
                }
                self.advance();
                Ok((name.clone(), data.span))
            }
            _ => Err(self.unexpected()),
        }
    }

    // ---- statements ----

    fn parse_statement_list_until_eof(&mut self) -> Result<Vec<Statement>, JSError> {
        let mut body = Vec::new();
        while *self.peek() != Token::Eof {
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_block_body(&mut self) -> Result<Vec<Statement>, JSError> {
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while *self.peek() != Token::RBrace {
            if *self.peek() == Token::Eof {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Statement, JSError> {
        let start = self.span();
        log::trace!("parse_statement at {}:{} {:?}", start.line, start.column, self.peek());
        let kind = match self.peek().clone() {
            Token::LBrace => StatementKind::Block(self.parse_block_body()?),
            Token::Semicolon => {
                self.advance();
                StatementKind::Empty
            }
            Token::Identifier(word) => match &*word {
                "var" | "const" => {
                    let decl = self.parse_var_declaration()?;
                    self.consume_semicolon()?;
                    StatementKind::VarDecl(decl)
                }
                "let" if matches!(self.peek_at(1), Token::Identifier(_) | Token::LBracket | Token::LBrace) => {
                    let decl = self.parse_var_declaration()?;
                    self.consume_semicolon()?;
                    StatementKind::VarDecl(decl)
                }
                "function" => StatementKind::FunctionDecl(self.parse_function(start, false, true)?),
                "async" if self.peek_at(1).is_identifier("function") && !self.peek_data_at(1).newline_before => {
                    self.advance();
                    StatementKind::FunctionDecl(self.parse_function(start, true, true)?)
                }
                "class" => StatementKind::ClassDecl(self.parse_class(true)?),
                "if" => self.parse_if()?,
                "for" => self.parse_for()?,
                "while" => {
                    self.advance();
                    self.expect(&Token::LParen)?;
                    let test = self.with_in(|p| p.parse_expression())?;
                    self.expect(&Token::RParen)?;
                    let body = Box::new(self.parse_statement()?);
                    StatementKind::While { test, body }
                }
                "do" => {
                    self.advance();
                    let body = Box::new(self.parse_statement()?);
                    self.expect_ident("while")?;
                    self.expect(&Token::LParen)?;
                    let test = self.with_in(|p| p.parse_expression())?;
                    self.expect(&Token::RParen)?;
                    self.eat(&Token::Semicolon);
                    StatementKind::DoWhile { body, test }
                }
                "return" => {
                    if self.function_depth == 0 {
                        return Err(raise_syntax_error!(start, "Illegal return statement"));
                    }
                    self.advance();
                    let data = self.peek_data();
                    let argument = if matches!(data.token, Token::Semicolon | Token::RBrace | Token::Eof) || data.newline_before {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    self.consume_semicolon()?;
                    StatementKind::Return(argument)
                }
                "break" | "continue" => {
                    self.advance();
                    let data = self.peek_data().clone();
                    let label = match &data.token {
                        Token::Identifier(name) if !data.newline_before && !RESERVED_WORDS.contains(&&**name) => {
                            self.advance();
                            Some(name.clone())
                        }
                        _ => None,
                    };
                    self.consume_semicolon()?;
                    if &*word == "break" {
                        StatementKind::Break(label)
                    } else {
                        StatementKind::Continue(label)
                    }
                }
                "throw" => {
                    self.advance();
                    if self.peek_data().newline_before {
                        return Err(raise_syntax_error!(self.span(), "Illegal newline after throw"));
                    }
                    let argument = self.parse_expression()?;
                    self.consume_semicolon()?;
                    StatementKind::Throw(argument)
                }
                "try" => self.parse_try()?,
                "switch" => self.parse_switch()?,
                "debugger" => {
                    self.advance();
                    self.consume_semicolon()?;
                    StatementKind::Debugger
                }
                "with" => {
                    return Err(raise_unsupported!("'with' statements"));
                }
                "import" if !matches!(self.peek_at(1), Token::LParen | Token::Dot) => {
                    self.skip_module_declaration();
                    StatementKind::ModuleDecl("import declarations")
                }
                "export" => {
                    self.skip_module_declaration();
                    StatementKind::ModuleDecl("export declarations")
                }
                _ if *self.peek_at(1) == Token::Colon && !RESERVED_WORDS.contains(&&*word) => {
                    self.advance();
                    self.advance();
                    let body = Box::new(self.parse_statement()?);
                    StatementKind::Labeled { label: word, body }
                }
                _ => self.parse_expression_statement()?,
            },
            _ => self.parse_expression_statement()?,
        };
        Ok(Statement::new(kind, self.finish(start)))
    }

    fn skip_module_declaration(&mut self) {
        let mut depth = 0usize;
        self.advance();
        loop {
            let data = self.peek_data();
            match data.token {
                Token::Eof => break,
                Token::Semicolon if depth == 0 => {
                    self.advance();
                    break;
                }
                _ if depth == 0 && data.newline_before => break,
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_expression_statement(&mut self) -> Result<StatementKind, JSError> {
        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(StatementKind::Expr(expr))
    }

    fn parse_var_kind(&mut self) -> Result<VarKind, JSError> {
        let kind = match self.peek() {
            Token::Identifier(w) if &**w == "var" => VarKind::Var,
            Token::Identifier(w) if &**w == "let" => VarKind::Let,
            Token::Identifier(w) if &**w == "const" => VarKind::Const,
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(kind)
    }

    fn parse_var_declaration(&mut self) -> Result<VarDeclaration, JSError> {
        let kind = self.parse_var_kind()?;
        self.parse_declarators(kind)
    }

    fn parse_declarators(&mut self, kind: VarKind) -> Result<VarDeclaration, JSError> {
        let mut declarations = Vec::new();
        loop {
            let target = self.parse_binding_pattern()?;
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if init.is_none() && !self.no_in && (kind == VarKind::Const || !target.is_simple()) {
                let msg = if kind == VarKind::Const {
                    "Missing initializer in const declaration"
                } else {
                    "Missing initializer in destructuring declaration"
                };
                return Err(raise_syntax_error!(self.last_span, "{msg}"));
            }
            declarations.push(VarDeclarator { target, init });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(VarDeclaration { kind, declarations })
    }

    fn parse_if(&mut self) -> Result<StatementKind, JSError> {
        self.advance();
        self.expect(&Token::LParen)?;
        let test = self.with_in(|p| p.parse_expression())?;
        self.expect(&Token::RParen)?;
        let consequent = Box::new(braced_if_function(self.parse_statement()?));
        let alternate = if self.eat_ident("else") {
            Some(Box::new(braced_if_function(self.parse_statement()?)))
        } else {
            None
        };
        Ok(StatementKind::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<StatementKind, JSError> {
        let for_span = self.advance().span;
        let is_await = if self.is_ident("await") {
            if !self.await_allowed() {
                return Err(self.unexpected());
            }
            if self.function_depth == 0 {
                self.saw_top_level_await = true;
            }
            self.advance();
            true
        } else {
            false
        };
        self.expect(&Token::LParen)?;

        let mut init = None;
        let is_decl = match self.peek() {
            Token::Identifier(w) if &**w == "var" || &**w == "const" => true,
            Token::Identifier(w) if &**w == "let" => matches!(self.peek_at(1), Token::Identifier(_) | Token::LBracket | Token::LBrace),
            _ => false,
        };
        if is_decl {
            let kind = self.parse_var_kind()?;
            let saved = self.no_in;
            self.no_in = true;
            let target = self.parse_binding_pattern();
            self.no_in = saved;
            let target = target?;
            if self.is_ident("of") || self.is_ident("in") {
                let head = ForHead::Declaration(kind, target);
                return self.parse_for_in_of(head, is_await);
            }
            let first_init = if self.eat(&Token::Assign) {
                let saved = self.no_in;
                self.no_in = true;
                let value = self.parse_assignment();
                self.no_in = saved;
                Some(value?)
            } else {
                None
            };
            if first_init.is_none() && (kind == VarKind::Const || !target.is_simple()) {
                return Err(raise_syntax_error!(self.last_span, "Missing initializer in declaration"));
            }
            let mut decl = VarDeclaration {
                kind,
                declarations: vec![VarDeclarator { target, init: first_init }],
            };
            if self.eat(&Token::Comma) {
                let saved = self.no_in;
                self.no_in = true;
                let rest = self.parse_declarators(kind);
                self.no_in = saved;
                decl.declarations.extend(rest?.declarations);
            }
            init = Some(ForInit::Declaration(decl));
        } else if *self.peek() != Token::Semicolon {
            let saved = self.no_in;
            self.no_in = true;
            let expr = self.parse_expression();
            self.no_in = saved;
            let expr = expr?;
            if self.is_ident("of") || self.is_ident("in") {
                let target = expr_to_pattern(expr)?;
                return self.parse_for_in_of(ForHead::Target(target), is_await);
            }
            init = Some(ForInit::Expression(expr));
        }
        if is_await {
            return Err(raise_syntax_error!(for_span, "Unexpected token in for await"));
        }
        self.expect(&Token::Semicolon)?;
        let test = if *self.peek() == Token::Semicolon {
            None
        } else {
            Some(self.with_in(|p| p.parse_expression())?)
        };
        self.expect(&Token::Semicolon)?;
        let update = if *self.peek() == Token::RParen {
            None
        } else {
            Some(self.with_in(|p| p.parse_expression())?)
        };
        self.expect(&Token::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(StatementKind::For { init, test, update, body })
    }

    fn parse_for_in_of(&mut self, head: ForHead, is_await: bool) -> Result<StatementKind, JSError> {
        let is_of = self.is_ident("of");
        let keyword_span = self.advance().span;
        let right = if is_of {
            self.with_in(|p| p.parse_assignment())?
        } else {
            self.with_in(|p| p.parse_expression())?
        };
        self.expect(&Token::RParen)?;
        let body = Box::new(self.parse_statement()?);
        if is_of {
            Ok(StatementKind::ForOf {
                head,
                iterable: right,
                body,
                is_await,
            })
        } else {
            if is_await {
                return Err(raise_syntax_error!(keyword_span, "Unexpected token 'in'"));
            }
            Ok(StatementKind::ForIn { head, object: right, body })
        }
    }

    fn parse_try(&mut self) -> Result<StatementKind, JSError> {
        let start = self.advance().span;
        let block = self.parse_block_body()?;
        let handler = if self.eat_ident("catch") {
            let param = if self.eat(&Token::LParen) {
                let param = self.parse_binding_pattern()?;
                self.expect(&Token::RParen)?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block_body()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat_ident("finally") {
            Some(self.parse_block_body()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(raise_syntax_error!(start, "Missing catch or finally after try"));
        }
        Ok(StatementKind::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn parse_switch(&mut self) -> Result<StatementKind, JSError> {
        self.advance();
        self.expect(&Token::LParen)?;
        let discriminant = self.with_in(|p| p.parse_expression())?;
        self.expect(&Token::RParen)?;
        self.expect(&Token::LBrace)?;
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.eat(&Token::RBrace) {
            let test = if self.eat_ident("case") {
                Some(self.with_in(|p| p.parse_expression())?)
            } else if self.is_ident("default") {
                let span = self.advance().span;
                if seen_default {
                    return Err(raise_syntax_error!(span, "More than one default clause in switch statement"));
                }
                seen_default = true;
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(&Token::Colon)?;
            let mut body = Vec::new();
            while !matches!(self.peek(), Token::RBrace | Token::Eof) && !self.is_ident("case") && !self.is_ident("default") {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(StatementKind::Switch { discriminant, cases })
    }

    // ---- functions and classes ----

    /// Parses `function name(...) {...}`; `start` is the span of the first token (`async` or `function`).
    fn parse_function(&mut self, start: Span, is_async: bool, is_declaration: bool) -> Result<Rc<FunctionNode>, JSError> {
        self.expect_ident("function")?;
        let is_generator = self.eat(&Token::Star);
        let name = if matches!(self.peek(), Token::Identifier(_)) {
            Some(self.binding_identifier()?.0)
        } else if is_declaration {
            return Err(self.unexpected());
        } else {
            None
        };
        self.parse_function_rest(start, name, FunctionKind::Normal, is_async, is_generator)
    }

    fn parse_function_rest(
        &mut self,
        start: Span,
        name: Option<Rc<str>>,
        kind: FunctionKind,
        is_async: bool,
        is_generator: bool,
    ) -> Result<Rc<FunctionNode>, JSError> {
        let saved = (self.in_async, self.in_generator, self.no_in);
        self.in_async = is_async;
        self.in_generator = is_generator;
        self.no_in = false;
        self.function_depth += 1;
        let result = (|| -> Result<_, JSError> {
            let params = self.parse_formal_params()?;
            match kind {
                FunctionKind::Getter if !params.is_empty() => {
                    return Err(raise_syntax_error!(self.last_span, "Getter must not have any formal parameters."));
                }
                FunctionKind::Setter if params.len() != 1 || params[0].rest => {
                    return Err(raise_syntax_error!(self.last_span, "Setter must have exactly one formal parameter."));
                }
                _ => {}
            }
            let body = self.parse_block_body()?;
            Ok((params, body))
        })();
        self.function_depth -= 1;
        (self.in_async, self.in_generator, self.no_in) = saved;
        let (params, body) = result?;
        let strict = has_use_strict(self.source, &body) || matches!(kind, FunctionKind::ClassConstructor | FunctionKind::DerivedConstructor);
        Ok(Rc::new(FunctionNode {
            name,
            params,
            body: FunctionBody::Block(body),
            kind,
            is_async,
            is_generator,
            strict,
            span: self.finish(start),
        }))
    }

    fn parse_formal_params(&mut self) -> Result<Vec<Param>, JSError> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        while *self.peek() != Token::RParen {
            if self.eat(&Token::Spread) {
                let pattern = self.parse_binding_pattern()?;
                params.push(Param { pattern, rest: true });
                if *self.peek() != Token::RParen {
                    return Err(raise_syntax_error!(self.span(), "Rest parameter must be last formal parameter"));
                }
                break;
            }
            let pattern = self.parse_binding_target()?;
            params.push(Param { pattern, rest: false });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    fn parse_arrow_function(&mut self, is_async: bool) -> Result<Expr, JSError> {
        let start = self.span();
        if is_async {
            self.advance();
        }
        let saved = (self.in_async, self.in_generator);
        self.in_async = is_async;
        self.in_generator = false;
        self.function_depth += 1;
        let result = (|| -> Result<_, JSError> {
            let params = if *self.peek() == Token::LParen {
                self.parse_formal_params()?
            } else {
                let (name, span) = self.binding_identifier()?;
                vec![Param {
                    pattern: Pattern::Identifier { name, span },
                    rest: false,
                }]
            };
            if self.peek_data().newline_before {
                return Err(self.unexpected());
            }
            self.expect(&Token::Arrow)?;
            let body = if *self.peek() == Token::LBrace {
                let saved_in = self.no_in;
                self.no_in = false;
                let body = self.parse_block_body();
                self.no_in = saved_in;
                FunctionBody::Block(body?)
            } else {
                FunctionBody::Expression(Box::new(self.parse_assignment()?))
            };
            Ok((params, body))
        })();
        self.function_depth -= 1;
        (self.in_async, self.in_generator) = saved;
        let (params, body) = result?;
        let strict = match &body {
            FunctionBody::Block(stmts) => has_use_strict(self.source, stmts),
            FunctionBody::Expression(_) => false,
        };
        let span = self.finish(start);
        let node = FunctionNode {
            name: None,
            params,
            body,
            kind: FunctionKind::Arrow,
            is_async,
            is_generator: false,
            strict,
            span,
        };
        Ok(Expr::new(ExprKind::Function(Rc::new(node)), span))
    }

    /// True when the tokens at the cursor start an arrow function.
    fn arrow_ahead(&self) -> Option<bool> {
        let mut offset = 0;
        let mut is_async = false;
        if self.is_ident("async") && !self.peek_data_at(1).newline_before {
            match self.peek_at(1) {
                Token::Identifier(_) if *self.peek_at(2) == Token::Arrow => return Some(true),
                Token::LParen => {
                    offset = 1;
                    is_async = true;
                }
                _ => {}
            }
        }
        match self.peek_at(offset) {
            Token::Identifier(name) if !RESERVED_WORDS.contains(&&**name) && offset == 0 => {
                (*self.peek_at(1) == Token::Arrow && !self.peek_data_at(1).newline_before).then_some(false)
            }
            Token::LParen => {
                let mut depth = 0usize;
                let mut i = offset;
                loop {
                    match self.peek_at(i) {
                        Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                        Token::RParen | Token::RBracket | Token::RBrace => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                break;
                            }
                        }
                        Token::Eof => return None,
                        _ => {}
                    }
                    i += 1;
                }
                (*self.peek_at(i + 1) == Token::Arrow && !self.peek_data_at(i + 1).newline_before).then_some(is_async)
            }
            _ => None,
        }
    }

    fn parse_class(&mut self, is_declaration: bool) -> Result<Rc<ClassNode>, JSError> {
        let start = self.expect_ident("class")?;
        let name = match self.peek() {
            Token::Identifier(w) if &**w != "extends" => Some(self.binding_identifier()?.0),
            _ if is_declaration => return Err(self.unexpected()),
            _ => None,
        };
        let heritage = if self.eat_ident("extends") {
            Some(Box::new(self.parse_left_hand_side()?))
        } else {
            None
        };
        self.expect(&Token::LBrace)?;
        let mut constructor = None;
        let mut elements = Vec::new();
        let saved_no_in = self.no_in;
        self.no_in = false;
        while !self.eat(&Token::RBrace) {
            if self.eat(&Token::Semicolon) {
                continue;
            }
            let member_start = self.span();
            let mut is_static = false;
            if self.is_ident("static") && !matches!(self.peek_at(1), Token::LParen | Token::Assign | Token::Semicolon | Token::RBrace) {
                self.advance();
                is_static = true;
                if *self.peek() == Token::LBrace {
                    let block_start = self.span();
                    let saved = (self.in_async, self.in_generator);
                    (self.in_async, self.in_generator) = (false, false);
                    self.function_depth += 1;
                    let body = self.parse_block_body();
                    self.function_depth -= 1;
                    (self.in_async, self.in_generator) = saved;
                    let span = self.finish(block_start);
                    elements.push(ClassElement::StaticBlock(Rc::new(FunctionNode {
                        name: None,
                        params: Vec::new(),
                        body: FunctionBody::Block(body?),
                        kind: FunctionKind::StaticBlock,
                        is_async: false,
                        is_generator: false,
                        strict: true,
                        span,
                    })));
                    continue;
                }
            }
            let method_start = self.span();
            let (is_async, is_generator, accessor) = self.parse_method_modifiers();
            let key = self.parse_property_name(true)?;
            if *self.peek() == Token::LParen {
                let is_ctor = !is_static && matches!(&key, PropertyName::Static(k) if &**k == "constructor");
                if is_ctor {
                    if accessor.is_some() || is_async || is_generator {
                        return Err(raise_syntax_error!(member_start, "Class constructor may not be a special method"));
                    }
                    if constructor.is_some() {
                        return Err(raise_syntax_error!(member_start, "A class may only have one constructor"));
                    }
                    let kind = if heritage.is_some() {
                        FunctionKind::DerivedConstructor
                    } else {
                        FunctionKind::ClassConstructor
                    };
                    constructor = Some(self.parse_function_rest(method_start, None, kind, false, false)?);
                    continue;
                }
                let (fn_kind, kind) = match accessor {
                    Some(MethodKind::Getter) => (FunctionKind::Getter, MethodKind::Getter),
                    Some(MethodKind::Setter) => (FunctionKind::Setter, MethodKind::Setter),
                    _ => (FunctionKind::Method, MethodKind::Method),
                };
                let function = self.parse_function_rest(method_start, None, fn_kind, is_async, is_generator)?;
                let function = force_strict(function);
                elements.push(ClassElement::Method {
                    key,
                    kind,
                    is_static,
                    function,
                });
                continue;
            }
            if is_async || is_generator || accessor.is_some() {
                return Err(self.unexpected());
            }
            if matches!(&key, PropertyName::Static(k) if &**k == "constructor")
                || (matches!(&key, PropertyName::Static(k) if &**k == "prototype") && is_static)
            {
                return Err(raise_syntax_error!(member_start, "Classes may not have a field named 'constructor' or 'prototype'"));
            }
            let initializer = if self.eat(&Token::Assign) {
                let init_start = self.span();
                let saved = (self.in_async, self.in_generator);
                (self.in_async, self.in_generator) = (false, false);
                self.function_depth += 1;
                let value = self.parse_assignment();
                self.function_depth -= 1;
                (self.in_async, self.in_generator) = saved;
                let value = value?;
                Some(Rc::new(FunctionNode {
                    name: None,
                    params: Vec::new(),
                    body: FunctionBody::Expression(Box::new(value)),
                    kind: FunctionKind::ClassField,
                    is_async: false,
                    is_generator: false,
                    strict: true,
                    span: self.finish(init_start),
                }))
            } else {
                None
            };
            self.consume_semicolon()?;
            elements.push(ClassElement::Field {
                key,
                is_static,
                initializer,
                span: self.finish(member_start),
            });
        }
        self.no_in = saved_no_in;
        Ok(Rc::new(ClassNode {
            name,
            heritage,
            constructor,
            elements,
            span: self.finish(start),
        }))
    }

    /// Reads `async`, `*`, `get`, `set` prefixes of a method definition.
    fn parse_method_modifiers(&mut self) -> (bool, bool, Option<MethodKind>) {
        let key_follows = |p: &Self, n: usize| {
            matches!(
                p.peek_at(n),
                Token::Identifier(_) | Token::String(_) | Token::Number(_) | Token::BigInt(_) | Token::LBracket | Token::PrivateName(_)
            )
        };
        let mut is_async = false;
        let mut is_generator = false;
        let mut accessor = None;
        if self.is_ident("async") && !self.peek_data_at(1).newline_before && (key_follows(self, 1) || *self.peek_at(1) == Token::Star) {
            self.advance();
            is_async = true;
        }
        if self.eat(&Token::Star) {
            is_generator = true;
        }
        if !is_async && !is_generator && (self.is_ident("get") || self.is_ident("set")) && key_follows(self, 1) {
            accessor = Some(if self.is_ident("get") {
                MethodKind::Getter
            } else {
                MethodKind::Setter
            });
            self.advance();
        }
        (is_async, is_generator, accessor)
    }

    fn parse_property_name(&mut self, allow_private: bool) -> Result<PropertyName, JSError> {
        let saved_pos = self.pos;
        let data = self.advance();
        Ok(match data.token {
            Token::Identifier(name) | Token::String(name) => PropertyName::Static(name),
            Token::Number(n) => PropertyName::Static(number_to_string(n).into()),
            Token::BigInt(digits) => PropertyName::Static(digits.into()),
            Token::PrivateName(name) if allow_private => {
                if &*name == "constructor" {
                    return Err(raise_syntax_error!(data.span, "Classes may not have a private field named '#constructor'"));
                }
                PropertyName::Private(name)
            }
            Token::LBracket => {
                let expr = self.with_in(|p| p.parse_assignment())?;
                self.expect(&Token::RBracket)?;
                PropertyName::Computed(Box::new(expr))
            }
            _ => {
                self.pos = saved_pos;
                return Err(self.unexpected());
            }
        })
    }

    // ---- patterns ----

    /// Binding pattern with an optional default.
    fn parse_binding_target(&mut self) -> Result<Pattern, JSError> {
        let target = self.parse_binding_pattern()?;
        if *self.peek() == Token::Assign {
            self.advance();
            let default = self.with_in(|p| p.parse_assignment())?;
            return Ok(Pattern::Default {
                target: Box::new(target),
                default: Box::new(default),
            });
        }
        Ok(target)
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern, JSError> {
        let start = self.span();
        match self.peek() {
            Token::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                let mut rest = None;
                loop {
                    match self.peek() {
                        Token::RBracket => break,
                        Token::Comma => {
                            self.advance();
                            elements.push(None);
                            continue;
                        }
                        Token::Spread => {
                            self.advance();
                            rest = Some(Box::new(self.parse_binding_pattern()?));
                            break;
                        }
                        _ => elements.push(Some(self.parse_binding_target()?)),
                    }
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBracket)?;
                Ok(Pattern::Array {
                    elements,
                    rest,
                    span: self.finish(start),
                })
            }
            Token::LBrace => {
                self.advance();
                let mut properties = Vec::new();
                while *self.peek() != Token::RBrace {
                    if self.eat(&Token::Spread) {
                        let (name, span) = self.binding_identifier()?;
                        properties.push(PatternProperty::Rest(Pattern::Identifier { name, span }));
                        break;
                    }
                    let key_data = self.peek_data().clone();
                    let key = self.parse_property_name(false)?;
                    let value = if self.eat(&Token::Colon) {
                        self.parse_binding_target()?
                    } else {
                        let name = match (&key, &key_data.token) {
                            (PropertyName::Static(name), Token::Identifier(_)) if !RESERVED_WORDS.contains(&&**name) => name.clone(),
                            _ => return Err(raise_syntax_error!(key_data.span, "Unexpected token {}", key_data.token.describe())),
                        };
                        let ident = Pattern::Identifier {
                            name,
                            span: key_data.span,
                        };
                        if self.eat(&Token::Assign) {
                            let default = self.with_in(|p| p.parse_assignment())?;
                            Pattern::Default {
                                target: Box::new(ident),
                                default: Box::new(default),
                            }
                        } else {
                            ident
                        }
                    };
                    properties.push(PatternProperty::KeyValue { key, value });
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBrace)?;
                Ok(Pattern::Object {
                    properties,
                    span: self.finish(start),
                })
            }
            _ => {
                let (name, span) = self.binding_identifier()?;
                Ok(Pattern::Identifier { name, span })
            }
        }
    }

    // ---- expressions ----

    pub(crate) fn parse_expression(&mut self) -> Result<Expr, JSError> {
        let start = self.span();
        let first = self.parse_assignment()?;
        if *self.peek() != Token::Comma {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&Token::Comma) {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::new(ExprKind::Sequence(exprs), self.finish(start)))
    }

    fn parse_assignment(&mut self) -> Result<Expr, JSError> {
        if let Some(is_async) = self.arrow_ahead() {
            return self.parse_arrow_function(is_async);
        }
        if self.in_generator && self.is_ident("yield") {
            let start = self.advance().span;
            let delegate = self.eat(&Token::Star);
            let data = self.peek_data();
            let argument = if data.newline_before
                || matches!(data.token, Token::RParen | Token::RBracket | Token::RBrace | Token::Comma | Token::Semicolon | Token::Colon | Token::Eof)
            {
                None
            } else {
                Some(Box::new(self.parse_assignment()?))
            };
            return Ok(Expr::new(ExprKind::Yield { argument, delegate }, self.finish(start)));
        }
        let start = self.span();
        let left = self.parse_conditional()?;
        match self.peek().clone() {
            Token::Assign => {
                self.advance();
                let target = expr_to_pattern(left)?;
                let value = self.parse_assignment()?;
                Ok(Expr::new(
                    ExprKind::Assign {
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                    self.finish(start),
                ))
            }
            Token::CompoundAssign(op) => {
                if !matches!(left.kind, ExprKind::Identifier(_) | ExprKind::Member { optional: false, .. } | ExprKind::SuperMember { .. }) {
                    return Err(raise_syntax_error!(left.span, "Invalid left-hand side in assignment"));
                }
                self.advance();
                let value = self.parse_assignment()?;
                Ok(Expr::new(
                    ExprKind::CompoundAssign {
                        op,
                        target: Box::new(left),
                        value: Box::new(value),
                    },
                    self.finish(start),
                ))
            }
            _ => Ok(left),
        }
    }

    fn parse_conditional(&mut self) -> Result<Expr, JSError> {
        let start = self.span();
        let test = self.parse_binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.with_in(|p| p.parse_assignment())?;
        self.expect(&Token::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            self.finish(start),
        ))
    }

    fn binary_operator(&self) -> Option<(u8, Result<BinaryOp, LogicalOp>)> {
        Some(match self.peek() {
            Token::NullishCoalescing => (1, Err(LogicalOp::Nullish)),
            Token::LogicalOr => (1, Err(LogicalOp::Or)),
            Token::LogicalAnd => (2, Err(LogicalOp::And)),
            Token::BitOr => (3, Ok(BinaryOp::BitOr)),
            Token::BitXor => (4, Ok(BinaryOp::BitXor)),
            Token::BitAnd => (5, Ok(BinaryOp::BitAnd)),
            Token::Equal => (6, Ok(BinaryOp::Equal)),
            Token::NotEqual => (6, Ok(BinaryOp::NotEqual)),
            Token::StrictEqual => (6, Ok(BinaryOp::StrictEqual)),
            Token::StrictNotEqual => (6, Ok(BinaryOp::StrictNotEqual)),
            Token::LessThan => (7, Ok(BinaryOp::LessThan)),
            Token::GreaterThan => (7, Ok(BinaryOp::GreaterThan)),
            Token::LessEqual => (7, Ok(BinaryOp::LessEqual)),
            Token::GreaterEqual => (7, Ok(BinaryOp::GreaterEqual)),
            Token::Identifier(w) if &**w == "instanceof" => (7, Ok(BinaryOp::InstanceOf)),
            Token::Identifier(w) if &**w == "in" && !self.no_in => (7, Ok(BinaryOp::In)),
            Token::ShiftLeft => (8, Ok(BinaryOp::Shl)),
            Token::ShiftRight => (8, Ok(BinaryOp::Shr)),
            Token::UnsignedShiftRight => (8, Ok(BinaryOp::UShr)),
            Token::Plus => (9, Ok(BinaryOp::Add)),
            Token::Minus => (9, Ok(BinaryOp::Sub)),
            Token::Star => (10, Ok(BinaryOp::Mul)),
            Token::Slash => (10, Ok(BinaryOp::Div)),
            Token::Percent => (10, Ok(BinaryOp::Mod)),
            Token::Exponent => (11, Ok(BinaryOp::Exp)),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, JSError> {
        let start = self.span();
        let mut left = if matches!(self.peek(), Token::PrivateName(_)) && self.peek_at(1).is_identifier("in") {
            let Token::PrivateName(name) = self.advance().token else {
                return Err(self.unexpected());
            };
            self.advance();
            let object = self.parse_binary(8)?;
            Expr::new(
                ExprKind::PrivateIn {
                    name,
                    object: Box::new(object),
                },
                self.finish(start),
            )
        } else {
            self.parse_unary()?
        };
        while let Some((prec, op)) = self.binary_operator() {
            if prec <= min_prec {
                break;
            }
            if prec == 11 && matches!(left.kind, ExprKind::Unary { .. }) && !self.is_parenthesized(&left) {
                return Err(raise_syntax_error!(
                    self.span(),
                    "Unary operator used immediately before exponentiation expression. Parenthesis must be used to disambiguate operator precedence"
                ));
            }
            self.advance();
            // `**` is right-associative
            let right = if prec == 11 { self.parse_binary(10)? } else { self.parse_binary(prec)? };
            let span = self.finish(start);
            left = match op {
                Ok(op) => Expr::new(
                    ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                ),
                Err(op) => Expr::new(
                    ExprKind::Logical {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                ),
            };
        }
        Ok(left)
    }

    fn is_parenthesized(&self, expr: &Expr) -> bool {
        source_slice(self.source, &expr.span).starts_with('(')
    }

    fn parse_unary(&mut self) -> Result<Expr, JSError> {
        let start = self.span();
        let op = match self.peek() {
            Token::Minus => Some(UnaryOp::Minus),
            Token::Plus => Some(UnaryOp::Plus),
            Token::LogicalNot => Some(UnaryOp::Not),
            Token::BitNot => Some(UnaryOp::BitNot),
            Token::Identifier(w) if &**w == "typeof" => Some(UnaryOp::TypeOf),
            Token::Identifier(w) if &**w == "void" => Some(UnaryOp::Void),
            Token::Identifier(w) if &**w == "delete" => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let argument = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    argument: Box::new(argument),
                },
                self.finish(start),
            ));
        }
        if matches!(self.peek(), Token::Increment | Token::Decrement) {
            let increment = self.advance().token == Token::Increment;
            let target = self.parse_unary()?;
            check_update_target(&target)?;
            return Ok(Expr::new(
                ExprKind::Update {
                    increment,
                    prefix: true,
                    target: Box::new(target),
                },
                self.finish(start),
            ));
        }
        if self.is_ident("await") && self.await_allowed() {
            self.advance();
            if self.function_depth == 0 {
                self.saw_top_level_await = true;
            }
            let argument = self.parse_unary()?;
            return Ok(Expr::new(ExprKind::Await(Box::new(argument)), self.finish(start)));
        }
        let expr = self.parse_left_hand_side()?;
        if matches!(self.peek(), Token::Increment | Token::Decrement) && !self.peek_data().newline_before {
            check_update_target(&expr)?;
            let increment = self.advance().token == Token::Increment;
            return Ok(Expr::new(
                ExprKind::Update {
                    increment,
                    prefix: false,
                    target: Box::new(expr),
                },
                self.finish(start),
            ));
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, JSError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        self.with_in(|p| {
            while *p.peek() != Token::RParen {
                if p.eat(&Token::Spread) {
                    args.push(Argument::Spread(p.parse_assignment()?));
                } else {
                    args.push(Argument::Item(p.parse_assignment()?));
                }
                if !p.eat(&Token::Comma) {
                    break;
                }
            }
            Ok(())
        })?;
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn parse_member_property(&mut self) -> Result<MemberProperty, JSError> {
        let saved_pos = self.pos;
        let data = self.advance();
        match data.token {
            Token::Identifier(name) => Ok(MemberProperty::Static(name)),
            Token::PrivateName(name) => Ok(MemberProperty::Private(name)),
            _ => {
                self.pos = saved_pos;
                Err(self.unexpected())
            }
        }
    }

    fn parse_super(&mut self) -> Result<Expr, JSError> {
        let start = self.advance().span;
        match self.peek() {
            Token::LParen => {
                let arguments = self.parse_arguments()?;
                Ok(Expr::new(ExprKind::SuperCall { arguments }, self.finish(start)))
            }
            Token::Dot => {
                self.advance();
                let property = self.parse_member_property()?;
                if matches!(property, MemberProperty::Private(_)) {
                    return Err(raise_syntax_error!(self.last_span, "Unexpected private field"));
                }
                Ok(Expr::new(ExprKind::SuperMember { property }, self.finish(start)))
            }
            Token::LBracket => {
                self.advance();
                let expr = self.with_in(|p| p.parse_expression())?;
                self.expect(&Token::RBracket)?;
                Ok(Expr::new(
                    ExprKind::SuperMember {
                        property: MemberProperty::Computed(Box::new(expr)),
                    },
                    self.finish(start),
                ))
            }
            _ => Err(raise_syntax_error!(start, "'super' keyword unexpected here")),
        }
    }

    fn parse_new(&mut self) -> Result<Expr, JSError> {
        let start = self.advance().span;
        if self.eat(&Token::Dot) {
            self.expect_ident("target")?;
            if self.function_depth == 0 {
                return Err(raise_syntax_error!(start, "new.target expression is not allowed here"));
            }
            return Ok(Expr::new(ExprKind::NewTarget, self.finish(start)));
        }
        let mut callee = if self.is_ident("new") {
            self.parse_new()?
        } else if self.is_ident("super") {
            self.parse_super()?
        } else {
            self.parse_primary()?
        };
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let property = self.parse_member_property()?;
                    callee = Expr::new(
                        ExprKind::Member {
                            object: Box::new(callee),
                            property,
                            optional: false,
                        },
                        self.finish(start),
                    );
                }
                Token::LBracket => {
                    self.advance();
                    let expr = self.with_in(|p| p.parse_expression())?;
                    self.expect(&Token::RBracket)?;
                    callee = Expr::new(
                        ExprKind::Member {
                            object: Box::new(callee),
                            property: MemberProperty::Computed(Box::new(expr)),
                            optional: false,
                        },
                        self.finish(start),
                    );
                }
                Token::Template { .. } => callee = self.parse_tagged_template(callee, start)?,
                Token::OptionalChain => return Err(raise_syntax_error!(self.span(), "Invalid optional chain from new expression")),
                _ => break,
            }
        }
        let arguments = if *self.peek() == Token::LParen {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                arguments,
            },
            self.finish(start),
        ))
    }

    fn parse_left_hand_side(&mut self) -> Result<Expr, JSError> {
        let start = self.span();
        let mut expr = if self.is_ident("new") {
            self.parse_new()?
        } else if self.is_ident("super") {
            self.parse_super()?
        } else {
            self.parse_primary()?
        };
        let mut in_chain = false;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let property = self.parse_member_property()?;
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                            optional: false,
                        },
                        self.finish(start),
                    );
                }
                Token::OptionalChain => {
                    self.advance();
                    in_chain = true;
                    match self.peek() {
                        Token::LParen => {
                            let arguments = self.parse_arguments()?;
                            expr = Expr::new(
                                ExprKind::Call {
                                    callee: Box::new(expr),
                                    arguments,
                                    optional: true,
                                },
                                self.finish(start),
                            );
                        }
                        Token::LBracket => {
                            self.advance();
                            let prop = self.with_in(|p| p.parse_expression())?;
                            self.expect(&Token::RBracket)?;
                            expr = Expr::new(
                                ExprKind::Member {
                                    object: Box::new(expr),
                                    property: MemberProperty::Computed(Box::new(prop)),
                                    optional: true,
                                },
                                self.finish(start),
                            );
                        }
                        _ => {
                            let property = self.parse_member_property()?;
                            expr = Expr::new(
                                ExprKind::Member {
                                    object: Box::new(expr),
                                    property,
                                    optional: true,
                                },
                                self.finish(start),
                            );
                        }
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let prop = self.with_in(|p| p.parse_expression())?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property: MemberProperty::Computed(Box::new(prop)),
                            optional: false,
                        },
                        self.finish(start),
                    );
                }
                Token::LParen => {
                    let arguments = self.parse_arguments()?;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            arguments,
                            optional: false,
                        },
                        self.finish(start),
                    );
                }
                Token::Template { .. } => {
                    if in_chain {
                        return Err(raise_syntax_error!(self.span(), "Invalid tagged template on optional chain"));
                    }
                    expr = self.parse_tagged_template(expr, start)?;
                }
                _ => break,
            }
        }
        if in_chain {
            let span = expr.span;
            expr = Expr::new(ExprKind::OptionalChain(Box::new(expr)), span);
        }
        Ok(expr)
    }

    fn parse_tagged_template(&mut self, tag: Expr, start: Span) -> Result<Expr, JSError> {
        let data = self.advance();
        let Token::Template { quasis, exprs } = data.token else {
            return Err(self.unexpected());
        };
        let exprs = exprs.into_iter().map(|tokens| self.parse_sub_expression(tokens)).collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::new(
            ExprKind::TaggedTemplate {
                tag: Box::new(tag),
                quasis: Rc::new(quasis),
                exprs,
            },
            self.finish(start),
        ))
    }

    /// Parses the tokens of a `${...}` template substitution.
    fn parse_sub_expression(&mut self, mut tokens: Vec<TokenData>) -> Result<Expr, JSError> {
        let end = tokens.last().map(|t| t.span).unwrap_or(self.last_span);
        if tokens.is_empty() {
            return Err(raise_syntax_error!(end, "Unexpected token '}}'"));
        }
        tokens.push(TokenData {
            token: Token::Eof,
            span: Span {
                start: end.end,
                end: end.end,
                line: end.line,
                column: end.column,
            },
            newline_before: false,
        });
        let saved_tokens = std::mem::replace(&mut self.tokens, tokens);
        let saved_pos = self.pos;
        let saved_last = self.last_span;
        self.pos = 0;
        let result = self.with_in(|p| {
            let expr = p.parse_expression()?;
            p.expect(&Token::Eof)?;
            Ok(expr)
        });
        self.tokens = saved_tokens;
        self.pos = saved_pos;
        self.last_span = saved_last;
        result
    }

    fn parse_primary(&mut self) -> Result<Expr, JSError> {
        let data = self.peek_data().clone();
        let start = data.span;
        match data.token {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Number(n), start))
            }
            Token::String(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::String(s), start))
            }
            Token::BigInt(digits) => {
                self.advance();
                Ok(Expr::new(ExprKind::BigInt(digits), start))
            }
            Token::Regex { pattern, flags } => {
                self.advance();
                Ok(Expr::new(ExprKind::RegExp { pattern, flags }, start))
            }
            Token::Template { quasis, exprs } => {
                self.advance();
                if quasis.iter().any(|q| q.cooked.is_none()) {
                    return Err(raise_syntax_error!(start, "Invalid escape sequence in template"));
                }
                let exprs = exprs.into_iter().map(|tokens| self.parse_sub_expression(tokens)).collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::new(ExprKind::Template { quasis, exprs }, start))
            }
            Token::LParen => {
                self.advance();
                let expr = self.with_in(|p| p.parse_expression())?;
                self.expect(&Token::RParen)?;
                Ok(Expr::new(expr.kind, self.finish(start)))
            }
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_object_literal(),
            Token::Identifier(name) => match &*name {
                "this" => {
                    self.advance();
                    Ok(Expr::new(ExprKind::This, start))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::new(ExprKind::Null, start))
                }
                "true" | "false" => {
                    self.advance();
                    Ok(Expr::new(ExprKind::Boolean(&*name == "true"), start))
                }
                "function" => {
                    let f = self.parse_function(start, false, false)?;
                    let span = f.span;
                    Ok(Expr::new(ExprKind::Function(f), span))
                }
                "async" if self.peek_at(1).is_identifier("function") && !self.peek_data_at(1).newline_before => {
                    self.advance();
                    let f = self.parse_function(start, true, false)?;
                    let span = f.span;
                    Ok(Expr::new(ExprKind::Function(f), span))
                }
                "class" => {
                    let c = self.parse_class(false)?;
                    let span = c.span;
                    Ok(Expr::new(ExprKind::Class(c), span))
                }
                "import" => Err(raise_unsupported!("dynamic import")),
                _ if RESERVED_WORDS.contains(&&*name) => Err(self.unexpected()),
                _ => {
                    let (name, span) = self.binding_identifier()?;
                    Ok(Expr::new(ExprKind::Identifier(name), span))
                }
            },
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, JSError> {
        let start = self.advance().span;
        let mut elements = Vec::new();
        self.with_in(|p| {
            loop {
                match p.peek() {
                    Token::RBracket => break,
                    Token::Comma => {
                        p.advance();
                        elements.push(None);
                        continue;
                    }
                    Token::Spread => {
                        p.advance();
                        elements.push(Some(ArrayElement::Spread(p.parse_assignment()?)));
                    }
                    _ => elements.push(Some(ArrayElement::Item(p.parse_assignment()?))),
                }
                if !p.eat(&Token::Comma) {
                    break;
                }
            }
            Ok(())
        })?;
        self.expect(&Token::RBracket)?;
        Ok(Expr::new(ExprKind::Array(elements), self.finish(start)))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, JSError> {
        let start = self.advance().span;
        let mut members = Vec::new();
        let saved = self.no_in;
        self.no_in = false;
        while *self.peek() != Token::RBrace {
            if self.eat(&Token::Spread) {
                members.push(ObjectMember::Spread(self.parse_assignment()?));
            } else {
                members.push(self.parse_object_member()?);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.no_in = saved;
        self.expect(&Token::RBrace)?;
        Ok(Expr::new(ExprKind::Object(members), self.finish(start)))
    }

    fn parse_object_member(&mut self) -> Result<ObjectMember, JSError> {
        let member_start = self.span();
        let (is_async, is_generator, accessor) = self.parse_method_modifiers();
        let key_data = self.peek_data().clone();
        let key = self.parse_property_name(false)?;
        if *self.peek() == Token::LParen {
            let (fn_kind, kind) = match accessor {
                Some(MethodKind::Getter) => (FunctionKind::Getter, MethodKind::Getter),
                Some(MethodKind::Setter) => (FunctionKind::Setter, MethodKind::Setter),
                _ => (FunctionKind::Method, MethodKind::Method),
            };
            let function = self.parse_function_rest(member_start, None, fn_kind, is_async, is_generator)?;
            return Ok(ObjectMember::Method { key, kind, function });
        }
        if is_async || is_generator || accessor.is_some() {
            return Err(self.unexpected());
        }
        if self.eat(&Token::Colon) {
            let value = self.parse_assignment()?;
            return Ok(ObjectMember::Property {
                key,
                value,
                shorthand: false,
            });
        }
        let name = match (&key, &key_data.token) {
            (PropertyName::Static(name), Token::Identifier(_)) if !RESERVED_WORDS.contains(&&**name) => name.clone(),
            _ => return Err(self.unexpected()),
        };
        if (&*name == "await" && self.in_async) || (&*name == "yield" && self.in_generator) {
            return Err(raise_syntax_error!(key_data.span, "Unexpected reserved word"));
        }
        if *self.peek() == Token::Assign {
            self.advance();
            let default = self.parse_assignment()?;
            return Ok(ObjectMember::CoverInitialized {
                name,
                default,
                span: self.finish(member_start),
            });
        }
        Ok(ObjectMember::Property {
            key,
            value: Expr::new(ExprKind::Identifier(name), key_data.span),
            shorthand: true,
        })
    }
}

fn force_strict(function: Rc<FunctionNode>) -> Rc<FunctionNode> {
    if function.strict {
        return function;
    }
    let mut node = (*function).clone();
    node.strict = true;
    Rc::new(node)
}

fn check_update_target(expr: &Expr) -> Result<(), JSError> {
    match &expr.kind {
        ExprKind::Identifier(_) | ExprKind::Member { optional: false, .. } | ExprKind::SuperMember { .. } => Ok(()),
        _ => Err(raise_syntax_error!(expr.span, "Invalid left-hand side expression in postfix operation")),
    }
}

/// Reinterprets an expression as an assignment target.
fn expr_to_pattern(expr: Expr) -> Result<Pattern, JSError> {
    let span = expr.span;
    match expr.kind {
        ExprKind::Identifier(name) => Ok(Pattern::Identifier { name, span }),
        ExprKind::Member { optional: false, .. } | ExprKind::SuperMember { .. } => Ok(Pattern::Expression(Box::new(expr))),
        ExprKind::Assign { target, value } => Ok(Pattern::Default {
            target,
            default: value,
        }),
        ExprKind::Array(elements) => {
            let mut out = Vec::new();
            let mut rest = None;
            let count = elements.len();
            for (i, element) in elements.into_iter().enumerate() {
                match element {
                    None => out.push(None),
                    Some(ArrayElement::Item(e)) => out.push(Some(expr_to_pattern(e)?)),
                    Some(ArrayElement::Spread(e)) => {
                        if i + 1 != count {
                            return Err(raise_syntax_error!(e.span, "Rest element must be last element"));
                        }
                        rest = Some(Box::new(expr_to_pattern(e)?));
                    }
                }
            }
            Ok(Pattern::Array {
                elements: out,
                rest,
                span,
            })
        }
        ExprKind::Object(members) => {
            let mut properties = Vec::new();
            for member in members {
                match member {
                    ObjectMember::Property { key, value, .. } => properties.push(PatternProperty::KeyValue {
                        key,
                        value: expr_to_pattern(value)?,
                    }),
                    ObjectMember::CoverInitialized { name, default, span } => properties.push(PatternProperty::KeyValue {
                        key: PropertyName::Static(name.clone()),
                        value: Pattern::Default {
                            target: Box::new(Pattern::Identifier { name, span }),
                            default: Box::new(default),
                        },
                    }),
                    ObjectMember::Spread(e) => properties.push(PatternProperty::Rest(expr_to_pattern(e)?)),
                    ObjectMember::Method { function, .. } => {
                        return Err(raise_syntax_error!(function.span, "Invalid destructuring assignment target"));
                    }
                }
            }
            Ok(Pattern::Object { properties, span })
        }
        _ => Err(raise_syntax_error!(span, "Invalid left-hand side in assignment")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_span_covers_exact_source() {
        let src = "function f( a ) {  return a }; f";
        let program = parse_program(src).unwrap();
        match &program.body[0].kind {
            StatementKind::FunctionDecl(f) => assert_eq!(source_slice(src, &f.span), "function f( a ) {  return a }"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn arrow_and_parenthesized_expressions() {
        let program = parse_program("(a, b) => a + b; (1, 2)").unwrap();
        assert!(matches!(&program.body[0].kind, StatementKind::Expr(Expr { kind: ExprKind::Function(f), .. }) if f.is_arrow()));
        assert!(matches!(&program.body[1].kind, StatementKind::Expr(Expr { kind: ExprKind::Sequence(v), .. }) if v.len() == 2));
    }

    #[test]
    fn top_level_await_is_recorded() {
        assert!(parse_program("await 1").unwrap().has_top_level_await);
        assert!(!parse_program("async function f() { await 1 }").unwrap().has_top_level_await);
    }

    #[test]
    fn asi_and_restricted_productions() {
        let program = parse_program("let a = 1\nlet b = a\n++b").unwrap();
        assert_eq!(program.body.len(), 3);
        assert!(parse_program("let a = 1 let b").is_err());
    }

    #[test]
    fn destructuring_assignment_targets() {
        let program = parse_program("[a, {b = 2, ...c}] = x").unwrap();
        match &program.body[0].kind {
            StatementKind::Expr(Expr {
                kind: ExprKind::Assign { target, .. },
                ..
            }) => {
                let mut names = Vec::new();
                target.bound_names(&mut names);
                assert_eq!(names.iter().map(|n| n.to_string()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_program("1 = 2").is_err());
    }
}
