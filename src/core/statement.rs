use crate::core::expr::{ClassNode, Expr, FunctionNode, Pattern};
use crate::core::token::Span;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Clone, Debug)]
pub struct VarDeclarator {
    pub target: Pattern,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug)]
pub struct VarDeclaration {
    pub kind: VarKind,
    pub declarations: Vec<VarDeclarator>,
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    /// `None` marks the `default` clause.
    pub test: Option<Expr>,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug)]
pub enum ForInit {
    Declaration(VarDeclaration),
    Expression(Expr),
}

/// Left side of `for-in` / `for-of`.
#[derive(Clone, Debug)]
pub enum ForHead {
    Declaration(VarKind, Pattern),
    Target(Pattern),
}

#[derive(Clone, Debug)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum StatementKind {
    Expr(Expr),
    VarDecl(VarDeclaration),
    FunctionDecl(Rc<FunctionNode>),
    ClassDecl(Rc<ClassNode>),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Statement>,
    },
    ForIn {
        head: ForHead,
        object: Expr,
        body: Box<Statement>,
    },
    ForOf {
        head: ForHead,
        iterable: Expr,
        body: Box<Statement>,
        is_await: bool,
    },
    While {
        test: Expr,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        test: Expr,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Block(Vec<Statement>),
    Empty,
    Break(Option<Rc<str>>),
    Continue(Option<Rc<str>>),
    Labeled {
        label: Rc<str>,
        body: Box<Statement>,
    },
    Try {
        block: Vec<Statement>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Statement>>,
    },
    Throw(Expr),
    Debugger,
    /// `import` / `export` declarations; parsed so they can be reported.
    ModuleDecl(&'static str),
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Statement { kind, span }
    }
}

/// A parsed script.
#[derive(Clone, Debug)]
pub struct Program {
    pub body: Vec<Statement>,
    pub strict: bool,
    /// The script contains a top-level `await`.
    pub has_top_level_await: bool,
}
