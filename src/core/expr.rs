use crate::core::statement::Statement;
use crate::core::token::{AssignOp, Span, TemplateQuasi};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
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
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    InstanceOf,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

impl LogicalOp {
    pub fn from_assign(op: AssignOp) -> Option<LogicalOp> {
        match op {
            AssignOp::And => Some(LogicalOp::And),
            AssignOp::Or => Some(LogicalOp::Or),
            AssignOp::Nullish => Some(LogicalOp::Nullish),
            _ => None,
        }
    }
}

impl BinaryOp {
    pub fn from_assign(op: AssignOp) -> Option<BinaryOp> {
        Some(match op {
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Mod => BinaryOp::Mod,
            AssignOp::Exp => BinaryOp::Exp,
            AssignOp::Shl => BinaryOp::Shl,
            AssignOp::Shr => BinaryOp::Shr,
            AssignOp::UShr => BinaryOp::UShr,
            AssignOp::BitAnd => BinaryOp::BitAnd,
            AssignOp::BitOr => BinaryOp::BitOr,
            AssignOp::BitXor => BinaryOp::BitXor,
            AssignOp::And | AssignOp::Or | AssignOp::Nullish => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum MemberProperty {
    Static(Rc<str>),
    Computed(Box<Expr>),
    Private(Rc<str>),
}

#[derive(Debug, Clone)]
pub enum PropertyName {
    Static(Rc<str>),
    Computed(Box<Expr>),
    Private(Rc<str>),
}

#[derive(Debug, Clone)]
pub enum ArrayElement {
    Item(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum Argument {
    Item(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

#[derive(Debug, Clone)]
pub enum ObjectMember {
    /// `key: value`; `shorthand` is set for `{ a }`.
    Property {
        key: PropertyName,
        value: Expr,
        shorthand: bool,
    },
    /// `{ a = 1 }`, only valid once reinterpreted as a pattern.
    CoverInitialized { name: Rc<str>, default: Expr, span: Span },
    Method {
        key: PropertyName,
        kind: MethodKind,
        function: Rc<FunctionNode>,
    },
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(f64),
    String(Rc<str>),
    Boolean(bool),
    Null,
    Undefined,
    BigInt(String),
    RegExp {
        pattern: String,
        flags: String,
    },
    Template {
        quasis: Vec<TemplateQuasi>,
        exprs: Vec<Expr>,
    },
    TaggedTemplate {
        tag: Box<Expr>,
        quasis: Rc<Vec<TemplateQuasi>>,
        exprs: Vec<Expr>,
    },
    Identifier(Rc<str>),
    This,
    NewTarget,
    /// `None` entries are holes.
    Array(Vec<Option<ArrayElement>>),
    Object(Vec<ObjectMember>),
    Function(Rc<FunctionNode>),
    Class(Rc<ClassNode>),
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `#x in obj`
    PrivateIn {
        name: Rc<str>,
        object: Box<Expr>,
    },
    Assign {
        target: Box<Pattern>,
        value: Box<Expr>,
    },
    CompoundAssign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: MemberProperty,
        optional: bool,
    },
    SuperMember {
        property: MemberProperty,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Argument>,
        optional: bool,
    },
    SuperCall {
        arguments: Vec<Argument>,
    },
    New {
        callee: Box<Expr>,
        arguments: Vec<Argument>,
    },
    /// Boundary of an optional chain; short-circuits to undefined.
    OptionalChain(Box<Expr>),
    Sequence(Vec<Expr>),
    Await(Box<Expr>),
    Yield {
        argument: Option<Box<Expr>>,
        delegate: bool,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    /// True for anonymous function/class expressions that take the binding name.
    pub fn is_anonymous_function_definition(&self) -> bool {
        match &self.kind {
            ExprKind::Function(f) => f.name.is_none(),
            ExprKind::Class(c) => c.name.is_none(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PatternProperty {
    KeyValue { key: PropertyName, value: Pattern },
    Rest(Pattern),
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Identifier { name: Rc<str>, span: Span },
    /// Assignment target such as `a.b` or `a[0]` (assignment patterns only).
    Expression(Box<Expr>),
    /// `None` entries are elisions.
    Array {
        elements: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
        span: Span,
    },
    Object {
        properties: Vec<PatternProperty>,
        span: Span,
    },
    Default {
        target: Box<Pattern>,
        default: Box<Expr>,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Identifier { span, .. } | Pattern::Array { span, .. } | Pattern::Object { span, .. } => *span,
            Pattern::Expression(e) => e.span,
            Pattern::Default { target, default } => target.span().to(&default.span),
        }
    }

    /// Every identifier this pattern binds, in source order.
    pub fn bound_names(&self, out: &mut Vec<Rc<str>>) {
        match self {
            Pattern::Identifier { name, .. } => out.push(name.clone()),
            Pattern::Expression(_) => {}
            Pattern::Array { elements, rest, .. } => {
                for p in elements.iter().flatten() {
                    p.bound_names(out);
                }
                if let Some(r) = rest {
                    r.bound_names(out);
                }
            }
            Pattern::Object { properties, .. } => {
                for p in properties {
                    match p {
                        PatternProperty::KeyValue { value, .. } => value.bound_names(out),
                        PatternProperty::Rest(r) => r.bound_names(out),
                    }
                }
            }
            Pattern::Default { target, .. } => target.bound_names(out),
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self, Pattern::Identifier { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub pattern: Pattern,
    pub rest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Arrow,
    Method,
    Getter,
    Setter,
    ClassConstructor,
    DerivedConstructor,
    ClassField,
    StaticBlock,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    /// Concise arrow body.
    Expression(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub name: Option<Rc<str>>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub kind: FunctionKind,
    pub is_async: bool,
    pub is_generator: bool,
    /// Body starts with a `"use strict"` directive.
    pub strict: bool,
    pub span: Span,
}

impl FunctionNode {
    pub fn is_arrow(&self) -> bool {
        self.kind == FunctionKind::Arrow
    }

    /// Simple parameter lists get a mapped `arguments` object in sloppy mode.
    pub fn has_simple_params(&self) -> bool {
        self.params.iter().all(|p| !p.rest && p.pattern.is_simple())
    }

    /// Number of parameters before the first rest or defaulted one.
    pub fn expected_argument_count(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| !p.rest && !matches!(p.pattern, Pattern::Default { .. }))
            .count()
    }

    pub fn body_statements(&self) -> &[Statement] {
        match &self.body {
            FunctionBody::Block(stmts) => stmts,
            FunctionBody::Expression(_) => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClassElement {
    Method {
        key: PropertyName,
        kind: MethodKind,
        is_static: bool,
        function: Rc<FunctionNode>,
    },
    Field {
        key: PropertyName,
        is_static: bool,
        /// Initializer wrapped as a field function so it runs with the instance as `this`.
        initializer: Option<Rc<FunctionNode>>,
        span: Span,
    },
    StaticBlock(Rc<FunctionNode>),
}

#[derive(Debug, Clone)]
pub struct ClassNode {
    pub name: Option<Rc<str>>,
    pub heritage: Option<Box<Expr>>,
    pub constructor: Option<Rc<FunctionNode>>,
    pub elements: Vec<ClassElement>,
    pub span: Span,
}
