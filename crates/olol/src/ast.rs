use std::{fmt, sync::Arc};

/// A source position (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Pos {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A declared type name.
///
/// Class targets are stored by their uppercase simple name and resolved
/// against the environment chain when the cast or declaration is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeName {
    Nothin,
    Integr,
    Dubble,
    Strin,
    Bool,
    Bukkit,
    Baskit,
    Class(String),
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothin => f.write_str("NOTHIN"),
            Self::Integr => f.write_str("INTEGR"),
            Self::Dubble => f.write_str("DUBBLE"),
            Self::Strin => f.write_str("STRIN"),
            Self::Bool => f.write_str("BOOL"),
            Self::Bukkit => f.write_str("BUKKIT"),
            Self::Baskit => f.write_str("BASKIT"),
            Self::Class(name) => f.write_str(name),
        }
    }
}

/// A literal value as written in source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Nothin,
    Int(i64),
    Dubble(f64),
    Strin(String),
    Bool(bool),
}

/// Binary operators, named after their surface keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    /// `OR` - logical or (short-circuit).
    Or,
    /// `AN` - logical and (short-circuit).
    An,
    /// `SAEM AS` - equality.
    SaemAs,
    /// `BIGGR THAN` - greater than.
    BiggrThan,
    /// `SMALLR THAN` - less than.
    SmallrThan,
    /// `MOAR` - addition (string concatenation for STRIN operands).
    Moar,
    /// `LES` - subtraction.
    Les,
    /// `TIEMZ` - multiplication.
    Tiemz,
    /// `DIVIDEZ` - division.
    Dividez,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Or => "OR",
            Self::An => "AN",
            Self::SaemAs => "SAEM AS",
            Self::BiggrThan => "BIGGR THAN",
            Self::SmallrThan => "SMALLR THAN",
            Self::Moar => "MOAR",
            Self::Les => "LES",
            Self::Tiemz => "TIEMZ",
            Self::Dividez => "DIVIDEZ",
        };
        f.write_str(text)
    }
}

/// Target of a function-call expression: a bare name or a `DO` method call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Callee {
    /// `NAME WIT args` - call a function visible in the environment chain.
    Name(String),
    /// `obj DO NAME [WIT args]` - call a method on the receiver.
    Method { object: Box<Expr>, name: String },
}

/// An expression node. Every variant carries the position of its first token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal {
        value: Literal,
        pos: Pos,
    },
    Identifier {
        name: String,
        pos: Pos,
    },
    /// Member access by juxtaposition: `obj MEMBER`.
    Member {
        object: Box<Expr>,
        member: String,
        pos: Pos,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    /// `NOT expr` - boolean negation of the operand's truthiness.
    Not {
        operand: Box<Expr>,
        pos: Pos,
    },
    /// `expr AS TYPE`.
    Cast {
        expr: Box<Expr>,
        target: TypeName,
        pos: Pos,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
        pos: Pos,
    },
    /// `NEW CLASS [WIT args]`.
    New {
        class_name: String,
        args: Vec<Expr>,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Self::Literal { pos, .. }
            | Self::Identifier { pos, .. }
            | Self::Member { pos, .. }
            | Self::Binary { pos, .. }
            | Self::Not { pos, .. }
            | Self::Cast { pos, .. }
            | Self::Call { pos, .. }
            | Self::New { pos, .. } => *pos,
        }
    }
}

/// Where an import pulls its declarations from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImportSource {
    /// `I CAN HAS STDIO?` - a registered builtin module, by uppercase name.
    Builtin(String),
    /// `I CAN HAS "path/to/mod"?` - a source file on disk.
    File(String),
}

/// `I CAN HAS …?` - merge declarations from another module.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImportDecl {
    pub source: ImportSource,
    /// Selected declaration names; empty means "all public".
    pub names: Vec<String>,
    pub pos: Pos,
}

/// A variable declaration, top-level (`HAI ME TEH`), local (`I HAS A`), or
/// class member (`DIS TEH`).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VarDecl {
    pub name: String,
    pub type_name: TypeName,
    pub init: Option<Expr>,
    pub locked: bool,
    pub docs: Vec<String>,
    pub pos: Pos,
}

/// A single function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Param {
    pub name: String,
    pub type_name: TypeName,
}

/// A function declaration.
///
/// `shared` is meaningful only inside a class body, where it is `Some`; at
/// top level it stays `None`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FuncDecl {
    pub name: String,
    pub return_type: Option<TypeName>,
    pub params: Vec<Param>,
    pub body: Arc<Block>,
    pub shared: Option<bool>,
    pub docs: Vec<String>,
    pub pos: Pos,
}

/// One member of a class body. Visibility comes from the sticky
/// `EVRYONE`/`MAHSELF` sections.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassMember {
    pub public: bool,
    pub shared: bool,
    pub kind: MemberKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MemberKind {
    Variable(VarDecl),
    Function(FuncDecl),
}

/// A class declaration with optional `KITTEH OF` parent.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassDecl {
    pub name: String,
    pub parent: Option<String>,
    pub members: Vec<ClassMember>,
    pub docs: Vec<String>,
    pub pos: Pos,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Import(ImportDecl),
    VarDecl(VarDecl),
    FuncDecl(FuncDecl),
    ClassDecl(ClassDecl),
    /// `target ITZ value` where target is an identifier or member access.
    Assign {
        target: Expr,
        value: Expr,
        pos: Pos,
    },
    /// `IZ cond ? then [NOPE else] KTHX`.
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
        pos: Pos,
    },
    /// `WHILE cond body KTHX`.
    While {
        cond: Expr,
        body: Block,
        pos: Pos,
    },
    /// `GIVEZ expr` or `GIVEZ UP`.
    Return {
        value: Option<Expr>,
        pos: Pos,
    },
    /// `MAYB body OOPSIE name catch [ALWAYZ finally] KTHX`.
    Try {
        body: Block,
        catch_var: String,
        catch_body: Block,
        finally_body: Option<Block>,
        pos: Pos,
    },
    /// `OOPS expr`.
    Throw {
        value: Expr,
        pos: Pos,
    },
    Expr(Expr),
}

/// A sequence of statements sharing one scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Block {
    pub stmts: Vec<Stmt>,
}

/// A parsed program: the ordered top-level statement list.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Program {
    pub stmts: Vec<Stmt>,
}
