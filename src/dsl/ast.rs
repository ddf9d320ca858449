// DSL Abstract Syntax
//
// Expressions live in a per-compilation arena and are addressed by `ExprId`;
// statements and declarations are owned trees. The semantic analyzer records
// each expression's resolved type back into the arena.

use crate::dsl::types::TypeRef;

/// Source position attached to every expression, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// Handle to an expression in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// Comparison operators the DSL supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Casts the analyzer may insert without source-level spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    SqlBoolToBool,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLit(i64),
    UintLit { val: u64, wide: bool },
    FloatLit(f32),
    BoolLit(bool),
    StringLit(String),
    NilLit,
    Ident(String),
    AddrOf(ExprId),
    Deref(ExprId),
    /// Pointer-type representation; the rewrite target for a pointer cast's
    /// first argument, which arrives parsed as a dereference.
    PointerTypeRepr(ExprId),
    Member { obj: ExprId, field: String },
    Compare { op: CmpOp, lhs: ExprId, rhs: ExprId },
    Call { callee: String, args: Vec<ExprId> },
    ImplicitCast { cast: CastKind, operand: ExprId },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: SourcePos,
    /// Resolved type; stays `None` when a check failed.
    pub ty: Option<TypeRef>,
}

/// Arena of expressions for one compilation.
#[derive(Debug, Default)]
pub struct AstArena {
    exprs: Vec<Expr>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: ExprKind, pos: SourcePos) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr { kind, pos, ty: None });
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.exprs[id.0 as usize].kind
    }

    pub fn pos(&self, id: ExprId) -> SourcePos {
        self.exprs[id.0 as usize].pos
    }

    pub fn ty(&self, id: ExprId) -> Option<TypeRef> {
        self.exprs[id.0 as usize].ty
    }

    pub fn set_ty(&mut self, id: ExprId, ty: TypeRef) {
        self.exprs[id.0 as usize].ty = Some(ty);
    }

    /// Replace an expression's kind in place (pre-resolution rewrites and
    /// implicit casts).
    pub fn set_kind(&mut self, id: ExprId, kind: ExprKind) {
        self.exprs[id.0 as usize].kind = kind;
    }

    /// Swap argument `idx` of the call at `call` for `new_arg`.
    pub fn set_call_arg(&mut self, call: ExprId, idx: usize, new_arg: ExprId) {
        if let ExprKind::Call { args, .. } = &mut self.exprs[call.0 as usize].kind {
            args[idx] = new_arg;
        }
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

/// Source-level type spelling used by declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRepr {
    Named(String),
    Pointer(Box<TypeRepr>),
}

impl TypeRepr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRepr::Named(name.into())
    }

    pub fn pointer(inner: TypeRepr) -> Self {
        TypeRepr::Pointer(Box::new(inner))
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var {
        name: String,
        ty: Option<TypeRepr>,
        init: Option<ExprId>,
    },
    Expr(ExprId),
    Assign { target: ExprId, value: ExprId },
    If {
        cond: ExprId,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    For {
        cond: Option<ExprId>,
        step: Option<ExprId>,
        body: Vec<Stmt>,
    },
    Return(Option<ExprId>),
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<(String, TypeRepr)>,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<(String, TypeRepr)>,
    pub ret: TypeRepr,
    pub body: Vec<Stmt>,
}

/// A complete emitted program: struct declarations, helper functions, and the
/// pipeline drivers, with `main` as the entry point.
#[derive(Debug, Default)]
pub struct Program {
    pub structs: Vec<StructDecl>,
    pub functions: Vec<FunctionDecl>,
    pub arena: AstArena,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn struct_decl(&self, name: &str) -> Option<&StructDecl> {
        self.structs.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_alloc_and_types() {
        let mut arena = AstArena::new();
        let a = arena.alloc(ExprKind::IntLit(1), SourcePos::default());
        let b = arena.alloc(ExprKind::IntLit(2), SourcePos::default());
        assert_ne!(a, b);
        assert!(arena.ty(a).is_none());
    }

    #[test]
    fn test_call_arg_replacement() {
        let mut arena = AstArena::new();
        let a = arena.alloc(ExprKind::IntLit(1), SourcePos::default());
        let call = arena.alloc(
            ExprKind::Call { callee: "hash".into(), args: vec![a] },
            SourcePos::default(),
        );
        let b = arena.alloc(ExprKind::IntLit(2), SourcePos::default());
        arena.set_call_arg(call, 0, b);
        match arena.kind(call) {
            ExprKind::Call { args, .. } => assert_eq!(args[0], b),
            _ => panic!("not a call"),
        }
    }
}
