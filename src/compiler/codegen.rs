// Code Generation Context
//
// The shared vocabulary translators emit through: literal/call/member
// constructors over the program's expression arena, fresh-name generation,
// and a function builder whose open blocks nest the per-row body as the
// translator chain unwinds.

use crate::dsl::ast::{
    CmpOp, ExprId, ExprKind, FunctionDecl, Program, SourcePos, Stmt, StructDecl, TypeRepr,
};
use crate::dsl::builtins::Builtin;
use crate::sql::SqlTypeId;

/// Name of the execution-context parameter every emitted function receives.
pub const EXEC_CTX: &str = "execCtx";

pub struct CodeGen {
    pub program: Program,
    name_counter: u32,
    line: u32,
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen {
    pub fn new() -> Self {
        Self {
            program: Program::default(),
            name_counter: 0,
            line: 0,
        }
    }

    fn next_pos(&mut self) -> SourcePos {
        self.line += 1;
        SourcePos::new(self.line, 0)
    }

    pub fn fresh_name(&mut self, prefix: &str) -> String {
        let n = self.name_counter;
        self.name_counter += 1;
        format!("{}{}", prefix, n)
    }

    fn alloc(&mut self, kind: ExprKind) -> ExprId {
        let pos = self.next_pos();
        self.program.arena.alloc(kind, pos)
    }

    pub fn int_lit(&mut self, v: i64) -> ExprId {
        self.alloc(ExprKind::IntLit(v))
    }

    pub fn uint32_lit(&mut self, v: u32) -> ExprId {
        self.alloc(ExprKind::UintLit { val: v as u64, wide: false })
    }

    pub fn uint64_lit(&mut self, v: u64) -> ExprId {
        self.alloc(ExprKind::UintLit { val: v, wide: true })
    }

    pub fn float_lit(&mut self, v: f32) -> ExprId {
        self.alloc(ExprKind::FloatLit(v))
    }

    pub fn bool_lit(&mut self, v: bool) -> ExprId {
        self.alloc(ExprKind::BoolLit(v))
    }

    pub fn str_lit(&mut self, s: &str) -> ExprId {
        self.alloc(ExprKind::StringLit(s.to_string()))
    }

    pub fn nil_lit(&mut self) -> ExprId {
        self.alloc(ExprKind::NilLit)
    }

    pub fn ident(&mut self, name: &str) -> ExprId {
        self.alloc(ExprKind::Ident(name.to_string()))
    }

    pub fn addr_of(&mut self, inner: ExprId) -> ExprId {
        self.alloc(ExprKind::AddrOf(inner))
    }

    pub fn addr_of_ident(&mut self, name: &str) -> ExprId {
        let inner = self.ident(name);
        self.addr_of(inner)
    }

    pub fn member(&mut self, obj: ExprId, field: &str) -> ExprId {
        self.alloc(ExprKind::Member { obj, field: field.to_string() })
    }

    pub fn member_of_ident(&mut self, var: &str, field: &str) -> ExprId {
        let obj = self.ident(var);
        self.member(obj, field)
    }

    pub fn compare(&mut self, op: CmpOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.alloc(ExprKind::Compare { op, lhs, rhs })
    }

    pub fn call(&mut self, builtin: Builtin, args: Vec<ExprId>) -> ExprId {
        self.alloc(ExprKind::Call { callee: builtin.name().to_string(), args })
    }

    pub fn call_named(&mut self, name: &str, args: Vec<ExprId>) -> ExprId {
        self.alloc(ExprKind::Call { callee: name.to_string(), args })
    }

    /// The first argument of a pointer cast: `*Type` spelled as a
    /// dereference of the type name, rewritten by the analyzer.
    pub fn ptr_type_arg(&mut self, type_name: &str) -> ExprId {
        let inner = self.ident(type_name);
        self.alloc(ExprKind::Deref(inner))
    }

    /// `@ptrCast(*Type, value)`
    pub fn ptr_cast(&mut self, type_name: &str, value: ExprId) -> ExprId {
        let ty = self.ptr_type_arg(type_name);
        self.call(Builtin::PtrCast, vec![ty, value])
    }

    /// `@sizeOf(Type)`
    pub fn size_of(&mut self, type_name: &str) -> ExprId {
        let ty = self.ident(type_name);
        self.call(Builtin::SizeOf, vec![ty])
    }

    pub fn declare_struct(&mut self, name: &str, fields: Vec<(String, TypeRepr)>) {
        self.program.structs.push(StructDecl { name: name.to_string(), fields });
    }

    pub fn declare_function(&mut self, decl: FunctionDecl) {
        self.program.functions.push(decl);
    }

    /// DSL type name for a struct field holding a SQL value of `type_id`.
    pub fn sql_type_name(type_id: SqlTypeId) -> &'static str {
        match type_id {
            t if t.is_integer_family() => "Integer",
            SqlTypeId::Boolean => "Boolean",
            SqlTypeId::Decimal => "Real",
            SqlTypeId::Date => "Date",
            _ => "StringVal",
        }
    }
}

enum FrameKind {
    Base,
    If { cond: ExprId },
    For {
        cond: Option<ExprId>,
        step: Option<ExprId>,
    },
}

struct Frame {
    kind: FrameKind,
    stmts: Vec<Stmt>,
    /// Statements emitted right after this frame closes, in the parent.
    tail: Vec<Stmt>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self { kind, stmts: Vec::new(), tail: Vec::new() }
    }
}

/// Builds one function. Control-flow blocks opened by translators stay open
/// while later translators append the nested per-row body; `finish` closes
/// whatever is still open, then appends the post-loop statements.
pub struct FunctionBuilder {
    name: String,
    params: Vec<(String, TypeRepr)>,
    ret: TypeRepr,
    frames: Vec<Frame>,
    after_close: Vec<Stmt>,
}

impl FunctionBuilder {
    pub fn new(name: &str, params: Vec<(String, TypeRepr)>, ret: TypeRepr) -> Self {
        Self {
            name: name.to_string(),
            params,
            ret,
            frames: vec![Frame::new(FrameKind::Base)],
            after_close: Vec::new(),
        }
    }

    fn top(&mut self) -> &mut Vec<Stmt> {
        &mut self.frames.last_mut().expect("builder always has a base frame").stmts
    }

    pub fn append(&mut self, stmt: Stmt) {
        self.top().push(stmt);
    }

    pub fn declare_var(&mut self, name: &str, ty: Option<TypeRepr>, init: Option<ExprId>) {
        self.append(Stmt::Var { name: name.to_string(), ty, init });
    }

    pub fn append_expr(&mut self, expr: ExprId) {
        self.append(Stmt::Expr(expr));
    }

    pub fn append_assign(&mut self, target: ExprId, value: ExprId) {
        self.append(Stmt::Assign { target, value });
    }

    /// Open an `if` block; subsequent statements land inside it.
    pub fn start_if(&mut self, cond: ExprId) {
        self.frames.push(Frame::new(FrameKind::If { cond }));
    }

    /// Open a `for (; cond; step)` block.
    pub fn start_for(&mut self, cond: Option<ExprId>, step: Option<ExprId>) {
        self.frames.push(Frame::new(FrameKind::For { cond, step }));
    }

    /// Close the innermost open block, then emit its tail in the parent.
    pub fn close_block(&mut self) {
        let frame = self.frames.pop().expect("no open block");
        let stmt = match frame.kind {
            FrameKind::Base => panic!("cannot close the base frame"),
            FrameKind::If { cond } => Stmt::If { cond, then_block: frame.stmts, else_block: None },
            FrameKind::For { cond, step } => Stmt::For { cond, step, body: frame.stmts },
        };
        let top = self.top();
        top.push(stmt);
        top.extend(frame.tail);
    }

    /// Statement emitted right after the innermost open block closes. With
    /// no open block, it lands at the end of the function body.
    pub fn append_after_block(&mut self, stmt: Stmt) {
        let frame = self.frames.last_mut().expect("builder always has a base frame");
        match frame.kind {
            FrameKind::Base => self.after_close.push(stmt),
            _ => frame.tail.push(stmt),
        }
    }

    /// Statement appended after every open block is closed.
    pub fn append_after_close(&mut self, stmt: Stmt) {
        self.after_close.push(stmt);
    }

    pub fn finish(mut self) -> FunctionDecl {
        while self.frames.len() > 1 {
            self.close_block();
        }
        let mut frame = self.frames.pop().expect("base frame");
        let mut body = std::mem::take(&mut frame.stmts);
        body.append(&mut frame.tail);
        body.append(&mut self.after_close);
        FunctionDecl {
            name: self.name,
            params: self.params,
            ret: self.ret,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_names_are_distinct() {
        let mut cg = CodeGen::new();
        assert_ne!(cg.fresh_name("tvi"), cg.fresh_name("tvi"));
    }

    #[test]
    fn test_open_blocks_nest_and_close_in_order() {
        let mut cg = CodeGen::new();
        let mut fb = FunctionBuilder::new("f", vec![], TypeRepr::named("nil"));
        let cond = cg.bool_lit(true);
        fb.start_for(Some(cond), None);
        let inner_cond = cg.bool_lit(false);
        fb.start_if(inner_cond);
        let lit = cg.int_lit(1);
        fb.append_expr(lit);
        let after = cg.int_lit(2);
        fb.append_after_close(Stmt::Expr(after));

        let decl = fb.finish();
        assert_eq!(decl.body.len(), 2);
        match &decl.body[0] {
            Stmt::For { body, .. } => match &body[0] {
                Stmt::If { then_block, .. } => assert_eq!(then_block.len(), 1),
                other => panic!("expected if inside loop, got {:?}", other),
            },
            other => panic!("expected loop, got {:?}", other),
        }
        assert!(matches!(decl.body[1], Stmt::Expr(_)));
    }
}
