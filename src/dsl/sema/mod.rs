// Semantic Analysis Module
//
// Resolves an emitted program: declarations first, then statements and
// expressions. Every intrinsic call is checked against its hard-coded
// contract; a failed check reports one diagnostic and leaves the call
// unresolved, which poisons dependent expressions without re-reporting.

pub mod errors;

mod builtin_calls;

use std::collections::{HashMap, HashSet};

pub use errors::{ErrorReporter, SemaError};

use crate::dsl::ast::{
    AstArena, CastKind, ExprId, ExprKind, FunctionDecl, Program, SourcePos, Stmt, StructDecl, TypeRepr,
};
use crate::dsl::types::{BuiltinKind, TypeContext, TypeRef};

pub struct Sema<'a> {
    types: &'a mut TypeContext,
    arena: &'a mut AstArena,
    reporter: &'a mut ErrorReporter,
    scopes: Vec<HashMap<String, TypeRef>>,
    struct_types: HashMap<String, TypeRef>,
    function_types: HashMap<String, TypeRef>,
    current_ret: Option<TypeRef>,
    /// Expressions whose resolution already failed; never re-reported.
    failed: HashSet<ExprId>,
}

impl<'a> Sema<'a> {
    pub fn new(types: &'a mut TypeContext, arena: &'a mut AstArena, reporter: &'a mut ErrorReporter) -> Self {
        Sema {
            types,
            arena,
            reporter,
            scopes: vec![HashMap::new()],
            struct_types: HashMap::new(),
            function_types: HashMap::new(),
            current_ret: None,
            failed: HashSet::new(),
        }
    }

    /// Analyze a whole program in place.
    pub fn run(program: &mut Program, types: &mut TypeContext, reporter: &mut ErrorReporter) {
        let structs = std::mem::take(&mut program.structs);
        let functions = std::mem::take(&mut program.functions);

        let mut sema = Sema::new(types, &mut program.arena, reporter);
        for s in &structs {
            sema.declare_struct(s);
        }
        for f in &functions {
            sema.declare_function(f);
        }
        for f in &functions {
            sema.check_function(f);
        }

        program.structs = structs;
        program.functions = functions;
    }

    pub fn types(&self) -> &TypeContext {
        self.types
    }

    fn declare_struct(&mut self, decl: &StructDecl) {
        let mut fields = Vec::with_capacity(decl.fields.len());
        for (name, repr) in &decl.fields {
            if let Some(ty) = self.resolve_type_repr(repr, SourcePos::default()) {
                fields.push((name.clone(), ty));
            }
        }
        let ty = self.types.struct_type(decl.name.clone(), fields);
        self.struct_types.insert(decl.name.clone(), ty);
    }

    fn declare_function(&mut self, decl: &FunctionDecl) {
        let mut params = Vec::with_capacity(decl.params.len());
        for (_, repr) in &decl.params {
            match self.resolve_type_repr(repr, SourcePos::default()) {
                Some(ty) => params.push(ty),
                None => return,
            }
        }
        let ret = match self.resolve_type_repr(&decl.ret, SourcePos::default()) {
            Some(ty) => ty,
            None => return,
        };
        let fn_ty = self.types.function(params, ret);
        self.function_types.insert(decl.name.clone(), fn_ty);
    }

    fn check_function(&mut self, decl: &FunctionDecl) {
        self.scopes.push(HashMap::new());
        for (name, repr) in &decl.params {
            if let Some(ty) = self.resolve_type_repr(repr, SourcePos::default()) {
                self.scopes.last_mut().unwrap().insert(name.clone(), ty);
            }
        }
        self.current_ret = self.resolve_type_repr(&decl.ret, SourcePos::default());
        self.check_block(&decl.body);
        self.current_ret = None;
        self.scopes.pop();
    }

    fn check_block(&mut self, stmts: &[Stmt]) {
        self.scopes.push(HashMap::new());
        for stmt in stmts {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var { name, ty, init } => {
                let declared = ty.as_ref().and_then(|repr| self.resolve_type_repr(repr, SourcePos::default()));
                let inferred = init.and_then(|e| self.resolve_expr(e));
                let var_ty = match (declared, inferred) {
                    (Some(d), Some(i)) => {
                        if d != i {
                            let pos = self.arena.pos(init.unwrap());
                            self.reporter.report(SemaError::BadAssignment {
                                pos,
                                dst: self.types.display(d),
                                src: self.types.display(i),
                            });
                        }
                        Some(d)
                    }
                    (Some(d), None) => Some(d),
                    (None, i) => i,
                };
                if let Some(ty) = var_ty {
                    self.scopes.last_mut().unwrap().insert(name.clone(), ty);
                }
            }
            Stmt::Expr(e) => {
                self.resolve_expr(*e);
            }
            Stmt::Assign { target, value } => {
                let dst = self.resolve_expr(*target);
                let src = self.resolve_expr(*value);
                if let (Some(dst), Some(src)) = (dst, src) {
                    if dst != src {
                        self.reporter.report(SemaError::BadAssignment {
                            pos: self.arena.pos(*target),
                            dst: self.types.display(dst),
                            src: self.types.display(src),
                        });
                    }
                }
            }
            Stmt::If { cond, then_block, else_block } => {
                self.check_condition(*cond);
                self.check_block(then_block);
                if let Some(else_block) = else_block {
                    self.check_block(else_block);
                }
            }
            Stmt::For { cond, step, body } => {
                if let Some(cond) = cond {
                    self.check_condition(*cond);
                }
                if let Some(step) = step {
                    self.resolve_expr(*step);
                }
                self.check_block(body);
            }
            Stmt::Return(value) => {
                if let Some(value) = value {
                    if let (Some(actual), Some(expected)) = (self.resolve_expr(*value), self.current_ret) {
                        if actual != expected {
                            self.reporter.report(SemaError::ReturnTypeMismatch {
                                pos: self.arena.pos(*value),
                                expected: self.types.display(expected),
                                actual: self.types.display(actual),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Conditions take a native bool; a SQL boolean is implicitly unwrapped.
    fn check_condition(&mut self, cond: ExprId) {
        let Some(ty) = self.resolve_expr(cond) else { return };
        if self.types.is_specific_builtin(ty, BuiltinKind::Boolean) {
            self.insert_sql_bool_cast(cond);
            return;
        }
        if !self.types.is_bool(ty) {
            self.reporter.report(SemaError::BadCondition {
                pos: self.arena.pos(cond),
                actual: self.types.display(ty),
            });
        }
    }

    /// Rewrite `expr` in place into an implicit SqlBool -> bool cast around
    /// its previous contents.
    fn insert_sql_bool_cast(&mut self, expr: ExprId) {
        let original = self.arena.expr(expr).clone();
        let pos = original.pos;
        let inner = self.arena.alloc(original.kind, pos);
        if let Some(ty) = original.ty {
            self.arena.set_ty(inner, ty);
        }
        self.arena
            .set_kind(expr, ExprKind::ImplicitCast { cast: CastKind::SqlBoolToBool, operand: inner });
        self.arena.set_ty(expr, self.types.builtin(BuiltinKind::Bool));
    }

    fn resolve_type_repr(&mut self, repr: &TypeRepr, pos: SourcePos) -> Option<TypeRef> {
        match repr {
            TypeRepr::Named(name) => {
                if let Some(&ty) = self.struct_types.get(name) {
                    return Some(ty);
                }
                if let Some(kind) = BuiltinKind::by_name(name) {
                    return Some(self.types.builtin(kind));
                }
                self.reporter.report(SemaError::UnknownType { pos, name: name.clone() });
                None
            }
            TypeRepr::Pointer(inner) => {
                let base = self.resolve_type_repr(inner, pos)?;
                Some(self.types.pointer_to(base))
            }
        }
    }

    fn lookup_ident(&self, name: &str) -> Option<TypeRef> {
        for scope in self.scopes.iter().rev() {
            if let Some(&ty) = scope.get(name) {
                return Some(ty);
            }
        }
        if let Some(&ty) = self.function_types.get(name) {
            return Some(ty);
        }
        // Type names resolve to the named type itself (sizeOf, ptrCast).
        if let Some(&ty) = self.struct_types.get(name) {
            return Some(ty);
        }
        BuiltinKind::by_name(name).map(|k| self.types.builtin(k))
    }

    /// Resolve an expression, memoizing successes and never re-reporting a
    /// failure.
    pub fn resolve_expr(&mut self, id: ExprId) -> Option<TypeRef> {
        if let Some(ty) = self.arena.ty(id) {
            return Some(ty);
        }
        if self.failed.contains(&id) {
            return None;
        }
        let resolved = self.resolve_expr_inner(id);
        match resolved {
            Some(ty) => self.arena.set_ty(id, ty),
            None => {
                self.failed.insert(id);
            }
        }
        resolved
    }

    fn resolve_expr_inner(&mut self, id: ExprId) -> Option<TypeRef> {
        let kind = self.arena.kind(id).clone();
        let pos = self.arena.pos(id);
        match kind {
            ExprKind::IntLit(_) => Some(self.types.builtin(BuiltinKind::Int32)),
            ExprKind::UintLit { wide, .. } => Some(self.types.builtin(if wide {
                BuiltinKind::Uint64
            } else {
                BuiltinKind::Uint32
            })),
            ExprKind::FloatLit(_) => Some(self.types.builtin(BuiltinKind::Float32)),
            ExprKind::BoolLit(_) => Some(self.types.builtin(BuiltinKind::Bool)),
            ExprKind::StringLit(_) => Some(self.types.string_literal()),
            ExprKind::NilLit => Some(self.types.builtin(BuiltinKind::Nil)),
            ExprKind::Ident(name) => {
                let ty = self.lookup_ident(&name);
                if ty.is_none() {
                    self.reporter.report(SemaError::UnknownIdentifier { pos, name });
                }
                ty
            }
            ExprKind::AddrOf(inner) => {
                let base = self.resolve_expr(inner)?;
                Some(self.types.pointer_to(base))
            }
            ExprKind::Deref(inner) => {
                let ty = self.resolve_expr(inner)?;
                match self.types.pointee(ty) {
                    Some(base) => Some(base),
                    None => {
                        self.reporter.report(SemaError::BadDeref { pos, actual: self.types.display(ty) });
                        None
                    }
                }
            }
            ExprKind::PointerTypeRepr(inner) => {
                let base = self.resolve_expr(inner)?;
                Some(self.types.pointer_to(base))
            }
            ExprKind::Member { obj, field } => {
                let obj_ty = self.resolve_expr(obj)?;
                let base = self.types.pointee(obj_ty).unwrap_or(obj_ty);
                let field_ty = self
                    .types
                    .struct_fields(base)
                    .and_then(|fields| fields.iter().find(|(n, _)| *n == field).map(|(_, t)| *t));
                if field_ty.is_none() {
                    self.reporter.report(SemaError::UnknownField {
                        pos,
                        ty: self.types.display(base),
                        field,
                    });
                }
                field_ty
            }
            ExprKind::Compare { lhs, rhs, op: _op } => {
                let lt = self.resolve_expr(lhs)?;
                let rt = self.resolve_expr(rhs)?;
                self.resolve_comparison(pos, lt, rt)
            }
            ExprKind::Call { .. } => self.check_builtin_call(id),
            ExprKind::ImplicitCast { cast: CastKind::SqlBoolToBool, operand } => {
                self.resolve_expr(operand)?;
                Some(self.types.builtin(BuiltinKind::Bool))
            }
        }
    }

    /// SQL operands compare into a SQL boolean; native numerics, bools, and
    /// pointer-nil checks compare into a native bool.
    fn resolve_comparison(&mut self, pos: SourcePos, lhs: TypeRef, rhs: TypeRef) -> Option<TypeRef> {
        let sql = |t| self.types.is_sql_value(t);
        let native_num = |s: &Self, t| s.types.is_integer(t) || s.types.is_float(t);
        if sql(lhs) && sql(rhs) {
            return Some(self.types.builtin(BuiltinKind::Boolean));
        }
        if (native_num(self, lhs) && native_num(self, rhs)) || (self.types.is_bool(lhs) && self.types.is_bool(rhs)) {
            return Some(self.types.builtin(BuiltinKind::Bool));
        }
        let ptr_nil = |s: &Self, a, b| s.types.is_pointer(a) && s.types.is_nil(b);
        if ptr_nil(self, lhs, rhs) || ptr_nil(self, rhs, lhs) {
            return Some(self.types.builtin(BuiltinKind::Bool));
        }
        self.reporter.report(SemaError::BadComparison {
            pos,
            lhs: self.types.display(lhs),
            rhs: self.types.display(rhs),
        });
        None
    }

    // Shared helpers for the intrinsic contract checks.

    pub(super) fn is_ptr_to_builtin(&self, ty: TypeRef, kind: BuiltinKind) -> bool {
        self.types.pointee(ty).is_some_and(|p| self.types.is_specific_builtin(p, kind))
    }

    pub(super) fn is_ptr_to_sql_value(&self, ty: TypeRef) -> bool {
        self.types.pointee(ty).is_some_and(|p| self.types.is_sql_value(p))
    }

    pub(super) fn is_ptr_to_aggregator(&self, ty: TypeRef) -> bool {
        self.types.pointee(ty).is_some_and(|p| self.types.is_aggregator(p))
    }

    pub(super) fn ptr_display(&mut self, kind: BuiltinKind) -> String {
        let base = self.types.builtin(kind);
        let ptr = self.types.pointer_to(base);
        self.types.display(ptr)
    }
}
