// Program Interpreter
//
// Tree-walking evaluator for compiled programs: walks the emitted statements
// and binds every intrinsic call to its runtime bridge. Byte pointers are
// (buffer, offset) handles; struct stores and loads go through the
// fixed-width SQL value encoding, which is what makes the output batch
// layout observable through the output callback.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::compiler::CompiledQuery;
use crate::dsl::ast::{CastKind, CmpOp, ExprId, ExprKind, FunctionDecl, Program, Stmt, TypeRepr};
use crate::dsl::builtins::Builtin;
use crate::dsl::types::{BuiltinKind, TypeContext, TypeKind};
use crate::exec::agg_hash_table::{AggregationHashTable, AggregationHashTableIterator};
use crate::exec::aggregators;
use crate::exec::bytes::ByteBuffer;
use crate::exec::context::ExecutionContext;
use crate::exec::index_iterator::IndexIterator;
use crate::exec::join_hash_table::{JoinHashTable, JoinHashTableIterator};
use crate::exec::projected_columns::ProjectedColumnsIterator;
use crate::exec::sorter::{Sorter, SorterIterator};
use crate::exec::table_vector_iterator::TableVectorIterator;
use crate::exec::ExecError;
use crate::plan::CompareOp;
use crate::sql::{SqlTypeId, SqlValue};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldKind {
    Sql(SqlTypeId),
    Agg(BuiltinKind),
}

#[derive(Debug)]
struct FieldEntry {
    name: String,
    kind: FieldKind,
    offset: usize,
}

#[derive(Debug)]
struct StructLayout {
    size: usize,
    fields: Vec<FieldEntry>,
}

impl StructLayout {
    fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn field_kind(type_name: &str) -> Option<FieldKind> {
    let kind = BuiltinKind::by_name(type_name)?;
    if kind.is_sql_value() {
        let type_id = match kind {
            BuiltinKind::Boolean => SqlTypeId::Boolean,
            BuiltinKind::Integer => SqlTypeId::Integer,
            BuiltinKind::Real => SqlTypeId::Decimal,
            BuiltinKind::Date => SqlTypeId::Date,
            _ => SqlTypeId::Varchar,
        };
        Some(FieldKind::Sql(type_id))
    } else if kind.is_aggregator() {
        Some(FieldKind::Agg(kind))
    } else {
        None
    }
}

fn field_size(kind: FieldKind) -> usize {
    match kind {
        FieldKind::Sql(type_id) => type_id.encoded_size(),
        FieldKind::Agg(kind) => aggregators::aggregator_size(kind),
    }
}

#[derive(Clone)]
enum PtrKind {
    Raw,
    Struct(Rc<StructLayout>),
    Field(FieldKind),
}

#[derive(Clone)]
struct TypedPtr {
    buf: ByteBuffer,
    offset: usize,
    kind: PtrKind,
}

enum RuntimeObj {
    Tvi(Option<TableVectorIterator>),
    IndexIter(Option<IndexIterator>),
    Jht(Option<JoinHashTable>),
    JhtIter(Option<JoinHashTableIterator>),
    Aht(Option<AggregationHashTable>),
    AhtIter(Option<AggregationHashTableIterator>),
    SorterState {
        sorter: Option<Sorter>,
        cmp_fn: Option<String>,
    },
    SorterIter(Option<SorterIterator>),
    FilterManager {
        filters: Vec<String>,
        finalized: bool,
    },
    Tls(crate::exec::context::ThreadStateContainer),
}

type ObjRef = Rc<RefCell<RuntimeObj>>;
type Slot = Rc<RefCell<Value>>;

#[derive(Clone)]
enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Sql(SqlValue),
    ExecCtx,
    MemPool,
    Ptr(TypedPtr),
    Ref(Slot),
    Obj(ObjRef),
    Pci(ObjRef),
    Fn(String),
}

enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<'a> {
    program: &'a Program,
    types: &'a TypeContext,
    ctx: &'a ExecutionContext,
    layouts: HashMap<String, Rc<StructLayout>>,
    /// Call stack of block-scope stacks.
    frames: Vec<Vec<HashMap<String, Slot>>>,
}

/// Compile-side entry: run a compiled query's `main` against a context.
pub fn execute_query(query: &CompiledQuery, ctx: &ExecutionContext) -> Result<i64, ExecError> {
    Interpreter::new(query, ctx).run()
}

impl<'a> Interpreter<'a> {
    pub fn new(query: &'a CompiledQuery, ctx: &'a ExecutionContext) -> Self {
        let mut layouts = HashMap::new();
        for decl in &query.program.structs {
            let mut fields = Vec::new();
            let mut offset = 0;
            for (name, repr) in &decl.fields {
                let kind = match repr {
                    TypeRepr::Named(n) => field_kind(n),
                    TypeRepr::Pointer(_) => None,
                };
                if let Some(kind) = kind {
                    fields.push(FieldEntry { name: name.clone(), kind, offset });
                    offset += field_size(kind);
                }
            }
            layouts.insert(decl.name.clone(), Rc::new(StructLayout { size: offset, fields }));
        }
        Self {
            program: &query.program,
            types: &query.types,
            ctx,
            layouts,
            frames: Vec::new(),
        }
    }

    pub fn run(&mut self) -> Result<i64, ExecError> {
        match self.call_function("main", vec![Value::ExecCtx])? {
            Value::Int(code) => Ok(code),
            _ => Ok(0),
        }
    }

    fn function_decl(&self, name: &str) -> Option<&'a FunctionDecl> {
        self.program.function(name)
    }

    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, ExecError> {
        if self.ctx.is_cancelled() {
            return Err(ExecError::Cancelled);
        }
        let decl = self
            .function_decl(name)
            .ok_or_else(|| ExecError::FunctionNotFound(name.to_string()))?;
        let mut scope = HashMap::new();
        for ((param, _), value) in decl.params.iter().zip(args) {
            scope.insert(param.clone(), Rc::new(RefCell::new(value)));
        }
        self.frames.push(vec![scope]);
        let flow = self.exec_block(&decl.body);
        self.frames.pop();
        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }

    fn lookup(&self, name: &str) -> Option<Slot> {
        let frame = self.frames.last()?;
        for scope in frame.iter().rev() {
            if let Some(slot) = scope.get(name) {
                return Some(slot.clone());
            }
        }
        None
    }

    fn declare(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(scope) = frame.last_mut() {
                scope.insert(name.to_string(), Rc::new(RefCell::new(value)));
            }
        }
    }

    fn exec_block(&mut self, stmts: &'a [Stmt]) -> Result<Flow, ExecError> {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(HashMap::new());
        }
        let mut flow = Flow::Normal;
        for stmt in stmts {
            flow = self.exec_stmt(stmt)?;
            if matches!(flow, Flow::Return(_)) {
                break;
            }
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.pop();
        }
        Ok(flow)
    }

    fn exec_stmt(&mut self, stmt: &'a Stmt) -> Result<Flow, ExecError> {
        match stmt {
            Stmt::Var { name, ty, init } => {
                let value = match init {
                    Some(expr) => self.eval(*expr)?,
                    None => self.default_value(ty.as_ref())?,
                };
                self.declare(name, value);
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(*expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(*value)?;
                self.assign(*target, value)?;
                Ok(Flow::Normal)
            }
            Stmt::If { cond, then_block, else_block } => {
                if self.eval_condition(*cond)? {
                    self.exec_block(then_block)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::For { cond, step, body } => {
                loop {
                    if let Some(cond) = cond {
                        if !self.eval_condition(*cond)? {
                            break;
                        }
                    }
                    match self.exec_block(body)? {
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal => {}
                    }
                    if let Some(step) = step {
                        self.eval(*step)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(*expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    fn default_value(&self, ty: Option<&TypeRepr>) -> Result<Value, ExecError> {
        let Some(TypeRepr::Named(name)) = ty else {
            return Ok(Value::Nil);
        };
        if let Some(layout) = self.layouts.get(name) {
            return Ok(Value::Ptr(TypedPtr {
                buf: ByteBuffer::with_size(layout.size),
                offset: 0,
                kind: PtrKind::Struct(layout.clone()),
            }));
        }
        let obj = match name.as_str() {
            "TableVectorIterator" => RuntimeObj::Tvi(None),
            "IndexIterator" => RuntimeObj::IndexIter(None),
            "JoinHashTable" => RuntimeObj::Jht(None),
            "JoinHashTableIterator" => RuntimeObj::JhtIter(None),
            "AggregationHashTable" => RuntimeObj::Aht(None),
            "AggregationHashTableIterator" => RuntimeObj::AhtIter(None),
            "Sorter" => RuntimeObj::SorterState { sorter: None, cmp_fn: None },
            "SorterIterator" => RuntimeObj::SorterIter(None),
            "FilterManager" => RuntimeObj::FilterManager { filters: Vec::new(), finalized: false },
            "ThreadStateContainer" => RuntimeObj::Tls(crate::exec::context::ThreadStateContainer::new()),
            _ => return Ok(Value::Nil),
        };
        Ok(Value::Obj(Rc::new(RefCell::new(obj))))
    }

    fn assign(&mut self, target: ExprId, value: Value) -> Result<(), ExecError> {
        match self.program.arena.kind(target) {
            ExprKind::Ident(name) => {
                let slot = self
                    .lookup(name)
                    .ok_or_else(|| ExecError::TypeViolation(format!("unknown variable '{}'", name)))?;
                *slot.borrow_mut() = value;
                Ok(())
            }
            ExprKind::Member { obj, field } => {
                let field = field.clone();
                let obj = self.eval(*obj)?;
                let (ptr, layout) = self.struct_ptr(&obj)?;
                let entry = layout
                    .field(&field)
                    .ok_or_else(|| ExecError::TypeViolation(format!("no field '{}'", field)))?;
                let FieldKind::Sql(type_id) = entry.kind else {
                    return Err(ExecError::TypeViolation("cannot store into an aggregator field".to_string()));
                };
                let Value::Sql(sql) = value else {
                    return Err(ExecError::TypeViolation("struct fields hold SQL values".to_string()));
                };
                let mut encoded = Vec::new();
                sql.write_to(type_id, &mut encoded)?;
                ptr.buf.put(ptr.offset + entry.offset, &encoded);
                Ok(())
            }
            _ => Err(ExecError::TypeViolation("unsupported assignment target".to_string())),
        }
    }

    fn struct_ptr<'v>(&self, value: &'v Value) -> Result<(&'v TypedPtr, Rc<StructLayout>), ExecError> {
        match value {
            Value::Ptr(ptr) => match &ptr.kind {
                PtrKind::Struct(layout) => Ok((ptr, layout.clone())),
                _ => Err(ExecError::TypeViolation("expected a struct pointer".to_string())),
            },
            _ => Err(ExecError::TypeViolation("expected a struct pointer".to_string())),
        }
    }

    fn eval_condition(&mut self, cond: ExprId) -> Result<bool, ExecError> {
        let value = self.eval(cond)?;
        self.truthy(&value)
    }

    fn truthy(&self, value: &Value) -> Result<bool, ExecError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Sql(SqlValue::Bool { is_null, val }) => Ok(!is_null && *val),
            _ => Err(ExecError::TypeViolation("condition is not a boolean".to_string())),
        }
    }

    fn eval(&mut self, expr: ExprId) -> Result<Value, ExecError> {
        match self.program.arena.kind(expr).clone() {
            ExprKind::IntLit(v) => Ok(Value::Int(v)),
            ExprKind::UintLit { val, .. } => Ok(Value::UInt(val)),
            ExprKind::FloatLit(v) => Ok(Value::Float(v as f64)),
            ExprKind::BoolLit(v) => Ok(Value::Bool(v)),
            ExprKind::StringLit(s) => Ok(Value::Str(s)),
            ExprKind::NilLit => Ok(Value::Nil),
            ExprKind::Ident(name) => {
                if let Some(slot) = self.lookup(&name) {
                    return Ok(slot.borrow().clone());
                }
                if self.function_decl(&name).is_some() {
                    return Ok(Value::Fn(name));
                }
                Err(ExecError::TypeViolation(format!("unknown identifier '{}'", name)))
            }
            ExprKind::AddrOf(inner) => self.eval_addr_of(inner),
            ExprKind::Deref(inner) => {
                let value = self.eval(inner)?;
                match value {
                    Value::Ref(slot) => Ok(slot.borrow().clone()),
                    other => Ok(other),
                }
            }
            ExprKind::PointerTypeRepr(_) => Ok(Value::Nil),
            ExprKind::Member { obj, field } => {
                let obj = self.eval(obj)?;
                let (ptr, layout) = self.struct_ptr(&obj)?;
                let entry = layout
                    .field(&field)
                    .ok_or_else(|| ExecError::TypeViolation(format!("no field '{}'", field)))?;
                match entry.kind {
                    FieldKind::Sql(type_id) => {
                        let bytes = ptr.buf.get(ptr.offset + entry.offset, type_id.encoded_size());
                        Ok(Value::Sql(SqlValue::read_from(type_id, &bytes)?))
                    }
                    FieldKind::Agg(_) => {
                        Err(ExecError::TypeViolation("aggregator fields are accessed by pointer".to_string()))
                    }
                }
            }
            ExprKind::Compare { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                self.compare_values(op, lhs, rhs)
            }
            ExprKind::ImplicitCast { cast: CastKind::SqlBoolToBool, operand } => {
                let value = self.eval(operand)?;
                Ok(Value::Bool(self.truthy(&value)?))
            }
            ExprKind::Call { callee, args } => self.eval_call(expr, &callee, &args),
        }
    }

    fn eval_addr_of(&mut self, inner: ExprId) -> Result<Value, ExecError> {
        match self.program.arena.kind(inner).clone() {
            ExprKind::Ident(name) => {
                let slot = self
                    .lookup(&name)
                    .ok_or_else(|| ExecError::TypeViolation(format!("unknown identifier '{}'", name)))?;
                let by_handle = matches!(
                    &*slot.borrow(),
                    Value::Obj(_) | Value::Pci(_) | Value::Ptr(_) | Value::ExecCtx | Value::MemPool
                );
                if by_handle {
                    Ok(slot.borrow().clone())
                } else {
                    Ok(Value::Ref(slot))
                }
            }
            ExprKind::Member { obj, field } => {
                let obj = self.eval(obj)?;
                let (ptr, layout) = self.struct_ptr(&obj)?;
                let entry = layout
                    .field(&field)
                    .ok_or_else(|| ExecError::TypeViolation(format!("no field '{}'", field)))?;
                Ok(Value::Ptr(TypedPtr {
                    buf: ptr.buf.clone(),
                    offset: ptr.offset + entry.offset,
                    kind: PtrKind::Field(entry.kind),
                }))
            }
            _ => self.eval(inner),
        }
    }

    fn compare_values(&self, op: CmpOp, lhs: Value, rhs: Value) -> Result<Value, ExecError> {
        use std::cmp::Ordering;
        let apply = |op: CmpOp, ord: Ordering| match op {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        };
        match (lhs, rhs) {
            (Value::Sql(a), Value::Sql(b)) => {
                if a.is_null() || b.is_null() {
                    return Ok(Value::Sql(SqlValue::Bool { is_null: true, val: false }));
                }
                match a.partial_cmp(&b) {
                    Some(ord) => Ok(Value::Sql(SqlValue::boolean(apply(op, ord)))),
                    None => Ok(Value::Sql(SqlValue::Bool { is_null: true, val: false })),
                }
            }
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(apply(op, a.cmp(&b)))),
            (Value::UInt(a), Value::UInt(b)) => Ok(Value::Bool(apply(op, a.cmp(&b)))),
            (Value::Float(a), Value::Float(b)) => {
                Ok(Value::Bool(a.partial_cmp(&b).map(|ord| apply(op, ord)).unwrap_or(false)))
            }
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(apply(op, a.cmp(&b)))),
            (Value::Nil, Value::Nil) => Ok(Value::Bool(matches!(op, CmpOp::Eq | CmpOp::Le | CmpOp::Ge))),
            (Value::Ptr(_), Value::Nil) | (Value::Nil, Value::Ptr(_)) => {
                Ok(Value::Bool(matches!(op, CmpOp::Ne)))
            }
            _ => Err(ExecError::TypeViolation("incomparable runtime values".to_string())),
        }
    }

    fn sql_arg(&self, value: &Value) -> Result<SqlValue, ExecError> {
        match value {
            Value::Sql(sql) => Ok(sql.clone()),
            Value::Ref(slot) => match &*slot.borrow() {
                Value::Sql(sql) => Ok(sql.clone()),
                _ => Err(ExecError::TypeViolation("expected a SQL value".to_string())),
            },
            Value::Ptr(TypedPtr { buf, offset, kind: PtrKind::Field(FieldKind::Sql(type_id)) }) => {
                let bytes = buf.get(*offset, type_id.encoded_size());
                Ok(SqlValue::read_from(*type_id, &bytes)?)
            }
            _ => Err(ExecError::TypeViolation("expected a SQL value".to_string())),
        }
    }

    fn int_arg(&self, value: &Value) -> Result<i64, ExecError> {
        match value {
            Value::Int(v) => Ok(*v),
            Value::UInt(v) => Ok(*v as i64),
            _ => Err(ExecError::TypeViolation("expected an integer".to_string())),
        }
    }

    fn uint_arg(&self, value: &Value) -> Result<u64, ExecError> {
        match value {
            Value::UInt(v) => Ok(*v),
            Value::Int(v) => Ok(*v as u64),
            _ => Err(ExecError::TypeViolation("expected an unsigned integer".to_string())),
        }
    }

    fn fn_arg(&self, value: &Value) -> Result<String, ExecError> {
        match value {
            Value::Fn(name) => Ok(name.clone()),
            _ => Err(ExecError::TypeViolation("expected a function reference".to_string())),
        }
    }

    fn obj_arg(&self, value: &Value) -> Result<ObjRef, ExecError> {
        match value {
            Value::Obj(obj) => Ok(obj.clone()),
            _ => Err(ExecError::TypeViolation("expected a runtime container".to_string())),
        }
    }

    fn raw_ptr(&self, value: &Value) -> Result<TypedPtr, ExecError> {
        match value {
            Value::Ptr(ptr) => Ok(ptr.clone()),
            _ => Err(ExecError::TypeViolation("expected a byte pointer".to_string())),
        }
    }

    fn agg_ptr(&self, value: &Value) -> Result<(BuiltinKind, ByteBuffer, usize), ExecError> {
        match value {
            Value::Ptr(TypedPtr { buf, offset, kind: PtrKind::Field(FieldKind::Agg(kind)) }) => {
                Ok((*kind, buf.clone(), *offset))
            }
            _ => Err(ExecError::TypeViolation("expected an aggregator pointer".to_string())),
        }
    }

    fn with_pci<R>(
        &self,
        value: &Value,
        f: impl FnOnce(&mut ProjectedColumnsIterator) -> Result<R, ExecError>,
    ) -> Result<R, ExecError> {
        let obj = match value {
            Value::Pci(obj) | Value::Obj(obj) => obj.clone(),
            _ => return Err(ExecError::TypeViolation("expected a projected-columns iterator".to_string())),
        };
        let mut guard = obj.borrow_mut();
        match &mut *guard {
            RuntimeObj::Tvi(Some(tvi)) => match tvi.pci_mut() {
                Some(pci) => f(pci),
                None => Err(ExecError::NotInitialized("ProjectedColumnsIterator")),
            },
            _ => Err(ExecError::TypeViolation("expected a projected-columns iterator".to_string())),
        }
    }

    fn hash_values(values: &[SqlValue]) -> u64 {
        let mut hasher = DefaultHasher::new();
        for value in values {
            value.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// A key-equality or comparator callback that routes back through the
    /// interpreter, stashing any error for the caller to surface.
    fn callback_truthy(&mut self, name: &str, args: Vec<Value>, failure: &mut Option<ExecError>) -> bool {
        match self.call_function(name, args) {
            Ok(value) => self.truthy(&value).unwrap_or(false),
            Err(e) => {
                *failure = Some(e);
                false
            }
        }
    }

    fn callback_i32(&mut self, name: &str, args: Vec<Value>, failure: &mut Option<ExecError>) -> i32 {
        match self.call_function(name, args) {
            Ok(Value::Int(v)) => v as i32,
            Ok(_) => 0,
            Err(e) => {
                *failure = Some(e);
                0
            }
        }
    }

    fn eval_call(&mut self, call: ExprId, callee: &str, arg_ids: &[ExprId]) -> Result<Value, ExecError> {
        let Some(builtin) = Builtin::by_name(callee) else {
            let mut args = Vec::with_capacity(arg_ids.len());
            for &arg in arg_ids {
                args.push(self.eval(arg)?);
            }
            return self.call_function(callee, args);
        };

        // Type-level intrinsics inspect their argument, not its value.
        match builtin {
            Builtin::SizeOf => return self.eval_size_of(arg_ids[0]),
            Builtin::PtrCast => return self.eval_ptr_cast(call, arg_ids[1]),
            _ => {}
        }

        let mut args = Vec::with_capacity(arg_ids.len());
        for &arg in arg_ids {
            args.push(self.eval(arg)?);
        }
        self.dispatch_builtin(builtin, args)
    }

    fn eval_size_of(&mut self, arg: ExprId) -> Result<Value, ExecError> {
        if let ExprKind::Ident(name) = self.program.arena.kind(arg) {
            if let Some(layout) = self.layouts.get(name) {
                return Ok(Value::UInt(layout.size as u64));
            }
            if let Some(kind) = BuiltinKind::by_name(name) {
                let size = field_kind(kind.name()).map(field_size).unwrap_or(8);
                return Ok(Value::UInt(size as u64));
            }
        }
        Err(ExecError::TypeViolation("sizeOf expects a type name".to_string()))
    }

    fn eval_ptr_cast(&mut self, call: ExprId, value_arg: ExprId) -> Result<Value, ExecError> {
        let value = self.eval(value_arg)?;
        let Some(call_ty) = self.program.arena.ty(call) else {
            return Ok(value);
        };
        let target_kind = match self.types.kind(call_ty) {
            TypeKind::Pointer(base) => match self.types.kind(*base) {
                TypeKind::Struct { name, .. } => self.layouts.get(name).cloned().map(PtrKind::Struct),
                TypeKind::Builtin(BuiltinKind::Int8) | TypeKind::Builtin(BuiltinKind::Uint8) => Some(PtrKind::Raw),
                _ => None,
            },
            _ => None,
        };
        match (value, target_kind) {
            (Value::Ptr(ptr), Some(kind)) => Ok(Value::Ptr(TypedPtr { buf: ptr.buf, offset: ptr.offset, kind })),
            (Value::Nil, _) => Ok(Value::Nil),
            (other, _) => Ok(other),
        }
    }

    fn dispatch_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value, ExecError> {
        match builtin {
            // SQL conversions
            Builtin::BoolToSql => match &args[0] {
                Value::Bool(b) => Ok(Value::Sql(SqlValue::boolean(*b))),
                _ => Err(ExecError::TypeViolation("boolToSql expects a bool".to_string())),
            },
            Builtin::IntToSql => Ok(Value::Sql(SqlValue::integer(self.int_arg(&args[0])?))),
            Builtin::FloatToSql => match &args[0] {
                Value::Float(f) => Ok(Value::Sql(SqlValue::real(*f))),
                _ => Err(ExecError::TypeViolation("floatToSql expects a float".to_string())),
            },
            Builtin::SqlToBool => Ok(Value::Bool(self.truthy(&args[0])?)),

            // Vectorized filters
            Builtin::FilterEq
            | Builtin::FilterNe
            | Builtin::FilterLt
            | Builtin::FilterLe
            | Builtin::FilterGt
            | Builtin::FilterGe => {
                let op = match builtin {
                    Builtin::FilterEq => CompareOp::Eq,
                    Builtin::FilterNe => CompareOp::Ne,
                    Builtin::FilterLt => CompareOp::Lt,
                    Builtin::FilterLe => CompareOp::Le,
                    Builtin::FilterGt => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                let col = self.int_arg(&args[1])? as usize;
                let rhs = match &args[2] {
                    Value::Int(v) => SqlValue::integer(*v),
                    Value::Float(v) => SqlValue::real(*v),
                    Value::Sql(v) => v.clone(),
                    _ => return Err(ExecError::TypeViolation("unsupported filter comparand".to_string())),
                };
                let count = self.with_pci(&args[0], |pci| Ok(pci.filter_compare(col, op, &rhs)))?;
                Ok(Value::Int(count as i64))
            }

            Builtin::ExecCtxGetMemoryPool => Ok(Value::MemPool),

            // Table vector iteration
            Builtin::TableIterInit => {
                let obj = self.obj_arg(&args[0])?;
                let Value::Str(name) = &args[1] else {
                    return Err(ExecError::TypeViolation("table name must be a string".to_string()));
                };
                let table = self.ctx.lookup_table(name).ok_or_else(|| ExecError::TableNotFound(name.clone()))?;
                *obj.borrow_mut() = RuntimeObj::Tvi(Some(TableVectorIterator::new(table, self.ctx.txn().clone())));
                Ok(Value::Nil)
            }
            Builtin::TableIterAdvance => {
                let obj = self.obj_arg(&args[0])?;
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::Tvi(Some(tvi)) => Ok(Value::Bool(tvi.advance())),
                    _ => Err(ExecError::NotInitialized("TableVectorIterator")),
                }
            }
            Builtin::TableIterGetPci => {
                let obj = self.obj_arg(&args[0])?;
                Ok(Value::Pci(obj))
            }
            Builtin::TableIterClose => {
                let obj = self.obj_arg(&args[0])?;
                let mut guard = obj.borrow_mut();
                if let RuntimeObj::Tvi(Some(tvi)) = &mut *guard {
                    tvi.close();
                }
                Ok(Value::Nil)
            }

            // Projected columns iteration
            Builtin::PciIsFiltered => self.with_pci(&args[0], |pci| Ok(Value::Bool(pci.is_filtered()))),
            Builtin::PciHasNext => self.with_pci(&args[0], |pci| Ok(Value::Bool(pci.has_next()))),
            Builtin::PciHasNextFiltered => self.with_pci(&args[0], |pci| Ok(Value::Bool(pci.has_next_filtered()))),
            Builtin::PciAdvance => self.with_pci(&args[0], |pci| Ok(Value::Bool(pci.advance()))),
            Builtin::PciAdvanceFiltered => self.with_pci(&args[0], |pci| Ok(Value::Bool(pci.advance_filtered()))),
            Builtin::PciReset => self.with_pci(&args[0], |pci| {
                pci.reset();
                Ok(Value::Bool(true))
            }),
            Builtin::PciResetFiltered => self.with_pci(&args[0], |pci| {
                pci.reset_filtered();
                Ok(Value::Bool(true))
            }),
            Builtin::PciMatch => {
                let matched = self.truthy(&args[1])?;
                self.with_pci(&args[0], |pci| {
                    pci.match_row(matched);
                    Ok(Value::Nil)
                })
            }
            Builtin::PciGetSmallInt | Builtin::PciGetInt | Builtin::PciGetBigInt | Builtin::PciGetReal | Builtin::PciGetDouble => {
                let col = self.int_arg(&args[1])? as usize;
                self.with_pci(&args[0], |pci| Ok(Value::Sql(pci.get(col).clone())))
            }

            Builtin::Hash => {
                let mut values = Vec::with_capacity(args.len());
                for arg in &args {
                    values.push(self.sql_arg(arg)?);
                }
                Ok(Value::UInt(Self::hash_values(&values)))
            }

            // Filter manager
            Builtin::FilterManagerInit => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::FilterManager { filters: Vec::new(), finalized: false };
                Ok(Value::Nil)
            }
            Builtin::FilterManagerInsertFilter => {
                let obj = self.obj_arg(&args[0])?;
                let mut names = Vec::new();
                for arg in &args[1..] {
                    names.push(self.fn_arg(arg)?);
                }
                match &mut *obj.borrow_mut() {
                    RuntimeObj::FilterManager { filters, .. } => filters.extend(names),
                    _ => return Err(ExecError::TypeViolation("expected a filter manager".to_string())),
                }
                Ok(Value::Nil)
            }
            Builtin::FilterManagerFinalize => {
                let obj = self.obj_arg(&args[0])?;
                if let RuntimeObj::FilterManager { finalized, .. } = &mut *obj.borrow_mut() {
                    *finalized = true;
                }
                Ok(Value::Nil)
            }
            Builtin::FilterManagerRunFilters => {
                let obj = self.obj_arg(&args[0])?;
                let filters = match &*obj.borrow() {
                    RuntimeObj::FilterManager { filters, .. } => filters.clone(),
                    _ => return Err(ExecError::TypeViolation("expected a filter manager".to_string())),
                };
                for name in filters {
                    self.call_function(&name, vec![args[1].clone()])?;
                }
                Ok(Value::Nil)
            }
            Builtin::FilterManagerFree => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::FilterManager { filters: Vec::new(), finalized: false };
                Ok(Value::Nil)
            }

            // Aggregation hash table
            Builtin::AggHashTableInit => {
                let obj = self.obj_arg(&args[0])?;
                let size = self.uint_arg(&args[2])? as usize;
                *obj.borrow_mut() = RuntimeObj::Aht(Some(AggregationHashTable::new(self.ctx.mem_pool(), size)));
                Ok(Value::Nil)
            }
            Builtin::AggHashTableInsert => {
                let obj = self.obj_arg(&args[0])?;
                let hash = self.uint_arg(&args[1])?;
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::Aht(Some(aht)) => {
                        let buf = aht.insert(hash);
                        Ok(Value::Ptr(TypedPtr { buf, offset: 0, kind: PtrKind::Raw }))
                    }
                    _ => Err(ExecError::NotInitialized("AggregationHashTable")),
                }
            }
            Builtin::AggHashTableLookup => {
                let obj = self.obj_arg(&args[0])?;
                let hash = self.uint_arg(&args[1])?;
                let key_check = self.fn_arg(&args[2])?;
                let probe = args[3].clone();
                let candidates: Vec<ByteBuffer> = {
                    let guard = obj.borrow();
                    let RuntimeObj::Aht(Some(aht)) = &*guard else {
                        return Err(ExecError::NotInitialized("AggregationHashTable"));
                    };
                    aht.candidates(hash)
                };
                let mut failure = None;
                for candidate in candidates {
                    let payload = Value::Ptr(TypedPtr { buf: candidate.clone(), offset: 0, kind: PtrKind::Raw });
                    if self.callback_truthy(&key_check, vec![payload, probe.clone()], &mut failure) {
                        return Ok(Value::Ptr(TypedPtr { buf: candidate, offset: 0, kind: PtrKind::Raw }));
                    }
                    if let Some(e) = failure.take() {
                        return Err(e);
                    }
                }
                Ok(Value::Nil)
            }
            Builtin::AggHashTableIterInit => {
                let iter_obj = self.obj_arg(&args[0])?;
                let aht_obj = self.obj_arg(&args[1])?;
                let guard = aht_obj.borrow();
                let RuntimeObj::Aht(Some(aht)) = &*guard else {
                    return Err(ExecError::NotInitialized("AggregationHashTable"));
                };
                *iter_obj.borrow_mut() = RuntimeObj::AhtIter(Some(AggregationHashTableIterator::new(aht)));
                Ok(Value::Nil)
            }
            Builtin::AggHashTableIterHasNext => {
                let obj = self.obj_arg(&args[0])?;
                let guard = obj.borrow();
                match &*guard {
                    RuntimeObj::AhtIter(Some(iter)) => Ok(Value::Bool(iter.has_next())),
                    _ => Err(ExecError::NotInitialized("AggregationHashTableIterator")),
                }
            }
            Builtin::AggHashTableIterNext => {
                let obj = self.obj_arg(&args[0])?;
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::AhtIter(Some(iter)) => {
                        iter.next();
                        Ok(Value::Nil)
                    }
                    _ => Err(ExecError::NotInitialized("AggregationHashTableIterator")),
                }
            }
            Builtin::AggHashTableIterGetRow => {
                let obj = self.obj_arg(&args[0])?;
                let guard = obj.borrow();
                match &*guard {
                    RuntimeObj::AhtIter(Some(iter)) => match iter.get_row() {
                        Some(buf) => Ok(Value::Ptr(TypedPtr { buf, offset: 0, kind: PtrKind::Raw })),
                        None => Ok(Value::Nil),
                    },
                    _ => Err(ExecError::NotInitialized("AggregationHashTableIterator")),
                }
            }
            Builtin::AggHashTableIterClose => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::AhtIter(None);
                Ok(Value::Nil)
            }
            Builtin::AggHashTableFree => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::Aht(None);
                Ok(Value::Nil)
            }

            // Aggregators
            Builtin::AggInit | Builtin::AggReset => {
                for arg in &args {
                    let (kind, buf, offset) = self.agg_ptr(arg)?;
                    aggregators::agg_init(kind, &buf, offset);
                }
                Ok(Value::Nil)
            }
            Builtin::AggAdvance => {
                let (kind, buf, offset) = self.agg_ptr(&args[0])?;
                let value = self.sql_arg(&args[1])?;
                aggregators::agg_advance(kind, &buf, offset, &value);
                Ok(Value::Nil)
            }
            Builtin::AggMerge => {
                let (kind, dst_buf, dst_off) = self.agg_ptr(&args[0])?;
                let (_, src_buf, src_off) = self.agg_ptr(&args[1])?;
                aggregators::agg_merge(kind, (&dst_buf, dst_off), (&src_buf, src_off));
                Ok(Value::Nil)
            }
            Builtin::AggResult => {
                let (kind, buf, offset) = self.agg_ptr(&args[0])?;
                Ok(Value::Sql(aggregators::agg_result(kind, &buf, offset)))
            }

            // Join hash table
            Builtin::JoinHashTableInit => {
                let obj = self.obj_arg(&args[0])?;
                let size = self.uint_arg(&args[2])? as usize;
                *obj.borrow_mut() = RuntimeObj::Jht(Some(JoinHashTable::new(self.ctx.mem_pool(), size)));
                Ok(Value::Nil)
            }
            Builtin::JoinHashTableInsert => {
                let obj = self.obj_arg(&args[0])?;
                let hash = self.uint_arg(&args[1])?;
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::Jht(Some(jht)) => {
                        let buf = jht.insert(hash);
                        Ok(Value::Ptr(TypedPtr { buf, offset: 0, kind: PtrKind::Raw }))
                    }
                    _ => Err(ExecError::NotInitialized("JoinHashTable")),
                }
            }
            Builtin::JoinHashTableBuild => {
                let obj = self.obj_arg(&args[0])?;
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::Jht(Some(jht)) => {
                        jht.build();
                        Ok(Value::Nil)
                    }
                    _ => Err(ExecError::NotInitialized("JoinHashTable")),
                }
            }
            Builtin::JoinHashTableBuildParallel => {
                let obj = self.obj_arg(&args[0])?;
                let tls_obj = self.obj_arg(&args[1])?;
                let tls_guard = tls_obj.borrow();
                let RuntimeObj::Tls(tls) = &*tls_guard else {
                    return Err(ExecError::TypeViolation("expected a thread state container".to_string()));
                };
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::Jht(Some(jht)) => {
                        jht.build_parallel(Vec::new(), tls);
                        Ok(Value::Nil)
                    }
                    _ => Err(ExecError::NotInitialized("JoinHashTable")),
                }
            }
            Builtin::JoinHashTableFree => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::Jht(None);
                Ok(Value::Nil)
            }
            Builtin::JoinHashTableIterInit => {
                let iter_obj = self.obj_arg(&args[0])?;
                let jht_obj = self.obj_arg(&args[1])?;
                let hash = self.uint_arg(&args[2])?;
                let guard = jht_obj.borrow();
                let RuntimeObj::Jht(Some(jht)) = &*guard else {
                    return Err(ExecError::NotInitialized("JoinHashTable"));
                };
                *iter_obj.borrow_mut() = RuntimeObj::JhtIter(Some(JoinHashTableIterator::new(jht, hash)));
                Ok(Value::Nil)
            }
            Builtin::JoinHashTableIterHasNext => {
                let iter_obj = self.obj_arg(&args[0])?;
                let key_eq = self.fn_arg(&args[1])?;
                let ctx_arg = args[2].clone();
                let probe_arg = args[3].clone();
                let mut failure = None;
                let has_next = {
                    let mut guard = iter_obj.borrow_mut();
                    let RuntimeObj::JhtIter(Some(iter)) = &mut *guard else {
                        return Err(ExecError::NotInitialized("JoinHashTableIterator"));
                    };
                    // Borrowing note: the callback re-enters the interpreter
                    // but never touches this iterator object.
                    iter.has_next(|candidate| {
                        let build = Value::Ptr(TypedPtr { buf: candidate.clone(), offset: 0, kind: PtrKind::Raw });
                        self.callback_truthy(&key_eq, vec![ctx_arg.clone(), probe_arg.clone(), build], &mut failure)
                    })
                };
                if let Some(e) = failure {
                    return Err(e);
                }
                Ok(Value::Bool(has_next))
            }
            Builtin::JoinHashTableIterGetRow => {
                let obj = self.obj_arg(&args[0])?;
                let guard = obj.borrow();
                match &*guard {
                    RuntimeObj::JhtIter(Some(iter)) => match iter.get_row() {
                        Some(buf) => Ok(Value::Ptr(TypedPtr { buf, offset: 0, kind: PtrKind::Raw })),
                        None => Ok(Value::Nil),
                    },
                    _ => Err(ExecError::NotInitialized("JoinHashTableIterator")),
                }
            }
            Builtin::JoinHashTableIterClose => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::JhtIter(None);
                Ok(Value::Nil)
            }

            // Sorter
            Builtin::SorterInit => {
                let obj = self.obj_arg(&args[0])?;
                let cmp_fn = self.fn_arg(&args[2])?;
                let size = self.uint_arg(&args[3])? as usize;
                *obj.borrow_mut() = RuntimeObj::SorterState {
                    sorter: Some(Sorter::new(self.ctx.mem_pool(), size)),
                    cmp_fn: Some(cmp_fn),
                };
                Ok(Value::Nil)
            }
            Builtin::SorterInsert => {
                let obj = self.obj_arg(&args[0])?;
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::SorterState { sorter: Some(sorter), .. } => {
                        let buf = sorter.insert();
                        Ok(Value::Ptr(TypedPtr { buf, offset: 0, kind: PtrKind::Raw }))
                    }
                    _ => Err(ExecError::NotInitialized("Sorter")),
                }
            }
            Builtin::SorterSort | Builtin::SorterSortParallel | Builtin::SorterSortTopKParallel => {
                let obj = self.obj_arg(&args[0])?;
                let top_k = if builtin == Builtin::SorterSortTopKParallel {
                    Some(self.uint_arg(&args[3])?)
                } else {
                    None
                };
                let mut failure = None;
                {
                    let mut guard = obj.borrow_mut();
                    let RuntimeObj::SorterState { sorter: Some(sorter), cmp_fn: Some(cmp_fn) } = &mut *guard else {
                        return Err(ExecError::NotInitialized("Sorter"));
                    };
                    let cmp_fn = cmp_fn.clone();
                    let tls = crate::exec::context::ThreadStateContainer::new();
                    let cmp = |a: &ByteBuffer, b: &ByteBuffer| {
                        let lhs = Value::Ptr(TypedPtr { buf: a.clone(), offset: 0, kind: PtrKind::Raw });
                        let rhs = Value::Ptr(TypedPtr { buf: b.clone(), offset: 0, kind: PtrKind::Raw });
                        self.callback_i32(&cmp_fn, vec![lhs, rhs], &mut failure)
                    };
                    match (builtin, top_k) {
                        (Builtin::SorterSort, _) => sorter.sort(cmp),
                        (Builtin::SorterSortParallel, _) => sorter.sort_parallel(Vec::new(), &tls, cmp),
                        (_, Some(k)) => sorter.sort_topk_parallel(Vec::new(), &tls, cmp, k),
                        _ => unreachable!("not a sorter sort call"),
                    }
                }
                if let Some(e) = failure {
                    return Err(e);
                }
                Ok(Value::Nil)
            }
            Builtin::SorterFree => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::SorterState { sorter: None, cmp_fn: None };
                Ok(Value::Nil)
            }
            Builtin::SorterIterInit => {
                let iter_obj = self.obj_arg(&args[0])?;
                let sorter_obj = self.obj_arg(&args[1])?;
                let guard = sorter_obj.borrow();
                let RuntimeObj::SorterState { sorter: Some(sorter), .. } = &*guard else {
                    return Err(ExecError::NotInitialized("Sorter"));
                };
                *iter_obj.borrow_mut() = RuntimeObj::SorterIter(Some(SorterIterator::new(sorter)));
                Ok(Value::Nil)
            }
            Builtin::SorterIterHasNext => {
                let obj = self.obj_arg(&args[0])?;
                let guard = obj.borrow();
                match &*guard {
                    RuntimeObj::SorterIter(Some(iter)) => Ok(Value::Bool(iter.has_next())),
                    _ => Err(ExecError::NotInitialized("SorterIterator")),
                }
            }
            Builtin::SorterIterNext => {
                let obj = self.obj_arg(&args[0])?;
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::SorterIter(Some(iter)) => {
                        iter.next();
                        Ok(Value::Nil)
                    }
                    _ => Err(ExecError::NotInitialized("SorterIterator")),
                }
            }
            Builtin::SorterIterGetRow => {
                let obj = self.obj_arg(&args[0])?;
                let guard = obj.borrow();
                match &*guard {
                    RuntimeObj::SorterIter(Some(iter)) => match iter.get_row() {
                        Some(buf) => Ok(Value::Ptr(TypedPtr { buf, offset: 0, kind: PtrKind::Raw })),
                        None => Ok(Value::Nil),
                    },
                    _ => Err(ExecError::NotInitialized("SorterIterator")),
                }
            }
            Builtin::SorterIterClose => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::SorterIter(None);
                Ok(Value::Nil)
            }

            // Output buffer
            Builtin::OutputAlloc => {
                let ptr = self
                    .ctx
                    .with_output(|out| out.alloc())
                    .ok_or_else(|| ExecError::TypeViolation("query has no output buffer".to_string()))?;
                Ok(Value::Ptr(TypedPtr { buf: ptr.buf, offset: ptr.offset, kind: PtrKind::Raw }))
            }
            Builtin::OutputAdvance => {
                self.ctx.with_output(|out| out.advance());
                Ok(Value::Nil)
            }
            Builtin::OutputSetNull => {
                let col = self.int_arg(&args[1])? as usize;
                self.ctx.with_output(|out| out.set_null(col));
                Ok(Value::Nil)
            }
            Builtin::OutputFinalize => {
                self.ctx.with_output(|out| out.finalize());
                Ok(Value::Nil)
            }

            // Index iteration
            Builtin::IndexIteratorInit => {
                let obj = self.obj_arg(&args[0])?;
                let Value::Str(name) = &args[1] else {
                    return Err(ExecError::TypeViolation("index name must be a string".to_string()));
                };
                let (index, table) = self
                    .ctx
                    .lookup_index(name)
                    .ok_or_else(|| ExecError::IndexNotFound(name.clone()))?;
                let col_oids = table.columns().iter().map(|c| c.oid).collect();
                let mut iter = IndexIterator::new(index, table, self.ctx.txn().clone());
                iter.set_cols(col_oids);
                iter.init()?;
                *obj.borrow_mut() = RuntimeObj::IndexIter(Some(iter));
                Ok(Value::Nil)
            }
            Builtin::IndexIteratorScanKey => {
                let obj = self.obj_arg(&args[0])?;
                let key_ptr = self.raw_ptr(&args[1])?;
                let bytes = key_ptr.buf.read(|b| b[key_ptr.offset..].to_vec());
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::IndexIter(Some(iter)) => {
                        iter.scan_key_from_bytes(&bytes)?;
                        Ok(Value::Nil)
                    }
                    _ => Err(ExecError::NotInitialized("IndexIterator")),
                }
            }
            Builtin::IndexIteratorAdvance => {
                let obj = self.obj_arg(&args[0])?;
                let mut guard = obj.borrow_mut();
                match &mut *guard {
                    RuntimeObj::IndexIter(Some(iter)) => Ok(Value::Bool(iter.advance())),
                    _ => Err(ExecError::NotInitialized("IndexIterator")),
                }
            }
            Builtin::IndexIteratorGetSmallInt
            | Builtin::IndexIteratorGetInt
            | Builtin::IndexIteratorGetBigInt
            | Builtin::IndexIteratorGetReal
            | Builtin::IndexIteratorGetDouble => {
                let obj = self.obj_arg(&args[0])?;
                let col = self.int_arg(&args[1])? as usize;
                let guard = obj.borrow();
                match &*guard {
                    RuntimeObj::IndexIter(Some(iter)) => iter
                        .get(col)
                        .map(|v| Value::Sql(v.clone()))
                        .ok_or(ExecError::NotInitialized("IndexIterator")),
                    _ => Err(ExecError::NotInitialized("IndexIterator")),
                }
            }
            Builtin::IndexIteratorFree => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::IndexIter(None);
                Ok(Value::Nil)
            }

            // Thread state container
            Builtin::TlsInit => {
                let obj = self.obj_arg(&args[0])?;
                *obj.borrow_mut() = RuntimeObj::Tls(crate::exec::context::ThreadStateContainer::new());
                Ok(Value::Nil)
            }
            Builtin::TlsFree => {
                let obj = self.obj_arg(&args[0])?;
                if let RuntimeObj::Tls(tls) = &*obj.borrow() {
                    tls.reset(0);
                }
                Ok(Value::Nil)
            }

            // Trig
            Builtin::ACos | Builtin::ASin | Builtin::ATan | Builtin::Cos | Builtin::Cot | Builtin::Sin | Builtin::Tan => {
                let input = self.sql_arg(&args[0])?;
                let Some(v) = input.as_real() else {
                    return Ok(Value::Sql(SqlValue::null_of(SqlTypeId::Decimal)));
                };
                let result = match builtin {
                    Builtin::ACos => v.acos(),
                    Builtin::ASin => v.asin(),
                    Builtin::ATan => v.atan(),
                    Builtin::Cos => v.cos(),
                    Builtin::Cot => 1.0 / v.tan(),
                    Builtin::Sin => v.sin(),
                    _ => v.tan(),
                };
                Ok(Value::Sql(SqlValue::real(result)))
            }
            Builtin::ATan2 => {
                let a = self.sql_arg(&args[0])?;
                let b = self.sql_arg(&args[1])?;
                match (a.as_real(), b.as_real()) {
                    (Some(a), Some(b)) => Ok(Value::Sql(SqlValue::real(a.atan2(b)))),
                    _ => Ok(Value::Sql(SqlValue::null_of(SqlTypeId::Decimal))),
                }
            }

            // Checked by the analyzer but not executable on this engine's
            // serial interpretation path.
            other => Err(ExecError::UnsupportedIntrinsic(other.name().to_string())),
        }
    }
}
