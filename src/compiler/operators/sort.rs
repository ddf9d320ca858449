// Sort Translators
//
// The build phase copies rows into the sorter and finalizes with a plain
// sort, a parallel sort, or a parallel top-K sort depending on the plan's
// hints. The output phase drains the sorted run through an iterator.

use crate::compiler::codegen::{CodeGen, FunctionBuilder, EXEC_CTX};
use crate::compiler::operators::{MaterializerKind, OperatorTranslator, OutputSource, StateField};
use crate::compiler::CompileError;
use crate::dsl::ast::{CmpOp, FunctionDecl, Stmt, TypeRepr};
use crate::dsl::builtins::Builtin;
use crate::plan::{SortDirection, SortHints};
use crate::sql::SqlTypeId;

pub struct SortBuildTranslator {
    keys: Vec<(usize, SortDirection)>,
    types: Vec<SqlTypeId>,
    hints: SortHints,
    sorter: String,
    tls: String,
    row_struct: String,
    cmp_fn: String,
}

impl SortBuildTranslator {
    pub fn new(cg: &mut CodeGen, keys: Vec<(usize, SortDirection)>, types: Vec<SqlTypeId>, hints: SortHints) -> Self {
        Self {
            keys,
            types,
            hints,
            sorter: cg.fresh_name("sorter"),
            tls: cg.fresh_name("tls"),
            row_struct: cg.fresh_name("SortRow"),
            cmp_fn: cg.fresh_name("sortCmp"),
        }
    }

    pub fn state_name(&self) -> &str {
        &self.sorter
    }

    pub fn row_struct_name(&self) -> &str {
        &self.row_struct
    }

    pub fn num_columns(&self) -> usize {
        self.types.len()
    }
}

impl OperatorTranslator for SortBuildTranslator {
    fn initialize_structs(&mut self, cg: &mut CodeGen) {
        let fields = self
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("c{}", i), TypeRepr::named(CodeGen::sql_type_name(*t))))
            .collect();
        cg.declare_struct(&self.row_struct, fields);
    }

    fn initialize_helper_functions(&mut self, cg: &mut CodeGen) {
        // fun cmp(lhs: *uint8, rhs: *uint8) -> int32
        let mut body = Vec::new();
        let lhs_arg = cg.ident("lhs");
        let lhs_cast = cg.ptr_cast(&self.row_struct, lhs_arg);
        body.push(Stmt::Var { name: "a".to_string(), ty: None, init: Some(lhs_cast) });
        let rhs_arg = cg.ident("rhs");
        let rhs_cast = cg.ptr_cast(&self.row_struct, rhs_arg);
        body.push(Stmt::Var { name: "b".to_string(), ty: None, init: Some(rhs_cast) });

        for (key, direction) in &self.keys {
            let field = format!("c{}", key);
            let (first, second) = match direction {
                SortDirection::Ascending => (-1, 1),
                SortDirection::Descending => (1, -1),
            };
            let a_field = cg.member_of_ident("a", &field);
            let b_field = cg.member_of_ident("b", &field);
            let a_less = cg.compare(CmpOp::Lt, a_field, b_field);
            let first_lit = cg.int_lit(first);
            body.push(Stmt::If {
                cond: a_less,
                then_block: vec![Stmt::Return(Some(first_lit))],
                else_block: None,
            });
            let b_field = cg.member_of_ident("b", &field);
            let a_field = cg.member_of_ident("a", &field);
            let b_less = cg.compare(CmpOp::Lt, b_field, a_field);
            let second_lit = cg.int_lit(second);
            body.push(Stmt::If {
                cond: b_less,
                then_block: vec![Stmt::Return(Some(second_lit))],
                else_block: None,
            });
        }
        let zero = cg.int_lit(0);
        body.push(Stmt::Return(Some(zero)));

        let byte_ptr = || TypeRepr::pointer(TypeRepr::named("uint8"));
        cg.declare_function(FunctionDecl {
            name: self.cmp_fn.clone(),
            params: vec![("lhs".to_string(), byte_ptr()), ("rhs".to_string(), byte_ptr())],
            ret: TypeRepr::named("int32"),
            body,
        });
    }

    fn initialize_state_fields(&self, fields: &mut Vec<StateField>) {
        fields.push(StateField { name: self.sorter.clone(), type_name: "Sorter".to_string() });
        if self.hints.parallel {
            fields.push(StateField {
                name: self.tls.clone(),
                type_name: "ThreadStateContainer".to_string(),
            });
        }
    }

    fn initialize_setup(&self, cg: &mut CodeGen, stmts: &mut Vec<Stmt>) {
        let sorter_ptr = cg.addr_of_ident(&self.sorter);
        let ctx = cg.ident(EXEC_CTX);
        let mem = cg.call(Builtin::ExecCtxGetMemoryPool, vec![ctx]);
        let cmp = cg.ident(&self.cmp_fn);
        let size = cg.size_of(&self.row_struct);
        let init = cg.call(Builtin::SorterInit, vec![sorter_ptr, mem, cmp, size]);
        stmts.push(Stmt::Expr(init));
        if self.hints.parallel {
            let tls_ptr = cg.addr_of_ident(&self.tls);
            let ctx = cg.ident(EXEC_CTX);
            let mem = cg.call(Builtin::ExecCtxGetMemoryPool, vec![ctx]);
            let init = cg.call(Builtin::TlsInit, vec![tls_ptr, mem]);
            stmts.push(Stmt::Expr(init));
        }
    }

    fn initialize_teardown(&self, cg: &mut CodeGen, stmts: &mut Vec<Stmt>) {
        let sorter_ptr = cg.addr_of_ident(&self.sorter);
        stmts.push(Stmt::Expr(cg.call(Builtin::SorterFree, vec![sorter_ptr])));
        if self.hints.parallel {
            let tls_ptr = cg.addr_of_ident(&self.tls);
            stmts.push(Stmt::Expr(cg.call(Builtin::TlsFree, vec![tls_ptr])));
        }
    }

    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        let child = child
            .ok_or_else(|| CompileError::Unsupported("sort requires an upstream operator".to_string()))?
            .clone();

        // var sortRow = @ptrCast(*SortRow, @sorterInsert(sorter))
        let row_var = cg.fresh_name("sortRow");
        let sorter = cg.ident(&self.sorter);
        let insert = cg.call(Builtin::SorterInsert, vec![sorter]);
        let cast = cg.ptr_cast(&self.row_struct, insert);
        fb.declare_var(&row_var, None, Some(cast));
        for i in 0..self.types.len() {
            let target = cg.member_of_ident(&row_var, &format!("c{}", i));
            let value = child.expr(cg, i)?;
            fb.append_assign(target, value);
        }

        // Finalize once the build pipeline drains.
        let finalize = match (self.hints.parallel, self.hints.top_k) {
            (true, Some(k)) => {
                let sorter = cg.ident(&self.sorter);
                let tls = cg.ident(&self.tls);
                let offset = cg.uint32_lit(0);
                let top_k = cg.uint64_lit(k);
                cg.call(Builtin::SorterSortTopKParallel, vec![sorter, tls, offset, top_k])
            }
            (true, None) => {
                let sorter = cg.ident(&self.sorter);
                let tls = cg.ident(&self.tls);
                let offset = cg.uint32_lit(0);
                cg.call(Builtin::SorterSortParallel, vec![sorter, tls, offset])
            }
            _ => {
                let sorter = cg.ident(&self.sorter);
                cg.call(Builtin::SorterSort, vec![sorter])
            }
        };
        fb.append_after_close(Stmt::Expr(finalize));
        Ok(())
    }

    fn output_source(&self) -> Option<&OutputSource> {
        None
    }
}

pub struct SortOutputTranslator {
    sorter: String,
    row_struct: String,
    num_columns: usize,
    iter_var: String,
    row_var: String,
    source: Option<OutputSource>,
}

impl SortOutputTranslator {
    pub fn new(cg: &mut CodeGen, build: &SortBuildTranslator) -> Self {
        Self {
            sorter: build.state_name().to_string(),
            row_struct: build.row_struct_name().to_string(),
            num_columns: build.num_columns(),
            iter_var: cg.fresh_name("sorterIter"),
            row_var: cg.fresh_name("sortRow"),
            source: None,
        }
    }
}

impl OperatorTranslator for SortOutputTranslator {
    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        _child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        // var sorterIter: SorterIterator
        // @sorterIterInit(&sorterIter, sorter)
        fb.declare_var(&self.iter_var, Some(TypeRepr::named("SorterIterator")), None);
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let sorter = cg.ident(&self.sorter);
        let init = cg.call(Builtin::SorterIterInit, vec![iter_ptr, sorter]);
        fb.append_expr(init);

        // for (; @sorterIterHasNext(&it); @sorterIterNext(&it)) { ... }
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let cond = cg.call(Builtin::SorterIterHasNext, vec![iter_ptr]);
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let step = cg.call(Builtin::SorterIterNext, vec![iter_ptr]);
        fb.start_for(Some(cond), Some(step));
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        fb.append_after_block(Stmt::Expr(cg.call(Builtin::SorterIterClose, vec![iter_ptr])));

        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let get_row = cg.call(Builtin::SorterIterGetRow, vec![iter_ptr]);
        let cast = cg.ptr_cast(&self.row_struct, get_row);
        fb.declare_var(&self.row_var, None, Some(cast));

        self.source = Some(OutputSource::Struct {
            var: self.row_var.clone(),
            fields: (0..self.num_columns).map(|i| format!("c{}", i)).collect(),
        });
        Ok(())
    }

    fn output_source(&self) -> Option<&OutputSource> {
        self.source.as_ref()
    }

    fn is_materializer(&self) -> MaterializerKind {
        MaterializerKind::Tuple
    }

    fn materialized_tuple(&self) -> Option<(&str, &str)> {
        Some((&self.row_var, &self.row_struct))
    }
}
