// Hash Join Translators
//
// The build side is a pipeline breaker: it materializes build rows into the
// join hash table and finalizes the table when its pipeline drains. The
// probe side materializes the probe keys, walks the hash chain with the
// emitted key-equality function, and exposes build columns next to the probe
// child's output.

use crate::compiler::codegen::{CodeGen, FunctionBuilder, EXEC_CTX};
use crate::compiler::operators::{MaterializerKind, OperatorTranslator, OutputSource, StateField};
use crate::compiler::CompileError;
use crate::dsl::ast::{CmpOp, FunctionDecl, Stmt, TypeRepr};
use crate::dsl::builtins::Builtin;
use crate::sql::SqlTypeId;

fn struct_fields(prefix: &str, types: &[SqlTypeId]) -> Vec<(String, TypeRepr)> {
    types
        .iter()
        .enumerate()
        .map(|(i, t)| (format!("{}{}", prefix, i), TypeRepr::named(CodeGen::sql_type_name(*t))))
        .collect()
}

pub struct JoinBuildTranslator {
    build_keys: Vec<usize>,
    build_types: Vec<SqlTypeId>,
    jht: String,
    row_struct: String,
    row_var: String,
}

impl JoinBuildTranslator {
    pub fn new(cg: &mut CodeGen, build_keys: Vec<usize>, build_types: Vec<SqlTypeId>) -> Self {
        Self {
            build_keys,
            build_types,
            jht: cg.fresh_name("joinHT"),
            row_struct: cg.fresh_name("BuildRow"),
            row_var: cg.fresh_name("buildRow"),
        }
    }

    pub fn state_name(&self) -> &str {
        &self.jht
    }

    pub fn row_struct_name(&self) -> &str {
        &self.row_struct
    }

    pub fn num_columns(&self) -> usize {
        self.build_types.len()
    }

    pub fn key_indexes(&self) -> &[usize] {
        &self.build_keys
    }
}

impl OperatorTranslator for JoinBuildTranslator {
    fn initialize_structs(&mut self, cg: &mut CodeGen) {
        cg.declare_struct(&self.row_struct, struct_fields("c", &self.build_types));
    }

    fn initialize_state_fields(&self, fields: &mut Vec<StateField>) {
        fields.push(StateField {
            name: self.jht.clone(),
            type_name: "JoinHashTable".to_string(),
        });
    }

    fn initialize_setup(&self, cg: &mut CodeGen, stmts: &mut Vec<Stmt>) {
        let jht_ptr = cg.addr_of_ident(&self.jht);
        let ctx = cg.ident(EXEC_CTX);
        let mem = cg.call(Builtin::ExecCtxGetMemoryPool, vec![ctx]);
        let size = cg.size_of(&self.row_struct);
        let init = cg.call(Builtin::JoinHashTableInit, vec![jht_ptr, mem, size]);
        stmts.push(Stmt::Expr(init));
    }

    fn initialize_teardown(&self, cg: &mut CodeGen, stmts: &mut Vec<Stmt>) {
        let jht_ptr = cg.addr_of_ident(&self.jht);
        stmts.push(Stmt::Expr(cg.call(Builtin::JoinHashTableFree, vec![jht_ptr])));
    }

    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        let child = child
            .ok_or_else(|| CompileError::Unsupported("join build requires an upstream operator".to_string()))?
            .clone();

        // var hashVal = @hash(key...)
        let hash_var = cg.fresh_name("hashVal");
        let mut key_args = Vec::with_capacity(self.build_keys.len());
        for &key in &self.build_keys {
            key_args.push(child.expr(cg, key)?);
        }
        let hash = cg.call(Builtin::Hash, key_args);
        fb.declare_var(&hash_var, None, Some(hash));

        // var buildRow = @ptrCast(*BuildRow, @joinHTInsert(jht, hashVal))
        let jht = cg.ident(&self.jht);
        let hash_val = cg.ident(&hash_var);
        let insert = cg.call(Builtin::JoinHashTableInsert, vec![jht, hash_val]);
        let cast = cg.ptr_cast(&self.row_struct, insert);
        fb.declare_var(&self.row_var, None, Some(cast));

        for i in 0..self.build_types.len() {
            let target = cg.member_of_ident(&self.row_var, &format!("c{}", i));
            let value = child.expr(cg, i)?;
            fb.append_assign(target, value);
        }

        // Finalize the table once the build pipeline drains.
        let jht = cg.ident(&self.jht);
        fb.append_after_close(Stmt::Expr(cg.call(Builtin::JoinHashTableBuild, vec![jht])));
        Ok(())
    }

    fn output_source(&self) -> Option<&OutputSource> {
        None
    }

    fn is_materializer(&self) -> MaterializerKind {
        MaterializerKind::Tuple
    }

    fn materialized_tuple(&self) -> Option<(&str, &str)> {
        Some((&self.row_var, &self.row_struct))
    }
}

pub struct JoinProbeTranslator {
    probe_keys: Vec<usize>,
    probe_key_types: Vec<SqlTypeId>,
    jht: String,
    build_struct: String,
    build_keys: Vec<usize>,
    build_cols: usize,
    probe_struct: String,
    key_eq_fn: String,
    iter_var: String,
    build_row_var: String,
    probe_row_var: String,
    source: Option<OutputSource>,
    children: Vec<OutputSource>,
}

impl JoinProbeTranslator {
    pub fn new(
        cg: &mut CodeGen,
        build: &JoinBuildTranslator,
        probe_keys: Vec<usize>,
        probe_key_types: Vec<SqlTypeId>,
    ) -> Self {
        Self {
            probe_keys,
            probe_key_types,
            jht: build.state_name().to_string(),
            build_struct: build.row_struct_name().to_string(),
            build_keys: build.key_indexes().to_vec(),
            build_cols: build.num_columns(),
            probe_struct: cg.fresh_name("ProbeRow"),
            key_eq_fn: cg.fresh_name("joinKeyEq"),
            iter_var: cg.fresh_name("jhtIter"),
            build_row_var: cg.fresh_name("buildRow"),
            probe_row_var: cg.fresh_name("probeRow"),
            source: None,
            children: Vec::new(),
        }
    }
}

impl OperatorTranslator for JoinProbeTranslator {
    fn initialize_structs(&mut self, cg: &mut CodeGen) {
        cg.declare_struct(&self.probe_struct, struct_fields("k", &self.probe_key_types));
    }

    fn initialize_helper_functions(&mut self, cg: &mut CodeGen) {
        // fun keyEq(ctx: *uint8, probe: *uint8, build: *uint8) -> bool
        let mut body = Vec::new();
        let probe_arg = cg.ident("probe");
        let probe_cast = cg.ptr_cast(&self.probe_struct, probe_arg);
        body.push(Stmt::Var { name: "p".to_string(), ty: None, init: Some(probe_cast) });
        let build_arg = cg.ident("build");
        let build_cast = cg.ptr_cast(&self.build_struct, build_arg);
        body.push(Stmt::Var { name: "b".to_string(), ty: None, init: Some(build_cast) });
        for (i, &build_key) in self.build_keys.iter().enumerate() {
            let lhs = cg.member_of_ident("p", &format!("k{}", i));
            let rhs = cg.member_of_ident("b", &format!("c{}", build_key));
            let eq = cg.compare(CmpOp::Eq, lhs, rhs);
            let false_lit = cg.bool_lit(false);
            body.push(Stmt::If {
                cond: eq,
                then_block: vec![],
                else_block: Some(vec![Stmt::Return(Some(false_lit))]),
            });
        }
        let true_lit = cg.bool_lit(true);
        body.push(Stmt::Return(Some(true_lit)));

        let byte_ptr = || TypeRepr::pointer(TypeRepr::named("uint8"));
        cg.declare_function(FunctionDecl {
            name: self.key_eq_fn.clone(),
            params: vec![
                ("ctx".to_string(), byte_ptr()),
                ("probe".to_string(), byte_ptr()),
                ("build".to_string(), byte_ptr()),
            ],
            ret: TypeRepr::named("bool"),
            body,
        });
    }

    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        let child = child
            .ok_or_else(|| CompileError::Unsupported("join probe requires an upstream operator".to_string()))?
            .clone();

        // Materialize the probe keys so the key-equality function can read
        // them through an opaque pointer.
        fb.declare_var(&self.probe_row_var, Some(TypeRepr::named(&self.probe_struct)), None);
        for (i, &key) in self.probe_keys.iter().enumerate() {
            let target = cg.member_of_ident(&self.probe_row_var, &format!("k{}", i));
            let value = child.expr(cg, key)?;
            fb.append_assign(target, value);
        }

        let hash_var = cg.fresh_name("hashVal");
        let mut key_args = Vec::with_capacity(self.probe_keys.len());
        for &key in &self.probe_keys {
            key_args.push(child.expr(cg, key)?);
        }
        let hash = cg.call(Builtin::Hash, key_args);
        fb.declare_var(&hash_var, None, Some(hash));

        // var jhtIter: JoinHashTableIterator
        // @joinHTIterInit(&jhtIter, jht, hashVal)
        fb.declare_var(&self.iter_var, Some(TypeRepr::named("JoinHashTableIterator")), None);
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let jht = cg.ident(&self.jht);
        let hash_val = cg.ident(&hash_var);
        let init = cg.call(Builtin::JoinHashTableIterInit, vec![iter_ptr, jht, hash_val]);
        fb.append_expr(init);

        // for (@joinHTIterHasNext(&jhtIter, keyEq, execCtx, &probeRow)) { ... }
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let key_eq = cg.ident(&self.key_eq_fn);
        let ctx = cg.ident(EXEC_CTX);
        let probe_ptr = cg.addr_of_ident(&self.probe_row_var);
        let has_next = cg.call(Builtin::JoinHashTableIterHasNext, vec![iter_ptr, key_eq, ctx, probe_ptr]);
        fb.start_for(Some(has_next), None);
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        fb.append_after_block(Stmt::Expr(cg.call(Builtin::JoinHashTableIterClose, vec![iter_ptr])));

        // var buildRow = @ptrCast(*BuildRow, @joinHTIterGetRow(&jhtIter))
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let get_row = cg.call(Builtin::JoinHashTableIterGetRow, vec![iter_ptr]);
        let cast = cg.ptr_cast(&self.build_struct, get_row);
        fb.declare_var(&self.build_row_var, None, Some(cast));

        let build_source = OutputSource::Struct {
            var: self.build_row_var.clone(),
            fields: (0..self.build_cols).map(|i| format!("c{}", i)).collect(),
        };
        self.children = vec![build_source.clone(), child.clone()];
        self.source = Some(OutputSource::Pair {
            left: Box::new(build_source),
            right: Box::new(child),
            split: self.build_cols,
        });
        Ok(())
    }

    fn output_source(&self) -> Option<&OutputSource> {
        self.source.as_ref()
    }

    fn child_sources(&self) -> &[OutputSource] {
        &self.children
    }
}
