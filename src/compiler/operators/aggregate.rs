// Aggregation Translators
//
// The build phase hashes the group keys, looks the group up in the
// aggregation hash table, allocates and initializes the payload on a miss,
// and advances the aggregators on every row. The result phase iterates the
// table and projects keys and aggregate results to the parent.

use crate::compiler::codegen::{CodeGen, FunctionBuilder, EXEC_CTX};
use crate::compiler::operators::{MaterializerKind, OperatorTranslator, OutputSource, StateField};
use crate::compiler::CompileError;
use crate::dsl::ast::{CmpOp, ExprId, FunctionDecl, Stmt, TypeRepr};
use crate::dsl::builtins::Builtin;
use crate::plan::{AggKind, AggregateExpr};
use crate::sql::SqlTypeId;

fn aggregator_type_name(kind: AggKind) -> &'static str {
    match kind {
        AggKind::CountStar => "CountStarAggregate",
        AggKind::Count => "CountAggregate",
        AggKind::Sum => "IntegerSumAggregate",
        AggKind::Avg => "IntegerAvgAggregate",
        AggKind::Min => "IntegerMinAggregate",
        AggKind::Max => "IntegerMaxAggregate",
    }
}

pub struct AggregateBuildTranslator {
    group_by: Vec<usize>,
    group_types: Vec<SqlTypeId>,
    aggregates: Vec<AggregateExpr>,
    aht: String,
    payload_struct: String,
    probe_struct: String,
    key_check_fn: String,
}

impl AggregateBuildTranslator {
    pub fn new(
        cg: &mut CodeGen,
        group_by: Vec<usize>,
        group_types: Vec<SqlTypeId>,
        aggregates: Vec<AggregateExpr>,
    ) -> Self {
        Self {
            group_by,
            group_types,
            aggregates,
            aht: cg.fresh_name("aggHT"),
            payload_struct: cg.fresh_name("AggPayload"),
            probe_struct: cg.fresh_name("AggProbe"),
            key_check_fn: cg.fresh_name("aggKeyCheck"),
        }
    }

    pub fn state_name(&self) -> &str {
        &self.aht
    }

    pub fn payload_struct_name(&self) -> &str {
        &self.payload_struct
    }

    pub fn key_field_names(&self) -> Vec<String> {
        (0..self.group_by.len()).map(|i| format!("k{}", i)).collect()
    }

    pub fn agg_field_names(&self) -> Vec<String> {
        (0..self.aggregates.len()).map(|i| format!("a{}", i)).collect()
    }

    fn hash_expr(&self, cg: &mut CodeGen, child: &OutputSource) -> Result<ExprId, CompileError> {
        if self.group_by.is_empty() {
            // A single global group: every row lands in the same bucket.
            return Ok(cg.uint64_lit(0));
        }
        let mut args = Vec::with_capacity(self.group_by.len());
        for &key in &self.group_by {
            args.push(child.expr(cg, key)?);
        }
        Ok(cg.call(Builtin::Hash, args))
    }
}

impl OperatorTranslator for AggregateBuildTranslator {
    fn initialize_structs(&mut self, cg: &mut CodeGen) {
        let mut fields = Vec::new();
        for (i, t) in self.group_types.iter().enumerate() {
            fields.push((format!("k{}", i), TypeRepr::named(CodeGen::sql_type_name(*t))));
        }
        for (i, agg) in self.aggregates.iter().enumerate() {
            fields.push((format!("a{}", i), TypeRepr::named(aggregator_type_name(agg.kind))));
        }
        cg.declare_struct(&self.payload_struct, fields);

        if !self.group_by.is_empty() {
            let fields = self
                .group_types
                .iter()
                .enumerate()
                .map(|(i, t)| (format!("k{}", i), TypeRepr::named(CodeGen::sql_type_name(*t))))
                .collect();
            cg.declare_struct(&self.probe_struct, fields);
        }
    }

    fn initialize_helper_functions(&mut self, cg: &mut CodeGen) {
        // fun keyCheck(payload: *uint8, probe: *uint8) -> bool
        let mut body = Vec::new();
        if !self.group_by.is_empty() {
            let payload_arg = cg.ident("payload");
            let payload_cast = cg.ptr_cast(&self.payload_struct, payload_arg);
            body.push(Stmt::Var { name: "pl".to_string(), ty: None, init: Some(payload_cast) });
            let probe_arg = cg.ident("probe");
            let probe_cast = cg.ptr_cast(&self.probe_struct, probe_arg);
            body.push(Stmt::Var { name: "pr".to_string(), ty: None, init: Some(probe_cast) });
            for i in 0..self.group_by.len() {
                let lhs = cg.member_of_ident("pl", &format!("k{}", i));
                let rhs = cg.member_of_ident("pr", &format!("k{}", i));
                let eq = cg.compare(CmpOp::Eq, lhs, rhs);
                let false_lit = cg.bool_lit(false);
                body.push(Stmt::If {
                    cond: eq,
                    then_block: vec![],
                    else_block: Some(vec![Stmt::Return(Some(false_lit))]),
                });
            }
        }
        let true_lit = cg.bool_lit(true);
        body.push(Stmt::Return(Some(true_lit)));

        let byte_ptr = || TypeRepr::pointer(TypeRepr::named("uint8"));
        cg.declare_function(FunctionDecl {
            name: self.key_check_fn.clone(),
            params: vec![("payload".to_string(), byte_ptr()), ("probe".to_string(), byte_ptr())],
            ret: TypeRepr::named("bool"),
            body,
        });
    }

    fn initialize_state_fields(&self, fields: &mut Vec<StateField>) {
        fields.push(StateField {
            name: self.aht.clone(),
            type_name: "AggregationHashTable".to_string(),
        });
    }

    fn initialize_setup(&self, cg: &mut CodeGen, stmts: &mut Vec<Stmt>) {
        let aht_ptr = cg.addr_of_ident(&self.aht);
        let ctx = cg.ident(EXEC_CTX);
        let mem = cg.call(Builtin::ExecCtxGetMemoryPool, vec![ctx]);
        let size = cg.size_of(&self.payload_struct);
        let init = cg.call(Builtin::AggHashTableInit, vec![aht_ptr, mem, size]);
        stmts.push(Stmt::Expr(init));
    }

    fn initialize_teardown(&self, cg: &mut CodeGen, stmts: &mut Vec<Stmt>) {
        let aht_ptr = cg.addr_of_ident(&self.aht);
        stmts.push(Stmt::Expr(cg.call(Builtin::AggHashTableFree, vec![aht_ptr])));
    }

    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        let child = child
            .ok_or_else(|| CompileError::Unsupported("aggregation requires an upstream operator".to_string()))?
            .clone();

        let probe_var = cg.fresh_name("aggProbe");
        if !self.group_by.is_empty() {
            fb.declare_var(&probe_var, Some(TypeRepr::named(&self.probe_struct)), None);
            for (i, &key) in self.group_by.iter().enumerate() {
                let target = cg.member_of_ident(&probe_var, &format!("k{}", i));
                let value = child.expr(cg, key)?;
                fb.append_assign(target, value);
            }
        }

        let hash_var = cg.fresh_name("hashVal");
        let hash = self.hash_expr(cg, &child)?;
        fb.declare_var(&hash_var, None, Some(hash));

        // var payload = @ptrCast(*AggPayload, @aggHTLookup(aht, hash, keyCheck, probe))
        let payload_var = cg.fresh_name("aggPayload");
        let aht = cg.ident(&self.aht);
        let hash_val = cg.ident(&hash_var);
        let key_check = cg.ident(&self.key_check_fn);
        let probe_ptr = if self.group_by.is_empty() {
            cg.ident(EXEC_CTX)
        } else {
            cg.addr_of_ident(&probe_var)
        };
        let lookup = cg.call(Builtin::AggHashTableLookup, vec![aht, hash_val, key_check, probe_ptr]);
        let cast = cg.ptr_cast(&self.payload_struct, lookup);
        fb.declare_var(&payload_var, None, Some(cast));

        // On miss: allocate, copy keys, initialize the aggregators.
        let payload = cg.ident(&payload_var);
        let nil = cg.nil_lit();
        let miss = cg.compare(CmpOp::Eq, payload, nil);
        fb.start_if(miss);
        {
            let aht = cg.ident(&self.aht);
            let hash_val = cg.ident(&hash_var);
            let insert = cg.call(Builtin::AggHashTableInsert, vec![aht, hash_val]);
            let cast = cg.ptr_cast(&self.payload_struct, insert);
            let target = cg.ident(&payload_var);
            fb.append_assign(target, cast);

            for i in 0..self.group_by.len() {
                let target = cg.member_of_ident(&payload_var, &format!("k{}", i));
                let value = cg.member_of_ident(&probe_var, &format!("k{}", i));
                fb.append_assign(target, value);
            }

            let mut agg_ptrs = Vec::with_capacity(self.aggregates.len());
            for i in 0..self.aggregates.len() {
                let member = cg.member_of_ident(&payload_var, &format!("a{}", i));
                agg_ptrs.push(cg.addr_of(member));
            }
            let init = cg.call(Builtin::AggInit, agg_ptrs);
            fb.append_expr(init);
        }
        fb.close_block();

        // Advance every aggregator with its input value.
        for (i, agg) in self.aggregates.iter().enumerate() {
            let input_var = cg.fresh_name("aggIn");
            let value = match agg.arg {
                Some((attr_idx, _)) => child.expr(cg, attr_idx)?,
                None => {
                    let lit = cg.int_lit(0);
                    cg.call(Builtin::IntToSql, vec![lit])
                }
            };
            fb.declare_var(&input_var, None, Some(value));
            let member = cg.member_of_ident(&payload_var, &format!("a{}", i));
            let agg_ptr = cg.addr_of(member);
            let input_ptr = cg.addr_of_ident(&input_var);
            let advance = cg.call(Builtin::AggAdvance, vec![agg_ptr, input_ptr]);
            fb.append_expr(advance);
        }
        Ok(())
    }

    fn output_source(&self) -> Option<&OutputSource> {
        None
    }
}

pub struct AggregateOutputTranslator {
    aht: String,
    payload_struct: String,
    key_fields: Vec<String>,
    agg_fields: Vec<String>,
    iter_var: String,
    row_var: String,
    source: Option<OutputSource>,
}

impl AggregateOutputTranslator {
    pub fn new(cg: &mut CodeGen, build: &AggregateBuildTranslator) -> Self {
        Self {
            aht: build.state_name().to_string(),
            payload_struct: build.payload_struct_name().to_string(),
            key_fields: build.key_field_names(),
            agg_fields: build.agg_field_names(),
            iter_var: cg.fresh_name("ahtIter"),
            row_var: cg.fresh_name("aggRow"),
            source: None,
        }
    }
}

impl OperatorTranslator for AggregateOutputTranslator {
    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        _child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        // var ahtIter: AggregationHashTableIterator
        // @aggHTIterInit(&ahtIter, aht)
        fb.declare_var(&self.iter_var, Some(TypeRepr::named("AggregationHashTableIterator")), None);
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let aht = cg.ident(&self.aht);
        let init = cg.call(Builtin::AggHashTableIterInit, vec![iter_ptr, aht]);
        fb.append_expr(init);

        // for (; @aggHTIterHasNext(&it); @aggHTIterNext(&it)) { ... }
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let cond = cg.call(Builtin::AggHashTableIterHasNext, vec![iter_ptr]);
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let step = cg.call(Builtin::AggHashTableIterNext, vec![iter_ptr]);
        fb.start_for(Some(cond), Some(step));
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        fb.append_after_block(Stmt::Expr(cg.call(Builtin::AggHashTableIterClose, vec![iter_ptr])));

        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let get_row = cg.call(Builtin::AggHashTableIterGetRow, vec![iter_ptr]);
        let cast = cg.ptr_cast(&self.payload_struct, get_row);
        fb.declare_var(&self.row_var, None, Some(cast));

        self.source = Some(OutputSource::AggPayload {
            var: self.row_var.clone(),
            key_fields: self.key_fields.clone(),
            agg_fields: self.agg_fields.clone(),
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
        Some((&self.row_var, &self.payload_struct))
    }
}
