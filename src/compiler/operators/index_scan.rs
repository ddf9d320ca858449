// Index Scan Translator
//
// Opens an index iterator, materializes the scan key from the plan's
// equality predicate into an encoded key row, and iterates the matching
// tuples.

use crate::compiler::codegen::{CodeGen, FunctionBuilder, EXEC_CTX};
use crate::compiler::operators::{MaterializerKind, OperatorTranslator, OutputSource};
use crate::compiler::CompileError;
use crate::dsl::ast::{Stmt, TypeRepr};
use crate::dsl::builtins::Builtin;
use crate::plan::{OutputSchema, PlanExpr};
use crate::sql::SqlTypeId;

pub struct IndexScanTranslator {
    index_name: String,
    key: Vec<PlanExpr>,
    key_types: Vec<SqlTypeId>,
    types: Vec<SqlTypeId>,
    iter_var: String,
    key_struct: String,
    key_var: String,
    source: Option<OutputSource>,
}

impl IndexScanTranslator {
    pub fn new(cg: &mut CodeGen, index_name: &str, key: Vec<PlanExpr>, schema: &OutputSchema) -> Self {
        let key_types = key
            .iter()
            .map(|k| match k {
                PlanExpr::FloatLiteral(_) => SqlTypeId::Decimal,
                PlanExpr::BoolLiteral(_) => SqlTypeId::Boolean,
                _ => SqlTypeId::Integer,
            })
            .collect();
        Self {
            index_name: index_name.to_string(),
            key,
            key_types,
            types: schema.columns().iter().map(|c| c.type_id).collect(),
            iter_var: cg.fresh_name("indexIter"),
            key_struct: cg.fresh_name("IndexKeyRow"),
            key_var: cg.fresh_name("keyRow"),
            source: None,
        }
    }
}

impl OperatorTranslator for IndexScanTranslator {
    fn initialize_structs(&mut self, cg: &mut CodeGen) {
        let fields = self
            .key_types
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("k{}", i), TypeRepr::named(CodeGen::sql_type_name(*t))))
            .collect();
        cg.declare_struct(&self.key_struct, fields);
    }

    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        _child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        // var indexIter: IndexIterator
        // @indexIteratorInit(&indexIter, "idx", execCtx)
        fb.declare_var(&self.iter_var, Some(TypeRepr::named("IndexIterator")), None);
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let name = cg.str_lit(&self.index_name);
        let ctx = cg.ident(EXEC_CTX);
        let init = cg.call(Builtin::IndexIteratorInit, vec![iter_ptr, name, ctx]);
        fb.append_expr(init);
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        fb.append_after_close(Stmt::Expr(cg.call(Builtin::IndexIteratorFree, vec![iter_ptr])));

        // Materialize the scan key.
        fb.declare_var(&self.key_var, Some(TypeRepr::named(&self.key_struct)), None);
        for (i, key_expr) in self.key.iter().enumerate() {
            let value = match key_expr {
                PlanExpr::IntLiteral(v) => {
                    let lit = cg.int_lit(*v);
                    cg.call(Builtin::IntToSql, vec![lit])
                }
                PlanExpr::FloatLiteral(v) => {
                    let lit = cg.float_lit(*v as f32);
                    cg.call(Builtin::FloatToSql, vec![lit])
                }
                PlanExpr::BoolLiteral(v) => {
                    let lit = cg.bool_lit(*v);
                    cg.call(Builtin::BoolToSql, vec![lit])
                }
                other => {
                    return Err(CompileError::Unsupported(format!("index scan key {}", other)));
                }
            };
            let target = cg.member_of_ident(&self.key_var, &format!("k{}", i));
            fb.append_assign(target, value);
        }

        // @indexIteratorScanKey(&indexIter, @ptrCast(*int8, &keyRow))
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let key_ptr = cg.addr_of_ident(&self.key_var);
        let key_bytes = cg.ptr_cast("int8", key_ptr);
        let scan = cg.call(Builtin::IndexIteratorScanKey, vec![iter_ptr, key_bytes]);
        fb.append_expr(scan);

        // for (@indexIteratorAdvance(&indexIter)) { ... }
        let iter_ptr = cg.addr_of_ident(&self.iter_var);
        let advance = cg.call(Builtin::IndexIteratorAdvance, vec![iter_ptr]);
        fb.start_for(Some(advance), None);

        self.source = Some(OutputSource::IndexIter {
            var: self.iter_var.clone(),
            types: self.types.clone(),
        });
        Ok(())
    }

    fn output_source(&self) -> Option<&OutputSource> {
        self.source.as_ref()
    }

    fn is_materializer(&self) -> MaterializerKind {
        MaterializerKind::TuplePointer
    }

    fn materialized_tuple(&self) -> Option<(&str, &str)> {
        Some((&self.iter_var, "IndexIterator"))
    }
}
