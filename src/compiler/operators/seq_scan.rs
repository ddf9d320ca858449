// Sequential Scan Translator
//
// Declares a table-vector iterator, opens the table, and generates the outer
// advance loop plus the inner projected-columns loop. Conjuncts whose
// comparands are a column reference and a constant become vectorized filter
// manager terms; everything else wraps the row body in a scalar `if`.

use crate::compiler::codegen::{CodeGen, FunctionBuilder, EXEC_CTX};
use crate::compiler::expression::translate_conjunct;
use crate::compiler::operators::{MaterializerKind, OperatorTranslator, OutputSource};
use crate::compiler::CompileError;
use crate::dsl::ast::{Stmt, TypeRepr};
use crate::dsl::builtins::Builtin;
use crate::plan::{CompareOp, OutputSchema, PlanExpr};
use crate::sql::SqlTypeId;

struct VectorTerm {
    col: usize,
    op: CompareOp,
    value: PlanExpr,
}

pub struct SeqScanTranslator {
    table_name: String,
    types: Vec<SqlTypeId>,
    vector_terms: Vec<VectorTerm>,
    scalar_conjuncts: Vec<PlanExpr>,
    tvi: String,
    pci: String,
    fm: String,
    filter_fns: Vec<String>,
    source: Option<OutputSource>,
}

impl SeqScanTranslator {
    pub fn new(cg: &mut CodeGen, table_name: &str, predicate: Option<&PlanExpr>, schema: &OutputSchema) -> Self {
        let mut vector_terms = Vec::new();
        let mut scalar_conjuncts = Vec::new();
        if let Some(predicate) = predicate {
            for conjunct in predicate.conjuncts() {
                match conjunct {
                    PlanExpr::Compare { op, left, right } if conjunct.is_vectorizable() => {
                        if let PlanExpr::ColumnRef { attr_idx, .. } = &**left {
                            vector_terms.push(VectorTerm {
                                col: *attr_idx,
                                op: *op,
                                value: (**right).clone(),
                            });
                            continue;
                        }
                        scalar_conjuncts.push(conjunct.clone());
                    }
                    other => scalar_conjuncts.push(other.clone()),
                }
            }
        }
        Self {
            table_name: table_name.to_string(),
            types: schema.columns().iter().map(|c| c.type_id).collect(),
            vector_terms,
            scalar_conjuncts,
            tvi: cg.fresh_name("tvi"),
            pci: cg.fresh_name("pci"),
            fm: cg.fresh_name("fm"),
            filter_fns: Vec::new(),
            source: None,
        }
    }

    fn filter_builtin(op: CompareOp) -> Builtin {
        match op {
            CompareOp::Eq => Builtin::FilterEq,
            CompareOp::Ne => Builtin::FilterNe,
            CompareOp::Lt => Builtin::FilterLt,
            CompareOp::Le => Builtin::FilterLe,
            CompareOp::Gt => Builtin::FilterGt,
            CompareOp::Ge => Builtin::FilterGe,
        }
    }
}

impl OperatorTranslator for SeqScanTranslator {
    fn initialize_helper_functions(&mut self, cg: &mut CodeGen) {
        for term in &self.vector_terms {
            let name = cg.fresh_name("scanFilter");
            let pci_arg = cg.ident("pci");
            let col = cg.int_lit(term.col as i64);
            let value = match &term.value {
                PlanExpr::IntLiteral(v) => cg.int_lit(*v),
                PlanExpr::FloatLiteral(v) => cg.float_lit(*v as f32),
                _ => cg.int_lit(0),
            };
            let filter = cg.call(Self::filter_builtin(term.op), vec![pci_arg, col, value]);
            cg.declare_function(crate::dsl::ast::FunctionDecl {
                name: name.clone(),
                params: vec![(
                    "pci".to_string(),
                    TypeRepr::pointer(TypeRepr::named("ProjectedColumnsIterator")),
                )],
                ret: TypeRepr::named("int32"),
                body: vec![Stmt::Return(Some(filter))],
            });
            self.filter_fns.push(name);
        }
    }

    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        _child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        let filtered = !self.filter_fns.is_empty();

        // var tvi: TableVectorIterator
        // @tableIterInit(&tvi, "table", execCtx)
        fb.declare_var(&self.tvi, Some(TypeRepr::named("TableVectorIterator")), None);
        let tvi_ptr = cg.addr_of_ident(&self.tvi);
        let name = cg.str_lit(&self.table_name);
        let ctx = cg.ident(EXEC_CTX);
        let init = cg.call(Builtin::TableIterInit, vec![tvi_ptr, name, ctx]);
        fb.append_expr(init);
        let tvi_ptr = cg.addr_of_ident(&self.tvi);
        fb.append_after_close(Stmt::Expr(cg.call(Builtin::TableIterClose, vec![tvi_ptr])));

        if filtered {
            fb.declare_var(&self.fm, Some(TypeRepr::named("FilterManager")), None);
            let fm_ptr = cg.addr_of_ident(&self.fm);
            let init = cg.call(Builtin::FilterManagerInit, vec![fm_ptr]);
            fb.append_expr(init);
            let mut args = vec![cg.addr_of_ident(&self.fm)];
            for f in &self.filter_fns {
                args.push(cg.ident(f));
            }
            let insert = cg.call(Builtin::FilterManagerInsertFilter, args);
            fb.append_expr(insert);
            let fm_ptr = cg.addr_of_ident(&self.fm);
            let finalize = cg.call(Builtin::FilterManagerFinalize, vec![fm_ptr]);
            fb.append_expr(finalize);
            let fm_ptr = cg.addr_of_ident(&self.fm);
            fb.append_after_close(Stmt::Expr(cg.call(Builtin::FilterManagerFree, vec![fm_ptr])));
        }

        // for (@tableIterAdvance(&tvi)) { ... }
        let tvi_ptr = cg.addr_of_ident(&self.tvi);
        let advance = cg.call(Builtin::TableIterAdvance, vec![tvi_ptr]);
        fb.start_for(Some(advance), None);

        // var pci = @tableIterGetPCI(&tvi)
        let tvi_ptr = cg.addr_of_ident(&self.tvi);
        let get_pci = cg.call(Builtin::TableIterGetPci, vec![tvi_ptr]);
        fb.declare_var(&self.pci, None, Some(get_pci));

        if filtered {
            let fm_ptr = cg.addr_of_ident(&self.fm);
            let pci = cg.ident(&self.pci);
            let run = cg.call(Builtin::FilterManagerRunFilters, vec![fm_ptr, pci]);
            fb.append_expr(run);
        }

        // for (; @pciHasNext(pci); @pciAdvance(pci)) { ... }
        let (has_next, advance) = if filtered {
            (Builtin::PciHasNextFiltered, Builtin::PciAdvanceFiltered)
        } else {
            (Builtin::PciHasNext, Builtin::PciAdvance)
        };
        let pci = cg.ident(&self.pci);
        let cond = cg.call(has_next, vec![pci]);
        let pci = cg.ident(&self.pci);
        let step = cg.call(advance, vec![pci]);
        fb.start_for(Some(cond), Some(step));

        let source = OutputSource::Pci { var: self.pci.clone(), types: self.types.clone() };

        // Scalar conjuncts guard the row body.
        for conjunct in &self.scalar_conjuncts {
            let cond = translate_conjunct(cg, conjunct, &source)?;
            fb.start_if(cond);
        }

        self.source = Some(source);
        Ok(())
    }

    fn output_source(&self) -> Option<&OutputSource> {
        self.source.as_ref()
    }

    fn is_materializer(&self) -> MaterializerKind {
        MaterializerKind::TuplePointer
    }

    fn materialized_tuple(&self) -> Option<(&str, &str)> {
        Some((&self.pci, "ProjectedColumnsIterator"))
    }
}
