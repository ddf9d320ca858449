// Output Translator
//
// Root of the final pipeline: allocates an output slot per tuple, copies the
// root plan's columns into it, and advances the buffer; finalize flushes the
// trailing batch at query end.

use crate::compiler::codegen::{CodeGen, FunctionBuilder, EXEC_CTX};
use crate::compiler::operators::{OperatorTranslator, OutputSource};
use crate::compiler::CompileError;
use crate::dsl::ast::Stmt;
use crate::dsl::builtins::Builtin;
use crate::dsl::ast::TypeRepr;
use crate::plan::OutputSchema;

pub struct OutputTranslator {
    num_columns: usize,
    row_struct: String,
    row_var: String,
    children: Vec<OutputSource>,
    fields: Vec<(String, TypeRepr)>,
}

impl OutputTranslator {
    pub fn new(cg: &mut CodeGen, schema: &OutputSchema) -> Self {
        let fields = schema
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| (format!("col{}", i), TypeRepr::named(CodeGen::sql_type_name(c.type_id))))
            .collect();
        Self {
            num_columns: schema.len(),
            row_struct: cg.fresh_name("OutputRow"),
            row_var: cg.fresh_name("out"),
            children: Vec::new(),
            fields,
        }
    }
}

impl OperatorTranslator for OutputTranslator {
    fn initialize_structs(&mut self, cg: &mut CodeGen) {
        cg.declare_struct(&self.row_struct, self.fields.clone());
    }

    fn initialize_teardown(&self, cg: &mut CodeGen, stmts: &mut Vec<Stmt>) {
        let ctx = cg.ident(EXEC_CTX);
        stmts.push(Stmt::Expr(cg.call(Builtin::OutputFinalize, vec![ctx])));
    }

    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        let child = child
            .ok_or_else(|| CompileError::Unsupported("output requires an upstream operator".to_string()))?
            .clone();

        // var out = @ptrCast(*OutputRow, @outputAlloc(execCtx))
        let ctx = cg.ident(EXEC_CTX);
        let alloc = cg.call(Builtin::OutputAlloc, vec![ctx]);
        let cast = cg.ptr_cast(&self.row_struct, alloc);
        fb.declare_var(&self.row_var, None, Some(cast));

        for i in 0..self.num_columns {
            let target = cg.member_of_ident(&self.row_var, &format!("col{}", i));
            let value = child.expr(cg, i)?;
            fb.append_assign(target, value);
        }

        let ctx = cg.ident(EXEC_CTX);
        let advance = cg.call(Builtin::OutputAdvance, vec![ctx]);
        fb.append_expr(advance);

        self.children.push(child);
        Ok(())
    }

    fn output_source(&self) -> Option<&OutputSource> {
        None
    }

    fn child_sources(&self) -> &[OutputSource] {
        &self.children
    }
}
