// Filter Translator
//
// No materialization: wraps the downstream row body in one `if` per
// conjunct, evaluated against the child's output.

use crate::compiler::codegen::{CodeGen, FunctionBuilder};
use crate::compiler::expression::translate_conjunct;
use crate::compiler::operators::{OperatorTranslator, OutputSource};
use crate::compiler::CompileError;
use crate::plan::PlanExpr;

pub struct FilterTranslator {
    predicate: PlanExpr,
    source: Option<OutputSource>,
    children: Vec<OutputSource>,
}

impl FilterTranslator {
    pub fn new(predicate: PlanExpr) -> Self {
        Self {
            predicate,
            source: None,
            children: Vec::new(),
        }
    }
}

impl OperatorTranslator for FilterTranslator {
    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        let child = child
            .ok_or_else(|| CompileError::Unsupported("filter requires an upstream operator".to_string()))?
            .clone();
        for conjunct in self.predicate.conjuncts() {
            let cond = translate_conjunct(cg, conjunct, &child)?;
            fb.start_if(cond);
        }
        self.children.push(child.clone());
        self.source = Some(child);
        Ok(())
    }

    fn output_source(&self) -> Option<&OutputSource> {
        self.source.as_ref()
    }

    fn child_sources(&self) -> &[OutputSource] {
        &self.children
    }
}
