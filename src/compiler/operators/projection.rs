// Projection Translator
//
// No materialization: reorders output lookups over the child's source.

use crate::compiler::codegen::{CodeGen, FunctionBuilder};
use crate::compiler::operators::{OperatorTranslator, OutputSource};
use crate::compiler::CompileError;

pub struct ProjectionTranslator {
    columns: Vec<usize>,
    source: Option<OutputSource>,
    children: Vec<OutputSource>,
}

impl ProjectionTranslator {
    pub fn new(columns: Vec<usize>) -> Self {
        Self {
            columns,
            source: None,
            children: Vec::new(),
        }
    }
}

impl OperatorTranslator for ProjectionTranslator {
    fn produce(
        &mut self,
        _cg: &mut CodeGen,
        _fb: &mut FunctionBuilder,
        child: Option<&OutputSource>,
    ) -> Result<(), CompileError> {
        let child = child
            .ok_or_else(|| CompileError::Unsupported("projection requires an upstream operator".to_string()))?
            .clone();
        self.children.push(child.clone());
        self.source = Some(OutputSource::Reorder {
            inner: Box::new(child),
            mapping: self.columns.clone(),
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
