// Pipeline Composer
//
// Splits the plan tree into maximal pipelines at pipeline breakers, pairs
// every node with exactly one translator, emits one driver function per
// pipeline plus the main entry that runs them in order, and finally runs the
// semantic analyzer over the emitted program. Compilation yields no code if
// any diagnostic was reported.

use crate::compiler::codegen::{CodeGen, FunctionBuilder, EXEC_CTX};
use crate::compiler::operators::{
    AggregateBuildTranslator, AggregateOutputTranslator, FilterTranslator, IndexScanTranslator,
    JoinBuildTranslator, JoinProbeTranslator, OperatorTranslator, OutputSource, OutputTranslator,
    ProjectionTranslator, SeqScanTranslator, SortBuildTranslator, StateField,
};
use crate::compiler::CompileError;
use crate::dsl::ast::{Program, Stmt, TypeRepr};
use crate::dsl::sema::{ErrorReporter, Sema};
use crate::dsl::types::TypeContext;
use crate::plan::PhysicalPlan;

/// A maximal run of translators with no pipeline breaker between them.
/// Operators pull from their children, so `next_step` consumes from the
/// tail.
pub struct Pipeline {
    steps: Vec<usize>,
    cursor: usize,
}

impl Pipeline {
    pub fn new(steps: Vec<usize>) -> Self {
        let cursor = steps.len();
        Self { steps, cursor }
    }

    pub fn add(&mut self, translator_idx: usize) {
        self.steps.push(translator_idx);
        self.cursor = self.steps.len();
    }

    /// The next translator from the tail, or none when drained.
    pub fn next_step(&mut self) -> Option<usize> {
        if self.cursor > 0 {
            self.cursor -= 1;
            Some(self.steps[self.cursor])
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// The result of one compilation: the emitted program and the type universe
/// its expressions were resolved against.
pub struct CompiledQuery {
    pub program: Program,
    pub types: TypeContext,
}

/// Lower a physical plan to a checked DSL program.
pub fn compile(plan: &PhysicalPlan) -> Result<CompiledQuery, CompileError> {
    let mut cg = CodeGen::new();
    let mut translators: Vec<Box<dyn OperatorTranslator>> = Vec::new();
    let mut pipelines: Vec<Pipeline> = Vec::new();

    let mut root_pipeline = Vec::new();
    build_operators(plan, &mut cg, &mut translators, &mut pipelines, &mut root_pipeline)?;

    let output = OutputTranslator::new(&mut cg, plan.schema());
    translators.push(Box::new(output));
    root_pipeline.push(translators.len() - 1);
    pipelines.push(Pipeline::new(root_pipeline));
    log::debug!("composed {} pipeline(s) for plan: {}", pipelines.len(), plan);

    // Declarations first: structs, helpers, query state.
    for translator in translators.iter_mut() {
        translator.initialize_structs(&mut cg);
        translator.initialize_helper_functions(&mut cg);
    }
    let mut state = Vec::<StateField>::new();
    let mut setup = Vec::<Stmt>::new();
    let mut teardown = Vec::<Stmt>::new();
    for translator in translators.iter() {
        translator.initialize_state_fields(&mut state);
        translator.initialize_setup(&mut cg, &mut setup);
        translator.initialize_teardown(&mut cg, &mut teardown);
    }

    // One driver function per pipeline; query state arrives as pointers.
    let mut params = vec![(
        EXEC_CTX.to_string(),
        TypeRepr::pointer(TypeRepr::named("ExecutionContext")),
    )];
    for field in &state {
        params.push((field.name.clone(), TypeRepr::pointer(TypeRepr::named(&field.type_name))));
    }

    for (pipeline_idx, pipeline) in pipelines.iter_mut().enumerate() {
        let mut order = Vec::with_capacity(pipeline.len());
        while let Some(idx) = pipeline.next_step() {
            order.push(idx);
        }
        // next_step walks root-first; emission nests child-first.
        order.reverse();

        let mut fb = FunctionBuilder::new(&format!("pipeline{}", pipeline_idx), params.clone(), TypeRepr::named("nil"));
        let mut prev: Option<usize> = None;
        for idx in order {
            let child_source: Option<OutputSource> = prev.and_then(|p| translators[p].output_source().cloned());
            translators[idx].produce(&mut cg, &mut fb, child_source.as_ref())?;
            prev = Some(idx);
        }
        cg.declare_function(fb.finish());
    }

    // The entry point declares the query state, runs setup, drives the
    // pipelines in order, then tears down.
    let main_params = vec![(
        EXEC_CTX.to_string(),
        TypeRepr::pointer(TypeRepr::named("ExecutionContext")),
    )];
    let mut fb = FunctionBuilder::new("main", main_params, TypeRepr::named("int32"));
    for field in &state {
        fb.declare_var(&field.name, Some(TypeRepr::named(&field.type_name)), None);
    }
    for stmt in setup {
        fb.append(stmt);
    }
    for pipeline_idx in 0..pipelines.len() {
        let mut args = vec![cg.ident(EXEC_CTX)];
        for field in &state {
            args.push(cg.addr_of_ident(&field.name));
        }
        let call = cg.call_named(&format!("pipeline{}", pipeline_idx), args);
        fb.append_expr(call);
    }
    for stmt in teardown {
        fb.append(stmt);
    }
    let zero = cg.int_lit(0);
    fb.append(Stmt::Return(Some(zero)));
    cg.declare_function(fb.finish());

    // Type-check the emitted program.
    let mut program = cg.program;
    let mut types = TypeContext::new();
    let mut reporter = ErrorReporter::new();
    Sema::run(&mut program, &mut types, &mut reporter);
    if reporter.has_errors() {
        return Err(CompileError::Sema(reporter.into_diagnostics()));
    }
    Ok(CompiledQuery { program, types })
}

fn build_operators(
    plan: &PhysicalPlan,
    cg: &mut CodeGen,
    translators: &mut Vec<Box<dyn OperatorTranslator>>,
    pipelines: &mut Vec<Pipeline>,
    current: &mut Vec<usize>,
) -> Result<(), CompileError> {
    match plan {
        PhysicalPlan::SeqScan { table_name, predicate, schema } => {
            let translator = SeqScanTranslator::new(cg, table_name, predicate.as_ref(), schema);
            translators.push(Box::new(translator));
            current.push(translators.len() - 1);
        }
        PhysicalPlan::IndexScan { index_name, key, schema, .. } => {
            let translator = IndexScanTranslator::new(cg, index_name, key.clone(), schema);
            translators.push(Box::new(translator));
            current.push(translators.len() - 1);
        }
        PhysicalPlan::Filter { input, predicate, .. } => {
            build_operators(input, cg, translators, pipelines, current)?;
            translators.push(Box::new(FilterTranslator::new(predicate.clone())));
            current.push(translators.len() - 1);
        }
        PhysicalPlan::Projection { input, columns, .. } => {
            build_operators(input, cg, translators, pipelines, current)?;
            translators.push(Box::new(ProjectionTranslator::new(columns.clone())));
            current.push(translators.len() - 1);
        }
        PhysicalPlan::HashJoin { left, right, build_keys, probe_keys, .. } => {
            // Build side is its own pipeline, terminated by the breaker.
            let mut build_pipeline = Vec::new();
            build_operators(left, cg, translators, pipelines, &mut build_pipeline)?;
            let build_types = left.schema().columns().iter().map(|c| c.type_id).collect();
            let build = JoinBuildTranslator::new(cg, build_keys.clone(), build_types);

            let probe_key_types = probe_keys
                .iter()
                .map(|&k| right.schema().column(k).type_id)
                .collect();
            let probe = JoinProbeTranslator::new(cg, &build, probe_keys.clone(), probe_key_types);

            translators.push(Box::new(build));
            build_pipeline.push(translators.len() - 1);
            pipelines.push(Pipeline::new(build_pipeline));

            build_operators(right, cg, translators, pipelines, current)?;
            translators.push(Box::new(probe));
            current.push(translators.len() - 1);
        }
        PhysicalPlan::Aggregate { input, group_by, aggregates, .. } => {
            let mut build_pipeline = Vec::new();
            build_operators(input, cg, translators, pipelines, &mut build_pipeline)?;
            let group_types = group_by
                .iter()
                .map(|&k| input.schema().column(k).type_id)
                .collect();
            let build = AggregateBuildTranslator::new(cg, group_by.clone(), group_types, aggregates.clone());
            let output = AggregateOutputTranslator::new(cg, &build);

            translators.push(Box::new(build));
            build_pipeline.push(translators.len() - 1);
            pipelines.push(Pipeline::new(build_pipeline));

            translators.push(Box::new(output));
            current.push(translators.len() - 1);
        }
        PhysicalPlan::Sort { input, keys, hints, .. } => {
            let mut build_pipeline = Vec::new();
            build_operators(input, cg, translators, pipelines, &mut build_pipeline)?;
            let types = input.schema().columns().iter().map(|c| c.type_id).collect();
            let build = SortBuildTranslator::new(cg, keys.clone(), types, *hints);
            let output = crate::compiler::operators::SortOutputTranslator::new(cg, &build);

            translators.push(Box::new(build));
            build_pipeline.push(translators.len() - 1);
            pipelines.push(Pipeline::new(build_pipeline));

            translators.push(Box::new(output));
            current.push(translators.len() - 1);
        }
    }
    Ok(())
}
