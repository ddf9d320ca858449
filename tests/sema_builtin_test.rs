// Intrinsic contract tests: every well-typed call resolves to the
// documented result type; every violation yields exactly one diagnostic and
// leaves the call unresolved.

use opaldb::dsl::ast::{AstArena, ExprId, ExprKind, FunctionDecl, Program, SourcePos, Stmt, TypeRepr};
use opaldb::dsl::sema::{ErrorReporter, Sema, SemaError};
use opaldb::dsl::types::TypeContext;

struct CheckResult {
    ty: Option<String>,
    diags: Vec<SemaError>,
}

fn named(name: &str) -> TypeRepr {
    TypeRepr::named(name)
}

fn ptr(name: &str) -> TypeRepr {
    TypeRepr::pointer(TypeRepr::named(name))
}

fn ident(arena: &mut AstArena, name: &str) -> ExprId {
    arena.alloc(ExprKind::Ident(name.to_string()), SourcePos::default())
}

fn int_lit(arena: &mut AstArena, v: i64) -> ExprId {
    arena.alloc(ExprKind::IntLit(v), SourcePos::default())
}

fn uint64_lit(arena: &mut AstArena, v: u64) -> ExprId {
    arena.alloc(ExprKind::UintLit { val: v, wide: true }, SourcePos::default())
}

fn uint32_lit(arena: &mut AstArena, v: u64) -> ExprId {
    arena.alloc(ExprKind::UintLit { val: v, wide: false }, SourcePos::default())
}

fn bool_lit(arena: &mut AstArena, v: bool) -> ExprId {
    arena.alloc(ExprKind::BoolLit(v), SourcePos::default())
}

fn str_lit(arena: &mut AstArena, s: &str) -> ExprId {
    arena.alloc(ExprKind::StringLit(s.to_string()), SourcePos::default())
}

fn call(arena: &mut AstArena, callee: &str, args: Vec<ExprId>) -> ExprId {
    arena.alloc(
        ExprKind::Call { callee: callee.to_string(), args },
        SourcePos::new(1, 1),
    )
}

/// Nil-returning helper function declaration with the given params.
fn helper_fn(name: &str, params: Vec<(&str, TypeRepr)>, ret: TypeRepr) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        params: params.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
        ret,
        body: vec![],
    }
}

/// Analyze a single call inside a function whose params provide the typed
/// operands.
fn analyze_call(
    params: Vec<(&str, TypeRepr)>,
    aux_fns: Vec<FunctionDecl>,
    build: impl FnOnce(&mut AstArena) -> ExprId,
) -> CheckResult {
    let mut program = Program::default();
    let call_id = build(&mut program.arena);
    program.functions = aux_fns;
    program.functions.push(FunctionDecl {
        name: "test".to_string(),
        params: params.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
        ret: named("nil"),
        body: vec![Stmt::Expr(call_id)],
    });

    let mut types = TypeContext::new();
    let mut reporter = ErrorReporter::new();
    Sema::run(&mut program, &mut types, &mut reporter);

    CheckResult {
        ty: program.arena.ty(call_id).map(|t| types.display(t)),
        diags: reporter.into_diagnostics(),
    }
}

fn assert_resolves(result: &CheckResult, expected: &str) {
    assert!(result.diags.is_empty(), "unexpected diagnostics: {:?}", result.diags);
    assert_eq!(result.ty.as_deref(), Some(expected));
}

fn assert_single_failure(result: &CheckResult) {
    assert_eq!(result.diags.len(), 1, "expected one diagnostic, got {:?}", result.diags);
    assert!(result.ty.is_none(), "ill-typed call should stay unresolved");
}

#[test]
fn test_sql_conversions() {
    let good = analyze_call(vec![], vec![], |a| {
        let lit = int_lit(a, 5);
        call(a, "intToSql", vec![lit])
    });
    assert_resolves(&good, "Integer");

    let good = analyze_call(vec![], vec![], |a| {
        let lit = bool_lit(a, true);
        call(a, "boolToSql", vec![lit])
    });
    assert_resolves(&good, "Boolean");

    let good = analyze_call(vec![("b", named("Boolean"))], vec![], |a| {
        let b = ident(a, "b");
        call(a, "sqlToBool", vec![b])
    });
    assert_resolves(&good, "bool");

    // Native bool where an integer is required.
    let bad = analyze_call(vec![], vec![], |a| {
        let lit = bool_lit(a, true);
        call(a, "intToSql", vec![lit])
    });
    assert_single_failure(&bad);
    assert!(matches!(bad.diags[0], SemaError::BadArgType { .. }));
}

#[test]
fn test_vectorized_filter_contract() {
    let good = analyze_call(vec![("pci", ptr("ProjectedColumnsIterator"))], vec![], |a| {
        let pci = ident(a, "pci");
        let col = int_lit(a, 0);
        let val = int_lit(a, 500);
        call(a, "filterEq", vec![pci, col, val])
    });
    assert_resolves(&good, "int32");

    let wrong_arity = analyze_call(vec![("pci", ptr("ProjectedColumnsIterator"))], vec![], |a| {
        let pci = ident(a, "pci");
        call(a, "filterLt", vec![pci])
    });
    assert_single_failure(&wrong_arity);
    assert!(matches!(wrong_arity.diags[0], SemaError::MismatchedArgCount { .. }));

    // First argument must point at a projected-columns iterator.
    let bad_target = analyze_call(vec![("s", ptr("Sorter"))], vec![], |a| {
        let s = ident(a, "s");
        let col = int_lit(a, 0);
        let val = int_lit(a, 1);
        call(a, "filterGe", vec![s, col, val])
    });
    assert_single_failure(&bad_target);
}

#[test]
fn test_table_iter_contract() {
    let params = vec![("tvi", ptr("TableVectorIterator")), ("execCtx", ptr("ExecutionContext"))];
    let good = analyze_call(params.clone(), vec![], |a| {
        let tvi = ident(a, "tvi");
        let name = str_lit(a, "test_1");
        let ctx = ident(a, "execCtx");
        call(a, "tableIterInit", vec![tvi, name, ctx])
    });
    assert_resolves(&good, "nil");

    let advance = analyze_call(params.clone(), vec![], |a| {
        let tvi = ident(a, "tvi");
        call(a, "tableIterAdvance", vec![tvi])
    });
    assert_resolves(&advance, "bool");

    let get_pci = analyze_call(params.clone(), vec![], |a| {
        let tvi = ident(a, "tvi");
        call(a, "tableIterGetPCI", vec![tvi])
    });
    assert_resolves(&get_pci, "*ProjectedColumnsIterator");

    // The table name must be a string literal, not a computed value.
    let bad_name = analyze_call(params, vec![], |a| {
        let tvi = ident(a, "tvi");
        let name = int_lit(a, 7);
        let ctx = ident(a, "execCtx");
        call(a, "tableIterInit", vec![tvi, name, ctx])
    });
    assert_single_failure(&bad_name);
}

#[test]
fn test_pci_match_inserts_sql_bool_cast() {
    let mut program = Program::default();
    let pci = program.arena.alloc(ExprKind::Ident("pci".to_string()), SourcePos::default());
    let cond = program.arena.alloc(ExprKind::Ident("cond".to_string()), SourcePos::default());
    let call_id = program.arena.alloc(
        ExprKind::Call { callee: "pciMatch".to_string(), args: vec![pci, cond] },
        SourcePos::default(),
    );
    program.functions.push(FunctionDecl {
        name: "test".to_string(),
        params: vec![
            ("pci".to_string(), ptr("ProjectedColumnsIterator")),
            ("cond".to_string(), named("Boolean")),
        ],
        ret: named("nil"),
        body: vec![Stmt::Expr(call_id)],
    });

    let mut types = TypeContext::new();
    let mut reporter = ErrorReporter::new();
    Sema::run(&mut program, &mut types, &mut reporter);

    assert!(!reporter.has_errors(), "diagnostics: {:?}", reporter.diagnostics());
    assert_eq!(program.arena.ty(call_id).map(|t| types.display(t)).as_deref(), Some("nil"));
    // The SQL boolean argument was rewritten into an implicit unwrap.
    match program.arena.kind(call_id) {
        ExprKind::Call { args, .. } => {
            assert!(matches!(program.arena.kind(args[1]), ExprKind::ImplicitCast { .. }));
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn test_hash_requires_sql_values() {
    let good = analyze_call(vec![("v", named("Integer")), ("w", named("Real"))], vec![], |a| {
        let v = ident(a, "v");
        let w = ident(a, "w");
        call(a, "hash", vec![v, w])
    });
    assert_resolves(&good, "uint64");

    let bad = analyze_call(vec![], vec![], |a| {
        let lit = int_lit(a, 3);
        call(a, "hash", vec![lit])
    });
    assert_single_failure(&bad);
    assert!(matches!(bad.diags[0], SemaError::NotASqlValue { .. }));
}

#[test]
fn test_aggregator_contracts() {
    let agg_params = vec![("agg", ptr("IntegerSumAggregate")), ("val", ptr("Integer"))];

    let init = analyze_call(agg_params.clone(), vec![], |a| {
        let agg = ident(a, "agg");
        call(a, "aggInit", vec![agg])
    });
    assert_resolves(&init, "nil");

    let advance = analyze_call(agg_params.clone(), vec![], |a| {
        let agg = ident(a, "agg");
        let val = ident(a, "val");
        call(a, "aggAdvance", vec![agg, val])
    });
    assert_resolves(&advance, "nil");

    // Every aggregator currently surfaces a SQL integer result.
    let result = analyze_call(vec![("agg", ptr("IntegerMaxAggregate"))], vec![], |a| {
        let agg = ident(a, "agg");
        call(a, "aggResult", vec![agg])
    });
    assert_resolves(&result, "Integer");

    let not_agg = analyze_call(vec![("val", ptr("Integer"))], vec![], |a| {
        let val = ident(a, "val");
        call(a, "aggInit", vec![val])
    });
    assert_single_failure(&not_agg);
    assert!(matches!(not_agg.diags[0], SemaError::NotAnAggregator { .. }));

    let bad_advance = analyze_call(vec![("agg", ptr("CountAggregate"))], vec![], |a| {
        let agg = ident(a, "agg");
        let agg2 = ident(a, "agg");
        call(a, "aggAdvance", vec![agg, agg2])
    });
    assert_single_failure(&bad_advance);
}

#[test]
fn test_join_hash_table_build_takes_exactly_one_argument() {
    let good = analyze_call(vec![("jht", ptr("JoinHashTable"))], vec![], |a| {
        let jht = ident(a, "jht");
        call(a, "joinHTBuild", vec![jht])
    });
    assert_resolves(&good, "nil");

    let too_many = analyze_call(vec![("jht", ptr("JoinHashTable"))], vec![], |a| {
        let jht = ident(a, "jht");
        let jht2 = ident(a, "jht");
        call(a, "joinHTBuild", vec![jht, jht2])
    });
    assert_single_failure(&too_many);
    assert!(matches!(too_many.diags[0], SemaError::MismatchedArgCount { .. }));
}

#[test]
fn test_join_hash_table_iter_has_next_shape() {
    let params = vec![
        ("iter", ptr("JoinHashTableIterator")),
        ("ctx", ptr("uint8")),
        ("probe", ptr("uint8")),
    ];
    let key_eq = helper_fn(
        "keyEq",
        vec![("a", ptr("uint8")), ("b", ptr("uint8")), ("c", ptr("uint8"))],
        named("bool"),
    );
    let good = analyze_call(params.clone(), vec![key_eq], |a| {
        let iter = ident(a, "iter");
        let f = ident(a, "keyEq");
        let ctx = ident(a, "ctx");
        let probe = ident(a, "probe");
        call(a, "joinHTIterHasNext", vec![iter, f, ctx, probe])
    });
    assert_resolves(&good, "bool");

    // Wrong return type on the key-equality function.
    let bad_fn = helper_fn(
        "keyEq",
        vec![("a", ptr("uint8")), ("b", ptr("uint8")), ("c", ptr("uint8"))],
        named("int32"),
    );
    let bad = analyze_call(params, vec![bad_fn], |a| {
        let iter = ident(a, "iter");
        let f = ident(a, "keyEq");
        let ctx = ident(a, "ctx");
        let probe = ident(a, "probe");
        call(a, "joinHTIterHasNext", vec![iter, f, ctx, probe])
    });
    assert_single_failure(&bad);
    assert!(matches!(bad.diags[0], SemaError::BadFunctionShape { .. }));
}

#[test]
fn test_sorter_init_comparator_shape() {
    let params = vec![("sorter", ptr("Sorter")), ("mem", ptr("MemoryPool"))];
    let cmp = helper_fn("cmp", vec![("a", ptr("uint8")), ("b", ptr("uint8"))], named("int32"));
    let good = analyze_call(params.clone(), vec![cmp], |a| {
        let sorter = ident(a, "sorter");
        let mem = ident(a, "mem");
        let f = ident(a, "cmp");
        let size = uint32_lit(a, 16);
        call(a, "sorterInit", vec![sorter, mem, f, size])
    });
    assert_resolves(&good, "nil");

    let bad_cmp = helper_fn("cmp", vec![("a", ptr("uint8"))], named("int32"));
    let bad = analyze_call(params, vec![bad_cmp], |a| {
        let sorter = ident(a, "sorter");
        let mem = ident(a, "mem");
        let f = ident(a, "cmp");
        let size = uint32_lit(a, 16);
        call(a, "sorterInit", vec![sorter, mem, f, size])
    });
    assert_single_failure(&bad);
    assert!(matches!(bad.diags[0], SemaError::BadFunctionShape { .. }));
}

#[test]
fn test_sorter_topk_requires_uint64_limit() {
    let params = vec![("sorter", ptr("Sorter")), ("tls", ptr("ThreadStateContainer"))];
    let good = analyze_call(params.clone(), vec![], |a| {
        let sorter = ident(a, "sorter");
        let tls = ident(a, "tls");
        let offset = uint32_lit(a, 0);
        let k = uint64_lit(a, 10);
        call(a, "sorterSortTopKParallel", vec![sorter, tls, offset, k])
    });
    assert_resolves(&good, "nil");

    let narrow_k = analyze_call(params, vec![], |a| {
        let sorter = ident(a, "sorter");
        let tls = ident(a, "tls");
        let offset = uint32_lit(a, 0);
        let k = uint32_lit(a, 10);
        call(a, "sorterSortTopKParallel", vec![sorter, tls, offset, k])
    });
    assert_single_failure(&narrow_k);
}

#[test]
fn test_agg_hash_table_process_batch_requires_pci_pointer_pointer() {
    let fns: Vec<FunctionDecl> = (0..4).map(|i| helper_fn(&format!("f{}", i), vec![], named("nil"))).collect();
    let good_params = vec![("aht", ptr("AggregationHashTable")), ("batch", TypeRepr::pointer(ptr("ProjectedColumnsIterator")))];
    let good = analyze_call(good_params, fns.clone(), |a| {
        let aht = ident(a, "aht");
        let batch = ident(a, "batch");
        let f0 = ident(a, "f0");
        let f1 = ident(a, "f1");
        let f2 = ident(a, "f2");
        let f3 = ident(a, "f3");
        let partitioned = bool_lit(a, false);
        call(a, "aggHTProcessBatch", vec![aht, batch, f0, f1, f2, f3, partitioned])
    });
    assert_resolves(&good, "nil");

    // A plain PCI pointer is not a pointer to a PCI pointer.
    let bad_params = vec![("aht", ptr("AggregationHashTable")), ("batch", ptr("ProjectedColumnsIterator"))];
    let bad = analyze_call(bad_params, fns, |a| {
        let aht = ident(a, "aht");
        let batch = ident(a, "batch");
        let f0 = ident(a, "f0");
        let f1 = ident(a, "f1");
        let f2 = ident(a, "f2");
        let f3 = ident(a, "f3");
        let partitioned = bool_lit(a, false);
        call(a, "aggHTProcessBatch", vec![aht, batch, f0, f1, f2, f3, partitioned])
    });
    assert_single_failure(&bad);
}

#[test]
fn test_table_iter_parallel_scan_function_shape() {
    let params = vec![("qs", ptr("uint8")), ("tls", ptr("ThreadStateContainer"))];
    let scanner = helper_fn(
        "scanner",
        vec![("qs", ptr("uint8")), ("ts", ptr("uint8")), ("tvi", ptr("TableVectorIterator"))],
        named("nil"),
    );
    let good = analyze_call(params.clone(), vec![scanner], |a| {
        let name = str_lit(a, "test_1");
        let qs = ident(a, "qs");
        let tls = ident(a, "tls");
        let f = ident(a, "scanner");
        call(a, "iterateTableParallel", vec![name, qs, tls, f])
    });
    assert_resolves(&good, "nil");

    let bad_scanner = helper_fn("scanner", vec![("qs", ptr("uint8"))], named("nil"));
    let bad = analyze_call(params, vec![bad_scanner], |a| {
        let name = str_lit(a, "test_1");
        let qs = ident(a, "qs");
        let tls = ident(a, "tls");
        let f = ident(a, "scanner");
        call(a, "iterateTableParallel", vec![name, qs, tls, f])
    });
    assert_single_failure(&bad);
    assert!(matches!(bad.diags[0], SemaError::BadParallelScanFunction { .. }));
}

#[test]
fn test_filter_manager_insert_filter_shape() {
    let params = vec![("fm", ptr("FilterManager"))];
    let flavor = helper_fn("flavor", vec![("pci", ptr("ProjectedColumnsIterator"))], named("int32"));
    let good = analyze_call(params.clone(), vec![flavor], |a| {
        let fm = ident(a, "fm");
        let f = ident(a, "flavor");
        call(a, "filterManagerInsertFilter", vec![fm, f])
    });
    assert_resolves(&good, "nil");

    let bad_flavor = helper_fn("flavor", vec![("pci", ptr("Sorter"))], named("int32"));
    let bad = analyze_call(params, vec![bad_flavor], |a| {
        let fm = ident(a, "fm");
        let f = ident(a, "flavor");
        call(a, "filterManagerInsertFilter", vec![fm, f])
    });
    assert_single_failure(&bad);
    assert!(matches!(bad.diags[0], SemaError::BadFunctionShape { .. }));
}

#[test]
fn test_ptr_cast_rewrites_deref_argument() {
    let mut program = Program::default();
    let base = program.arena.alloc(ExprKind::Ident("ProjectedColumnsIterator".to_string()), SourcePos::default());
    let deref = program.arena.alloc(ExprKind::Deref(base), SourcePos::default());
    let value = program.arena.alloc(ExprKind::Ident("p".to_string()), SourcePos::default());
    let call_id = program.arena.alloc(
        ExprKind::Call { callee: "ptrCast".to_string(), args: vec![deref, value] },
        SourcePos::default(),
    );
    program.functions.push(FunctionDecl {
        name: "test".to_string(),
        params: vec![("p".to_string(), ptr("uint8"))],
        ret: named("nil"),
        body: vec![Stmt::Expr(call_id)],
    });

    let mut types = TypeContext::new();
    let mut reporter = ErrorReporter::new();
    Sema::run(&mut program, &mut types, &mut reporter);

    assert!(!reporter.has_errors(), "diagnostics: {:?}", reporter.diagnostics());
    assert_eq!(
        program.arena.ty(call_id).map(|t| types.display(t)).as_deref(),
        Some("*ProjectedColumnsIterator")
    );
    // The dereference was rewritten into a pointer-type representation.
    match program.arena.kind(call_id) {
        ExprKind::Call { args, .. } => {
            assert!(matches!(program.arena.kind(args[0]), ExprKind::PointerTypeRepr(_)));
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn test_ptr_cast_rejects_non_type_argument() {
    let bad = analyze_call(vec![("p", ptr("uint8"))], vec![], |a| {
        let lit = int_lit(a, 1);
        let p = ident(a, "p");
        call(a, "ptrCast", vec![lit, p])
    });
    assert_single_failure(&bad);
    assert!(matches!(bad.diags[0], SemaError::BadPointerCast { .. }));
}

#[test]
fn test_size_of_accepts_any_type() {
    let good = analyze_call(vec![], vec![], |a| {
        let ty = ident(a, "JoinHashTable");
        call(a, "sizeOf", vec![ty])
    });
    assert_resolves(&good, "uint32");
}

#[test]
fn test_trig_contracts() {
    let good = analyze_call(vec![("r", named("Real"))], vec![], |a| {
        let r = ident(a, "r");
        call(a, "sin", vec![r])
    });
    assert_resolves(&good, "Real");

    let atan2 = analyze_call(vec![("r", named("Real"))], vec![], |a| {
        let r1 = ident(a, "r");
        let r2 = ident(a, "r");
        call(a, "atan2", vec![r1, r2])
    });
    assert_resolves(&atan2, "Real");

    let bad = analyze_call(vec![("v", named("Integer"))], vec![], |a| {
        let v = ident(a, "v");
        call(a, "cos", vec![v])
    });
    assert_single_failure(&bad);
}

#[test]
fn test_unknown_builtin() {
    let bad = analyze_call(vec![], vec![], |a| call(a, "launchMissiles", vec![]));
    assert_single_failure(&bad);
    assert!(matches!(bad.diags[0], SemaError::UnknownBuiltin { .. }));
}

#[test]
fn test_output_contracts() {
    let params = vec![("execCtx", ptr("ExecutionContext"))];
    let alloc = analyze_call(params.clone(), vec![], |a| {
        let ctx = ident(a, "execCtx");
        call(a, "outputAlloc", vec![ctx])
    });
    assert_resolves(&alloc, "*uint8");

    let set_null = analyze_call(params.clone(), vec![], |a| {
        let ctx = ident(a, "execCtx");
        let col = int_lit(a, 2);
        call(a, "outputSetNull", vec![ctx, col])
    });
    assert_resolves(&set_null, "nil");

    let finalize = analyze_call(params, vec![], |a| {
        let ctx = ident(a, "execCtx");
        call(a, "outputFinalize", vec![ctx])
    });
    assert_resolves(&finalize, "nil");
}

#[test]
fn test_index_iterator_contracts() {
    let params = vec![
        ("iter", ptr("IndexIterator")),
        ("execCtx", ptr("ExecutionContext")),
        ("key", ptr("int8")),
    ];
    let init = analyze_call(params.clone(), vec![], |a| {
        let iter = ident(a, "iter");
        let name = str_lit(a, "idx");
        let ctx = ident(a, "execCtx");
        call(a, "indexIteratorInit", vec![iter, name, ctx])
    });
    assert_resolves(&init, "nil");

    let scan = analyze_call(params.clone(), vec![], |a| {
        let iter = ident(a, "iter");
        let key = ident(a, "key");
        call(a, "indexIteratorScanKey", vec![iter, key])
    });
    assert_resolves(&scan, "nil");

    // The key buffer must be a byte pointer.
    let bad_key = analyze_call(params, vec![], |a| {
        let iter = ident(a, "iter");
        let iter2 = ident(a, "iter");
        call(a, "indexIteratorScanKey", vec![iter, iter2])
    });
    assert_single_failure(&bad_key);
}

#[test]
fn test_type_identity_is_shared_across_calls() {
    let mut program = Program::default();
    let lit_a = program.arena.alloc(ExprKind::IntLit(1), SourcePos::default());
    let call_a = program.arena.alloc(
        ExprKind::Call { callee: "intToSql".to_string(), args: vec![lit_a] },
        SourcePos::default(),
    );
    let lit_b = program.arena.alloc(ExprKind::IntLit(2), SourcePos::default());
    let call_b = program.arena.alloc(
        ExprKind::Call { callee: "intToSql".to_string(), args: vec![lit_b] },
        SourcePos::default(),
    );
    program.functions.push(FunctionDecl {
        name: "test".to_string(),
        params: vec![],
        ret: named("nil"),
        body: vec![Stmt::Expr(call_a), Stmt::Expr(call_b)],
    });

    let mut types = TypeContext::new();
    let mut reporter = ErrorReporter::new();
    Sema::run(&mut program, &mut types, &mut reporter);

    assert!(!reporter.has_errors());
    // Uniqued types: both calls resolve to the same type handle.
    assert_eq!(program.arena.ty(call_a), program.arena.ty(call_b));
}
