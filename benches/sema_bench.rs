use criterion::{criterion_group, criterion_main, Criterion};

use opaldb::dsl::ast::{ExprKind, FunctionDecl, Program, SourcePos, Stmt, TypeRepr};
use opaldb::dsl::sema::{ErrorReporter, Sema};
use opaldb::dsl::types::TypeContext;

/// A function body of `n` well-typed intrinsic calls.
fn build_program(n: usize) -> Program {
    let mut program = Program::default();
    let mut body = Vec::with_capacity(n);
    for i in 0..n {
        let lit = program.arena.alloc(ExprKind::IntLit(i as i64), SourcePos::default());
        let conv = program.arena.alloc(
            ExprKind::Call { callee: "intToSql".to_string(), args: vec![lit] },
            SourcePos::default(),
        );
        let hash = program.arena.alloc(
            ExprKind::Call { callee: "hash".to_string(), args: vec![conv] },
            SourcePos::default(),
        );
        body.push(Stmt::Expr(hash));
    }
    program.functions.push(FunctionDecl {
        name: "bench".to_string(),
        params: vec![],
        ret: TypeRepr::named("nil"),
        body,
    });
    program
}

fn bench_sema(c: &mut Criterion) {
    c.bench_function("sema_1k_intrinsic_calls", |b| {
        b.iter_batched(
            || build_program(1000),
            |mut program| {
                let mut types = TypeContext::new();
                let mut reporter = ErrorReporter::new();
                Sema::run(&mut program, &mut types, &mut reporter);
                assert!(!reporter.has_errors());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_sema);
criterion_main!(benches);
