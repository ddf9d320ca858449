// Intrinsic Call Checking
//
// One check per intrinsic family: verify arity, verify argument types, and
// produce the call's result type. Every failure reports exactly one
// diagnostic and leaves the call unresolved.

use crate::dsl::ast::{CastKind, ExprId, ExprKind, SourcePos};
use crate::dsl::builtins::Builtin;
use crate::dsl::sema::{Sema, SemaError};
use crate::dsl::types::{BuiltinKind, TypeRef};

impl<'a> Sema<'a> {
    pub(super) fn check_builtin_call(&mut self, call: ExprId) -> Option<TypeRef> {
        let ExprKind::Call { callee, args } = self.arena.kind(call).clone() else {
            return None;
        };
        let pos = self.arena.pos(call);

        let Some(builtin) = Builtin::by_name(&callee) else {
            if self.function_types.contains_key(&callee) {
                return self.check_user_call(pos, &callee, &args);
            }
            self.reporter.report(SemaError::UnknownBuiltin { pos, name: callee });
            return None;
        };

        // The pointer cast rewrites its first argument before resolution.
        if builtin == Builtin::PtrCast {
            return self.check_ptr_cast(pos, &callee, &args);
        }

        // Resolve all arguments up front; a failed argument poisons the call.
        for &arg in &args {
            self.resolve_expr(arg)?;
        }

        match builtin {
            Builtin::BoolToSql | Builtin::IntToSql | Builtin::FloatToSql | Builtin::SqlToBool => {
                self.check_sql_conversion(pos, &callee, &args, builtin)
            }
            Builtin::FilterEq
            | Builtin::FilterNe
            | Builtin::FilterLt
            | Builtin::FilterLe
            | Builtin::FilterGt
            | Builtin::FilterGe => self.check_vector_filter(pos, &callee, &args),
            Builtin::ExecCtxGetMemoryPool => self.check_exec_ctx_call(pos, &callee, &args),
            Builtin::TlsInit | Builtin::TlsReset | Builtin::TlsIterate | Builtin::TlsFree => {
                self.check_tls_call(pos, &callee, &args, builtin)
            }
            Builtin::TableIterInit | Builtin::TableIterAdvance | Builtin::TableIterGetPci | Builtin::TableIterClose => {
                self.check_table_iter_call(pos, &callee, &args, builtin)
            }
            Builtin::TableIterParallel => self.check_table_iter_parallel(pos, &callee, &args),
            Builtin::PciIsFiltered
            | Builtin::PciHasNext
            | Builtin::PciHasNextFiltered
            | Builtin::PciAdvance
            | Builtin::PciAdvanceFiltered
            | Builtin::PciMatch
            | Builtin::PciReset
            | Builtin::PciResetFiltered
            | Builtin::PciGetSmallInt
            | Builtin::PciGetInt
            | Builtin::PciGetBigInt
            | Builtin::PciGetReal
            | Builtin::PciGetDouble => self.check_pci_call(pos, &callee, &args, builtin),
            Builtin::Hash => self.check_hash_call(pos, &callee, &args),
            Builtin::FilterManagerInit
            | Builtin::FilterManagerInsertFilter
            | Builtin::FilterManagerFinalize
            | Builtin::FilterManagerRunFilters
            | Builtin::FilterManagerFree => self.check_filter_manager_call(pos, &callee, &args, builtin),
            Builtin::AggHashTableInit
            | Builtin::AggHashTableInsert
            | Builtin::AggHashTableLookup
            | Builtin::AggHashTableProcessBatch
            | Builtin::AggHashTableMovePartitions
            | Builtin::AggHashTableParallelPartitionedScan
            | Builtin::AggHashTableFree => self.check_agg_hash_table_call(pos, &callee, &args, builtin),
            Builtin::AggHashTableIterInit
            | Builtin::AggHashTableIterHasNext
            | Builtin::AggHashTableIterNext
            | Builtin::AggHashTableIterGetRow
            | Builtin::AggHashTableIterClose => self.check_agg_hash_table_iter_call(pos, &callee, &args, builtin),
            Builtin::AggPartIterHasNext
            | Builtin::AggPartIterNext
            | Builtin::AggPartIterGetRow
            | Builtin::AggPartIterGetHash => self.check_agg_part_iter_call(pos, &callee, &args, builtin),
            Builtin::AggInit | Builtin::AggAdvance | Builtin::AggMerge | Builtin::AggReset | Builtin::AggResult => {
                self.check_aggregator_call(pos, &callee, &args, builtin)
            }
            Builtin::JoinHashTableInit => self.check_join_hash_table_init(pos, &callee, &args),
            Builtin::JoinHashTableInsert => self.check_join_hash_table_insert(pos, &callee, &args),
            Builtin::JoinHashTableBuild | Builtin::JoinHashTableBuildParallel => {
                self.check_join_hash_table_build(pos, &callee, &args, builtin)
            }
            Builtin::JoinHashTableFree => {
                self.check_single_container_arg(pos, &callee, &args, BuiltinKind::JoinHashTable)?;
                Some(self.nil())
            }
            Builtin::JoinHashTableIterInit => self.check_join_hash_table_iter_init(pos, &callee, &args),
            Builtin::JoinHashTableIterHasNext => self.check_join_hash_table_iter_has_next(pos, &callee, &args),
            Builtin::JoinHashTableIterGetRow => {
                self.check_single_container_arg(pos, &callee, &args, BuiltinKind::JoinHashTableIterator)?;
                Some(self.byte_ptr())
            }
            Builtin::JoinHashTableIterClose => {
                self.check_single_container_arg(pos, &callee, &args, BuiltinKind::JoinHashTableIterator)?;
                Some(self.nil())
            }
            Builtin::SorterInit => self.check_sorter_init(pos, &callee, &args),
            Builtin::SorterInsert => {
                self.check_single_container_arg(pos, &callee, &args, BuiltinKind::Sorter)?;
                Some(self.byte_ptr())
            }
            Builtin::SorterSort | Builtin::SorterSortParallel | Builtin::SorterSortTopKParallel => {
                self.check_sorter_sort(pos, &callee, &args, builtin)
            }
            Builtin::SorterFree => {
                self.check_single_container_arg(pos, &callee, &args, BuiltinKind::Sorter)?;
                Some(self.nil())
            }
            Builtin::SorterIterInit
            | Builtin::SorterIterHasNext
            | Builtin::SorterIterNext
            | Builtin::SorterIterGetRow
            | Builtin::SorterIterClose => self.check_sorter_iter_call(pos, &callee, &args, builtin),
            Builtin::OutputAlloc => {
                self.check_single_container_arg(pos, &callee, &args, BuiltinKind::ExecutionContext)?;
                Some(self.byte_ptr())
            }
            Builtin::OutputAdvance | Builtin::OutputFinalize => {
                self.check_single_container_arg(pos, &callee, &args, BuiltinKind::ExecutionContext)?;
                Some(self.nil())
            }
            Builtin::OutputSetNull => self.check_output_set_null(pos, &callee, &args),
            Builtin::Insert => {
                if !self.check_arg_count(pos, &callee, &args, 3) {
                    return None;
                }
                Some(self.nil())
            }
            Builtin::IndexIteratorInit => self.check_index_iterator_init(pos, &callee, &args),
            Builtin::IndexIteratorScanKey => self.check_index_iterator_scan_key(pos, &callee, &args),
            Builtin::IndexIteratorAdvance => {
                self.check_single_container_arg(pos, &callee, &args, BuiltinKind::IndexIterator)?;
                Some(self.builtin(BuiltinKind::Bool))
            }
            Builtin::IndexIteratorGetSmallInt
            | Builtin::IndexIteratorGetInt
            | Builtin::IndexIteratorGetBigInt
            | Builtin::IndexIteratorGetReal
            | Builtin::IndexIteratorGetDouble => self.check_index_iterator_get(pos, &callee, &args, builtin),
            Builtin::IndexIteratorFree => {
                self.check_single_container_arg(pos, &callee, &args, BuiltinKind::IndexIterator)?;
                Some(self.nil())
            }
            Builtin::ACos
            | Builtin::ASin
            | Builtin::ATan
            | Builtin::ATan2
            | Builtin::Cos
            | Builtin::Cot
            | Builtin::Sin
            | Builtin::Tan => self.check_math_trig_call(pos, &callee, &args, builtin),
            Builtin::SizeOf => {
                if !self.check_arg_count(pos, &callee, &args, 1) {
                    return None;
                }
                Some(self.builtin(BuiltinKind::Uint32))
            }
            Builtin::PtrCast => unreachable!("pointer cast handled before argument resolution"),
        }
    }

    // Shared small helpers

    fn builtin(&self, kind: BuiltinKind) -> TypeRef {
        self.types.builtin(kind)
    }

    fn nil(&self) -> TypeRef {
        self.builtin(BuiltinKind::Nil)
    }

    fn byte_ptr(&mut self) -> TypeRef {
        let base = self.builtin(BuiltinKind::Uint8);
        self.types.pointer_to(base)
    }

    fn arg_display(&self, arg: ExprId) -> String {
        match self.arena.ty(arg) {
            Some(ty) => self.types.display(ty),
            None => "<unresolved>".to_string(),
        }
    }

    fn check_arg_count(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], expected: usize) -> bool {
        if args.len() != expected {
            self.reporter.report(SemaError::MismatchedArgCount {
                pos,
                callee: callee.to_string(),
                expected: expected.to_string(),
                actual: args.len(),
            });
            return false;
        }
        true
    }

    fn check_arg_count_at_least(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], expected: usize) -> bool {
        if args.len() < expected {
            self.reporter.report(SemaError::MismatchedArgCount {
                pos,
                callee: callee.to_string(),
                expected: format!("at least {}", expected),
                actual: args.len(),
            });
            return false;
        }
        true
    }

    fn report_bad_arg(&mut self, pos: SourcePos, callee: &str, idx: usize, expected: String, arg: ExprId) {
        let actual = self.arg_display(arg);
        self.reporter.report(SemaError::BadArgType {
            pos,
            callee: callee.to_string(),
            arg_index: idx,
            expected,
            actual,
        });
    }

    /// Argument `idx` must be a pointer to the given container kind.
    fn expect_ptr_to(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], idx: usize, kind: BuiltinKind) -> Option<()> {
        let ty = self.arena.ty(args[idx])?;
        if !self.is_ptr_to_builtin(ty, kind) {
            let expected = self.ptr_display(kind);
            self.report_bad_arg(pos, callee, idx, expected, args[idx]);
            return None;
        }
        Some(())
    }

    /// Argument `idx` must be exactly the given primitive kind.
    fn expect_specific(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], idx: usize, kind: BuiltinKind) -> Option<()> {
        let ty = self.arena.ty(args[idx])?;
        if !self.types.is_specific_builtin(ty, kind) {
            self.report_bad_arg(pos, callee, idx, kind.name().to_string(), args[idx]);
            return None;
        }
        Some(())
    }

    fn expect_integer(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], idx: usize) -> Option<()> {
        let ty = self.arena.ty(args[idx])?;
        if !self.types.is_integer(ty) {
            self.report_bad_arg(pos, callee, idx, BuiltinKind::Uint32.name().to_string(), args[idx]);
            return None;
        }
        Some(())
    }

    fn expect_pointer(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], idx: usize) -> Option<()> {
        let ty = self.arena.ty(args[idx])?;
        if !self.types.is_pointer(ty) {
            self.report_bad_arg(pos, callee, idx, "pointer".to_string(), args[idx]);
            return None;
        }
        Some(())
    }

    fn expect_function(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], idx: usize) -> Option<()> {
        let ty = self.arena.ty(args[idx])?;
        if !self.types.is_function(ty) {
            self.report_bad_arg(pos, callee, idx, "function".to_string(), args[idx]);
            return None;
        }
        Some(())
    }

    fn expect_string_literal(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], idx: usize) -> Option<()> {
        let is_lit = matches!(self.arena.kind(args[idx]), ExprKind::StringLit(_));
        if !is_lit {
            self.report_bad_arg(pos, callee, idx, "string literal".to_string(), args[idx]);
            return None;
        }
        Some(())
    }

    /// The common single-argument shape: exactly one pointer to `kind`.
    fn check_single_container_arg(
        &mut self,
        pos: SourcePos,
        callee: &str,
        args: &[ExprId],
        kind: BuiltinKind,
    ) -> Option<()> {
        if !self.check_arg_count(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, kind)
    }

    // Per-family contract checks

    fn check_sql_conversion(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 1) {
            return None;
        }
        let input = self.arena.ty(args[0])?;
        match builtin {
            Builtin::BoolToSql => {
                if !self.types.is_bool(input) {
                    self.report_bad_arg(pos, callee, 0, BuiltinKind::Bool.name().to_string(), args[0]);
                    return None;
                }
                Some(self.builtin(BuiltinKind::Boolean))
            }
            Builtin::IntToSql => {
                if !self.types.is_integer(input) {
                    self.report_bad_arg(pos, callee, 0, "integer".to_string(), args[0]);
                    return None;
                }
                Some(self.builtin(BuiltinKind::Integer))
            }
            Builtin::FloatToSql => {
                if !self.types.is_float(input) {
                    self.report_bad_arg(pos, callee, 0, "float".to_string(), args[0]);
                    return None;
                }
                Some(self.builtin(BuiltinKind::Real))
            }
            _ => {
                if !self.types.is_specific_builtin(input, BuiltinKind::Boolean) {
                    self.report_bad_arg(pos, callee, 0, BuiltinKind::Boolean.name().to_string(), args[0]);
                    return None;
                }
                Some(self.builtin(BuiltinKind::Bool))
            }
        }
    }

    fn check_vector_filter(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 3) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::ProjectedColumnsIterator)?;
        self.expect_specific(pos, callee, args, 1, BuiltinKind::Int32)?;
        // The third argument is the comparison value; the runtime accepts any
        // column-compatible operand, so it is left unchecked here.
        Some(self.builtin(BuiltinKind::Int32))
    }

    fn check_exec_ctx_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        self.check_single_container_arg(pos, callee, args, BuiltinKind::ExecutionContext)?;
        let mem = self.builtin(BuiltinKind::MemoryPool);
        Some(self.types.pointer_to(mem))
    }

    fn check_tls_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::ThreadStateContainer)?;
        match builtin {
            Builtin::TlsInit => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::MemoryPool)?;
            }
            Builtin::TlsFree => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
            }
            Builtin::TlsReset => {
                if !self.check_arg_count(pos, callee, args, 5) {
                    return None;
                }
                self.expect_specific(pos, callee, args, 1, BuiltinKind::Uint32)?;
                self.expect_function(pos, callee, args, 2)?;
                self.expect_function(pos, callee, args, 3)?;
                let ctx_ty = self.arena.ty(args[4])?;
                if !self.types.is_pointer(ctx_ty) && !self.types.is_nil(ctx_ty) {
                    self.report_bad_arg(pos, callee, 4, "pointer or nil".to_string(), args[4]);
                    return None;
                }
            }
            _ => {
                if !self.check_arg_count(pos, callee, args, 3) {
                    return None;
                }
                self.expect_pointer(pos, callee, args, 1)?;
                self.expect_function(pos, callee, args, 2)?;
            }
        }
        Some(self.nil())
    }

    fn check_table_iter_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::TableVectorIterator)?;
        match builtin {
            Builtin::TableIterInit => {
                if !self.check_arg_count(pos, callee, args, 3) {
                    return None;
                }
                self.expect_string_literal(pos, callee, args, 1)?;
                self.expect_ptr_to(pos, callee, args, 2, BuiltinKind::ExecutionContext)?;
                Some(self.nil())
            }
            Builtin::TableIterAdvance => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.builtin(BuiltinKind::Bool))
            }
            Builtin::TableIterGetPci => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                let pci = self.builtin(BuiltinKind::ProjectedColumnsIterator);
                Some(self.types.pointer_to(pci))
            }
            _ => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.nil())
            }
        }
    }

    fn check_table_iter_parallel(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 4) {
            return None;
        }
        self.expect_string_literal(pos, callee, args, 0)?;
        // Opaque query state: any pointer.
        self.expect_pointer(pos, callee, args, 1)?;
        self.expect_ptr_to(pos, callee, args, 2, BuiltinKind::ThreadStateContainer)?;
        // Scanner: fn(*queryState, *threadState, *TableVectorIterator) -> ?
        let fn_ty = self.arena.ty(args[3])?;
        let shape_ok = match self.types.function_shape(fn_ty) {
            Some((params, _)) => {
                params.len() == 3
                    && self.types.is_pointer(params[0])
                    && self.types.is_pointer(params[1])
                    && self.is_ptr_to_builtin(params[2], BuiltinKind::TableVectorIterator)
            }
            None => false,
        };
        if !shape_ok {
            self.reporter.report(SemaError::BadParallelScanFunction {
                pos,
                actual: self.arg_display(args[3]),
            });
            return None;
        }
        Some(self.nil())
    }

    fn check_pci_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::ProjectedColumnsIterator)?;
        match builtin {
            Builtin::PciIsFiltered
            | Builtin::PciHasNext
            | Builtin::PciHasNextFiltered
            | Builtin::PciAdvance
            | Builtin::PciAdvanceFiltered
            | Builtin::PciReset
            | Builtin::PciResetFiltered => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.builtin(BuiltinKind::Bool))
            }
            Builtin::PciMatch => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                let match_ty = self.arena.ty(args[1])?;
                if self.types.is_specific_builtin(match_ty, BuiltinKind::Boolean) {
                    // A SQL boolean match value is implicitly unwrapped.
                    let arg = args[1];
                    let original = self.arena.expr(arg).clone();
                    let inner = self.arena.alloc(original.kind, original.pos);
                    if let Some(t) = original.ty {
                        self.arena.set_ty(inner, t);
                    }
                    self.arena
                        .set_kind(arg, ExprKind::ImplicitCast { cast: CastKind::SqlBoolToBool, operand: inner });
                    self.arena.set_ty(arg, self.builtin(BuiltinKind::Bool));
                } else if !self.types.is_bool(match_ty) {
                    self.report_bad_arg(pos, callee, 1, BuiltinKind::Bool.name().to_string(), args[1]);
                    return None;
                }
                Some(self.nil())
            }
            Builtin::PciGetSmallInt | Builtin::PciGetInt | Builtin::PciGetBigInt => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                self.expect_integer(pos, callee, args, 1)?;
                Some(self.builtin(BuiltinKind::Integer))
            }
            _ => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                self.expect_integer(pos, callee, args, 1)?;
                Some(self.builtin(BuiltinKind::Real))
            }
        }
    }

    fn check_hash_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        for (idx, &arg) in args.iter().enumerate() {
            let ty = self.arena.ty(arg)?;
            if !self.types.is_sql_value(ty) {
                self.reporter.report(SemaError::NotASqlValue {
                    pos: self.arena.pos(arg),
                    callee: callee.to_string(),
                    arg_index: idx,
                    actual: self.types.display(ty),
                });
                return None;
            }
        }
        Some(self.builtin(BuiltinKind::Uint64))
    }

    fn check_filter_manager_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::FilterManager)?;
        match builtin {
            Builtin::FilterManagerInit | Builtin::FilterManagerFinalize | Builtin::FilterManagerFree => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.nil())
            }
            Builtin::FilterManagerInsertFilter => {
                if !self.check_arg_count_at_least(pos, callee, args, 2) {
                    return None;
                }
                for (idx, &arg) in args.iter().enumerate().skip(1) {
                    let ty = self.arena.ty(arg)?;
                    let shape_ok = match self.types.function_shape(ty) {
                        Some((params, ret)) => {
                            self.types.is_integer(ret)
                                && params.len() == 1
                                && self.is_ptr_to_builtin(params[0], BuiltinKind::ProjectedColumnsIterator)
                        }
                        None => false,
                    };
                    if !shape_ok {
                        self.reporter.report(SemaError::BadFunctionShape {
                            pos,
                            callee: callee.to_string(),
                            arg_index: idx,
                            expected: "fn(*ProjectedColumnsIterator) -> int32".to_string(),
                            actual: self.arg_display(arg),
                        });
                        return None;
                    }
                }
                Some(self.nil())
            }
            _ => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::ProjectedColumnsIterator)?;
                Some(self.nil())
            }
        }
    }

    fn check_agg_hash_table_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::AggregationHashTable)?;
        match builtin {
            Builtin::AggHashTableInit => {
                if !self.check_arg_count(pos, callee, args, 3) {
                    return None;
                }
                self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::MemoryPool)?;
                self.expect_specific(pos, callee, args, 2, BuiltinKind::Uint32)?;
                Some(self.nil())
            }
            Builtin::AggHashTableInsert => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                self.expect_specific(pos, callee, args, 1, BuiltinKind::Uint64)?;
                Some(self.byte_ptr())
            }
            Builtin::AggHashTableLookup => {
                if !self.check_arg_count(pos, callee, args, 4) {
                    return None;
                }
                self.expect_specific(pos, callee, args, 1, BuiltinKind::Uint64)?;
                self.expect_function(pos, callee, args, 2)?;
                self.expect_pointer(pos, callee, args, 3)?;
                Some(self.byte_ptr())
            }
            Builtin::AggHashTableProcessBatch => {
                if !self.check_arg_count(pos, callee, args, 7) {
                    return None;
                }
                // The batch argument is a pointer to a PCI pointer.
                let batch_ty = self.arena.ty(args[1])?;
                let inner_ok = self
                    .types
                    .pointee(batch_ty)
                    .is_some_and(|inner| self.is_ptr_to_builtin(inner, BuiltinKind::ProjectedColumnsIterator));
                if !inner_ok {
                    self.report_bad_arg(pos, callee, 1, "**ProjectedColumnsIterator".to_string(), args[1]);
                    return None;
                }
                for idx in 2..=5 {
                    self.expect_function(pos, callee, args, idx)?;
                }
                let last = self.arena.ty(args[6])?;
                if !self.types.is_bool(last) {
                    self.report_bad_arg(pos, callee, 6, BuiltinKind::Bool.name().to_string(), args[6]);
                    return None;
                }
                Some(self.nil())
            }
            Builtin::AggHashTableMovePartitions => {
                if !self.check_arg_count(pos, callee, args, 4) {
                    return None;
                }
                self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::ThreadStateContainer)?;
                self.expect_specific(pos, callee, args, 2, BuiltinKind::Uint32)?;
                self.expect_function(pos, callee, args, 3)?;
                Some(self.nil())
            }
            Builtin::AggHashTableParallelPartitionedScan => {
                if !self.check_arg_count(pos, callee, args, 4) {
                    return None;
                }
                self.expect_pointer(pos, callee, args, 1)?;
                self.expect_ptr_to(pos, callee, args, 2, BuiltinKind::ThreadStateContainer)?;
                self.expect_function(pos, callee, args, 3)?;
                Some(self.nil())
            }
            _ => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.nil())
            }
        }
    }

    fn check_agg_hash_table_iter_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::AggregationHashTableIterator)?;
        match builtin {
            Builtin::AggHashTableIterInit => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::AggregationHashTable)?;
                Some(self.nil())
            }
            Builtin::AggHashTableIterHasNext => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.builtin(BuiltinKind::Bool))
            }
            Builtin::AggHashTableIterGetRow => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.byte_ptr())
            }
            _ => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.nil())
            }
        }
    }

    fn check_agg_part_iter_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::AggOverflowPartIter)?;
        match builtin {
            Builtin::AggPartIterHasNext => Some(self.builtin(BuiltinKind::Bool)),
            Builtin::AggPartIterGetRow => Some(self.byte_ptr()),
            Builtin::AggPartIterGetHash => Some(self.builtin(BuiltinKind::Uint64)),
            _ => Some(self.nil()),
        }
    }

    fn check_aggregator_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        match builtin {
            Builtin::AggInit | Builtin::AggReset => {
                if !self.check_arg_count_at_least(pos, callee, args, 1) {
                    return None;
                }
                for (idx, &arg) in args.iter().enumerate() {
                    let ty = self.arena.ty(arg)?;
                    if !self.is_ptr_to_aggregator(ty) {
                        self.reporter.report(SemaError::NotAnAggregator {
                            pos,
                            callee: callee.to_string(),
                            arg_index: idx,
                            actual: self.types.display(ty),
                        });
                        return None;
                    }
                }
                Some(self.nil())
            }
            Builtin::AggAdvance => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                let agg_ty = self.arena.ty(args[0])?;
                if !self.is_ptr_to_aggregator(agg_ty) {
                    self.reporter.report(SemaError::NotAnAggregator {
                        pos,
                        callee: callee.to_string(),
                        arg_index: 0,
                        actual: self.types.display(agg_ty),
                    });
                    return None;
                }
                let val_ty = self.arena.ty(args[1])?;
                if !self.is_ptr_to_sql_value(val_ty) {
                    self.reporter.report(SemaError::NotASqlValue {
                        pos,
                        callee: callee.to_string(),
                        arg_index: 1,
                        actual: self.types.display(val_ty),
                    });
                    return None;
                }
                Some(self.nil())
            }
            Builtin::AggMerge => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                for (idx, &arg) in args.iter().enumerate() {
                    let ty = self.arena.ty(arg)?;
                    if !self.is_ptr_to_aggregator(ty) {
                        self.reporter.report(SemaError::NotAnAggregator {
                            pos,
                            callee: callee.to_string(),
                            arg_index: idx,
                            actual: self.types.display(ty),
                        });
                        return None;
                    }
                }
                Some(self.nil())
            }
            _ => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                let ty = self.arena.ty(args[0])?;
                if !self.is_ptr_to_aggregator(ty) {
                    self.reporter.report(SemaError::NotAnAggregator {
                        pos,
                        callee: callee.to_string(),
                        arg_index: 0,
                        actual: self.types.display(ty),
                    });
                    return None;
                }
                // All aggregators currently surface their result as a SQL
                // integer; see DESIGN.md before widening this.
                Some(self.builtin(BuiltinKind::Integer))
            }
        }
    }

    fn check_join_hash_table_init(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 3) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::JoinHashTable)?;
        self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::MemoryPool)?;
        self.expect_integer(pos, callee, args, 2)?;
        Some(self.nil())
    }

    fn check_join_hash_table_insert(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 2) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::JoinHashTable)?;
        self.expect_specific(pos, callee, args, 1, BuiltinKind::Uint64)?;
        Some(self.byte_ptr())
    }

    fn check_join_hash_table_build(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::JoinHashTable)?;
        match builtin {
            Builtin::JoinHashTableBuild => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
            }
            _ => {
                if !self.check_arg_count(pos, callee, args, 3) {
                    return None;
                }
                self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::ThreadStateContainer)?;
                self.expect_specific(pos, callee, args, 2, BuiltinKind::Uint32)?;
            }
        }
        Some(self.nil())
    }

    fn check_join_hash_table_iter_init(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 3) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::JoinHashTableIterator)?;
        self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::JoinHashTable)?;
        self.expect_specific(pos, callee, args, 2, BuiltinKind::Uint64)?;
        Some(self.nil())
    }

    fn check_join_hash_table_iter_has_next(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 4) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::JoinHashTableIterator)?;
        // Key equality: fn(*ctx, *probeRow, *tableRow) -> bool
        let key_eq_ty = self.arena.ty(args[1])?;
        let shape_ok = match self.types.function_shape(key_eq_ty) {
            Some((params, ret)) => {
                self.types.is_bool(ret) && params.len() == 3 && params.iter().all(|&p| self.types.is_pointer(p))
            }
            None => false,
        };
        if !shape_ok {
            self.reporter.report(SemaError::BadFunctionShape {
                pos,
                callee: callee.to_string(),
                arg_index: 1,
                expected: "fn(*, *, *) -> bool".to_string(),
                actual: self.arg_display(args[1]),
            });
            return None;
        }
        self.expect_pointer(pos, callee, args, 2)?;
        self.expect_pointer(pos, callee, args, 3)?;
        Some(self.builtin(BuiltinKind::Bool))
    }

    fn check_sorter_init(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 4) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::Sorter)?;
        self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::MemoryPool)?;
        // Comparator: fn(*, *) -> int32
        let cmp_ty = self.arena.ty(args[2])?;
        let shape_ok = match self.types.function_shape(cmp_ty) {
            Some((params, ret)) => {
                self.types.is_specific_builtin(ret, BuiltinKind::Int32)
                    && params.len() == 2
                    && params.iter().all(|&p| self.types.is_pointer(p))
            }
            None => false,
        };
        if !shape_ok {
            self.reporter.report(SemaError::BadFunctionShape {
                pos,
                callee: callee.to_string(),
                arg_index: 2,
                expected: "fn(*, *) -> int32".to_string(),
                actual: self.arg_display(args[2]),
            });
            return None;
        }
        self.expect_specific(pos, callee, args, 3, BuiltinKind::Uint32)?;
        Some(self.nil())
    }

    fn check_sorter_sort(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::Sorter)?;
        match builtin {
            Builtin::SorterSort => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
            }
            Builtin::SorterSortParallel | Builtin::SorterSortTopKParallel => {
                let expected = if builtin == Builtin::SorterSortTopKParallel { 4 } else { 3 };
                if !self.check_arg_count(pos, callee, args, expected) {
                    return None;
                }
                self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::ThreadStateContainer)?;
                self.expect_specific(pos, callee, args, 2, BuiltinKind::Uint32)?;
                if builtin == Builtin::SorterSortTopKParallel {
                    self.expect_specific(pos, callee, args, 3, BuiltinKind::Uint64)?;
                }
            }
            _ => unreachable!("not a sorter sort call"),
        }
        Some(self.nil())
    }

    fn check_sorter_iter_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count_at_least(pos, callee, args, 1) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::SorterIterator)?;
        match builtin {
            Builtin::SorterIterInit => {
                if !self.check_arg_count(pos, callee, args, 2) {
                    return None;
                }
                self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::Sorter)?;
                Some(self.nil())
            }
            Builtin::SorterIterHasNext => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.builtin(BuiltinKind::Bool))
            }
            Builtin::SorterIterGetRow => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.byte_ptr())
            }
            _ => {
                if !self.check_arg_count(pos, callee, args, 1) {
                    return None;
                }
                Some(self.nil())
            }
        }
    }

    fn check_output_set_null(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 2) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::ExecutionContext)?;
        self.expect_integer(pos, callee, args, 1)?;
        Some(self.nil())
    }

    fn check_index_iterator_init(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 3) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::IndexIterator)?;
        let name_ty = self.arena.ty(args[1])?;
        if !self.types.is_string(name_ty) {
            self.report_bad_arg(pos, callee, 1, "string".to_string(), args[1]);
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 2, BuiltinKind::ExecutionContext)?;
        Some(self.nil())
    }

    fn check_index_iterator_scan_key(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 2) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::IndexIterator)?;
        self.expect_ptr_to(pos, callee, args, 1, BuiltinKind::Int8)?;
        Some(self.nil())
    }

    fn check_index_iterator_get(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 2) {
            return None;
        }
        self.expect_ptr_to(pos, callee, args, 0, BuiltinKind::IndexIterator)?;
        self.expect_integer(pos, callee, args, 1)?;
        match builtin {
            Builtin::IndexIteratorGetReal | Builtin::IndexIteratorGetDouble => Some(self.builtin(BuiltinKind::Real)),
            _ => Some(self.builtin(BuiltinKind::Integer)),
        }
    }

    fn check_math_trig_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId], builtin: Builtin) -> Option<TypeRef> {
        let real = BuiltinKind::Real;
        if builtin == Builtin::ATan2 {
            if !self.check_arg_count(pos, callee, args, 2) {
                return None;
            }
            self.expect_specific(pos, callee, args, 0, real)?;
            self.expect_specific(pos, callee, args, 1, real)?;
        } else {
            if !self.check_arg_count(pos, callee, args, 1) {
                return None;
            }
            self.expect_specific(pos, callee, args, 0, real)?;
        }
        Some(self.builtin(real))
    }

    fn check_ptr_cast(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        if !self.check_arg_count(pos, callee, args, 2) {
            return None;
        }
        // The first argument arrives parsed as a dereference because the
        // grammar cannot tell a type expression from a value expression at a
        // call site. Rewrite it into a pointer-type representation.
        let ExprKind::Deref(inner) = self.arena.kind(args[0]).clone() else {
            self.reporter.report(SemaError::BadPointerCast { pos, actual: self.arg_display(args[0]) });
            return None;
        };
        self.arena.set_kind(args[0], ExprKind::PointerTypeRepr(inner));

        for &arg in args {
            self.resolve_expr(arg)?;
        }

        let target = self.arena.ty(args[0])?;
        let source = self.arena.ty(args[1])?;
        if !self.types.is_pointer(target) || !self.types.is_pointer(source) {
            self.reporter.report(SemaError::BadPointerCast {
                pos,
                actual: self.types.display(if self.types.is_pointer(target) { source } else { target }),
            });
            return None;
        }
        Some(target)
    }

    fn check_user_call(&mut self, pos: SourcePos, callee: &str, args: &[ExprId]) -> Option<TypeRef> {
        for &arg in args {
            self.resolve_expr(arg)?;
        }
        let fn_ty = self.function_types[callee];
        let (params, ret) = {
            let (p, r) = self.types.function_shape(fn_ty)?;
            (p.to_vec(), r)
        };
        if !self.check_arg_count(pos, callee, args, params.len()) {
            return None;
        }
        for (idx, (&arg, &param)) in args.iter().zip(params.iter()).enumerate() {
            let ty = self.arena.ty(arg)?;
            if ty != param {
                let expected = self.types.display(param);
                self.report_bad_arg(pos, callee, idx, expected, arg);
                return None;
            }
        }
        Some(ret)
    }
}
