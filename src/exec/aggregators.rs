// Aggregators
//
// Byte-encoded accumulator states living inside aggregation payload rows.
// Each aggregator kind has a fixed layout and the init / advance / merge /
// result / reset lifecycle.

use byteorder::{ByteOrder, LittleEndian};

use crate::dsl::types::BuiltinKind;
use crate::exec::bytes::ByteBuffer;
use crate::sql::{SqlTypeId, SqlValue};

/// Encoded size of one aggregator state.
pub fn aggregator_size(kind: BuiltinKind) -> usize {
    match kind {
        BuiltinKind::CountAggregate | BuiltinKind::CountStarAggregate => 8,
        // seen flag + accumulator
        BuiltinKind::IntegerSumAggregate | BuiltinKind::IntegerMinAggregate | BuiltinKind::IntegerMaxAggregate => 9,
        // count + sum
        BuiltinKind::IntegerAvgAggregate => 16,
        _ => 0,
    }
}

fn read_i64(buf: &ByteBuffer, offset: usize) -> i64 {
    buf.read(|b| LittleEndian::read_i64(&b[offset..offset + 8]))
}

fn write_i64(buf: &ByteBuffer, offset: usize, v: i64) {
    let mut bytes = [0u8; 8];
    LittleEndian::write_i64(&mut bytes, v);
    buf.put(offset, &bytes);
}

/// Zero the state; also the reset lifecycle step.
pub fn agg_init(kind: BuiltinKind, buf: &ByteBuffer, offset: usize) {
    buf.put(offset, &vec![0u8; aggregator_size(kind)]);
}

/// Fold one input value into the state. Nulls are ignored by every
/// aggregator except COUNT(*).
pub fn agg_advance(kind: BuiltinKind, buf: &ByteBuffer, offset: usize, value: &SqlValue) {
    match kind {
        BuiltinKind::CountStarAggregate => {
            write_i64(buf, offset, read_i64(buf, offset) + 1);
        }
        BuiltinKind::CountAggregate => {
            if !value.is_null() {
                write_i64(buf, offset, read_i64(buf, offset) + 1);
            }
        }
        BuiltinKind::IntegerSumAggregate => {
            if let Some(v) = value.as_integer() {
                buf.put(offset, &[1]);
                write_i64(buf, offset + 1, read_i64(buf, offset + 1).wrapping_add(v));
            }
        }
        BuiltinKind::IntegerAvgAggregate => {
            if let Some(v) = value.as_integer() {
                write_i64(buf, offset, read_i64(buf, offset) + 1);
                write_i64(buf, offset + 8, read_i64(buf, offset + 8).wrapping_add(v));
            }
        }
        BuiltinKind::IntegerMinAggregate => {
            if let Some(v) = value.as_integer() {
                let seen = buf.get(offset, 1)[0] != 0;
                if !seen || v < read_i64(buf, offset + 1) {
                    buf.put(offset, &[1]);
                    write_i64(buf, offset + 1, v);
                }
            }
        }
        BuiltinKind::IntegerMaxAggregate => {
            if let Some(v) = value.as_integer() {
                let seen = buf.get(offset, 1)[0] != 0;
                if !seen || v > read_i64(buf, offset + 1) {
                    buf.put(offset, &[1]);
                    write_i64(buf, offset + 1, v);
                }
            }
        }
        _ => {}
    }
}

/// Fold a partial state into this one.
pub fn agg_merge(kind: BuiltinKind, dst: (&ByteBuffer, usize), src: (&ByteBuffer, usize)) {
    let (dst_buf, dst_off) = dst;
    let (src_buf, src_off) = src;
    match kind {
        BuiltinKind::CountAggregate | BuiltinKind::CountStarAggregate => {
            write_i64(dst_buf, dst_off, read_i64(dst_buf, dst_off) + read_i64(src_buf, src_off));
        }
        BuiltinKind::IntegerSumAggregate => {
            if src_buf.get(src_off, 1)[0] != 0 {
                dst_buf.put(dst_off, &[1]);
                write_i64(
                    dst_buf,
                    dst_off + 1,
                    read_i64(dst_buf, dst_off + 1).wrapping_add(read_i64(src_buf, src_off + 1)),
                );
            }
        }
        BuiltinKind::IntegerAvgAggregate => {
            write_i64(dst_buf, dst_off, read_i64(dst_buf, dst_off) + read_i64(src_buf, src_off));
            write_i64(
                dst_buf,
                dst_off + 8,
                read_i64(dst_buf, dst_off + 8).wrapping_add(read_i64(src_buf, src_off + 8)),
            );
        }
        BuiltinKind::IntegerMinAggregate | BuiltinKind::IntegerMaxAggregate => {
            if src_buf.get(src_off, 1)[0] != 0 {
                let v = read_i64(src_buf, src_off + 1);
                agg_advance(kind, dst_buf, dst_off, &SqlValue::integer(v));
            }
        }
        _ => {}
    }
}

/// Current result as a SQL integer.
pub fn agg_result(kind: BuiltinKind, buf: &ByteBuffer, offset: usize) -> SqlValue {
    match kind {
        BuiltinKind::CountAggregate | BuiltinKind::CountStarAggregate => SqlValue::integer(read_i64(buf, offset)),
        BuiltinKind::IntegerSumAggregate | BuiltinKind::IntegerMinAggregate | BuiltinKind::IntegerMaxAggregate => {
            if buf.get(offset, 1)[0] == 0 {
                SqlValue::null_of(SqlTypeId::Integer)
            } else {
                SqlValue::integer(read_i64(buf, offset + 1))
            }
        }
        BuiltinKind::IntegerAvgAggregate => {
            let count = read_i64(buf, offset);
            if count == 0 {
                SqlValue::null_of(SqlTypeId::Integer)
            } else {
                SqlValue::integer(read_i64(buf, offset + 8) / count)
            }
        }
        _ => SqlValue::null_of(SqlTypeId::Integer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(kind: BuiltinKind) -> ByteBuffer {
        let buf = ByteBuffer::with_size(aggregator_size(kind));
        agg_init(kind, &buf, 0);
        buf
    }

    #[test]
    fn test_sum_over_range() {
        let kind = BuiltinKind::IntegerSumAggregate;
        let buf = state(kind);
        for i in 1..=1000 {
            agg_advance(kind, &buf, 0, &SqlValue::integer(i));
        }
        assert_eq!(agg_result(kind, &buf, 0), SqlValue::integer(500_500));
    }

    #[test]
    fn test_sum_ignores_nulls_and_starts_null() {
        let kind = BuiltinKind::IntegerSumAggregate;
        let buf = state(kind);
        assert!(agg_result(kind, &buf, 0).is_null());
        agg_advance(kind, &buf, 0, &SqlValue::null_of(SqlTypeId::Integer));
        assert!(agg_result(kind, &buf, 0).is_null());
        agg_advance(kind, &buf, 0, &SqlValue::integer(5));
        assert_eq!(agg_result(kind, &buf, 0), SqlValue::integer(5));
    }

    #[test]
    fn test_count_vs_count_star_on_nulls() {
        let count = state(BuiltinKind::CountAggregate);
        let count_star = state(BuiltinKind::CountStarAggregate);
        for v in [SqlValue::integer(1), SqlValue::null_of(SqlTypeId::Integer)] {
            agg_advance(BuiltinKind::CountAggregate, &count, 0, &v);
            agg_advance(BuiltinKind::CountStarAggregate, &count_star, 0, &v);
        }
        assert_eq!(agg_result(BuiltinKind::CountAggregate, &count, 0), SqlValue::integer(1));
        assert_eq!(agg_result(BuiltinKind::CountStarAggregate, &count_star, 0), SqlValue::integer(2));
    }

    #[test]
    fn test_min_max() {
        let min = state(BuiltinKind::IntegerMinAggregate);
        let max = state(BuiltinKind::IntegerMaxAggregate);
        for v in [3i64, -7, 12, 0] {
            agg_advance(BuiltinKind::IntegerMinAggregate, &min, 0, &SqlValue::integer(v));
            agg_advance(BuiltinKind::IntegerMaxAggregate, &max, 0, &SqlValue::integer(v));
        }
        assert_eq!(agg_result(BuiltinKind::IntegerMinAggregate, &min, 0), SqlValue::integer(-7));
        assert_eq!(agg_result(BuiltinKind::IntegerMaxAggregate, &max, 0), SqlValue::integer(12));
    }

    #[test]
    fn test_avg_truncates_like_integer_division() {
        let kind = BuiltinKind::IntegerAvgAggregate;
        let buf = state(kind);
        for v in [1i64, 2, 4] {
            agg_advance(kind, &buf, 0, &SqlValue::integer(v));
        }
        assert_eq!(agg_result(kind, &buf, 0), SqlValue::integer(2));
    }

    #[test]
    fn test_merge_partial_states() {
        let kind = BuiltinKind::IntegerSumAggregate;
        let a = state(kind);
        let b = state(kind);
        agg_advance(kind, &a, 0, &SqlValue::integer(10));
        agg_advance(kind, &b, 0, &SqlValue::integer(32));
        agg_merge(kind, (&a, 0), (&b, 0));
        assert_eq!(agg_result(kind, &a, 0), SqlValue::integer(42));
    }

    #[test]
    fn test_reset_clears_state() {
        let kind = BuiltinKind::CountStarAggregate;
        let buf = state(kind);
        agg_advance(kind, &buf, 0, &SqlValue::integer(1));
        agg_init(kind, &buf, 0);
        assert_eq!(agg_result(kind, &buf, 0), SqlValue::integer(0));
    }
}
