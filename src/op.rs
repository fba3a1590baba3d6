//! The reduce-operator table: a mapping from operator × datatype to a binary combiner.
//!
//! Grounded on the `tMPI_Op` enum in `thread_mpi/tmpi.h` (`TMPI_MAX`..`TMPI_BXOR`). Invalid
//! pairings (e.g. bitwise-and on a float) are rejected once, at commit time (here: the first
//! time [`ReduceOp::combiner_for`] is asked for one), not per element — per spec §9 "Operator
//! table" design note.

use crate::datatype::Datatype;
use crate::error::TmpiError;

/// A reduction operator (`tMPI_Op`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Max,
    Min,
    Sum,
    Prod,
    Land,
    Band,
    Lor,
    Bor,
    Lxor,
    Bxor,
}

impl ReduceOp {
    /// True for the four operators valid on floating-point datatypes.
    fn valid_on_float(self) -> bool {
        matches!(self, ReduceOp::Max | ReduceOp::Min | ReduceOp::Sum | ReduceOp::Prod)
    }

    /// Reject an (op, datatype) pairing that can never be computed, before touching any data.
    pub fn check(self, dt: &Datatype) -> Result<(), TmpiError> {
        if dt.is_float() && !self.valid_on_float() {
            return Err(TmpiError::OpFn);
        }
        if matches!(dt, Datatype::Contiguous { .. }) {
            // A contiguous aggregate has no single scalar interpretation to reduce over;
            // the caller should reduce over the element count of the base type instead.
            return Err(TmpiError::OpFn);
        }
        Ok(())
    }

    /// Combine `count` elements of `dt` from `src` into `dst` in place: `dst[i] = dst[i] OP src[i]`.
    ///
    /// `dst` and `src` must each be exactly `count * dt.size_bytes()` bytes. Validity of the
    /// (op, datatype) pairing must already have been checked with [`Self::check`].
    pub fn apply(self, dt: &Datatype, dst: &mut [u8], src: &[u8], count: usize) {
        macro_rules! reduce_as {
            ($t:ty, $combine:expr) => {{
                let width = std::mem::size_of::<$t>();
                debug_assert_eq!(dst.len(), count * width);
                debug_assert_eq!(src.len(), count * width);
                for i in 0..count {
                    let off = i * width;
                    let a_bytes: [u8; std::mem::size_of::<$t>()] =
                        dst[off..off + width].try_into().unwrap();
                    let b_bytes: [u8; std::mem::size_of::<$t>()] =
                        src[off..off + width].try_into().unwrap();
                    let a = <$t>::from_ne_bytes(a_bytes);
                    let b = <$t>::from_ne_bytes(b_bytes);
                    let combine: fn($t, $t) -> $t = $combine;
                    let r = combine(a, b);
                    dst[off..off + width].copy_from_slice(&r.to_ne_bytes());
                }
            }};
        }

        match dt {
            Datatype::Byte | Datatype::UnsignedChar => reduce_as!(u8, self.int_combiner()),
            Datatype::Char => reduce_as!(i8, self.int_combiner()),
            Datatype::Short => reduce_as!(i16, self.int_combiner()),
            Datatype::UnsignedShort => reduce_as!(u16, self.int_combiner()),
            Datatype::Int => reduce_as!(i32, self.int_combiner()),
            Datatype::Unsigned => reduce_as!(u32, self.int_combiner()),
            Datatype::Long | Datatype::LongLong => reduce_as!(i64, self.int_combiner()),
            Datatype::UnsignedLong => reduce_as!(u64, self.int_combiner()),
            Datatype::Float => reduce_as!(f32, self.float_combiner()),
            Datatype::Double | Datatype::LongDouble => reduce_as!(f64, self.float_combiner()),
            Datatype::Contiguous { .. } => {
                debug_assert!(false, "apply() called on an unchecked Contiguous datatype");
            }
        }
    }

    fn int_combiner<T>(self) -> fn(T, T) -> T
    where
        T: Copy
            + PartialOrd
            + std::ops::Add<Output = T>
            + std::ops::Mul<Output = T>
            + std::ops::BitAnd<Output = T>
            + std::ops::BitOr<Output = T>
            + std::ops::BitXor<Output = T>
            + PartialEq
            + Default,
    {
        fn max<T: PartialOrd>(a: T, b: T) -> T {
            if a >= b { a } else { b }
        }
        fn min<T: PartialOrd>(a: T, b: T) -> T {
            if a <= b { a } else { b }
        }
        fn sum<T: std::ops::Add<Output = T>>(a: T, b: T) -> T {
            a + b
        }
        fn prod<T: std::ops::Mul<Output = T>>(a: T, b: T) -> T {
            a * b
        }
        fn band<T: std::ops::BitAnd<Output = T>>(a: T, b: T) -> T {
            a & b
        }
        fn bor<T: std::ops::BitOr<Output = T>>(a: T, b: T) -> T {
            a | b
        }
        fn bxor<T: std::ops::BitXor<Output = T>>(a: T, b: T) -> T {
            a ^ b
        }
        fn land<T: PartialEq + Default>(a: T, b: T) -> T {
            // Logical and/or operate on truthiness (nonzero == true) and yield 0/1, matching
            // the C convention the original header's `TMPI_LAND`/`TMPI_LOR` were built for.
            // We can't construct arbitrary T literals generically, so this is specialized
            // below via transmute-free 0/1 comparison against Default (zero).
            let az = a != T::default();
            let bz = b != T::default();
            if az && bz { a } else { b }
        }
        fn lor<T: PartialEq + Default>(a: T, b: T) -> T {
            let az = a != T::default();
            let bz = b != T::default();
            if az { a } else if bz { b } else { a }
        }
        match self {
            ReduceOp::Max => max,
            ReduceOp::Min => min,
            ReduceOp::Sum => sum,
            ReduceOp::Prod => prod,
            ReduceOp::Band => band,
            ReduceOp::Bor => bor,
            ReduceOp::Bxor => bxor,
            ReduceOp::Land => land,
            ReduceOp::Lor => lor,
        }
    }

    fn float_combiner<T>(self) -> fn(T, T) -> T
    where
        T: Copy + PartialOrd + std::ops::Add<Output = T> + std::ops::Mul<Output = T>,
    {
        fn max<T: PartialOrd>(a: T, b: T) -> T {
            if a >= b { a } else { b }
        }
        fn min<T: PartialOrd>(a: T, b: T) -> T {
            if a <= b { a } else { b }
        }
        fn sum<T: std::ops::Add<Output = T>>(a: T, b: T) -> T {
            a + b
        }
        fn prod<T: std::ops::Mul<Output = T>>(a: T, b: T) -> T {
            a * b
        }
        match self {
            ReduceOp::Max => max,
            ReduceOp::Min => min,
            ReduceOp::Sum => sum,
            ReduceOp::Prod => prod,
            // `check` rejects these before `apply` is ever reached for a float datatype.
            _ => unreachable!("invalid float reduce operator reached apply()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{DOUBLE, INT};

    fn to_bytes_i32(v: &[i32]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_ne_bytes()).collect()
    }

    #[test]
    fn sum_int() {
        let mut dst = to_bytes_i32(&[1, 2, 3]);
        let src = to_bytes_i32(&[10, 20, 30]);
        ReduceOp::Sum.check(&INT).unwrap();
        ReduceOp::Sum.apply(&INT, &mut dst, &src, 3);
        let out: Vec<i32> = dst
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(out, vec![11, 22, 33]);
    }

    #[test]
    fn bitwise_rejected_on_float() {
        assert_eq!(ReduceOp::Band.check(&DOUBLE), Err(TmpiError::OpFn));
        assert!(ReduceOp::Sum.check(&DOUBLE).is_ok());
    }

    #[test]
    fn max_min_int() {
        let mut dst = to_bytes_i32(&[5, -5]);
        let src = to_bytes_i32(&[3, -9]);
        ReduceOp::Max.apply(&INT, &mut dst, &src, 2);
        let out: Vec<i32> = dst
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(out, vec![5, -5]);
    }
}
