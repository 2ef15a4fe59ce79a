//! Host stack headroom for Shark's recursive passes.
//!
//! The parser recurses once per nested statement and once per right operand,
//! and the evaluator once per statement, sub-expression and user call. Source
//! like `1 + 1 + ...` or fifty thousand nested `?` blocks therefore goes as
//! deep as the program is long. Every one of those recursion points goes
//! through [`with_headroom`], which moves onto a fresh heap segment when the
//! current one runs low. Runaway user recursion is still cut off by
//! `Config::max_call_depth` as a RecursionError.

/// Grow once fewer than this many bytes are left on the current segment.
const MIN_HEADROOM: usize = 128 * 1024;

/// Bytes in each segment allocated after the first.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Runs `f`, switching to a new stack segment first if the current one is
/// nearly exhausted.
#[inline]
pub fn with_headroom<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(MIN_HEADROOM, SEGMENT_SIZE, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Nested {
        Leaf(i64),
        Add(Box<Nested>, i64),
    }

    fn total(node: &Nested) -> i64 {
        with_headroom(|| match node {
            Nested::Leaf(value) => *value,
            Nested::Add(inner, value) => total(inner) + value,
        })
    }

    #[test]
    fn walks_a_deep_left_spine() {
        let mut node = Nested::Leaf(0);
        for _ in 0..100_000 {
            node = Nested::Add(Box::new(node), 1);
        }
        assert_eq!(total(&node), 100_000);

        // unwind iteratively so the test itself does not recurse on drop
        loop {
            match node {
                Nested::Add(inner, _) => node = *inner,
                Nested::Leaf(_) => break,
            }
        }
    }

    #[test]
    fn passes_errors_through() {
        let result: Result<i64, &str> = with_headroom(|| Err("unbound"));
        assert_eq!(result, Err("unbound"));
    }
}
