//! Szudzik pairing of node-index pairs
//!
//! Maps two `u32` node indices to a single `u64` and back. Random graph
//! generation keeps a set of these codes instead of a set of pairs to reject
//! duplicate edges.
//!
//! The whole `u32 × u32` domain fits: `combine(u32::MAX, u32::MAX)` is
//! exactly `u64::MAX`.

/// Pair `(a, b)` into one integer.
///
/// The mapping is ordered: `combine(a, b) != combine(b, a)` unless `a == b`.
/// Use [`combine_unordered`] for undirected edges.
pub fn combine(a: u32, b: u32) -> u64 {
    let (a, b) = (u64::from(a), u64::from(b));
    if a >= b { a * a + a + b } else { a + b * b }
}

/// Pair an undirected edge, normalizing to `(min, max)` first.
pub fn combine_unordered(a: u32, b: u32) -> u64 {
    combine(a.min(b), a.max(b))
}

/// Exact inverse of [`combine`].
pub fn reverse(z: u64) -> (u32, u32) {
    let s = z.isqrt();
    let r = z - s * s;
    if r < s {
        (r as u32, s as u32)
    } else {
        (s as u32, (r - s) as u32)
    }
}
