use crate::interval::CnvInterval;

/// Default minimum overlap, as a fraction of either interval's length
pub const DEFAULT_OVERLAP_RATE: f64 = 0.8;

/// Number of bases shared by two intervals on the same chromosome (0 if disjoint)
pub fn overlap_len(a: &CnvInterval, b: &CnvInterval) -> i64 {
    if a.chromosome() != b.chromosome() {
        return 0;
    }
    let start = i64::from(a.start().max(b.start()));
    let end = i64::from(a.end().min(b.end()));
    (end - start).max(0)
}

/// Decide whether two calls describe the same event.
///
/// They must share at least one base, and the shared part must cover at least
/// `threshold` of one of the two intervals. A call lying mostly inside a larger
/// one therefore always merges with it. Empty or inverted intervals never merge.
pub fn overlaps(a: &CnvInterval, b: &CnvInterval, threshold: f64) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let shared = overlap_len(a, b);
    if shared <= 0 {
        return false;
    }
    let shared = shared as f64;
    shared >= threshold * a.len() as f64 || shared >= threshold * b.len() as f64
}
