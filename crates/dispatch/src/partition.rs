//! Ratio-based audience partitioning across campaign email variants.
//!
//! Each variant takes `ceil(N * ratio / 100)` members starting where the
//! previous variant's *intended* share ended. Ceiling rounding favours earlier
//! variants, and once the cursor passes `N` every later bucket is empty. The
//! resulting distribution is relied on downstream and must stay exactly as is.

/// Split `audience` into one contiguous bucket per ratio, in ratio order.
///
/// Ratios are percentages expected to sum to 100; they are not re-validated.
pub fn partition<'a, T>(audience: &'a [T], ratios: &[u32]) -> Vec<&'a [T]> {
    let n = audience.len();
    let mut pos = 0usize;

    ratios
        .iter()
        .map(|&ratio| {
            let count = bucket_count(n, ratio);
            let start = pos.min(n);
            let end = n.min(pos.saturating_add(count));
            pos = pos.saturating_add(count);
            &audience[start..end]
        })
        .collect()
}

/// Intended member count for one variant.
pub fn bucket_count(audience_len: usize, ratio: u32) -> usize {
    (audience_len as f64 * f64::from(ratio) / 100.0).ceil() as usize
}
