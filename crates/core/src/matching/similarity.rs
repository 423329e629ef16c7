use crate::matching::normalize::normalize_address;

/// Indel ratio between two strings, scaled to `0..=100`.
///
/// Computed as `2 * lcs / (len_a + len_b)` over chars, where `lcs` is the longest common
/// subsequence. This is the `fuzz.ratio` score. `100` means identical, `0` means nothing in
/// common. Symmetric, and two empty strings score `100`.
pub fn similarity(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }

    let ratio = (2 * longest_common_subsequence(&a, &b)) as f64 / total as f64;
    (ratio.clamp(0.0, 1.0) * 100.0).round() as u8
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut previous = vec![0usize; inner.len() + 1];
    let mut current = vec![0usize; inner.len() + 1];

    for left in outer {
        for (index, right) in inner.iter().enumerate() {
            current[index + 1] = if left == right {
                previous[index] + 1
            } else {
                current[index].max(previous[index + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[inner.len()]
}

/// [`similarity`] of two raw addresses after normalising both.
pub fn address_similarity(a: &str, b: &str) -> u8 {
    similarity(&normalize_address(a), &normalize_address(b))
}
