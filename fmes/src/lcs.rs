//! Longest common subsequence over two sequences with a caller-supplied
//! equality.

/// Index pairs `(i, j)` of a longest common subsequence of `a` and `b`,
/// increasing in both components.
///
/// When several subsequences are equally long, reconstruction takes a match
/// as soon as one is available and otherwise skips ahead in `a` first, which
/// keeps the earliest usable elements of `b`. The result is deterministic.
pub fn lcs<A, B>(a: &[A], b: &[B], mut eq: impl FnMut(&A, &B) -> bool) -> Vec<(usize, usize)> {
    let (m, n) = (a.len(), b.len());
    if m == 0 || n == 0 {
        return Vec::new();
    }

    // table[i * width + j] = LCS length of a[i..] and b[j..]
    let width = n + 1;
    let mut table = vec![0u32; (m + 1) * width];
    let mut same = vec![false; m * n];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            table[i * width + j] = if eq(&a[i], &b[j]) {
                same[i * n + j] = true;
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(table[0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < m && j < n {
        if same[i * n + j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_empty_inputs() {
        assert!(lcs::<char, char>(&[], &chars("abc"), |a, b| a == b).is_empty());
        assert!(lcs::<char, char>(&chars("abc"), &[], |a, b| a == b).is_empty());
    }

    #[test]
    fn test_identical() {
        let a = chars("abcd");
        assert_eq!(
            lcs(&a, &a, |x, y| x == y),
            vec![(0, 0), (1, 1), (2, 2), (3, 3)]
        );
    }

    #[test]
    fn test_classic() {
        let a = chars("ABCBDAB");
        let b = chars("BDCABA");
        let pairs = lcs(&a, &b, |x, y| x == y);
        assert_eq!(pairs.len(), 4);
        for w in pairs.windows(2) {
            assert!(w[0].0 < w[1].0 && w[0].1 < w[1].1);
        }
        for &(i, j) in &pairs {
            assert_eq!(a[i], b[j]);
        }
    }

    #[test]
    fn test_swap_prefers_earliest() {
        // [b, c] vs [c, b]: either element alone is an LCS; the one that
        // keeps the first element of the second sequence wins
        let pairs = lcs(&chars("bc"), &chars("cb"), |x, y| x == y);
        assert_eq!(pairs, vec![(1, 0)]);
    }

    #[test]
    fn test_custom_equality_across_types() {
        let a = [1u32, 2, 3, 4];
        let b = ["4", "2", "3"];
        let pairs = lcs(&a, &b, |x, y| x.to_string() == *y);
        assert_eq!(pairs, vec![(1, 1), (2, 2)]);
    }
}
