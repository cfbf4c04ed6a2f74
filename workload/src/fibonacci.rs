/// Naive exponential recursion. The cost is the point.
pub fn fibonacci(n: u32) -> u64 {
    if n <= 1 {
        return n as u64;
    }
    fibonacci(n - 1) + fibonacci(n - 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_cases() {
        assert_eq!(fibonacci(0), 0);
        assert_eq!(fibonacci(1), 1);
        assert_eq!(fibonacci(2), 1);
    }

    #[test]
    fn matches_iterative_sequence() {
        let (mut a, mut b) = (0u64, 1u64);
        for n in 0..25 {
            assert_eq!(fibonacci(n), a, "n = {n}");
            (a, b) = (b, a + b);
        }
    }
}
