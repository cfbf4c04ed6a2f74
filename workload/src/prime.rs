/// Trial-division primality test.
pub fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

/// Counts primes in `2..=limit` by testing every candidate independently.
pub fn count_primes(limit: usize) -> usize {
    (2..=limit).filter(|&n| is_prime(n)).count()
}
