use std::fmt;
use std::hint::black_box;
use std::ops::Range;

use rand::Rng;

use crate::{fibonacci, matrix, prime, sort};

/// The closed set of compute-bound algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    PrimeCount,
    MatrixMultiply,
    Fibonacci,
    Sort,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 4] = [
        WorkloadKind::PrimeCount,
        WorkloadKind::MatrixMultiply,
        WorkloadKind::Fibonacci,
        WorkloadKind::Sort,
    ];

    /// Half-open range the random size parameter is drawn from.
    pub fn size_range(self) -> Range<usize> {
        match self {
            WorkloadKind::PrimeCount => 1_000..10_000,
            WorkloadKind::MatrixMultiply => 50..150,
            WorkloadKind::Fibonacci => 35..45,
            WorkloadKind::Sort => 10_000..50_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadKind::PrimeCount => "prime_count",
            WorkloadKind::MatrixMultiply => "matrix_multiply",
            WorkloadKind::Fibonacci => "fibonacci",
            WorkloadKind::Sort => "sort",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete invocation: an algorithm plus its size parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Workload {
    pub kind: WorkloadKind,
    pub size: usize,
}

impl Workload {
    pub fn new(kind: WorkloadKind, size: usize) -> Self {
        Self { kind, size }
    }

    /// Uniform choice of kind, then a uniform size from that kind's range.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let kind = WorkloadKind::ALL[rng.gen_range(0..WorkloadKind::ALL.len())];
        let size = rng.gen_range(kind.size_range());
        Self { kind, size }
    }

    /// Runs the workload to completion and returns its checksum.
    ///
    /// `rng` seeds the random inputs of the matrix and sort workloads.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let out = match self.kind {
            WorkloadKind::PrimeCount => prime::count_primes(self.size) as u64,
            WorkloadKind::MatrixMultiply => {
                let a = matrix::Matrix::random(self.size, rng);
                let b = matrix::Matrix::random(self.size, rng);
                a.multiply(&b).trace().to_bits()
            }
            WorkloadKind::Fibonacci => fibonacci::fibonacci(self.size as u32),
            WorkloadKind::Sort => {
                let data = sort::random_array(self.size, rng);
                sort::combined_sort(&data)
            }
        };
        black_box(out)
    }
}
