use rand::Rng;

/// Dense square matrix stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Entries drawn uniformly from `[0, 1)`.
    pub fn random<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let data = (0..n * n).map(|_| rng.r#gen::<f64>()).collect();
        Self { n, data }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    /// Full triple-loop product, no blocking or transposition tricks.
    ///
    /// Both operands must share the same size.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.n, other.n, "matrix sizes differ");
        let n = self.n;
        let mut out = Matrix::zeros(n);

        for i in 0..n {
            for j in 0..n {
                let mut acc = 0.0;
                for k in 0..n {
                    acc += self.data[i * n + k] * other.data[k * n + j];
                }
                out.data[i * n + j] = acc;
            }
        }
        out
    }

    pub fn trace(&self) -> f64 {
        (0..self.n).map(|i| self.get(i, i)).sum()
    }
}
