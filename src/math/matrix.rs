use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

/// Dense row-major matrix of `f64`.
///
/// Rows are pixels and columns are features everywhere this type is used by
/// the reference model, so a batch of `n × h × w` pixels becomes one matrix
/// with `n·h·w` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Wraps an existing row-major buffer. Returns `None` if the length does
    /// not match `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Option<Matrix> {
        if data.len() != rows * cols {
            return None;
        }
        Some(Matrix { rows, cols, data })
    }

    /// He initialization: samples from N(0, sqrt(2 / fan_in)).
    ///
    /// `rows` is the fan-in here because weights are stored `input × output`.
    pub fn he<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let std_dev = (2.0 / rows.max(1) as f64).sqrt();
        let data = (0..rows * cols)
            .map(|_| sample_standard_normal(rng) * std_dev)
            .collect();
        Matrix { rows, cols, data }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let cols = self.cols;
        &mut self.data[row * cols..(row + 1) * cols]
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// `self · rhs`. Panics on incompatible shapes; callers build both sides.
    pub fn matmul(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.cols, rhs.rows, "matmul shape mismatch");
        let mut res = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            let out = &mut res.data[i * rhs.cols..(i + 1) * rhs.cols];
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                let rhs_row = &rhs.data[k * rhs.cols..(k + 1) * rhs.cols];
                for (o, &b) in out.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
        }
        res
    }

    /// Adds a `1 × cols` row vector to every row.
    pub fn add_row(&self, bias: &Matrix) -> Matrix {
        assert_eq!(bias.rows, 1);
        assert_eq!(bias.cols, self.cols);
        let mut res = self.clone();
        for r in 0..res.rows {
            for (x, &b) in res.row_mut(r).iter_mut().zip(&bias.data) {
                *x += b;
            }
        }
        res
    }

    /// Sums over rows, producing a `1 × cols` matrix.
    pub fn sum_rows(&self) -> Matrix {
        let mut res = Matrix::zeros(1, self.cols);
        for r in 0..self.rows {
            for (acc, &x) in res.data.iter_mut().zip(self.row(r)) {
                *acc += x;
            }
        }
        res
    }

    /// Element-wise (Hadamard) product of two same-shape matrices.
    pub fn hadamard(&self, other: &Matrix) -> Matrix {
        assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a * b).collect(),
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

/// Samples a single value from N(0, 1) using the Box-Muller transform.
fn sample_standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // Uniform samples in (0, 1] to avoid log(0).
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
