//! Linear-regression baseline.
//!
//! Ordinary least squares with an intercept. The normal equations
//! (XᵀX)β = Xᵀy are solved by Gaussian elimination with partial pivoting;
//! a 1e-8 ridge on the diagonal keeps collinear indicator columns solvable.

use crate::domain::error::ForecastError;
use ndarray::{Array1, Array2, ArrayView2};

const RIDGE: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearRegression {
    pub fn fit(x: ArrayView2<f64>, y: &[f64]) -> Result<Self, ForecastError> {
        let (rows, features) = x.dim();
        if rows == 0 {
            return Err(ForecastError::InsufficientData {
                stage: "linear regression".into(),
                rows: 0,
                minimum: 1,
            });
        }
        if y.len() != rows {
            return Err(ForecastError::LengthMismatch {
                what: "regression targets".into(),
                expected: rows,
                actual: y.len(),
            });
        }

        // Design matrix with a leading column of ones.
        let p = features + 1;
        let mut design = Array2::ones((rows, p));
        design.slice_mut(ndarray::s![.., 1..]).assign(&x);

        let mut xtx = design.t().dot(&design);
        for i in 1..p {
            xtx[[i, i]] += RIDGE;
        }
        let xty = design.t().dot(&Array1::from(y.to_vec()));

        let beta = solve(xtx, xty)?;
        Ok(Self {
            intercept: beta[0],
            coefficients: beta.slice(ndarray::s![1..]).to_owned(),
        })
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<f64>, ForecastError> {
        if x.ncols() != self.coefficients.len() {
            return Err(ForecastError::LengthMismatch {
                what: "regression features".into(),
                expected: self.coefficients.len(),
                actual: x.ncols(),
            });
        }
        Ok((x.dot(&self.coefficients) + self.intercept).to_vec())
    }
}

/// Solves `a · x = b` in place; `a` must be square.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>, ForecastError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(ForecastError::Model {
                reason: format!("singular normal equations at column {}", col),
            });
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}
