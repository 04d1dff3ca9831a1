// LogisticRegression - L2-regularised logistic regression
//
// Minimises sum(log loss) + ||w||^2 / (2C) with the intercept unpenalised,
// using damped Newton steps. The Hessian is small (features + 1 square) for
// the data sets this runs on, so each step is a dense Cholesky solve.

use super::{check_training_set, check_width, sigmoid, Classifier};
use crate::error::ModelError;

/// Regularisation and solver settings
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticParams {
    /// Inverse regularisation strength
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the largest gradient component is below this
    pub tol: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

struct Coefficients {
    weights: Vec<f64>,
    intercept: f64,
}

impl Coefficients {
    fn decision(&self, row: &[f64]) -> f64 {
        self.intercept + dot(&self.weights, row)
    }
}

pub struct LogisticRegression {
    params: LogisticParams,
    fitted: Option<Coefficients>,
}

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// Fitted weights, intercept last
    pub fn coefficients(&self) -> Option<Vec<f64>> {
        self.fitted.as_ref().map(|c| {
            let mut all = c.weights.clone();
            all.push(c.intercept);
            all
        })
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticParams::default())
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Parameter vector `theta` holds the weights followed by the intercept
fn objective(theta: &[f64], x: &[Vec<f64>], y: &[usize], alpha: f64) -> f64 {
    let p = theta.len() - 1;
    let mut loss = 0.0;
    for (row, &label) in x.iter().zip(y) {
        let z = theta[p] + dot(&theta[..p], row);
        // log(1 + e^z) - y z, computed without overflow
        let softplus = if z > 0.0 {
            z + (-z).exp().ln_1p()
        } else {
            z.exp().ln_1p()
        };
        loss += softplus - label as f64 * z;
    }
    loss + 0.5 * alpha * dot(&theta[..p], &theta[..p])
}

/// Solve `a x = b` for symmetric positive definite `a` (row-major, n x n)
fn cholesky_solve(mut a: Vec<f64>, b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    for j in 0..n {
        let mut diag = a[j * n + j];
        for k in 0..j {
            diag -= a[j * n + k] * a[j * n + k];
        }
        if diag <= 0.0 || !diag.is_finite() {
            return None;
        }
        let diag = diag.sqrt();
        a[j * n + j] = diag;
        for i in (j + 1)..n {
            let mut value = a[i * n + j];
            for k in 0..j {
                value -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = value / diag;
        }
    }

    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut value = b[i];
        for k in 0..i {
            value -= a[i * n + k] * z[k];
        }
        z[i] = value / a[i * n + i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut value = z[i];
        for k in (i + 1)..n {
            value -= a[k * n + i] * x[k];
        }
        x[i] = value / a[i * n + i];
    }
    Some(x)
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "LogisticRegression"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[usize]) -> Result<(), ModelError> {
        let p = check_training_set(x, y)?;
        let dim = p + 1;
        let alpha = 1.0 / self.params.c;
        let mut theta = vec![0.0; dim];
        let mut current = objective(&theta, x, y, alpha);

        for iteration in 0..self.params.max_iter {
            let mut grad = vec![0.0; dim];
            let mut hess = vec![0.0; dim * dim];
            for (row, &label) in x.iter().zip(y) {
                let z = theta[p] + dot(&theta[..p], row);
                let prob = sigmoid(z);
                let residual = prob - label as f64;
                let w = (prob * (1.0 - prob)).max(1e-12);

                for i in 0..p {
                    grad[i] += residual * row[i];
                }
                grad[p] += residual;

                for i in 0..dim {
                    let xi = if i < p { row[i] } else { 1.0 };
                    for j in 0..=i {
                        let xj = if j < p { row[j] } else { 1.0 };
                        hess[i * dim + j] += w * xi * xj;
                    }
                }
            }
            for i in 0..p {
                grad[i] += alpha * theta[i];
                hess[i * dim + i] += alpha;
            }
            hess[p * dim + p] += 1e-10;
            for i in 0..dim {
                for j in 0..i {
                    hess[j * dim + i] = hess[i * dim + j];
                }
            }

            let grad_norm = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if grad_norm < self.params.tol {
                log::debug!(
                    "[LogisticRegression] Converged after {} iterations",
                    iteration
                );
                break;
            }

            // Newton direction, or steepest descent if the solve fails
            let direction = match cholesky_solve(hess, &grad) {
                Some(step) => step,
                None => grad.clone(),
            };

            let slope = dot(&grad, &direction);
            let mut step = 1.0;
            let mut improved = false;
            while step >= 1e-10 {
                let candidate: Vec<f64> = theta
                    .iter()
                    .zip(&direction)
                    .map(|(t, d)| t - step * d)
                    .collect();
                let value = objective(&candidate, x, y, alpha);
                if value <= current - 1e-4 * step * slope {
                    theta = candidate;
                    current = value;
                    improved = true;
                    break;
                }
                step *= 0.5;
            }
            if !improved {
                break;
            }
        }

        let intercept = theta[p];
        theta.truncate(p);
        self.fitted = Some(Coefficients {
            weights: theta,
            intercept,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let coefficients = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        check_width(x, coefficients.weights.len())?;
        Ok(x.iter().map(|row| sigmoid(coefficients.decision(row))).collect())
    }

    fn fresh(&self) -> Box<dyn Classifier> {
        Box::new(Self::new(self.params.clone()))
    }
}
