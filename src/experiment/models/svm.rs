// Svm - RBF-kernel support vector classifier
//
// The dual is solved with SMO using second-order working-set selection; the
// full kernel matrix is precomputed. Probabilities come from a Platt sigmoid
// fitted to the training decision values. Hard predictions use the sign of
// the decision function, so they can disagree with `predict_proba > 0.5`
// near the boundary.

use super::{check_training_set, check_width, sigmoid, Classifier};
use crate::error::ModelError;

const TAU: f64 = 1e-12;

/// SVM hyper-parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SvmParams {
    /// Box constraint
    pub c: f64,
    /// Kernel width; `None` = 1 / (n_features * var(X))
    pub gamma: Option<f64>,
    /// KKT violation tolerance
    pub tol: f64,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: None,
            tol: 1e-3,
        }
    }
}

struct SupportVectors {
    vectors: Vec<Vec<f64>>,
    /// alpha_i * y_i
    coefficients: Vec<f64>,
    rho: f64,
    gamma: f64,
    platt_a: f64,
    platt_b: f64,
    n_features: usize,
}

impl SupportVectors {
    fn decision(&self, row: &[f64]) -> f64 {
        self.vectors
            .iter()
            .zip(&self.coefficients)
            .map(|(sv, coef)| coef * rbf(sv, row, self.gamma))
            .sum::<f64>()
            - self.rho
    }
}

pub struct Svm {
    params: SvmParams,
    fitted: Option<SupportVectors>,
}

impl Svm {
    pub fn new(params: SvmParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// Signed distance-like score; positive means class 1
    pub fn decision_function(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let model = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        check_width(x, model.n_features)?;
        Ok(x.iter().map(|row| model.decision(row)).collect())
    }

    pub fn support_vector_count(&self) -> usize {
        self.fitted.as_ref().map_or(0, |m| m.vectors.len())
    }
}

impl Default for Svm {
    fn default() -> Self {
        Self::new(SvmParams::default())
    }
}

fn rbf(a: &[f64], b: &[f64], gamma: f64) -> f64 {
    let distance: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * distance).exp()
}

/// 1 / (n_features * variance of every entry)
fn scale_gamma(x: &[Vec<f64>], n_features: usize) -> f64 {
    let count = (x.len() * n_features) as f64;
    let mean = x.iter().flatten().sum::<f64>() / count;
    let var = x.iter().flatten().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;
    if var > 0.0 {
        1.0 / (n_features as f64 * var)
    } else {
        1.0
    }
}

struct SmoSolution {
    alpha: Vec<f64>,
    rho: f64,
}

/// Solve the C-SVC dual for labels `y` in {-1, +1}
fn solve_smo(kernel: &[Vec<f64>], y: &[f64], c: f64, tol: f64) -> SmoSolution {
    let n = y.len();
    let mut alpha = vec![0.0; n];
    // Gradient of 1/2 a'Qa - e'a with Q_ij = y_i y_j K_ij
    let mut grad = vec![-1.0; n];
    let q = |i: usize, j: usize| y[i] * y[j] * kernel[i][j];
    let max_iter = (100 * n).max(10_000_000);

    for _ in 0..max_iter {
        // i: maximal violator among indices that can move up
        let mut g_max = f64::NEG_INFINITY;
        let mut i_sel = None;
        for t in 0..n {
            let can_move = if y[t] > 0.0 { alpha[t] < c } else { alpha[t] > 0.0 };
            if can_move && -y[t] * grad[t] >= g_max {
                g_max = -y[t] * grad[t];
                i_sel = Some(t);
            }
        }
        let Some(i) = i_sel else { break };

        // j: second-order choice among indices that can move down
        let mut g_max2 = f64::NEG_INFINITY;
        let mut j_sel = None;
        let mut obj_min = f64::INFINITY;
        for t in 0..n {
            let can_move = if y[t] > 0.0 { alpha[t] > 0.0 } else { alpha[t] < c };
            if !can_move {
                continue;
            }
            let yg = y[t] * grad[t];
            g_max2 = g_max2.max(yg);
            let grad_diff = g_max + yg;
            if grad_diff > 0.0 {
                let mut quad = kernel[i][i] + kernel[t][t] - 2.0 * kernel[i][t];
                if quad <= 0.0 {
                    quad = TAU;
                }
                let obj = -(grad_diff * grad_diff) / quad;
                if obj <= obj_min {
                    obj_min = obj;
                    j_sel = Some(t);
                }
            }
        }
        let Some(j) = j_sel else { break };
        if g_max + g_max2 < tol {
            break;
        }

        let (old_i, old_j) = (alpha[i], alpha[j]);
        if y[i] != y[j] {
            let mut quad = q(i, i) + q(j, j) + 2.0 * q(i, j);
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let mut quad = q(i, i) + q(j, j) - 2.0 * q(i, j);
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let (delta_i, delta_j) = (alpha[i] - old_i, alpha[j] - old_j);
        for (k, g) in grad.iter_mut().enumerate() {
            *g += q(i, k) * delta_i + q(j, k) * delta_j;
        }
    }

    SmoSolution {
        rho: compute_rho(&alpha, &grad, y, c),
        alpha,
    }
}

fn compute_rho(alpha: &[f64], grad: &[f64], y: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut free_count = 0usize;

    for t in 0..alpha.len() {
        let yg = y[t] * grad[t];
        if alpha[t] >= c {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if alpha[t] <= 0.0 {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free_count += 1;
            free_sum += yg;
        }
    }

    if free_count > 0 {
        free_sum / free_count as f64
    } else {
        (upper + lower) / 2.0
    }
}

/// Fit P(y = 1 | f) = 1 / (1 + exp(A f + B)) by Newton's method
fn fit_platt(decisions: &[f64], labels: &[usize]) -> (f64, f64) {
    let prior1 = labels.iter().filter(|&&l| l == 1).count() as f64;
    let prior0 = labels.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&l| if l == 1 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        decisions
            .iter()
            .zip(&targets)
            .map(|(&f, &t)| {
                let fapb = f * a + b;
                if fapb >= 0.0 {
                    t * fapb + (-fapb).exp().ln_1p()
                } else {
                    (t - 1.0) * fapb + fapb.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..100 {
        let (mut h11, mut h22, mut h21, mut g1, mut g2) = (1e-12, 1e-12, 0.0, 0.0, 0.0);
        for (&f, &t) in decisions.iter().zip(&targets) {
            // p = P(y = 1 | f), q = 1 - p
            let p = sigmoid(-(f * a + b));
            let q = 1.0 - p;
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }
        if g1.abs() < 1e-5 && g2.abs() < 1e-5 {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= 1e-10 {
            let (new_a, new_b) = (a + step * da, b + step * db);
            let new_f = objective(new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }
        if step < 1e-10 {
            log::debug!("[SVM] Platt line search failed");
            break;
        }
    }

    (a, b)
}

impl Classifier for Svm {
    fn name(&self) -> &'static str {
        "SVM"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[usize]) -> Result<(), ModelError> {
        let n_features = check_training_set(x, y)?;
        let gamma = self.params.gamma.unwrap_or_else(|| scale_gamma(x, n_features));
        let signs: Vec<f64> = y.iter().map(|&l| if l == 1 { 1.0 } else { -1.0 }).collect();

        let kernel: Vec<Vec<f64>> = x
            .iter()
            .map(|a| x.iter().map(|b| rbf(a, b, gamma)).collect())
            .collect();
        let solution = solve_smo(&kernel, &signs, self.params.c, self.params.tol);

        let training_decisions: Vec<f64> = (0..x.len())
            .map(|i| {
                (0..x.len())
                    .map(|k| solution.alpha[k] * signs[k] * kernel[k][i])
                    .sum::<f64>()
                    - solution.rho
            })
            .collect();
        let (platt_a, platt_b) = fit_platt(&training_decisions, y);

        let mut vectors = Vec::new();
        let mut coefficients = Vec::new();
        for (i, &a) in solution.alpha.iter().enumerate() {
            if a > 0.0 {
                vectors.push(x[i].clone());
                coefficients.push(a * signs[i]);
            }
        }
        log::debug!(
            "[SVM] {} support vectors of {}, gamma {:.5}",
            vectors.len(),
            x.len(),
            gamma
        );

        self.fitted = Some(SupportVectors {
            vectors,
            coefficients,
            rho: solution.rho,
            gamma,
            platt_a,
            platt_b,
            n_features,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let model = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        check_width(x, model.n_features)?;
        Ok(x.iter()
            .map(|row| sigmoid(-(model.decision(row) * model.platt_a + model.platt_b)))
            .collect())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<usize>, ModelError> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|d| (d > 0.0) as usize)
            .collect())
    }

    fn fresh(&self) -> Box<dyn Classifier> {
        Box::new(Self::new(self.params.clone()))
    }
}
