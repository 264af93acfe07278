//! Linear models: least squares, ridge and one-vs-rest logistic regression

use super::{check_class_labels, check_shapes, Estimator};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Retries once with a small ridge on the diagonal if A is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    cholesky_solve_inner(a, b).or_else(|| {
        let n = a.nrows();
        let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
        let mut a_reg = a.clone();
        for k in 0..n {
            a_reg[[k, k]] += ridge.max(1e-12);
        }
        cholesky_solve_inner(&a_reg, b)
    })
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // A = L * L^T
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Ordinary least squares, optionally with an L2 penalty (ridge)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: f64,
    pub fit_intercept: bool,
    /// Regularization strength (L2); zero for plain least squares
    pub alpha: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha: 0.0,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

impl Estimator for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let n_features = x.ncols();

        let (x_centered, y_centered, x_mean, y_mean) = if self.fit_intercept {
            let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
            let y_mean = y.mean().unwrap_or(0.0);
            (x - &x_mean.view().insert_axis(Axis(0)), y - y_mean, x_mean, y_mean)
        } else {
            (x.clone(), y.clone(), Array1::zeros(n_features), 0.0)
        };

        // (X^T X + alpha*I) w = X^T y
        let mut xtx = x_centered.t().dot(&x_centered);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_centered.t().dot(&y_centered);
        let coefficients = cholesky_solve(&xtx, &xty).ok_or_else(|| {
            PipelineError::Fit("normal equations are singular; try Ridge with alpha > 0".to_string())
        })?;

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        Ok(x.dot(coefficients) + self.intercept)
    }
}

/// Binary logistic model trained by gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryLogistic {
    weights: Array1<f64>,
    bias: f64,
}

impl BinaryLogistic {
    fn probability(&self, x: &Array2<f64>) -> Array1<f64> {
        sigmoid(&(x.dot(&self.weights) + self.bias))
    }
}

fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// Logistic regression; multiclass targets use one-vs-rest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// L2 penalty
    pub alpha: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Gradient norm at which descent stops
    pub tol: f64,
    classes: Vec<f64>,
    /// One model per class; a single model for two classes
    models: Vec<BinaryLogistic>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            alpha: 0.0,
            max_iter: 1000,
            learning_rate: 0.1,
            tol: 1e-6,
            classes: Vec::new(),
            models: Vec::new(),
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>) -> BinaryLogistic {
        let n_samples = x.nrows() as f64;
        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;

        for _ in 0..self.max_iter {
            let predictions = sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - y;
            let dw = x.t().dot(&errors) / n_samples + self.alpha * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }
            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }

        BinaryLogistic { weights, bias }
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        check_class_labels(y)?;
        self.classes = distinct_classes(y);

        let one_vs: Vec<f64> = match self.classes.len() {
            0 | 1 => Vec::new(),
            2 => vec![self.classes[1]],
            _ => self.classes.clone(),
        };
        self.models = one_vs
            .iter()
            .map(|&class| {
                let target = y.mapv(|v| if v == class { 1.0 } else { 0.0 });
                self.fit_binary(x, &target)
            })
            .collect();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match (self.classes.as_slice(), self.models.as_slice()) {
            ([], _) => Err(PipelineError::ModelNotFitted),
            ([only], _) => Ok(Array1::from_elem(x.nrows(), *only)),
            ([negative, positive], [model]) => Ok(model
                .probability(x)
                .mapv(|p| if p >= 0.5 { *positive } else { *negative })),
            (classes, models) => {
                let probabilities: Vec<Array1<f64>> = models.iter().map(|m| m.probability(x)).collect();
                Ok(Array1::from_shape_fn(x.nrows(), |row| {
                    let mut best = 0;
                    for k in 1..classes.len() {
                        if probabilities[k][row] > probabilities[best][row] {
                            best = k;
                        }
                    }
                    classes[best]
                }))
            }
        }
    }
}

/// Sorted distinct class codes
pub(crate) fn distinct_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        assert!((model.coefficients.as_ref().unwrap()[0] - 2.0).abs() < 1e-8);
        assert!((model.intercept - 1.0).abs() < 1e-8);
        let pred = model.predict(&array![[5.0]]).unwrap();
        assert!((pred[0] - 11.0).abs() < 1e-8);
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut ols = LinearRegression::new();
        let mut ridge = LinearRegression::new().with_alpha(10.0);
        ols.fit(&x, &y).unwrap();
        ridge.fit(&x, &y).unwrap();
        assert!(ridge.coefficients.unwrap()[0] < ols.coefficients.unwrap()[0]);
    }

    #[test]
    fn test_predict_before_fit() {
        let err = LinearRegression::new().predict(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotFitted));
    }

    #[test]
    fn test_logistic_binary() {
        let x = array![[-2.0], [-1.5], [-1.0], [1.0], [1.5], [2.0]];
        let y = array![3.0, 3.0, 3.0, 7.0, 7.0, 7.0];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_logistic_one_vs_rest() {
        let x = array![[0.0, 0.0], [0.1, 0.0], [5.0, 0.0], [5.1, 0.0], [0.0, 5.0], [0.0, 5.1]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let mut model = LogisticRegression::new().with_max_iter(3000);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.classes(), &[0.0, 1.0, 2.0]);
        assert_eq!(model.predict(&x).unwrap(), y);
    }
}
