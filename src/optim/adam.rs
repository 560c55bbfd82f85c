//! Adam optimizer
//!
//! Maintains exponential moving averages of the gradient (`m`) and squared
//! gradient (`v`) per parameter, with bias-corrected step sizing:
//!
//! θ_t = θ_{t-1} - lr_t * m_t / (√v_t + ε)
//!
//! where lr_t folds both bias corrections into the learning rate.

use ndarray::Array1;

use super::Optimizer;
use crate::tensor::Tensor;

pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>, // First moment
    v: Vec<Option<Array1<f32>>>, // Second moment
}

impl Adam {
    /// Create a new Adam optimizer.
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Create Adam with the conventional defaults (β1=0.9, β2=0.999, ε=1e-8).
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    /// Number of steps taken so far.
    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// Initialize moment slots if needed.
    fn ensure_moments(&mut self, params: &[Tensor]) {
        if self.m.is_empty() {
            self.m = params.iter().map(|_| None).collect();
            self.v = params.iter().map(|_| None).collect();
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [Tensor]) {
        self.ensure_moments(params);
        self.t += 1;

        // Bias correction factors folded into the step size.
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        for (i, param) in params.iter_mut().enumerate() {
            if let Some(grad) = param.grad() {
                // m_t = β1 * m_{t-1} + (1 - β1) * g
                let m_t = if let Some(m) = &self.m[i] {
                    m * self.beta1 + &grad * (1.0 - self.beta1)
                } else {
                    &grad * (1.0 - self.beta1)
                };

                // v_t = β2 * v_{t-1} + (1 - β2) * g²
                let grad_sq = &grad * &grad;
                let v_t = if let Some(v) = &self.v[i] {
                    v * self.beta2 + &grad_sq * (1.0 - self.beta2)
                } else {
                    &grad_sq * (1.0 - self.beta2)
                };

                let update = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;
                *param.data_mut() -= &update;

                self.m[i] = Some(m_t);
                self.v[i] = Some(v_t);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn test_first_step_matches_closed_form() {
        // For a single scalar with gradient 1.0 at t = 1:
        //   m̂ = 1, v̂ = 1, update = lr / (1 + ε) ≈ lr
        let mut params = vec![Tensor::from_vec(vec![0.0], true)];
        let mut optimizer = Adam::default_params(0.001);

        params[0].set_grad(arr1(&[1.0]));
        optimizer.step(&mut params);

        assert_eq!(optimizer.step_count(), 1);
        assert_abs_diff_eq!(params[0].data()[0], -0.001, epsilon = 1e-7);
    }

    #[test]
    fn test_moments_start_at_zero() {
        let optimizer = Adam::default_params(0.001);
        assert_eq!(optimizer.step_count(), 0);
        assert!(optimizer.m.is_empty());
        assert!(optimizer.v.is_empty());
    }

    #[test]
    fn test_step_changes_parameters() {
        let mut params = vec![Tensor::from_vec(vec![1.0, -2.0, 3.0], true)];
        let mut optimizer = Adam::default_params(0.01);

        let before = params[0].data().to_vec();
        params[0].set_grad(arr1(&[0.5, -0.5, 1.0]));
        optimizer.step(&mut params);

        let after = params[0].data().to_vec();
        assert!(before.iter().zip(&after).any(|(b, a)| b != a));
    }

    #[test]
    fn test_update_is_descent() {
        let mut params = vec![Tensor::from_vec(vec![5.0], true)];
        let mut optimizer = Adam::default_params(0.1);

        for _ in 0..5 {
            params[0].set_grad(arr1(&[1.0]));
            optimizer.step(&mut params);
        }
        // Positive gradient must push the parameter down.
        assert!(params[0].data()[0] < 5.0);
    }

    #[test]
    fn test_quadratic_convergence() {
        // f(x) = x², gradient 2x.
        let mut params = vec![Tensor::from_vec(vec![5.0, -3.0, 2.0], true)];
        let mut optimizer = Adam::default_params(0.1);

        for _ in 0..100 {
            let grad = params[0].data().mapv(|x| 2.0 * x);
            params[0].set_grad(grad);
            optimizer.step(&mut params);
        }

        for &val in params[0].data().iter() {
            assert!(val.abs() < 0.5, "value {val} did not converge");
        }
    }

    #[test]
    fn test_no_grad_leaves_params_unchanged() {
        let mut params = vec![Tensor::from_vec(vec![1.0, 2.0], true)];
        let mut optimizer = Adam::default_params(0.1);

        let before = params[0].data().to_vec();
        optimizer.step(&mut params);
        assert_eq!(params[0].data().to_vec(), before);
    }

    #[test]
    fn test_multiple_params() {
        let mut params = vec![
            Tensor::from_vec(vec![1.0, 2.0], true),
            Tensor::from_vec(vec![3.0, 4.0], true),
        ];
        let mut optimizer = Adam::default_params(0.1);

        params[0].set_grad(arr1(&[0.1, 0.2]));
        params[1].set_grad(arr1(&[0.3, 0.4]));
        optimizer.step(&mut params);

        assert!(params[0].data()[0] < 1.0);
        assert!(params[1].data()[0] < 3.0);
    }
}
