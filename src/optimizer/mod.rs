pub mod gradient_clipper;

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};
use serde::{Deserialize, Serialize};

pub use gradient_clipper::GradientClipper;

/// Parameter update rule.
///
/// Every trainable tensor of a network is addressed by a stable `slot`
/// index so stateful optimizers can keep one set of moments per tensor.
/// `step_done` is called once after all slots of an update were visited.
pub trait Optimizer {
    fn update(&mut self, slot: usize, param: ArrayViewMutD<f32>, gradient: ArrayViewD<f32>, learning_rate: f32);

    fn step_done(&mut self) {}
}

/// Serializable choice of optimizer, as found in configuration files.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum OptimizerConfig {
    SGD,
    Adam { beta1: f32, beta2: f32, epsilon: f32 },
    RMSProp { beta: f32, epsilon: f32 },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam { beta1: 0.9, beta2: 0.999, epsilon: 1e-8 }
    }
}

impl OptimizerConfig {
    pub fn build(&self) -> OptimizerWrapper {
        match *self {
            OptimizerConfig::SGD => OptimizerWrapper::SGD(SGD::new()),
            OptimizerConfig::Adam { beta1, beta2, epsilon } => OptimizerWrapper::Adam(Adam::new(beta1, beta2, epsilon)),
            OptimizerConfig::RMSProp { beta, epsilon } => OptimizerWrapper::RMSProp(RMSProp::new(beta, epsilon)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
    RMSProp(RMSProp),
}

impl Optimizer for OptimizerWrapper {
    fn update(&mut self, slot: usize, param: ArrayViewMutD<f32>, gradient: ArrayViewD<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update(slot, param, gradient, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update(slot, param, gradient, learning_rate),
            OptimizerWrapper::RMSProp(optimizer) => optimizer.update(slot, param, gradient, learning_rate),
        }
    }

    fn step_done(&mut self) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.step_done(),
            OptimizerWrapper::Adam(optimizer) => optimizer.step_done(),
            OptimizerWrapper::RMSProp(optimizer) => optimizer.step_done(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Optimizer for SGD {
    fn update(&mut self, _slot: usize, mut param: ArrayViewMutD<f32>, gradient: ArrayViewD<f32>, learning_rate: f32) {
        param.zip_mut_with(&gradient, |w, &g| *w -= learning_rate * g);
    }
}

/// Returns the state array for `slot`, allocating zeros shaped like
/// `like` on first use or after a shape change.
fn slot_state<'a>(states: &'a mut Vec<Option<ArrayD<f32>>>, slot: usize, like: &ArrayViewD<f32>) -> &'a mut ArrayD<f32> {
    if states.len() <= slot {
        states.resize(slot + 1, None);
    }
    let entry = &mut states[slot];
    if entry.as_ref().map_or(false, |s| s.shape() != like.shape()) {
        *entry = None;
    }
    entry.get_or_insert_with(|| ArrayD::zeros(like.raw_dim()))
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m: Vec<Option<ArrayD<f32>>>,
    v: Vec<Option<ArrayD<f32>>>,
    pub t: usize,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam { beta1, beta2, epsilon, m: Vec::new(), v: Vec::new(), t: 1 }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn update(&mut self, slot: usize, param: ArrayViewMutD<f32>, gradient: ArrayViewD<f32>, learning_rate: f32) {
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let bias1 = 1.0 - beta1.powi(self.t as i32);
        let bias2 = 1.0 - beta2.powi(self.t as i32);

        let m = slot_state(&mut self.m, slot, &gradient);
        Zip::from(&mut *m).and(&gradient).for_each(|m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        let v = slot_state(&mut self.v, slot, &gradient);
        Zip::from(&mut *v).and(&gradient).for_each(|v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        // Both moments exist now; borrow them together for the update.
        if let (Some(Some(m)), Some(Some(v))) = (self.m.get(slot), self.v.get(slot)) {
            Zip::from(param).and(m).and(v).for_each(|w, &m, &v| {
                let m_hat = m / bias1;
                let v_hat = v / bias2;
                *w -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
            });
        }
    }

    fn step_done(&mut self) {
        self.t += 1;
    }
}

/// RMSProp optimizer
#[derive(Serialize, Deserialize, Clone)]
pub struct RMSProp {
    pub beta: f32,
    pub epsilon: f32,
    v: Vec<Option<ArrayD<f32>>>,
}

impl RMSProp {
    pub fn new(beta: f32, epsilon: f32) -> Self {
        RMSProp { beta, epsilon, v: Vec::new() }
    }
}

impl Default for RMSProp {
    fn default() -> Self {
        Self::new(0.9, 1e-8)
    }
}

impl Optimizer for RMSProp {
    fn update(&mut self, slot: usize, param: ArrayViewMutD<f32>, gradient: ArrayViewD<f32>, learning_rate: f32) {
        let (beta, epsilon) = (self.beta, self.epsilon);
        let v = slot_state(&mut self.v, slot, &gradient);
        Zip::from(param).and(&mut *v).and(&gradient).for_each(|w, v, &g| {
            *v = beta * *v + (1.0 - beta) * g * g;
            *w -= learning_rate * g / (v.sqrt() + epsilon);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn};

    fn param() -> ArrayD<f32> {
        array![1.0f32, -2.0, 0.5].into_dyn()
    }

    #[test]
    fn sgd_steps_against_gradient() {
        let mut w = param();
        let g = array![1.0f32, -1.0, 0.0].into_dyn();
        SGD::new().update(0, w.view_mut(), g.view(), 0.1);
        assert_eq!(w, array![0.9f32, -1.9, 0.5].into_dyn());
    }

    #[test]
    fn adam_first_step_moves_by_learning_rate() {
        let mut adam = Adam::default();
        let mut w = param();
        let g = array![2.0f32, -0.5, 0.0].into_dyn();
        adam.update(0, w.view_mut(), g.view(), 0.01);
        adam.step_done();
        // Bias-corrected first step is lr * sign(g).
        assert!((w[[0]] - 0.99).abs() < 1e-5);
        assert!((w[[1]] - -1.99).abs() < 1e-5);
        assert_eq!(w[[2]], 0.5);
        assert_eq!(adam.t, 2);
    }

    #[test]
    fn slots_keep_independent_state() {
        let mut rms = RMSProp::default();
        let mut a = ArrayD::<f32>::zeros(IxDyn(&[2]));
        let mut b = ArrayD::<f32>::zeros(IxDyn(&[2, 2]));
        rms.update(0, a.view_mut(), ArrayD::ones(IxDyn(&[2])).view(), 0.1);
        rms.update(3, b.view_mut(), ArrayD::ones(IxDyn(&[2, 2])).view(), 0.1);
        assert!(a.iter().all(|&x| x < 0.0));
        assert!(b.iter().all(|&x| x < 0.0));
    }

    #[test]
    fn config_builds_matching_wrapper() {
        let wrapper = OptimizerConfig::RMSProp { beta: 0.95, epsilon: 1e-6 }.build();
        assert!(matches!(wrapper, OptimizerWrapper::RMSProp(ref r) if r.beta == 0.95));
    }
}
