//! The approximator behind search: a narrow [`Evaluator`] trait plus a small
//! hand-rolled feedforward network (trunk + policy head + value head). No
//! tensor library backs this -- the network is small enough that plain
//! `f64` arithmetic over `Vec`s is the natural fit.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// `evaluate(features) -> (prior logits over |A|, value in [-1, 1])`.
///
/// Implementations must be side-effect-free from the caller's perspective:
/// search threads only ever read through this trait. Parameter updates are
/// the training loop's job, never the evaluator's own.
pub trait Evaluator {
    fn evaluate(&self, features: &[f64]) -> (Vec<f64>, f64);
}

/// Returns flat logits (uniform after softmax) and a zero value. Useful for
/// exercising the search in isolation from any trained parameters.
pub struct UniformEvaluator {
    pub num_actions: usize,
}

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, _features: &[f64]) -> (Vec<f64>, f64) {
        (vec![0.0; self.num_actions], 0.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Linear {
    in_dim: usize,
    out_dim: usize,
    w: Vec<f64>,
    b: Vec<f64>,
}

impl Linear {
    fn new(in_dim: usize, out_dim: usize, rng: &mut StdRng) -> Linear {
        let std = (2.0 / in_dim as f64).sqrt();
        let normal = Normal::new(0.0, std).expect("valid stddev");
        let w = (0..in_dim * out_dim).map(|_| normal.sample(rng)).collect();
        Linear { in_dim, out_dim, w, b: vec![0.0; out_dim] }
    }

    fn forward(&self, x: &[f64]) -> Vec<f64> {
        let mut out = self.b.clone();
        for o in 0..self.out_dim {
            let row = o * self.in_dim;
            let mut sum = 0.0;
            for i in 0..self.in_dim {
                sum += self.w[row + i] * x[i];
            }
            out[o] += sum;
        }
        out
    }

    /// Returns `(grad_input, grad_w, grad_b)` for a single sample.
    fn backward(&self, x: &[f64], grad_out: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut grad_input = vec![0.0; self.in_dim];
        let mut grad_w = vec![0.0; self.in_dim * self.out_dim];
        for o in 0..self.out_dim {
            let go = grad_out[o];
            let row = o * self.in_dim;
            for i in 0..self.in_dim {
                grad_w[row + i] = go * x[i];
                grad_input[i] += go * self.w[row + i];
            }
        }
        (grad_input, grad_w, grad_out.to_vec())
    }
}

fn relu(v: &[f64]) -> Vec<f64> {
    v.iter().map(|&x| x.max(0.0)).collect()
}

fn relu_backward(pre: &[f64], grad_out: &[f64]) -> Vec<f64> {
    pre.iter().zip(grad_out).map(|(&p, &g)| if p > 0.0 { g } else { 0.0 }).collect()
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|&x| x / sum).collect()
}

/// Trunk (2 hidden layers, ReLU) feeding a policy head and a 2-layer value
/// head (ReLU then tanh).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlphaZeroNet {
    trunk1: Linear,
    trunk2: Linear,
    policy_head: Linear,
    value1: Linear,
    value2: Linear,
}

struct Activations {
    input: Vec<f64>,
    h1_pre: Vec<f64>,
    h1: Vec<f64>,
    h2_pre: Vec<f64>,
    h2: Vec<f64>,
    policy_logits: Vec<f64>,
    v1_pre: Vec<f64>,
    v1: Vec<f64>,
    v2_pre: f64,
}

impl AlphaZeroNet {
    pub fn new(input_dim: usize, hidden_dim: usize, num_actions: usize, seed: u64) -> AlphaZeroNet {
        let mut rng = StdRng::seed_from_u64(seed);
        AlphaZeroNet {
            trunk1: Linear::new(input_dim, hidden_dim, &mut rng),
            trunk2: Linear::new(hidden_dim, hidden_dim, &mut rng),
            policy_head: Linear::new(hidden_dim, num_actions, &mut rng),
            value1: Linear::new(hidden_dim, hidden_dim, &mut rng),
            value2: Linear::new(hidden_dim, 1, &mut rng),
        }
    }

    fn forward_full(&self, features: &[f64]) -> Activations {
        let h1_pre = self.trunk1.forward(features);
        let h1 = relu(&h1_pre);
        let h2_pre = self.trunk2.forward(&h1);
        let h2 = relu(&h2_pre);
        let policy_logits = self.policy_head.forward(&h2);
        let v1_pre = self.value1.forward(&h2);
        let v1 = relu(&v1_pre);
        let v2_pre = self.value2.forward(&v1)[0];
        Activations { input: features.to_vec(), h1_pre, h1, h2_pre, h2, policy_logits, v1_pre, v1, v2_pre }
    }
}

impl Evaluator for AlphaZeroNet {
    fn evaluate(&self, features: &[f64]) -> (Vec<f64>, f64) {
        let act = self.forward_full(features);
        (act.policy_logits, act.v2_pre.tanh())
    }
}

/// One training example: encoded features, the tempered search policy used
/// as the training target, and the eventual game outcome from the sample's
/// `to_play` perspective.
pub struct Sample {
    pub features: Vec<f64>,
    pub target_policy: Vec<f64>,
    pub target_value: f64,
}

#[derive(Default, Clone, Serialize, Deserialize)]
struct AdamState {
    m_w: Vec<f64>,
    v_w: Vec<f64>,
    m_b: Vec<f64>,
    v_b: Vec<f64>,
}

impl AdamState {
    fn zeroed(w_len: usize, b_len: usize) -> AdamState {
        AdamState { m_w: vec![0.0; w_len], v_w: vec![0.0; w_len], m_b: vec![0.0; b_len], v_b: vec![0.0; b_len] }
    }
}

/// Adam over the five layers of [`AlphaZeroNet`], with the usual
/// `beta1=0.9, beta2=0.999, eps=1e-8` defaults.
#[derive(Clone, Serialize, Deserialize)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: u64,
    trunk1: AdamState,
    trunk2: AdamState,
    policy_head: AdamState,
    value1: AdamState,
    value2: AdamState,
}

impl Adam {
    pub fn new(net: &AlphaZeroNet, lr: f64) -> Adam {
        Adam {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            trunk1: AdamState::zeroed(net.trunk1.w.len(), net.trunk1.b.len()),
            trunk2: AdamState::zeroed(net.trunk2.w.len(), net.trunk2.b.len()),
            policy_head: AdamState::zeroed(net.policy_head.w.len(), net.policy_head.b.len()),
            value1: AdamState::zeroed(net.value1.w.len(), net.value1.b.len()),
            value2: AdamState::zeroed(net.value2.w.len(), net.value2.b.len()),
        }
    }

}

/// Applies one bias-corrected Adam update to `layer` using `state`. A free
/// function rather than an `Adam` method: a method taking `&mut self` can't
/// also receive a `&mut` to one of its own fields as an argument.
#[allow(clippy::too_many_arguments)]
fn apply_adam_update(
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: u64,
    layer: &mut Linear,
    state: &mut AdamState,
    grad_w: &[f64],
    grad_b: &[f64],
) {
    let bias_correction1 = 1.0 - beta1.powi(t as i32);
    let bias_correction2 = 1.0 - beta2.powi(t as i32);
    for idx in 0..layer.w.len() {
        state.m_w[idx] = beta1 * state.m_w[idx] + (1.0 - beta1) * grad_w[idx];
        state.v_w[idx] = beta2 * state.v_w[idx] + (1.0 - beta2) * grad_w[idx] * grad_w[idx];
        let m_hat = state.m_w[idx] / bias_correction1;
        let v_hat = state.v_w[idx] / bias_correction2;
        layer.w[idx] -= lr * m_hat / (v_hat.sqrt() + eps);
    }
    for idx in 0..layer.b.len() {
        state.m_b[idx] = beta1 * state.m_b[idx] + (1.0 - beta1) * grad_b[idx];
        state.v_b[idx] = beta2 * state.v_b[idx] + (1.0 - beta2) * grad_b[idx] * grad_b[idx];
        let m_hat = state.m_b[idx] / bias_correction1;
        let v_hat = state.v_b[idx] / bias_correction2;
        layer.b[idx] -= lr * m_hat / (v_hat.sqrt() + eps);
    }
}

/// One gradient-descent step over `batch`: log-softmax policy
/// cross-entropy plus value MSE, averaged across the batch, per
/// `train_epoch`'s per-batch contract. Returns `(policy_loss, value_loss)`.
pub fn train_on_batch(net: &mut AlphaZeroNet, optimizer: &mut Adam, batch: &[&Sample]) -> (f64, f64) {
    let n = batch.len() as f64;
    let hidden1 = net.trunk1.out_dim;
    let hidden2 = net.trunk2.out_dim;
    let num_actions = net.policy_head.out_dim;

    let mut grad_trunk1_w = vec![0.0; net.trunk1.w.len()];
    let mut grad_trunk1_b = vec![0.0; net.trunk1.b.len()];
    let mut grad_trunk2_w = vec![0.0; net.trunk2.w.len()];
    let mut grad_trunk2_b = vec![0.0; net.trunk2.b.len()];
    let mut grad_policy_w = vec![0.0; net.policy_head.w.len()];
    let mut grad_policy_b = vec![0.0; net.policy_head.b.len()];
    let mut grad_value1_w = vec![0.0; net.value1.w.len()];
    let mut grad_value1_b = vec![0.0; net.value1.b.len()];
    let mut grad_value2_w = vec![0.0; net.value2.w.len()];
    let mut grad_value2_b = vec![0.0; net.value2.b.len()];

    let mut policy_loss_sum = 0.0;
    let mut value_loss_sum = 0.0;

    for sample in batch {
        let act = net.forward_full(&sample.features);
        let probs = softmax(&act.policy_logits);

        let log_probs: Vec<f64> = probs.iter().map(|p| (p + 1e-12).ln()).collect();
        let sample_policy_loss: f64 =
            -sample.target_policy.iter().zip(&log_probs).map(|(t, lp)| t * lp).sum::<f64>();
        policy_loss_sum += sample_policy_loss;

        let value = act.v2_pre.tanh();
        let value_err = value - sample.target_value;
        value_loss_sum += value_err * value_err;

        debug_assert_eq!(probs.len(), num_actions);
        let d_logits: Vec<f64> = probs.iter().zip(&sample.target_policy).map(|(p, t)| (p - t) / n).collect();

        let d_v2_pre = (2.0 * value_err * (1.0 - act.v2_pre.tanh().powi(2))) / n;
        let (d_v1, w2, b2) = net.value2.backward(&act.v1, &[d_v2_pre]);
        accumulate(&mut grad_value2_w, &w2);
        accumulate(&mut grad_value2_b, &b2);

        let d_v1_pre = relu_backward(&act.v1_pre, &d_v1);
        let (d_h2_from_value, w1, b1) = net.value1.backward(&act.h2, &d_v1_pre);
        accumulate(&mut grad_value1_w, &w1);
        accumulate(&mut grad_value1_b, &b1);

        let (d_h2_from_policy, wp, bp) = net.policy_head.backward(&act.h2, &d_logits);
        accumulate(&mut grad_policy_w, &wp);
        accumulate(&mut grad_policy_b, &bp);

        let mut d_h2 = vec![0.0; hidden2];
        for i in 0..hidden2 {
            d_h2[i] = d_h2_from_value[i] + d_h2_from_policy[i];
        }
        let d_h2_pre = relu_backward(&act.h2_pre, &d_h2);
        let (d_h1, wt2, bt2) = net.trunk2.backward(&act.h1, &d_h2_pre);
        accumulate(&mut grad_trunk2_w, &wt2);
        accumulate(&mut grad_trunk2_b, &bt2);

        let d_h1_pre = relu_backward(&act.h1_pre, &d_h1);
        let (_d_input, wt1, bt1) = net.trunk1.backward(&act.input, &d_h1_pre);
        accumulate(&mut grad_trunk1_w, &wt1);
        accumulate(&mut grad_trunk1_b, &bt1);
    }

    let _ = hidden1;
    optimizer.t += 1;
    let (lr, beta1, beta2, eps, t) = (optimizer.lr, optimizer.beta1, optimizer.beta2, optimizer.eps, optimizer.t);
    apply_adam_update(lr, beta1, beta2, eps, t, &mut net.trunk1, &mut optimizer.trunk1, &grad_trunk1_w, &grad_trunk1_b);
    apply_adam_update(lr, beta1, beta2, eps, t, &mut net.trunk2, &mut optimizer.trunk2, &grad_trunk2_w, &grad_trunk2_b);
    apply_adam_update(
        lr,
        beta1,
        beta2,
        eps,
        t,
        &mut net.policy_head,
        &mut optimizer.policy_head,
        &grad_policy_w,
        &grad_policy_b,
    );
    apply_adam_update(lr, beta1, beta2, eps, t, &mut net.value1, &mut optimizer.value1, &grad_value1_w, &grad_value1_b);
    apply_adam_update(lr, beta1, beta2, eps, t, &mut net.value2, &mut optimizer.value2, &grad_value2_w, &grad_value2_b);

    (policy_loss_sum / n, value_loss_sum / n)
}

fn accumulate(dst: &mut [f64], src: &[f64]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}
