// src/keystroke/autoencoder.rs - Dense autoencoder trained by gradient descent
//
// Topology: input -> hidden (ReLU) -> bottleneck (ReLU) -> input (Sigmoid).
// Reconstruction error (MSE against the input) is the anomaly score. Each
// profile owns an independent weight set; nothing here is shared.
use crate::error::{BiometricError, Result};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sigmoid argument clamp; avoids overflow in exp for extreme inputs
const SIGMOID_CLAMP: f64 = 500.0;

/// Activation applied by a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(&self, z: f64) -> f64 {
        match self {
            Activation::Relu => z.max(0.0),
            Activation::Sigmoid => {
                let z = z.clamp(-SIGMOID_CLAMP, SIGMOID_CLAMP);
                1.0 / (1.0 + (-z).exp())
            }
        }
    }
}

/// One fully-connected layer with owned weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Row-major weights: weights[output][input]
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    /// Xavier-uniform initialization scaled by fan-in and fan-out
    fn xavier<R: Rng>(input_size: usize, output_size: usize, activation: Activation, rng: &mut R) -> Self {
        let scale = (6.0 / (input_size + output_size) as f64).sqrt();
        let weights = (0..output_size)
            .map(|_| {
                (0..input_size)
                    .map(|_| rng.gen_range(-1.0..1.0) * scale)
                    .collect()
            })
            .collect();

        DenseLayer {
            weights,
            biases: vec![0.0; output_size],
            activation,
        }
    }

    /// Forward pass returning pre-activations and activations
    fn forward(&self, input: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut pre = Vec::with_capacity(self.biases.len());
        let mut out = Vec::with_capacity(self.biases.len());

        for (row, bias) in self.weights.iter().zip(self.biases.iter()) {
            let z: f64 = row.iter().zip(input.iter()).map(|(w, x)| w * x).sum::<f64>() + bias;
            pre.push(z);
            out.push(self.activation.apply(z));
        }

        (pre, out)
    }
}

/// Encoder-bottleneck-decoder network reconstructing normalized vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autoencoder {
    pub input_size: usize,
    pub layers: Vec<DenseLayer>,
}

impl Autoencoder {
    /// Build a freshly initialized network for the given input width
    pub fn new(input_size: usize, hidden_size: usize, bottleneck_size: usize) -> Self {
        let mut rng = rand::thread_rng();
        let layers = vec![
            DenseLayer::xavier(input_size, hidden_size, Activation::Relu, &mut rng),
            DenseLayer::xavier(hidden_size, bottleneck_size, Activation::Relu, &mut rng),
            DenseLayer::xavier(bottleneck_size, input_size, Activation::Sigmoid, &mut rng),
        ];

        Autoencoder { input_size, layers }
    }

    /// Forward pass only; returns the reconstruction
    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        self.check_input(input)?;

        let mut current = input.to_vec();
        for layer in &self.layers {
            let (_, out) = layer.forward(&current);
            current = out;
        }

        Ok(current)
    }

    /// Mean squared error between the input and its reconstruction
    pub fn reconstruction_error(&self, input: &[f64]) -> Result<f64> {
        let reconstruction = self.predict(input)?;
        Ok(mse(input, &reconstruction))
    }

    /// Full-batch gradient descent: every epoch visits each sample once and
    /// applies the backpropagated update immediately (online within the
    /// epoch, not averaged mini-batches). Returns the final epoch loss.
    pub fn train(&mut self, data: &[Vec<f64>], epochs: usize, learning_rate: f64) -> Result<f64> {
        if data.is_empty() {
            return Err(BiometricError::TrainingFailure(
                "no training samples".to_string(),
            ));
        }
        for sample in data {
            self.check_input(sample)?;
        }

        let mut final_loss = 0.0;
        for epoch in 0..epochs {
            let mut epoch_loss = 0.0;
            for sample in data {
                epoch_loss += self.train_sample(sample, learning_rate);
            }
            final_loss = epoch_loss / data.len() as f64;

            if epoch % 50 == 0 || epoch + 1 == epochs {
                debug!("autoencoder epoch {}: loss {:.6}", epoch, final_loss);
            }
        }

        if !final_loss.is_finite() {
            return Err(BiometricError::TrainingFailure(format!(
                "training diverged, loss {}",
                final_loss
            )));
        }

        Ok(final_loss)
    }

    /// One forward/backward pass with an immediate weight update
    fn train_sample(&mut self, input: &[f64], learning_rate: f64) -> f64 {
        // Forward, keeping every layer's pre-activation and activation
        let mut activations: Vec<Vec<f64>> = vec![input.to_vec()];
        let mut pre_activations: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let (pre, out) = layer.forward(activations.last().unwrap());
            pre_activations.push(pre);
            activations.push(out);
        }

        let output = activations.last().unwrap();
        let loss = mse(input, output);

        // Output delta through the sigmoid: (y - t) * y * (1 - y)
        let mut delta: Vec<f64> = output
            .iter()
            .zip(input.iter())
            .map(|(y, t)| (y - t) * y * (1.0 - y))
            .collect();

        // Backward pass, updating each layer as its delta is known
        for k in (0..self.layers.len()).rev() {
            let layer_input = &activations[k];

            // Propagate before mutating this layer's weights
            let delta_prev = if k > 0 {
                let mut prev = vec![0.0; layer_input.len()];
                for (o, d) in delta.iter().enumerate() {
                    for (i, p) in prev.iter_mut().enumerate() {
                        *p += self.layers[k].weights[o][i] * d;
                    }
                }
                // ReLU derivative: 0/1 mask from the pre-activation
                for (p, z) in prev.iter_mut().zip(pre_activations[k - 1].iter()) {
                    if *z <= 0.0 {
                        *p = 0.0;
                    }
                }
                Some(prev)
            } else {
                None
            };

            let layer = &mut self.layers[k];
            for (o, d) in delta.iter().enumerate() {
                for (i, x) in layer_input.iter().enumerate() {
                    layer.weights[o][i] -= learning_rate * d * x;
                }
                layer.biases[o] -= learning_rate * d;
            }

            if let Some(prev) = delta_prev {
                delta = prev;
            }
        }

        loss
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_size {
            return Err(BiometricError::InvalidFeatures(format!(
                "input length {} does not match network input {}",
                input.len(),
                self.input_size
            )));
        }
        Ok(())
    }
}

/// Mean squared error between two equal-length vectors
pub fn mse(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        / a.len() as f64
}
