//! Randomness for Simulated Ticks

use rand::{Rng, RngCore};

/// Uniform source of values in `[0, 1)` driving the tick simulation
pub trait TickRng: Send {
    fn next_unit(&mut self) -> f64;
}

impl<R: RngCore + Send> TickRng for R {
    fn next_unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Replays a fixed sequence of values, wrapping around at the end
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedRng {
    /// Create a scripted source. An empty script always yields 0.0.
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }
}

impl TickRng for ScriptedRng {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}
