//! Synthetic monitoring data shared by the integration tests.

#![allow(dead_code)]

use driftwatch_core::DataBatch;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

/// Relative frequencies of the values `0..10`.
const WEIGHTS: [u32; 10] = [30, 20, 15, 10, 8, 6, 5, 3, 2, 1];

pub const FEATURES: [&str; 3] = ["x1", "x2", "x3"];

pub fn feature_names() -> Vec<String> {
    FEATURES.iter().map(|f| f.to_string()).collect()
}

fn draw(rng: &mut StdRng) -> f64 {
    let total: u32 = WEIGHTS.iter().sum();
    let mut r = rng.gen_range(0..total);
    for (value, &weight) in WEIGHTS.iter().enumerate() {
        if r < weight {
            return value as f64;
        }
        r -= weight;
    }
    (WEIGHTS.len() - 1) as f64
}

/// Hourly rows where `x2 = 2 * x1` and `x3` is independent of both.
pub struct Synthetic {
    pub x1: Vec<f64>,
    pub x2: Vec<f64>,
    pub x3: Vec<f64>,
    pub start: i64,
}

impl Synthetic {
    pub fn generate(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let x1: Vec<f64> = (0..n).map(|_| draw(&mut rng)).collect();
        let x2 = x1.iter().map(|v| v * 2.0).collect();
        let x3 = (0..n).map(|_| draw(&mut rng)).collect();
        Self {
            x1,
            x2,
            x3,
            start: 1_640_995_200,
        }
    }

    /// Break the `x1`/`x2` relationship without touching either marginal distribution.
    pub fn shuffle_x2(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.x2.shuffle(&mut rng);
        self
    }

    pub fn len(&self) -> usize {
        self.x1.len()
    }

    pub fn timestamps(&self) -> Vec<Value> {
        (0..self.len())
            .map(|i| json!(self.start + i as i64 * 3600))
            .collect()
    }

    pub fn to_batch(&self) -> DataBatch {
        let column = |values: &[f64]| values.iter().map(|v| json!(v)).collect::<Vec<_>>();
        DataBatch::from_columns(vec![
            ("timestamp".into(), self.timestamps()),
            ("x1".into(), column(&self.x1)),
            ("x2".into(), column(&self.x2)),
            ("x3".into(), column(&self.x3)),
        ])
        .unwrap()
    }

    /// The batch with every row tagged as belonging to `period`.
    pub fn to_batch_in(&self, period: &str) -> DataBatch {
        self.to_batch()
            .with_column("period", vec![json!(period); self.len()])
            .unwrap()
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from("timestamp,x1,x2,x3\n");
        for i in 0..self.len() {
            out.push_str(&format!(
                "{},{},{},{}\n",
                self.start + i as i64 * 3600,
                self.x1[i],
                self.x2[i],
                self.x3[i]
            ));
        }
        out
    }
}
