//! ONNX image classifier

use crate::error::VisionError;
use crate::models::manager::ModelBundle;
use crate::preprocess::{input_shape, prepare_input};
use async_trait::async_trait;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use robolink_core::{rank_classifications, Classification, Classifier, Frame, InputLayout, ModelConfig, PixelRange};
use std::sync::Arc;
use tracing::{debug, info};

/// Tolerance used to decide whether scores already form a distribution
const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// Single-output image classifier (Teachable Machine export or similar).
pub struct OnnxClassifier {
    session: Arc<Mutex<Session>>,
    labels: Vec<String>,
    input_size: u32,
    layout: InputLayout,
    range: PixelRange,
}

impl OnnxClassifier {
    /// Load the model of a fetched bundle.
    pub fn load(bundle: &ModelBundle, config: &ModelConfig) -> Result<Self, VisionError> {
        bundle.metadata.validate()?;
        if !bundle.model_path.is_file() {
            return Err(VisionError::Model(format!(
                "Model file not found: {:?}",
                bundle.model_path
            )));
        }

        let session = Session::builder()
            .map_err(|e| VisionError::Ort(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VisionError::Ort(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| VisionError::Ort(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&bundle.model_path)
            .map_err(|e| VisionError::Ort(format!("Failed to load model: {}", e)))?;

        info!(
            "Classifier loaded from {:?} ({} labels)",
            bundle.model_path,
            bundle.metadata.labels.len()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            labels: bundle.metadata.labels.clone(),
            input_size: bundle.metadata.image_size,
            layout: config.input_layout,
            range: config.pixel_range,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }
}

fn run_session(session: &Mutex<Session>, shape: [usize; 4], input: Vec<f32>) -> Result<Vec<f32>, VisionError> {
    let array = Array4::from_shape_vec(shape, input)
        .map_err(|e| VisionError::Ort(format!("Failed to create input array: {}", e)))?;
    let tensor = Tensor::from_array(array)
        .map_err(|e| VisionError::Ort(format!("Failed to create input tensor: {}", e)))?;

    let mut session = session.lock();
    let outputs = session
        .run(ort::inputs![tensor])
        .map_err(|e| VisionError::Ort(format!("Inference failed: {}", e)))?;
    let (_, scores) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| VisionError::Ort(format!("Failed to extract output: {}", e)))?;
    Ok(scores.to_vec())
}

/// Numerically stable softmax
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; scores.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

fn is_distribution(scores: &[f32]) -> bool {
    let sum: f32 = scores.iter().sum();
    scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE
}

/// Pair raw model scores with labels, best first. Logits are turned into
/// probabilities; outputs that already sum to one are kept as is.
pub fn scores_to_classifications(
    scores: &[f32],
    labels: &[String],
) -> Result<Vec<Classification>, VisionError> {
    if scores.len() != labels.len() {
        return Err(VisionError::Processing(format!(
            "Model produced {} scores for {} labels",
            scores.len(),
            labels.len()
        )));
    }

    let probabilities = if is_distribution(scores) {
        scores.to_vec()
    } else {
        softmax(scores)
    };

    let mut results: Vec<Classification> = labels
        .iter()
        .zip(probabilities)
        .map(|(label, p)| Classification::new(label.clone(), p))
        .collect();
    rank_classifications(&mut results);
    Ok(results)
}

#[async_trait]
impl Classifier for OnnxClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    async fn predict(&mut self, frame: &Frame) -> robolink_core::Result<Vec<Classification>> {
        let session = Arc::clone(&self.session);
        let frame = frame.clone();
        let (side, layout, range) = (self.input_size, self.layout, self.range);

        let scores = tokio::task::spawn_blocking(move || {
            let input = prepare_input(&frame, side, layout, range)?;
            run_session(&session, input_shape(side, layout), input)
        })
        .await
        .map_err(|e| VisionError::Processing(format!("Inference task failed: {}", e)))??;

        let classifications = scores_to_classifications(&scores, &self.labels)?;
        debug!("Predicted {} classes", classifications.len());
        Ok(classifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[2.0, 1.0, 0.1]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }

    #[test]
    fn test_softmax_large_logits() {
        let probs = softmax(&[1000.0, 999.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn test_distribution_kept_as_is() {
        let result = scores_to_classifications(&[0.9, 0.1], &labels(&["Forward", "Stop"])).unwrap();
        assert_eq!(result[0].label, "Forward");
        assert!((result[0].confidence - 0.9).abs() < 1e-6);
        assert!((result[1].confidence - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_logits_are_normalized() {
        let result = scores_to_classifications(&[3.0, -1.0], &labels(&["Left", "Right"])).unwrap();
        let sum: f32 = result.iter().map(|c| c.confidence).sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(result[0].confidence > result[1].confidence);
    }

    #[test]
    fn test_results_ranked_best_first() {
        let result =
            scores_to_classifications(&[0.2, 0.7, 0.1], &labels(&["Left", "Forward", "Stop"])).unwrap();
        let ranked: Vec<&str> = result.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(ranked, vec!["Forward", "Left", "Stop"]);
    }

    #[test]
    fn test_score_count_mismatch() {
        assert!(scores_to_classifications(&[0.5, 0.5], &labels(&["only"])).is_err());
    }
}
