use crate::{error::InferenceError, labels::ClassLabels};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

/// Incoming detection request. `crop_id` is accepted for compatibility and
/// plays no part in the prediction.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionRequest {
    #[serde(default)]
    pub crop_id: Option<String>,
    pub image_base64: String,
}

/// Label to probability mapping in class-label order.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    entries: Vec<(String, f32)>,
}

impl Distribution {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, probability)| *probability)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries
            .iter()
            .map(|(name, probability)| (name.as_str(), *probability))
    }

    pub fn total(&self) -> f32 {
        self.entries.iter().map(|(_, probability)| probability).sum()
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, probability) in &self.entries {
            map.serialize_entry(label, probability)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    #[serde(rename = "disease")]
    top_label: String,
    confidence: f32,
    #[serde(rename = "all_predictions")]
    distribution: Distribution,
}

impl PredictionResult {
    pub fn top_label(&self) -> &str {
        &self.top_label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }
}

/// Maps a model output vector onto the labels.
///
/// The winner is the first index holding the maximum value. Probabilities are
/// taken as-is, without re-normalization.
pub fn aggregate(
    labels: &ClassLabels,
    output: &[f32],
) -> Result<PredictionResult, InferenceError> {
    if output.len() != labels.len() {
        return Err(InferenceError::OutputLength {
            expected: labels.len(),
            actual: output.len(),
        });
    }
    if let Some(index) = output.iter().position(|value| !value.is_finite()) {
        return Err(InferenceError::NonFinite { index });
    }

    let mut best = 0;
    for (index, value) in output.iter().enumerate().skip(1) {
        if *value > output[best] {
            best = index;
        }
    }

    let entries = labels
        .iter()
        .zip(output)
        .map(|(label, probability)| (label.to_string(), *probability))
        .collect();

    Ok(PredictionResult {
        top_label: labels[best].to_string(),
        confidence: output[best],
        distribution: Distribution { entries },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> ClassLabels {
        ClassLabels::new(
            ["Healthy", "Bacterial Blight", "Leaf Spot", "Rust", "Powdery Mildew"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_aggregate_picks_maximum() {
        let result = aggregate(&labels(), &[0.05, 0.1, 0.7, 0.1, 0.05]).unwrap();

        assert_eq!(result.top_label(), "Leaf Spot");
        assert_eq!(result.confidence(), 0.7);
        assert_eq!(result.distribution().get("Leaf Spot"), Some(0.7));
        assert!((result.distribution().total() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_aggregate_ties_go_to_first_index() {
        let result = aggregate(&labels(), &[0.1, 0.35, 0.1, 0.35, 0.1]).unwrap();

        assert_eq!(result.top_label(), "Bacterial Blight");
        assert_eq!(result.confidence(), 0.35);
    }

    #[test]
    fn test_distribution_follows_label_order() {
        let labels = labels();
        let result = aggregate(&labels, &[0.2, 0.2, 0.2, 0.2, 0.2]).unwrap();

        let names: Vec<&str> = result.distribution().iter().map(|(name, _)| name).collect();
        assert_eq!(names, labels.iter().collect::<Vec<_>>());
        assert_eq!(result.top_label(), "Healthy");
    }

    #[test]
    fn test_aggregate_does_not_renormalize() {
        let result = aggregate(&labels(), &[0.1, 0.1, 0.1, 0.1, 0.2]).unwrap();

        assert_eq!(result.confidence(), 0.2);
        assert!((result.distribution().total() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_aggregate_rejects_wrong_length() {
        let result = aggregate(&labels(), &[0.5, 0.5]);
        assert!(matches!(
            result,
            Err(InferenceError::OutputLength {
                expected: 5,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_aggregate_rejects_nan() {
        let result = aggregate(&labels(), &[0.5, f32::NAN, 0.5, 0.0, 0.0]);
        assert!(matches!(result, Err(InferenceError::NonFinite { index: 1 })));
    }

    #[test]
    fn test_serialized_shape() {
        let result = aggregate(&labels(), &[0.5, 0.25, 0.125, 0.0625, 0.0625]).unwrap();
        let json = serde_json::to_string(&result).unwrap();

        assert_eq!(
            json,
            r#"{"disease":"Healthy","confidence":0.5,"all_predictions":{"Healthy":0.5,"Bacterial Blight":0.25,"Leaf Spot":0.125,"Rust":0.0625,"Powdery Mildew":0.0625}}"#
        );
    }

    #[test]
    fn test_detection_request_crop_id_optional() {
        let request: DetectionRequest =
            serde_json::from_str(r#"{"image_base64": "aGVsbG8="}"#).unwrap();
        assert_eq!(request.crop_id, None);
        assert_eq!(request.image_base64, "aGVsbG8=");

        let request: DetectionRequest =
            serde_json::from_str(r#"{"crop_id": "c-17", "image_base64": ""}"#).unwrap();
        assert_eq!(request.crop_id.as_deref(), Some("c-17"));
    }
}
