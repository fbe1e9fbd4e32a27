use super::schemas::{CandidateRecord, ClassificationRequest, ClassifierResponse};
use super::{ClassifierError, ExternalClassifier};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted classifier for tests and offline runs. Responses are keyed by
/// the static pattern label of the request.
pub struct MockClassifier {
    responses: HashMap<String, ClassifierResponse>,
    default_response: ClassifierResponse,
    raw_response: Option<String>,
    delay: Duration,
    call_count: AtomicUsize,
    should_fail: bool,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            responses: Self::default_responses(),
            default_response: Self::opinion("requires_check", 0.5, "No scripted opinion for this pattern"),
            raw_response: None,
            delay: Duration::from_millis(1),
            call_count: AtomicUsize::new(0),
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        let mut classifier = Self::new();
        classifier.should_fail = true;
        classifier
    }

    pub fn with_response(mut self, pattern: &str, response: ClassifierResponse) -> Self {
        self.responses.insert(pattern.to_string(), response);
        self
    }

    pub fn with_default_response(mut self, response: ClassifierResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Returns `raw` verbatim for every call, single or batched.
    pub fn with_raw_response(mut self, raw: impl Into<String>) -> Self {
        self.raw_response = Some(raw.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }

    pub fn opinion(quality: &str, confidence: f64, reasoning: &str) -> ClassifierResponse {
        ClassifierResponse {
            enhanced_pattern: None,
            quality: Some(quality.to_string()),
            confidence: Some(confidence),
            reasoning: Some(reasoning.to_string()),
            suggested_transformations: Vec::new(),
        }
    }

    fn default_responses() -> HashMap<String, ClassifierResponse> {
        let mut responses = HashMap::new();
        responses.insert(
            "embarrassingly_parallel".to_string(),
            ClassifierResponse {
                enhanced_pattern: Some("embarrassingly_parallel_verified".to_string()),
                suggested_transformations: vec!["#pragma omp parallel for".to_string()],
                ..Self::opinion("safe_parallel", 0.9, "Iterations are independent")
            },
        );
        responses.insert(
            "reduction".to_string(),
            ClassifierResponse {
                enhanced_pattern: Some("reduction_safe".to_string()),
                suggested_transformations: vec![
                    "#pragma omp parallel for reduction(+:sum)".to_string()
                ],
                ..Self::opinion("safe_parallel", 0.85, "Accumulator can be privatized")
            },
        );
        responses.insert(
            "prefix_sum".to_string(),
            Self::opinion("not_parallel", 0.8, "Each element depends on the previous one"),
        );
        responses
    }

    async fn begin(&self) -> Result<(), ClassifierError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(ClassifierError::Unreachable(
                "Mock classifier configured to fail".to_string(),
            ));
        }
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    fn respond(&self, pattern: &str) -> &ClassifierResponse {
        self.responses.get(pattern).unwrap_or(&self.default_response)
    }
}

#[async_trait]
impl ExternalClassifier for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
    }

    async fn classify(&self, request: &ClassificationRequest) -> Result<String, ClassifierError> {
        self.begin().await?;
        if let Some(raw) = &self.raw_response {
            return Ok(raw.clone());
        }
        serde_json::to_string(self.respond(&request.pattern))
            .map_err(|e| ClassifierError::Malformed(e.to_string()))
    }

    async fn classify_batch(&self, candidates: &[CandidateRecord]) -> Result<String, ClassifierError> {
        self.begin().await?;
        if let Some(raw) = &self.raw_response {
            return Ok(raw.clone());
        }
        let body: serde_json::Map<String, serde_json::Value> = candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                serde_json::to_value(self.respond(&candidate.candidate_type))
                    .map(|value| (format!("candidate_{}", i + 1), value))
            })
            .collect::<Result<_, _>>()
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        serde_json::to_string(&body).map_err(|e| ClassifierError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ExternalClassifierAdapter;

    fn request(pattern: &str) -> ClassificationRequest {
        ClassificationRequest {
            pattern: pattern.to_string(),
            context: "{}".to_string(),
            function: "kernel".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_scripted_response() {
        let classifier = MockClassifier::new();
        let raw = classifier.classify(&request("reduction")).await.unwrap();
        let opinion = ExternalClassifierAdapter::parse_opinion(&raw).unwrap();
        assert_eq!(opinion.enhanced_pattern.as_deref(), Some("reduction_safe"));
        assert_eq!(opinion.confidence, 0.85);
    }

    #[tokio::test]
    async fn test_mock_call_counting() {
        let classifier = MockClassifier::new();
        assert_eq!(classifier.call_count(), 0);
        classifier.classify(&request("map")).await.unwrap();
        classifier.classify(&request("map")).await.unwrap();
        assert_eq!(classifier.call_count(), 2);
        classifier.reset_count();
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let classifier = MockClassifier::failing();
        assert!(classifier.classify(&request("map")).await.is_err());
    }
}
