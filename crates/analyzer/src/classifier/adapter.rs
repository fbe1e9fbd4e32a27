use super::config::ClassifierConfig;
use super::schemas::{
    CandidateRecord, ClassificationRequest, ClassifierOutcome, ClassifierResponse,
    ExternalOpinion, ExternalQuality, UnavailableReason,
};
use super::{ClassifierError, ExternalClassifier};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ExternalClassifierAdapter {
    classifier: Option<Arc<dyn ExternalClassifier>>,
    config: ClassifierConfig,
    cache: Option<Mutex<LruCache<ClassificationRequest, ExternalOpinion>>>,
}

impl Default for ExternalClassifierAdapter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ExternalClassifierAdapter {
    pub fn disabled() -> Self {
        Self {
            classifier: None,
            config: ClassifierConfig::default(),
            cache: None,
        }
    }

    pub fn new(classifier: Arc<dyn ExternalClassifier>, config: ClassifierConfig) -> Self {
        let cache = NonZeroUsize::new(config.cache_size).map(|size| Mutex::new(LruCache::new(size)));
        Self {
            classifier: Some(classifier),
            config,
            cache,
        }
    }

    pub fn is_available(&self) -> bool {
        self.active().is_some()
    }

    pub fn classifier_name(&self) -> Option<&str> {
        self.classifier.as_deref().map(|c| c.name())
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn active(&self) -> Option<&Arc<dyn ExternalClassifier>> {
        self.classifier.as_ref().filter(|_| self.config.enabled)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms.max(1))
    }

    pub async fn classify(&self, request: &ClassificationRequest) -> ClassifierOutcome {
        let Some(classifier) = self.active() else {
            return ClassifierOutcome::Unavailable(UnavailableReason::NotConfigured);
        };

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().get(request) {
                debug!("Classifier cache hit for {}", request.function);
                return ClassifierOutcome::Opinion(hit.clone());
            }
        }

        let response = match tokio::time::timeout(self.timeout(), classifier.classify(request)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.config.timeout_ms)),
        };

        match response.and_then(|raw| Self::parse_opinion(&raw)) {
            Ok(opinion) => {
                if let Some(cache) = &self.cache {
                    cache.lock().put(request.clone(), opinion.clone());
                }
                ClassifierOutcome::Opinion(opinion)
            }
            Err(e) => {
                warn!(
                    "{} unavailable for {}: {}",
                    classifier.name(),
                    request.function,
                    e
                );
                ClassifierOutcome::Unavailable(e.reason())
            }
        }
    }

    /// One outcome per candidate, in order. Candidates are sent in chunks of
    /// `batch_size`, each chunk under its own timeout; a failed chunk or a
    /// malformed entry only affects the candidates it covers.
    pub async fn classify_batch(&self, candidates: &[CandidateRecord]) -> Vec<ClassifierOutcome> {
        let Some(classifier) = self.active() else {
            return vec![ClassifierOutcome::Unavailable(UnavailableReason::NotConfigured); candidates.len()];
        };

        let mut outcomes = Vec::with_capacity(candidates.len());
        for chunk in candidates.chunks(self.config.batch_size.max(1)) {
            let response =
                match tokio::time::timeout(self.timeout(), classifier.classify_batch(chunk)).await {
                    Ok(result) => result,
                    Err(_) => Err(ClassifierError::Timeout(self.config.timeout_ms)),
                };

            match response {
                Ok(raw) => outcomes.extend(Self::parse_batch(&raw, chunk.len())),
                Err(e) => {
                    warn!(
                        "{} batch of {} candidates failed: {}",
                        classifier.name(),
                        chunk.len(),
                        e
                    );
                    outcomes.extend(
                        std::iter::repeat(ClassifierOutcome::Unavailable(e.reason())).take(chunk.len()),
                    );
                }
            }
        }
        outcomes
    }

    pub fn parse_opinion(raw: &str) -> Result<ExternalOpinion, ClassifierError> {
        let response: ClassifierResponse = serde_json::from_str(extract_json(raw))
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        Self::validate(response)
    }

    fn validate(response: ClassifierResponse) -> Result<ExternalOpinion, ClassifierError> {
        let opinion = ExternalOpinion::from(response);
        if opinion.quality == ExternalQuality::Error {
            return Err(ClassifierError::Reported(if opinion.reasoning.is_empty() {
                "no usable quality label".to_string()
            } else {
                opinion.reasoning
            }));
        }
        Ok(opinion)
    }

    pub fn parse_batch(raw: &str, expected: usize) -> Vec<ClassifierOutcome> {
        let value: Value = match serde_json::from_str(extract_json(raw)) {
            Ok(value) => value,
            Err(e) => {
                warn!("Malformed batch response: {}", e);
                return vec![ClassifierOutcome::Unavailable(UnavailableReason::Malformed); expected];
            }
        };

        let entries: Vec<Option<&Value>> = match &value {
            Value::Array(items) => (0..expected).map(|i| items.get(i)).collect(),
            Value::Object(map) => match map.get("candidates") {
                Some(Value::Array(items)) => (0..expected).map(|i| items.get(i)).collect(),
                _ => (1..=expected)
                    .map(|i| map.get(&format!("candidate_{i}")))
                    .collect(),
            },
            _ => vec![None; expected],
        };

        entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let Some(entry) = entry else {
                    debug!("Batch response has no entry for candidate {}", i + 1);
                    return ClassifierOutcome::Unavailable(UnavailableReason::Malformed);
                };
                let parsed = serde_json::from_value::<ClassifierResponse>(entry.clone())
                    .map_err(|e| ClassifierError::Malformed(e.to_string()))
                    .and_then(Self::validate);
                match parsed {
                    Ok(opinion) => ClassifierOutcome::Opinion(opinion),
                    Err(e) => {
                        debug!("Candidate {} unusable: {}", i + 1, e);
                        ClassifierOutcome::Unavailable(e.reason())
                    }
                }
            })
            .collect()
    }
}

/// Strips markdown fences and prose around a JSON document.
fn extract_json(text: &str) -> &str {
    let text = text.trim();
    if let Some(start) = text.find("```") {
        let body = &text[start + 3..];
        let body = body.strip_prefix("json").unwrap_or(body);
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    let start = text.find(['{', '[']);
    let end = text.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if end >= start => &text[start..=end],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_block() {
        let raw = "Here you go:\n```json\n{\"quality\": \"safe_parallel\"}\n```\nthanks";
        assert_eq!(extract_json(raw), "{\"quality\": \"safe_parallel\"}");
        assert_eq!(extract_json("noise {\"a\": 1} trailing"), "{\"a\": 1}");
    }

    #[test]
    fn test_error_quality_is_rejected() {
        let err = ExternalClassifierAdapter::parse_opinion(r#"{"quality": "error", "reasoning": "API request failed"}"#)
            .unwrap_err();
        assert_eq!(err.reason(), UnavailableReason::Rejected);
    }

    #[test]
    fn test_partial_batch() {
        let raw = r#"{
            "candidate_1": {"classification": "safe_parallel", "confidence": 0.9},
            "candidate_2": "not an object",
            "candidate_3": {"classification": "not_parallel", "confidence": 0.8}
        }"#;
        let outcomes = ExternalClassifierAdapter::parse_batch(raw, 4);
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].opinion().map(|o| o.quality), Some(ExternalQuality::SafeParallel));
        assert_eq!(outcomes[1], ClassifierOutcome::Unavailable(UnavailableReason::Malformed));
        assert_eq!(outcomes[2].opinion().map(|o| o.quality), Some(ExternalQuality::NotParallel));
        assert_eq!(outcomes[3], ClassifierOutcome::Unavailable(UnavailableReason::Malformed));
    }

    #[test]
    fn test_garbage_batch() {
        let outcomes = ExternalClassifierAdapter::parse_batch("<html>502</html>", 2);
        assert!(outcomes.iter().all(|o| !o.is_available()));
    }
}
