use super::advanced::{
    ComplexReductionRecognizer, Convolution2DRecognizer, FrobeniusNormRecognizer,
    ImageProcessingRecognizer, MatrixAdditionRecognizer, MatrixMultiplyRecognizer,
    MatrixScalingRecognizer, StencilRecognizer,
};
use super::basic::{
    EmbarrassinglyParallelRecognizer, FilterRecognizer, MapRecognizer, PrefixSumRecognizer,
    ReductionRecognizer, SimpleParallelRecognizer, VectorizableRecognizer,
};
use super::{PatternKind, PatternRecognizer};
use std::collections::HashMap;
use std::sync::Arc;

/// Recognizers addressable by the pattern they detect.
pub struct RecognizerRegistry {
    recognizers: HashMap<PatternKind, Arc<dyn PatternRecognizer>>,
}

impl RecognizerRegistry {
    pub fn new() -> Self {
        Self {
            recognizers: HashMap::new(),
        }
    }

    pub fn register<R: PatternRecognizer + 'static>(&mut self, recognizer: R) {
        self.recognizers.insert(recognizer.kind(), Arc::new(recognizer));
    }

    pub fn register_arc(&mut self, recognizer: Arc<dyn PatternRecognizer>) {
        self.recognizers.insert(recognizer.kind(), recognizer);
    }

    pub fn get(&self, kind: PatternKind) -> Option<Arc<dyn PatternRecognizer>> {
        self.recognizers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<PatternKind> {
        let mut kinds: Vec<_> = self.recognizers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.recognizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recognizers.is_empty()
    }
}

impl Default for RecognizerRegistry {
    fn default() -> Self {
        let mut registry = Self::new();

        registry.register(MatrixMultiplyRecognizer);
        registry.register(Convolution2DRecognizer);
        registry.register(ImageProcessingRecognizer);
        registry.register(StencilRecognizer);
        registry.register(MatrixAdditionRecognizer);
        registry.register(MatrixScalingRecognizer);
        registry.register(FrobeniusNormRecognizer);
        registry.register(ComplexReductionRecognizer);

        registry.register(PrefixSumRecognizer);
        registry.register(ReductionRecognizer);
        registry.register(FilterRecognizer);
        registry.register(EmbarrassinglyParallelRecognizer);
        registry.register(VectorizableRecognizer);
        registry.register(MapRecognizer);
        registry.register(SimpleParallelRecognizer);

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_every_pattern_but_unknown() {
        let registry = RecognizerRegistry::default();
        assert_eq!(registry.len(), PatternKind::ALL.len() - 1);
        assert!(registry.get(PatternKind::Unknown).is_none());
        for kind in registry.kinds() {
            assert_eq!(registry.get(kind).map(|r| r.kind()), Some(kind));
        }
    }
}
