//! Mapping from external pattern labels to [`PatternKind`].
//!
//! A built-in alias table covers the labels external classifiers commonly
//! emit. Hosts may extend it once per process from a JSON file; after that the
//! list is read-only and shared without locking.

use crate::patterns::PatternKind;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSignature {
    pub name: String,
    pub pattern: PatternKind,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct PatternSignatures {
    signatures: Vec<PatternSignature>,
}

static GLOBAL_SIGNATURES: OnceLock<PatternSignatures> = OnceLock::new();

impl PatternSignatures {
    pub fn builtin() -> Self {
        let table: [(&str, PatternKind, &str); 9] = [
            ("embarrassingly_parallel_verified", PatternKind::EmbarrassinglyParallel, "Independent iterations confirmed"),
            ("vectorizable_simd", PatternKind::Vectorizable, "SIMD-friendly contiguous body"),
            ("reduction_safe", PatternKind::Reduction, "Privatizable accumulator"),
            ("stencil_pattern", PatternKind::Stencil, "Neighbourhood read of one array"),
            ("gather_scatter", PatternKind::Map, "Indirect elementwise access"),
            ("matrix_operation", PatternKind::MatrixMultiply, "Dense linear algebra kernel"),
            ("scan_pattern", PatternKind::PrefixSum, "Running prefix"),
            ("risky_dependencies", PatternKind::Unknown, "Dependencies the classifier could not clear"),
            ("unsafe_parallel", PatternKind::Unknown, "Classifier advises against parallelization"),
        ];
        Self {
            signatures: table
                .into_iter()
                .map(|(name, pattern, description)| PatternSignature {
                    name: name.to_string(),
                    pattern,
                    description: description.to_string(),
                })
                .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let signatures: Vec<PatternSignature> =
            serde_json::from_str(json).context("Failed to parse pattern signatures")?;
        if let Some(empty) = signatures.iter().find(|s| s.name.trim().is_empty()) {
            bail!("Pattern signature for {} has an empty name", empty.pattern);
        }
        Ok(Self { signatures })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read signature file: {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// Built-ins followed by `extra`; later entries win on lookup.
    pub fn extended(mut self, extra: PatternSignatures) -> Self {
        self.signatures.extend(extra.signatures);
        self
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternSignature> {
        self.signatures.iter()
    }

    /// Resolves an external label. `Some(Unknown)` means the label is known
    /// but makes no pattern claim.
    pub fn lookup(&self, label: &str) -> Option<PatternKind> {
        let normalized = label.trim().to_ascii_lowercase();
        self.signatures
            .iter()
            .rev()
            .find(|s| s.name.eq_ignore_ascii_case(&normalized))
            .map(|s| s.pattern)
            .or_else(|| PatternKind::from_label(&normalized))
    }

    /// Loads the process-wide list once. Returns false when it was already
    /// initialized; the earlier list stays in place.
    pub fn load_global<P: AsRef<Path>>(path: P) -> Result<bool> {
        if GLOBAL_SIGNATURES.get().is_some() {
            debug!("Pattern signatures already loaded");
            return Ok(false);
        }
        let loaded = Self::builtin().extended(Self::from_file(path.as_ref())?);
        let count = loaded.len();
        let installed = GLOBAL_SIGNATURES.set(loaded).is_ok();
        if installed {
            info!("Loaded {} pattern signatures from {}", count, path.as_ref().display());
        }
        Ok(installed)
    }

    pub fn global() -> &'static PatternSignatures {
        GLOBAL_SIGNATURES.get_or_init(Self::builtin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_aliases() {
        let signatures = PatternSignatures::builtin();
        assert_eq!(signatures.lookup("reduction_safe"), Some(PatternKind::Reduction));
        assert_eq!(signatures.lookup("Stencil_Pattern"), Some(PatternKind::Stencil));
        assert_eq!(signatures.lookup("matmul"), Some(PatternKind::MatrixMultiply));
        assert_eq!(signatures.lookup("risky_dependencies"), Some(PatternKind::Unknown));
        assert_eq!(signatures.lookup("something_else"), None);
    }

    #[test]
    fn test_file_entries_override_builtins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "stencil_pattern", "pattern": "convolution_2d", "description": "blur"}},
               {{"name": "tiled_gemm", "pattern": "matrix_multiply"}}]"#
        )
        .unwrap();

        let extra = PatternSignatures::from_file(file.path()).unwrap();
        assert_eq!(extra.len(), 2);
        let signatures = PatternSignatures::builtin().extended(extra);
        assert_eq!(signatures.lookup("stencil_pattern"), Some(PatternKind::Convolution2D));
        assert_eq!(signatures.lookup("tiled_gemm"), Some(PatternKind::MatrixMultiply));
    }

    #[test]
    fn test_rejects_bad_files() {
        assert!(PatternSignatures::from_json_str("{}").is_err());
        assert!(PatternSignatures::from_json_str(r#"[{"name": " ", "pattern": "map"}]"#).is_err());
        assert!(PatternSignatures::from_file("/nonexistent/signatures.json").is_err());
    }
}
