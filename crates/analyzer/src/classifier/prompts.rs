use super::schemas::{CandidateRecord, ClassificationRequest};

pub const SYSTEM_PROMPT: &str = "You review loops that a static analyzer proposes for \
parallelization. Answer with a single JSON object and nothing else. Use the quality \
labels safe_parallel, requires_check or not_parallel. Report confidence as a number \
between 0 and 1. Prefer requires_check over safe_parallel whenever a loop-carried \
dependency, aliasing or an impure call cannot be ruled out.";

const RESPONSE_SHAPE: &str = r#"{"enhancedPattern": "<label>", "quality": "<label>", "confidence": 0.0, "reasoning": "<text>", "suggestedTransformations": ["<pragma>"]}"#;

pub fn single_prompt(request: &ClassificationRequest) -> String {
    format!(
        "Function: {}\nStatic pattern: {}\nLoop context:\n{}\n\nRespond with JSON shaped as:\n{}",
        request.function, request.pattern, request.context, RESPONSE_SHAPE
    )
}

pub fn batch_prompt(candidates: &[CandidateRecord]) -> String {
    let mut prompt = format!(
        "Classify each of the following {} loop candidates.\n\n",
        candidates.len()
    );
    for (i, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "candidate_{}: {} in {}:{} ({})\n  reason: {}\n  proposed: {}\n",
            i + 1,
            candidate.candidate_type,
            candidate.file,
            candidate.line,
            candidate.function,
            candidate.reason,
            candidate.suggested_patch.replace('\n', " | ")
        ));
    }
    prompt.push_str(&format!(
        "\nRespond with one JSON object keyed candidate_1..candidate_{}, each value shaped as:\n{}",
        candidates.len(),
        RESPONSE_SHAPE
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_prompt_numbers_from_one() {
        let candidate = CandidateRecord {
            candidate_type: "reduction".to_string(),
            file: "kernel.c".to_string(),
            function: "dot".to_string(),
            line: 12,
            reason: "accumulator".to_string(),
            suggested_patch: "#pragma omp parallel for reduction(+:sum)".to_string(),
        };
        let prompt = batch_prompt(&[candidate.clone(), candidate]);
        assert!(prompt.contains("candidate_1: reduction in kernel.c:12"));
        assert!(prompt.contains("candidate_2:"));
        assert!(!prompt.contains("candidate_0"));
    }
}
