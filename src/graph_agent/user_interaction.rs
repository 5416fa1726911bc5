//! Per-node user-interaction policy and the keyword-based confidence
//! estimator used to decide whether a node's output needs a human check.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInteractionMode {
    ContinuousChat,
    SingleReactCycle,
}

#[derive(Debug, Clone)]
pub struct UserInteraction {
    pub mode: UserInteractionMode,
    pub require_approval: bool,
    pub confidence_threshold: Option<f64>,
    pub approval_prompt: Option<String>,
    pub allow_user_prompting: bool,
    pub show_end_chat_button: bool,
}

impl Default for UserInteraction {
    fn default() -> Self {
        Self {
            mode: UserInteractionMode::SingleReactCycle,
            require_approval: false,
            confidence_threshold: None,
            approval_prompt: None,
            allow_user_prompting: false,
            show_end_chat_button: false,
        }
    }
}

/// Phrases whose presence in an answer suggests the model itself is unsure.
const UNCERTAINTY_MARKERS: &[&str] = &[
    "i think",
    "maybe",
    "possibly",
    "might be",
    "could be",
    "not sure",
    "unclear",
    "uncertain",
    "probably",
    "seems like",
    "appears to",
];

/// Hand-rolled confidence estimate: `max(0.1, 1.0 - 0.1 * marker_count)`.
/// A placeholder for a real scorer — see DESIGN.md.
pub fn estimate_confidence(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let count = UNCERTAINTY_MARKERS
        .iter()
        .filter(|marker| lower.contains(*marker))
        .count() as f64;
    (1.0 - 0.1 * count).max(0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_answer_scores_near_one() {
        assert_eq!(estimate_confidence("the answer is 42"), 1.0);
    }

    #[test]
    fn hedged_answer_scores_lower() {
        let score = estimate_confidence("I think it might be 42, but I'm not sure");
        assert!(score < 1.0);
    }
}
