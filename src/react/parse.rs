//! Parses one LLM turn into a thought/action/actionInput step or a final
//! answer. Expects the classic ReAct text shape:
//!
//! ```text
//! Thought: <reasoning>
//! Action: <tool name>
//! Action Input: <json>
//! ```
//! or
//! ```text
//! Thought: <reasoning>
//! Final Answer: <answer>
//! ```

use serde_json::Value;

use crate::react::error::ReactError;

#[derive(Debug, Clone)]
pub enum ParsedStep {
    Action {
        thought: String,
        action: String,
        action_input: Value,
    },
    FinalAnswer {
        thought: String,
        answer: String,
    },
}

pub fn parse_step(text: &str) -> Result<ParsedStep, ReactError> {
    let thought = extract_field(text, "Thought").unwrap_or_default();

    if let Some(answer) = extract_field(text, "Final Answer") {
        return Ok(ParsedStep::FinalAnswer { thought, answer });
    }

    let action = extract_field(text, "Action").ok_or_else(|| {
        ReactError::ParsingError("no Action or Final Answer found in LLM output".to_string())
    })?;
    let action_input_raw = extract_field(text, "Action Input").unwrap_or_else(|| "{}".to_string());
    let action_input: Value = serde_json::from_str(action_input_raw.trim())
        .or_else(|_| serde_json::from_str(&format!("\"{}\"", action_input_raw.trim())))
        .map_err(|e| ReactError::ParsingError(format!("invalid Action Input JSON: {e}")))?;

    Ok(ParsedStep::Action {
        thought,
        action: action.trim().to_string(),
        action_input,
    })
}

/// Extracts the single-line (or until-next-field) value of `Field: value`.
fn extract_field(text: &str, field: &str) -> Option<String> {
    let marker = format!("{field}:");
    let start = text.find(&marker)? + marker.len();
    let rest = &text[start..];
    let field_names = ["Thought", "Action", "Action Input", "Final Answer"];
    let end = field_names
        .iter()
        .filter(|f| **f != field)
        .filter_map(|f| rest.find(&format!("\n{f}:")))
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_step() {
        let text = "Thought: I should add\nAction: adder\nAction Input: {\"a\":1,\"b\":2}";
        match parse_step(text).unwrap() {
            ParsedStep::Action {
                action,
                action_input,
                ..
            } => {
                assert_eq!(action, "adder");
                assert_eq!(action_input, serde_json::json!({"a": 1, "b": 2}));
            }
            ParsedStep::FinalAnswer { .. } => panic!("expected action"),
        }
    }

    #[test]
    fn parses_final_answer() {
        let text = "Thought: done\nFinal Answer: the answer is 3";
        match parse_step(text).unwrap() {
            ParsedStep::FinalAnswer { answer, .. } => assert_eq!(answer, "the answer is 3"),
            ParsedStep::Action { .. } => panic!("expected final answer"),
        }
    }

    #[test]
    fn missing_action_and_final_answer_is_parsing_error() {
        let err = parse_step("Thought: stuck").unwrap_err();
        assert!(matches!(err, ReactError::ParsingError(_)));
    }
}
