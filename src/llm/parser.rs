use crate::error::{Error, Result};
use crate::llm::provider::Relevances;

/// Decodes a scoring response into comment-id → relevance, rejecting any
/// value outside [0, 1]. The payload is expected to be a bare JSON object
/// but a fenced code block around it is tolerated.
pub fn parse_relevances(response: &str) -> Result<Relevances> {
    let json_str = extract_json(response)?;

    let relevances: Relevances = serde_json::from_str(&json_str)
        .map_err(|e| Error::MalformedResponse(format!("not an id-to-float mapping: {}", e)))?;

    for (id, value) in &relevances {
        if !(0.0..=1.0).contains(value) || !value.is_finite() {
            return Err(Error::MalformedResponse(format!(
                "relevance {} for comment {} outside [0, 1]",
                value, id
            )));
        }
    }

    Ok(relevances)
}

fn extract_json(text: &str) -> Result<String> {
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return Ok(text[start..start + end].trim().to_string());
        }
    }

    // Fall back to the first balanced object in the text
    if let Some(start) = text.find('{') {
        let mut depth = 0;
        let mut end = start;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, c) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match c {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }

        if depth == 0 && end > start {
            return Ok(text[start..end].to_string());
        }
    }

    Err(Error::MalformedResponse(
        "no JSON object found in response".to_string(),
    ))
}
