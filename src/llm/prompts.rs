use serde::Serialize;

use crate::error::Result;

/// One comment in the shared-context block of the plain prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ContextComment {
    pub id: u64,
    pub comment: String,
    pub author: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentToScore {
    pub id: u64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewCommentToScore {
    pub id: u64,
    pub comment: String,
    #[serde(rename = "diffHunk", skip_serializing_if = "Option::is_none")]
    pub diff_hunk: Option<String>,
}

pub fn comment_prompt(
    specification: &str,
    comments: &[CommentToScore],
    all_comments: &[ContextComment],
) -> Result<String> {
    Ok(format!(
        r#"Instruction:
Start by thoroughly reading all comments and retaining their content for the evaluation.

OUTPUT FORMAT:
Provide a JSON object with the format: {{ID: CONNECTION_SCORE}} for each record in the evaluation section.
The CONNECTION_SCORE should reflect the average relevance based on all comments, title, and body.

GLOBAL CONTEXT:
Specification
"{specification}"

ALL COMMENTS:
{all}

IMPORTANT CONTEXT:
Consider all comments when evaluating connections. Relevant comments may appear before or after the comment being evaluated, so examine all of them closely.

START EVALUATING:
{subset}

POST EVALUATION:
Provide only the connection scores as floating-point values indicating the relevance of each comment based on its connection to the overall context.

SCORING CRITERIA:
Assign scores from 0 to 1, 0: Not related (e.g., spam), 1: Highly relevant (e.g., solutions, bugs)
Consider the context of all comments; even minor details may be significant for resolving the issue. If a comment is unrelated to all comments, title, or issue specification, assign a score of 0.

OUTPUT:
Return a JSON object containing the ID and the connection score for each evaluated comment. The number of entries in the JSON response must match exactly {count}.
"#,
        specification = specification,
        all = serde_json::to_string_pretty(all_comments)?,
        subset = serde_json::to_string_pretty(comments)?,
        count = comments.len(),
    ))
}

pub fn review_comment_prompt(
    specification: &str,
    comments: &[ReviewCommentToScore],
) -> Result<String> {
    #[derive(Serialize)]
    struct Payload<'a> {
        specification: &'a str,
        comments: &'a [ReviewCommentToScore],
    }

    let payload = serde_json::to_string(&Payload {
        specification,
        comments,
    })?;

    Ok(format!(
        "I need to evaluate the value of a GitHub contributor's comments in a pull request. \
Some of these comments are code review comments, and some are general suggestions or a part of \
the discussion. I'm interested in how much each comment helps to solve the GitHub issue and \
improve code quality. Please provide a float between 0 and 1 to represent the value of each \
comment. A score of 1 indicates that the comment is very valuable and significantly improves \
the submitted solution and code quality, whereas a score of 0 indicates a negative or zero \
impact. A stringified JSON is given below that contains the specification of the GitHub issue, \
and comments by different contributors. The property \"diffHunk\" presents the chunk of code \
being addressed for a possible change in a code review comment.\n\n```\n{payload}\n```\n\n\n\
To what degree are each of the comments valuable? Please reply with ONLY a JSON where each key \
is the comment ID given in JSON above, and the value is a float number between 0 and 1 \
corresponding to the comment. The float number should represent the value of the comment for \
improving the issue solution and code quality. The total number of properties in your JSON \
response should equal exactly {count}.",
        payload = payload,
        count = comments.len(),
    ))
}

/// A response shaped like the true one, used to bound the output tokens the
/// scoring call may spend.
pub fn placeholder_response(ids: impl IntoIterator<Item = u64>) -> String {
    let map: serde_json::Map<String, serde_json::Value> = ids
        .into_iter()
        .map(|id| (id.to_string(), serde_json::json!(0.5)))
        .collect();
    serde_json::to_string_pretty(&serde_json::Value::Object(map)).unwrap_or_default()
}

// Rough estimate: ~4 characters per token
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len() / 4) as u32
}

pub fn output_token_ceiling(placeholder: &str, limit: u32) -> u32 {
    estimate_tokens(placeholder).min(limit).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prompt_embeds_subset_and_count() {
        let subset = vec![CommentToScore {
            id: 11,
            comment: "I can reproduce this on main".to_string(),
        }];
        let context = vec![ContextComment {
            id: 11,
            comment: "I can reproduce this on main".to_string(),
            author: "carol".to_string(),
        }];
        let prompt = comment_prompt("Crash on empty input", &subset, &context).unwrap();
        assert!(prompt.contains("Crash on empty input"));
        assert!(prompt.contains("\"id\": 11"));
        assert!(prompt.contains("must match exactly 1"));
    }

    #[test]
    fn review_prompt_carries_diff_hunk() {
        let subset = vec![ReviewCommentToScore {
            id: 21,
            comment: "This unwrap can panic".to_string(),
            diff_hunk: Some("@@ -1,3 +1,3 @@".to_string()),
        }];
        let prompt = review_comment_prompt("Crash on empty input", &subset).unwrap();
        assert!(prompt.contains("\"diffHunk\":\"@@ -1,3 +1,3 @@\""));
        assert!(prompt.contains("exactly 1"));
    }

    #[test]
    fn token_ceiling_clamps_to_limit() {
        let placeholder = placeholder_response((0..10_000).map(|i| i as u64));
        assert_eq!(output_token_ceiling(&placeholder, 16_384), 16_384);

        let small = placeholder_response([1, 2, 3]);
        let ceiling = output_token_ceiling(&small, 16_384);
        assert!(ceiling < 100);
        assert!(ceiling >= 1);
    }
}
