//! Fenced code extraction from oracle responses

const JAVA_FENCE: &str = "```java";
const FENCE: &str = "```";

/// Body of the first fenced block, preferring a ```java fence.
///
/// Returns `None` when there is no fence or the block is never closed.
#[must_use]
pub fn extract_code_block(response: &str) -> Option<String> {
    let open = response.find(JAVA_FENCE).or_else(|| response.find(FENCE))?;
    let after_open = &response[open..];
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];

    let close = body
        .match_indices(FENCE)
        .find(|(idx, _)| *idx == 0 || body[..*idx].ends_with('\n'))
        .map(|(idx, _)| idx)?;
    let code = body[..close].trim_end();
    if code.trim().is_empty() {
        return None;
    }
    Some(code.to_string())
}
