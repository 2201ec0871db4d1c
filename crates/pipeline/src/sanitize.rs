//! Strip echoed prompt payloads from formatter output.
//!
//! Models sometimes reproduce the `## draft(JSON)` / `## collected(JSON)`
//! sections of their prompt. A heading naming one of those payloads
//! (`draft`, `draft(JSON)`, `Collected (JSON)`, ... ignoring case and
//! whitespace) is removed together with the fenced block right after it
//! (blank lines in between are allowed). An unclosed fence runs to the next
//! heading or the end of the text. A matching heading without a fenced block
//! is left alone.

const PAYLOAD_HEADINGS: &[&str] = &["draft", "draft(json)", "collected", "collected(json)"];

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn is_payload_heading(line: &str) -> bool {
    if !is_heading(line) {
        return false;
    }
    let text: String = line
        .trim()
        .trim_start_matches('#')
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    let text = text.trim_end_matches(':');
    PAYLOAD_HEADINGS.iter().any(|h| *h == text)
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Index one past the end of the payload section starting at `start`, or
/// `None` when no fenced block follows the heading.
fn payload_section_end(lines: &[&str], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    if i >= lines.len() || !is_fence(lines[i]) {
        return None;
    }

    i += 1;
    while i < lines.len() {
        if is_fence(lines[i]) {
            return Some(i + 1);
        }
        if is_heading(lines[i]) {
            return Some(i);
        }
        i += 1;
    }
    Some(lines.len())
}

/// Remove leaked payload sections and trim the result.
pub fn sanitize(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        if is_payload_heading(lines[i])
            && let Some(end) = payload_section_end(&lines, i)
        {
            i = end;
            continue;
        }
        kept.push(lines[i]);
        i += 1;
    }

    kept.join("\n").trim().to_string()
}
