//! Text-level repair of chat replies that were asked for strict JSON but rarely deliver it.
//!
//! Every function here is a pure `&str -> String` (or slice) transformation. The rewrites
//! are driven by a small structural scanner that knows when it is inside a string literal
//! and which container it is in, so recipe prose that happens to contain `amount`, `Note:`
//! or braces is never touched.

const FENCE_JSON: &str = "```json";
const FENCE: &str = "```";
const NOTE_MARKER: &str = "Note:";
const AMOUNT_KEY: &str = "amount";
const RECIPES_KEY: &str = "\"recipes\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// Removes markdown code fences and any trailing `Note:` commentary.
pub fn strip_fences_and_trailer(raw: &str) -> String {
    let unfenced = raw.replace(FENCE_JSON, "").replace(FENCE, "");
    let cut = trailer_start(&unfenced).unwrap_or(unfenced.len());
    unfenced[..cut].trim().to_string()
}

/// Position of the first `Note:` that sits outside a string literal, scanning from the
/// first `{`. Without any `{` the first marker anywhere counts.
fn trailer_start(text: &str) -> Option<usize> {
    let Some(start) = text.find('{') else {
        return text.find(NOTE_MARKER);
    };

    let bytes = text.as_bytes();
    let mut in_string = false;
    let mut escaped = false;
    for i in start..bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if bytes[i..].starts_with(NOTE_MARKER.as_bytes()) {
            return Some(i);
        }
    }
    None
}

/// Quotes bare values the model leaves unquoted.
///
/// Text outside any object is copied as-is, so quotes in a preamble do not shift the scan.
/// Inside JSON objects only:
/// * an `amount` value that is not a string, object or array is captured up to the next
///   `,`, `]` or `}` and re-emitted as a string (`"amount": 3 cloves` -> `"amount": "3 cloves"`);
/// * any other value made of a number directly followed by a unit word becomes a single
///   string with one separating space (`"calories": 250kcal` -> `"calories": "250 kcal"`).
///
/// Anything else is copied verbatim, so valid JSON comes out unchanged.
pub fn repair_bare_values(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 32);
    let mut stack: Vec<Container> = Vec::new();
    let mut expect_key = false;
    let mut pending_key: Option<&str> = None;
    let mut i = 0;

    while i < bytes.len() {
        if stack.is_empty() && bytes[i] != b'{' {
            let prose_end = text[i..].find('{').map_or(bytes.len(), |offset| i + offset);
            out.push_str(&text[i..prose_end]);
            i = prose_end;
            continue;
        }
        match bytes[i] {
            b'"' => {
                let (end, terminated) = string_end(bytes, i);
                out.push_str(&text[i..end]);
                if expect_key && stack.last() == Some(&Container::Object) {
                    let inner_end = if terminated { end - 1 } else { end };
                    pending_key = Some(&text[i + 1..inner_end]);
                    expect_key = false;
                }
                i = end;
            }
            b'{' => {
                stack.push(Container::Object);
                expect_key = true;
                pending_key = None;
                out.push('{');
                i += 1;
            }
            b'[' => {
                stack.push(Container::Array);
                expect_key = false;
                pending_key = None;
                out.push('[');
                i += 1;
            }
            b'}' | b']' => {
                stack.pop();
                expect_key = false;
                pending_key = None;
                out.push(bytes[i] as char);
                i += 1;
            }
            b',' => {
                expect_key = stack.last() == Some(&Container::Object);
                pending_key = None;
                out.push(',');
                i += 1;
            }
            b':' => {
                out.push(':');
                i += 1;
                if let Some(key) = pending_key.take() {
                    i = rewrite_value(text, i, key, &mut out);
                }
            }
            _ => {
                let run_end = bytes[i..]
                    .iter()
                    .position(|b| matches!(b, b'"' | b'{' | b'}' | b'[' | b']' | b',' | b':'))
                    .map_or(bytes.len(), |offset| i + offset);
                out.push_str(&text[i..run_end]);
                i = run_end;
            }
        }
    }

    out
}

/// Handles the value that follows `key:` starting at `start`. Returns where scanning resumes.
fn rewrite_value(text: &str, start: usize, key: &str, out: &mut String) -> usize {
    let bytes = text.as_bytes();
    let value_start = skip_whitespace(bytes, start);
    out.push_str(&text[start..value_start]);

    let Some(&first) = bytes.get(value_start) else {
        return value_start;
    };
    if matches!(first, b'"' | b'{' | b'[') {
        return value_start;
    }

    if key == AMOUNT_KEY {
        let value_end = bytes[value_start..]
            .iter()
            .position(|b| matches!(b, b',' | b']' | b'}'))
            .map_or(bytes.len(), |offset| value_start + offset);
        let cleaned = text[value_start..value_end]
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'')
            .trim();
        push_json_string(out, cleaned);
        return value_end;
    }

    match unit_suffixed_number(bytes, value_start) {
        Some((number_end, unit_start, unit_end)) => {
            let quoted = format!(
                "{} {}",
                &text[value_start..number_end],
                &text[unit_start..unit_end]
            );
            push_json_string(out, &quoted);
            unit_end
        }
        None => value_start,
    }
}

/// Matches `digits[.digits]` followed by optional whitespace and an ASCII word that ends
/// on a word boundary. Returns `(number_end, unit_start, unit_end)`.
fn unit_suffixed_number(bytes: &[u8], start: usize) -> Option<(usize, usize, usize)> {
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == start {
        return None;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    let number_end = i;

    let unit_start = skip_whitespace(bytes, number_end);
    let mut unit_end = unit_start;
    while unit_end < bytes.len() && bytes[unit_end].is_ascii_alphabetic() {
        unit_end += 1;
    }
    if unit_end == unit_start {
        return None;
    }
    if bytes
        .get(unit_end)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
    {
        return None;
    }
    Some((number_end, unit_start, unit_end))
}

fn push_json_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// End of the string literal opening at `start` (one past the closing quote), and whether
/// a closing quote was found at all.
fn string_end(bytes: &[u8], start: usize) -> (usize, bool) {
    let mut escaped = false;
    for (offset, &b) in bytes[start + 1..].iter().enumerate() {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b'"' {
            return (start + 1 + offset + 1, true);
        }
    }
    (bytes.len(), false)
}

/// Finds the first `{...}` block that mentions the `"recipes"` key.
///
/// Text outside any object is prose: quotes there are not string delimiters. Each `{` is
/// matched to its closing brace by depth, ignoring braces inside string literals, so a
/// second JSON-ish block later in the reply is not swallowed. A `{` that never closes is
/// skipped and the search resumes at the next `{`. If no balanced block qualifies, the
/// span from the first unclosed `{` to the last `}` is returned (a truncated reply) and
/// the parser gets to say what is wrong with it.
pub fn isolate_recipes_block(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut first_unclosed: Option<usize> = None;
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        match matching_brace(bytes, start) {
            Some(end) => {
                let block = &text[start..=end];
                if block.contains(RECIPES_KEY) {
                    return Some(block);
                }
                search_from = end + 1;
            }
            None => {
                first_unclosed.get_or_insert(start);
                search_from = start + 1;
            }
        }
    }

    let start = first_unclosed?;
    let last = text.rfind('}')?;
    if last <= start {
        return None;
    }
    let block = &text[start..=last];
    block.contains(RECIPES_KEY).then_some(block)
}

/// Index of the `}` closing the object that opens at `start`.
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let (end, terminated) = string_end(bytes, i);
                if !terminated {
                    return None;
                }
                i = end;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_and_trailer() {
        let raw = "```json\n{\"recipes\":[]}\n```\nNote: enjoy!";
        assert_eq!(strip_fences_and_trailer(raw), "{\"recipes\":[]}");
    }

    #[test]
    fn test_note_inside_string_is_kept() {
        let raw = "{\"description\":\"Note: serve warm\"}\nNote: extra prose";
        assert_eq!(
            strip_fences_and_trailer(raw),
            "{\"description\":\"Note: serve warm\"}"
        );
    }

    #[test]
    fn test_note_without_json_cuts_to_end() {
        assert_eq!(strip_fences_and_trailer("Sorry. Note: no recipes"), "Sorry.");
    }

    #[test]
    fn test_amount_bare_words_are_quoted() {
        let text = r#"{"ingredients":[{"name":"garlic","amount": 3 cloves},{"name":"salt","amount":to taste}]}"#;
        let repaired = repair_bare_values(text);
        assert_eq!(
            repaired,
            r#"{"ingredients":[{"name":"garlic","amount": "3 cloves"},{"name":"salt","amount":"to taste"}]}"#
        );
    }

    #[test]
    fn test_amount_stray_quotes_are_trimmed() {
        let repaired = repair_bare_values(r#"{"amount": '200 ml' }"#);
        assert_eq!(repaired, r#"{"amount": "200 ml"}"#);
    }

    #[test]
    fn test_amount_plain_number_becomes_string() {
        assert_eq!(repair_bare_values(r#"{"amount": 2}"#), r#"{"amount": "2"}"#);
    }

    #[test]
    fn test_unit_suffixed_numbers_are_quoted() {
        let repaired = repair_bare_values(r#"{"calories": 250kcal, "fat": 12.5 g, "servings": 4}"#);
        assert_eq!(
            repaired,
            r#"{"calories": "250 kcal", "fat": "12.5 g", "servings": 4}"#
        );
    }

    #[test]
    fn test_exponent_numbers_are_left_alone() {
        assert_eq!(repair_bare_values(r#"{"big": 1e5}"#), r#"{"big": 1e5}"#);
    }

    #[test]
    fn test_strings_mentioning_amount_are_untouched() {
        let text = r#"{"description":"the \"amount\": 3 cups of joy, 15g of love","amount":"1 kg"}"#;
        assert_eq!(repair_bare_values(text), text);
    }

    #[test]
    fn test_valid_json_is_unchanged() {
        let text = r#"{"recipes":[{"title":"Soup","servings":"2","nutrition":{"calories":"200 kcal"},"steps":["a, b","c"]}]}"#;
        assert_eq!(repair_bare_values(text), text);
    }

    #[test]
    fn test_array_values_are_not_rewritten() {
        let text = r#"{"steps":[15 min]}"#;
        assert_eq!(repair_bare_values(text), text);
    }

    #[test]
    fn test_isolate_skips_unrelated_blocks() {
        let text = r#"Options {a} then {"recipes":[{"title":"x"}]} and {"other":1}"#;
        assert_eq!(
            isolate_recipes_block(text),
            Some(r#"{"recipes":[{"title":"x"}]}"#)
        );
    }

    #[test]
    fn test_isolate_ignores_braces_in_strings() {
        let text = r#"{"recipes":[{"title":"brace } inside"}]} trailing }"#;
        assert_eq!(
            isolate_recipes_block(text),
            Some(r#"{"recipes":[{"title":"brace } inside"}]}"#)
        );
    }

    #[test]
    fn test_isolate_truncated_reply_falls_back_to_last_brace() {
        let text = r#"{"recipes":[{"title":"x"}"#;
        assert_eq!(isolate_recipes_block(text), Some(r#"{"recipes":[{"title":"x"}"#));
    }

    #[test]
    fn test_odd_quote_in_preamble_is_prose() {
        let text = "A 12\" skillet works: {\"amount\": 3 cloves, \"fat\": 5g}";
        assert_eq!(
            repair_bare_values(text),
            "A 12\" skillet works: {\"amount\": \"3 cloves\", \"fat\": \"5 g\"}"
        );
        assert_eq!(
            isolate_recipes_block("Use a 12\" pan {\"recipes\":[]}"),
            Some("{\"recipes\":[]}")
        );
    }

    #[test]
    fn test_isolate_resumes_after_unclosed_brace() {
        let text = r#"Pick {one or two: {"recipes":[{"title":"x"}]}"#;
        assert_eq!(
            isolate_recipes_block(text),
            Some(r#"{"recipes":[{"title":"x"}]}"#)
        );
    }

    #[test]
    fn test_isolate_without_recipes_key() {
        assert_eq!(isolate_recipes_block(r#"{"dishes":[]}"#), None);
        assert_eq!(isolate_recipes_block("no json here"), None);
    }
}
