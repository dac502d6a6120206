//! Pulling JSON out of free model text.
//!
//! Completion models wrap their JSON in commentary and stray markup, so the
//! text is scanned for balanced `{ ... }` spans and each span is tried as JSON
//! in order of its opening brace.

use crate::types::{ToolCallRequest, ToolSelection};
use serde_json::Value;
use thiserror::Error;

/// Key the selection envelope must carry.
pub const TOOLS_KEY: &str = "toolsToCall";

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("the text did not include any valid JSON object")]
    NoValidJson,

    #[error("the JSON object did not include the key '{0}'")]
    MissingKey(String),

    #[error("malformed 'toolsToCall' envelope: {0}")]
    InvalidEnvelope(String),
}

/// Byte span of the balanced object opening at `start`, if it closes.
///
/// Braces inside string literals are ignored, escapes included.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Every balanced `{ ... }` span that parses as a JSON object, in order.
fn objects(text: &str) -> impl Iterator<Item = serde_json::Map<String, Value>> + '_ {
    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .filter_map(move |(start, _)| {
            let end = balanced_end(text, start)?;
            match serde_json::from_str(&text[start..end]) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            }
        })
}

/// The first JSON object embedded in `text`.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    objects(text)
        .next()
        .map(Value::Object)
        .ok_or(ExtractError::NoValidJson)
}

/// The first embedded object carrying `toolsToCall`, as a tool selection.
///
/// Objects without the key are skipped; if some parsed but none had it the
/// failure is `MissingKey`.
pub fn extract_tool_calls(text: &str) -> Result<ToolSelection, ExtractError> {
    let mut saw_object = false;
    for mut object in objects(text) {
        saw_object = true;
        if let Some(calls) = object.remove(TOOLS_KEY) {
            return parse_calls(calls).map(|tools_to_call| ToolSelection { tools_to_call });
        }
    }

    Err(if saw_object {
        ExtractError::MissingKey(TOOLS_KEY.into())
    } else {
        ExtractError::NoValidJson
    })
}

/// Items are `{"name": .., "input": ..}` objects; a bare string is a name.
fn parse_calls(calls: Value) -> Result<Vec<ToolCallRequest>, ExtractError> {
    let Value::Array(items) = calls else {
        return Err(ExtractError::InvalidEnvelope(format!(
            "expected a list, got {}",
            calls
        )));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(ToolCallRequest {
                name,
                input: Value::Null,
            }),
            Value::Object(_) => serde_json::from_value(item)
                .map_err(|e| ExtractError::InvalidEnvelope(e.to_string())),
            other => Err(ExtractError::InvalidEnvelope(format!(
                "unexpected tool call {}",
                other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    #[test]
    fn finds_object_inside_commentary() {
        let text = "Sure! Here you go:\n<response>\n{\"toolsToCall\": [{\"name\": \"GetDateTime\"}]}\n</response> hope that helps";
        let selection = extract_tool_calls(text).unwrap();
        assert_eq!(selection.tools_to_call.len(), 1);
        assert_eq!(selection.tools_to_call[0].name, "GetDateTime");
        assert!(selection.tools_to_call[0].input.is_null());
    }

    #[test]
    fn separate_objects_are_not_merged() {
        let text = r#"{"thought": "time"} and then {"toolsToCall": [{"name": "GetDateTime"}]}"#;
        assert_eq!(extract_json(text).unwrap(), json!({"thought": "time"}));
        let selection = extract_tool_calls(text).unwrap();
        assert_eq!(selection.tools_to_call[0].name, "GetDateTime");
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let text = r#"x {"toolsToCall": [{"name": "Echo", "input": "a } b \" { c"}]} y"#;
        let selection = extract_tool_calls(text).unwrap();
        assert_eq!(selection.tools_to_call[0].input, json!("a } b \" { c"));
    }

    #[test]
    fn nested_inputs_survive() {
        let text = r#"{"toolsToCall": [{"name": "SpotifyControl", "input": {"command": "setVolume", "query": "60%"}}, "ReadyToAnswer"]}"#;
        let selection = extract_tool_calls(text).unwrap();
        assert_eq!(
            selection.tools_to_call[0].input,
            json!({"command": "setVolume", "query": "60%"})
        );
        assert_eq!(selection.tools_to_call[1].name, "ReadyToAnswer");
    }

    #[test]
    fn failure_classes() {
        assert_eq!(
            extract_tool_calls("I think you want... {not json"),
            Err(ExtractError::NoValidJson)
        );
        assert_eq!(extract_json("no braces at all"), Err(ExtractError::NoValidJson));
        assert_eq!(
            extract_tool_calls(r#"{"tools": []}"#),
            Err(ExtractError::MissingKey("toolsToCall".into()))
        );
        assert!(matches!(
            extract_tool_calls(r#"{"toolsToCall": "GetDateTime"}"#),
            Err(ExtractError::InvalidEnvelope(_))
        ));
        assert!(matches!(
            extract_tool_calls(r#"{"toolsToCall": [42]}"#),
            Err(ExtractError::InvalidEnvelope(_))
        ));
    }

    #[test]
    fn unbalanced_closers_do_not_panic() {
        assert_eq!(extract_json("}}} { ] } {"), Err(ExtractError::NoValidJson));
        assert_eq!(extract_json("ünï {\"ö\": \"ß\"} çø"), Ok(json!({"ö": "ß"})));
    }

    fn noise(rng: &mut StdRng) -> String {
        const ALPHABET: &[char] = &[
            'a', 'Z', ' ', '\n', '.', ':', '{', '}', '"', '<', '>', '/', '[', ']', 'é',
        ];
        let len = rng.gen_range(0..40);
        (0..len)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
            .collect()
    }

    fn random_selection(rng: &mut StdRng) -> ToolSelection {
        const NAMES: &[&str] = &["GetDateTime", "ConfigManager", "SpotifyControl", "AppManager"];
        let calls = (0..rng.gen_range(1..4))
            .map(|i| ToolCallRequest {
                name: NAMES[rng.gen_range(0..NAMES.len())].to_string(),
                input: match rng.gen_range(0..3) {
                    0 => Value::Null,
                    1 => json!(format!("query {{{}}} \"quoted\"", i)),
                    _ => json!({"command": "set", "key": "k", "value": {"nested": [i, "}"]}}),
                },
            })
            .collect();
        ToolSelection {
            tools_to_call: calls,
        }
    }

    #[test]
    fn embedded_selections_are_recovered_from_noise() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let selection = random_selection(&mut rng);
            let text = format!(
                "{}{}{}",
                noise(&mut rng),
                serde_json::to_string(&selection).unwrap(),
                noise(&mut rng)
            );
            let extracted = extract_tool_calls(&text)
                .unwrap_or_else(|e| panic!("{} in {:?}", e, text));
            assert_eq!(extracted, selection, "{:?}", text);
        }
    }
}
