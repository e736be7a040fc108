//! Strict decoding of JSON arrays embedded in free-text model replies.

use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum ReplyError {
    #[error("no JSON array found in reply")]
    NoArray,
    #[error("invalid JSON array: {0}")]
    InvalidJson(serde_json::Error),
    #[error("array does not match the expected shape: {0}")]
    Schema(serde_json::Error),
}

/// Decode the first JSON array embedded in `reply` into `Vec<T>`.
///
/// Candidates are bracket-balanced substrings starting at each `[` in order of
/// appearance; the first one that parses as a JSON array is decoded strictly.
pub fn decode_array<T: DeserializeOwned>(reply: &str) -> Result<Vec<T>, ReplyError> {
    let mut last_err = None;
    for candidate in array_candidates(reply) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(v @ Value::Array(_)) => return serde_json::from_value(v).map_err(ReplyError::Schema),
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
    }
    Err(match last_err {
        Some(e) => ReplyError::InvalidJson(e),
        None => ReplyError::NoArray,
    })
}

/// Every balanced `[...]` substring, ordered by start position.
fn array_candidates(s: &str) -> impl Iterator<Item = &str> + '_ {
    s.char_indices()
        .filter(|&(_, ch)| ch == '[')
        .filter_map(move |(start, _)| balanced_end(&s[start..]).map(|end| &s[start..start + end]))
}

/// Byte length of the balanced bracket group opening at the start of `s`.
fn balanced_end(s: &str) -> Option<usize> {
    let mut in_str = false;
    let mut esc = false;
    let mut stack: Vec<char> = Vec::new();

    for (i, ch) in s.char_indices() {
        if in_str {
            if esc {
                esc = false;
            } else if ch == '\\' {
                esc = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }

        match ch {
            '"' => in_str = true,
            '{' | '[' => stack.push(ch),
            '}' | ']' => {
                let open = stack.pop()?;
                if (open == '{' && ch != '}') || (open == '[' && ch != ']') {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
