//! Exclusion rules: drop inputs whose path matches a user regex.

use crate::command::{InputExclusion, InputType};
use regex::Regex;
use std::path::Path;
use tracing::warn;

/// Whether `path` is excluded by any rule whose kind is `Unspecified` or
/// equals `input_type`. Malformed regexes never match; they are reported at
/// `warn` and otherwise ignored.
pub fn should_exclude(path: &Path, input_type: InputType, exclusions: &[InputExclusion]) -> bool {
    let path_str = path.to_string_lossy();
    for rule in exclusions {
        if rule.input_type != InputType::Unspecified && rule.input_type != input_type {
            continue;
        }
        match Regex::new(&rule.regex) {
            Ok(re) => {
                if re.is_match(&path_str) {
                    return true;
                }
            }
            Err(e) => {
                warn!(regex = %rule.regex, error = %e, "ignoring malformed exclusion regex");
            }
        }
    }
    false
}
