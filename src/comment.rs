//! Removes trailing `#…` comments from a non-recipe line.
//!
//! Walks the line tracking single/double quote state (not nestable with each other) and a
//! balanced-group depth for `(` / `{`. An unescaped `#` outside all quotes and groups terminates
//! the line. Recipe lines are never passed through this: a `#` inside a shell command is the
//! shell's business, not ours.

use crate::context::Context;
use crate::error::MakeError;

const COMMENT_CHAR: char = '#';

/// Strip a trailing comment from `line`, respecting quoting and paren/brace nesting.
pub fn strip_comment(line: &str, context: &Context) -> Result<String, MakeError> {
    let mut in_single = false;
    let mut in_double = false;
    let mut paren_depth: i32 = 0;
    let mut brace_depth: i32 = 0;
    let mut escaped = false;
    let mut end = line.len();

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        match c {
            '\\' => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '(' if !in_single && !in_double => paren_depth += 1,
            ')' if !in_single && !in_double => {
                paren_depth -= 1;
                if paren_depth < 0 {
                    return Err(MakeError::new(
                        "Mismatched closing parenthesis.",
                        context.clone(),
                    ));
                }
            }
            '{' if !in_single && !in_double => brace_depth += 1,
            '}' if !in_single && !in_double => {
                brace_depth -= 1;
                if brace_depth < 0 {
                    return Err(MakeError::new("Mismatched closing brace.", context.clone()));
                }
            }
            COMMENT_CHAR
                if !in_single && !in_double && paren_depth == 0 && brace_depth == 0 =>
            {
                end = i;
                break;
            }
            _ => {}
        }
    }

    Ok(line[..end].to_string())
}
