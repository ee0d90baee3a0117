//! Evaluates `ifeq`/`ifneq`/`ifdef`/`ifndef`/`else`/`endif` directives and tracks, for any
//! given line, whether it falls inside an active (taken) branch.
//!
//! This does not filter the line stream itself — it is consulted by the parser one line at a
//! time, since conditionals must see macro values as they stand at the point the directive is
//! reached, not after the whole file is read.

use crate::context::Context;
use crate::error::MakeError;
use crate::vars::Vars;

struct Frame {
    /// Whether lines under the current branch of this `if`/`else if`/`else` chain are active.
    active: bool,
    /// Whether some branch of this chain has already been taken (further `else` clauses in the
    /// same chain are then forced inactive even if their own condition would be true).
    satisfied: bool,
}

#[derive(Default)]
pub struct ConditionalEvaluator {
    stack: Vec<Frame>,
}

impl ConditionalEvaluator {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Whether a line at the current point in the file should be processed at all: every
    /// enclosing `if` frame must be in its active branch.
    pub fn is_active(&self) -> bool {
        self.stack.iter().all(|f| f.active)
    }

    pub fn is_directive(line: &str) -> bool {
        let t = line.trim_start();
        for kw in ["ifeq", "ifneq", "ifdef", "ifndef", "else", "endif"] {
            if t == kw || t.starts_with(&format!("{} ", kw)) || t.starts_with(&format!("{}(", kw))
            {
                return true;
            }
        }
        false
    }

    /// Process one directive line, updating internal nesting state. `vars` is used to evaluate
    /// `ifeq`/`ifdef` conditions against the macro values known so far.
    pub fn handle(&mut self, line: &str, vars: &Vars, context: &Context) -> Result<(), MakeError> {
        let trimmed = line.trim();

        if trimmed == "endif" {
            self.stack
                .pop()
                .ok_or_else(|| MakeError::new("endif without matching if", context.clone()))?;
            return Ok(());
        }

        if trimmed == "else" || trimmed.starts_with("else ") {
            let rest = trimmed.strip_prefix("else").unwrap().trim();
            return self.handle_else(rest, vars, context);
        }

        let active = Self::eval_condition(trimmed, vars, context)?;
        self.stack.push(Frame {
            active,
            satisfied: active,
        });
        Ok(())
    }

    fn handle_else(&mut self, rest: &str, vars: &Vars, context: &Context) -> Result<(), MakeError> {
        let satisfied_already = {
            let frame = self
                .stack
                .last()
                .ok_or_else(|| MakeError::new("else without matching if", context.clone()))?;
            frame.satisfied
        };

        let new_active = if satisfied_already {
            false
        } else if rest.is_empty() {
            true
        } else {
            Self::eval_condition(rest, vars, context)?
        };

        let frame = self.stack.last_mut().unwrap();
        frame.active = new_active;
        frame.satisfied = frame.satisfied || new_active;
        Ok(())
    }

    fn eval_condition(text: &str, vars: &Vars, context: &Context) -> Result<bool, MakeError> {
        if let Some(rest) = text.strip_prefix("ifeq") {
            Self::eval_eq(rest, vars, context)
        } else if let Some(rest) = text.strip_prefix("ifneq") {
            Ok(!Self::eval_eq(rest, vars, context)?)
        } else if let Some(rest) = text.strip_prefix("ifdef") {
            Ok(vars.is_defined(rest.trim()))
        } else if let Some(rest) = text.strip_prefix("ifndef") {
            Ok(!vars.is_defined(rest.trim()))
        } else {
            Err(MakeError::new(
                format!("Unrecognized conditional directive: {}", text),
                context.clone(),
            ))
        }
    }

    /// Parse and evaluate the argument of `ifeq`/`ifneq`: either `(A,B)` or `"A" "B"` (or `'A'
    /// 'B'`), expanding both sides before comparing.
    fn eval_eq(args: &str, vars: &Vars, context: &Context) -> Result<bool, MakeError> {
        let trimmed = args.trim();
        let (left, right) = if let Some(inner) = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
        {
            split_top_level_comma(inner, context)?
        } else {
            split_quoted_pair(trimmed, context)?
        };

        let left = crate::expand::expand(&left, vars)
            .map_err(|e| MakeError::new(e, context.clone()))?;
        let right = crate::expand::expand(&right, vars)
            .map_err(|e| MakeError::new(e, context.clone()))?;
        Ok(left.trim() == right.trim())
    }
}

fn split_top_level_comma(s: &str, context: &Context) -> Result<(String, String), MakeError> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                return Ok((s[..i].trim().to_string(), s[i + 1..].trim().to_string()));
            }
            _ => {}
        }
    }
    Err(MakeError::new(
        format!("ifeq/ifneq missing comma in: ({})", s),
        context.clone(),
    ))
}

fn split_quoted_pair(s: &str, context: &Context) -> Result<(String, String), MakeError> {
    let parts: Vec<&str> = s
        .split(|c| c == '"' || c == '\'')
        .filter(|p| !p.trim().is_empty())
        .collect();
    if parts.len() != 2 {
        return Err(MakeError::new(
            format!("ifeq/ifneq expected two quoted arguments in: {}", s),
            context.clone(),
        ));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
