//! Turns a stream of logical lines into a `Vars` store and a `TargetTable`, the two structures the
//! `Resolver` and `Scheduler` need to do anything.
//!
//! This supersedes the inline recursive parser in `makefile.rs`: instead of expanding recipe text
//! eagerly (which makes automatic variables like `$@` impossible, since they don't exist until a
//! target is actually being built), recipe lines are kept raw and expanded by the scheduler at run
//! time. Everything else — rule/assignment line classification, conditional and include handling —
//! follows the same line-at-a-time shape the old parser used.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::comment::strip_comment;
use crate::conditional::ConditionalEvaluator;
use crate::context::Context;
use crate::error::MakeError;
use crate::expand::expand;
use crate::include::IncludeProcessor;
use crate::line_reader::{LineReader, LogicalLine};
use crate::rule::Rule;
use crate::target_table::TargetTable;
use crate::vars::{DefineOp, Vars};

const COMMENT_INDICATOR: char = '#';

/// Everything a parse pass produces, handed off to the `Resolver`/`Scheduler` pipeline.
pub struct ParsedMakefile {
    pub vars: Vars,
    pub table: TargetTable,
    pub default_target: Option<String>,
    /// `(pattern, dirlist)` pairs from `vpath` directives, applied to a `Resolver` by the caller.
    pub vpath_rules: Vec<(String, String)>,
}

struct PendingRule {
    targets: Vec<String>,
    prerequisites: Vec<String>,
    recipe: Vec<String>,
    context: Context,
}

pub struct MakefileParser {
    vars: Vars,
    table: TargetTable,
    conditionals: ConditionalEvaluator,
    pending: Option<PendingRule>,
    default_target: Option<String>,
    vpath_rules: Vec<(String, String)>,
}

enum LineShape {
    Assignment {
        name: String,
        op: DefineOp,
        rhs: String,
    },
    Rule {
        targets: String,
        rest: String,
    },
    Invalid,
}

impl MakefileParser {
    pub fn new(vars: Vars) -> Self {
        Self {
            vars,
            table: TargetTable::new(),
            conditionals: ConditionalEvaluator::new(),
            pending: None,
            default_target: None,
            vpath_rules: Vec::new(),
        }
    }

    /// Read and parse a makefile from disk.
    pub fn parse_file(path: &Path, vars: Vars) -> Result<ParsedMakefile, MakeError> {
        let file = File::open(path).map_err(|e| {
            MakeError::new(
                format!("Could not read makefile ({}).", e),
                Context::from(path.to_path_buf()),
            )
        })?;
        let lines = LineReader::read(BufReader::new(file)).map_err(|e| {
            MakeError::new(e.to_string(), Context::from(path.to_path_buf()))
        })?;
        Self::new(vars).parse_lines(lines, Some(path.to_path_buf()))
    }

    /// Parse an already-read stream of logical lines (used directly by tests, and internally once
    /// the file has been read off disk).
    pub fn parse_lines(
        mut self,
        lines: Vec<LogicalLine>,
        base_path: Option<PathBuf>,
    ) -> Result<ParsedMakefile, MakeError> {
        let mut queue: VecDeque<LogicalLine> = lines.into();

        while let Some(line) = queue.pop_front() {
            let path = line.source.clone().or_else(|| base_path.clone());
            let mut context = path.map(Context::from).unwrap_or_default();
            context.line_index = Some(line.line_number.saturating_sub(1));
            context.content = Some(line.content.clone());

            let spliced = self.process_line(&line.content, &context)?;
            for extra in spliced.into_iter().rev() {
                queue.push_front(extra);
            }
        }

        self.finalize_pending()?;

        Ok(ParsedMakefile {
            vars: self.vars,
            table: self.table,
            default_target: self.default_target,
            vpath_rules: self.vpath_rules,
        })
    }

    /// Handle one logical line, returning any lines an `include` directive spliced in.
    fn process_line(&mut self, line: &str, context: &Context) -> Result<Vec<LogicalLine>, MakeError> {
        let recipe_prefix = self.vars.get(".RECIPEPREFIX").value.clone();

        if self.pending.is_some() && line.starts_with(&recipe_prefix) {
            if self.conditionals.is_active() {
                let cmd = line[recipe_prefix.len()..].trim().to_string();
                if !cmd.is_empty() {
                    if let Some(pending) = &mut self.pending {
                        pending.recipe.push(cmd);
                    }
                }
            }
            return Ok(Vec::new());
        }

        self.finalize_pending()?;

        if ConditionalEvaluator::is_directive(line) {
            self.conditionals.handle(line, &self.vars, context)?;
            return Ok(Vec::new());
        }

        if !self.conditionals.is_active() {
            return Ok(Vec::new());
        }

        let stripped = strip_comment(line, context)?;
        let trimmed = stripped.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_INDICATOR) {
            return Ok(Vec::new());
        }

        if IncludeProcessor::is_directive(trimmed) {
            return IncludeProcessor::process(trimmed, &self.vars, context);
        }

        if trimmed == "export" || trimmed.starts_with("export ") {
            self.handle_export(trimmed[6..].trim(), context)?;
            return Ok(Vec::new());
        }
        if trimmed == "unexport" || trimmed.starts_with("unexport ") {
            self.handle_unexport(trimmed[8..].trim(), context)?;
            return Ok(Vec::new());
        }
        if trimmed == "vpath" || trimmed.starts_with("vpath ") {
            self.handle_vpath(trimmed[5..].trim(), context)?;
            return Ok(Vec::new());
        }

        match classify_line(trimmed) {
            LineShape::Assignment { name, op, rhs } => {
                self.apply_assignment(&name, &rhs, op, context)?;
            }
            LineShape::Rule { targets, rest } => {
                self.start_rule(&targets, &rest, context)?;
            }
            LineShape::Invalid => {
                return Err(MakeError::new("Invalid line type.", context.clone()));
            }
        }

        Ok(Vec::new())
    }

    fn apply_assignment(
        &mut self,
        name: &str,
        rhs: &str,
        op: DefineOp,
        context: &Context,
    ) -> Result<(), MakeError> {
        let expanded_name = expand(name, &self.vars).map_err(|e| MakeError::new(e, context.clone()))?;
        self.vars
            .define(expanded_name.trim(), rhs, op)
            .map_err(|e| MakeError::new(e, context.clone()))
    }

    fn start_rule(&mut self, targets: &str, rest: &str, context: &Context) -> Result<(), MakeError> {
        // A leading `:` after the first means a double-colon rule; we don't distinguish its
        // execution semantics from a normal rule, only merge prerequisites the same way.
        let rest = rest.strip_prefix(':').unwrap_or(rest);

        let (deps, inline_recipe) = match rest.split_once(';') {
            Some((d, r)) => (d, Some(r)),
            None => (rest, None),
        };

        let expanded_targets = expand(targets, &self.vars).map_err(|e| MakeError::new(e, context.clone()))?;
        let expanded_deps = expand(deps, &self.vars).map_err(|e| MakeError::new(e, context.clone()))?;

        let mut recipe = Vec::new();
        if let Some(r) = inline_recipe {
            recipe.push(r.trim_start().to_string());
        }

        self.pending = Some(PendingRule {
            targets: expanded_targets.split_whitespace().map(str::to_string).collect(),
            prerequisites: expanded_deps.split_whitespace().map(str::to_string).collect(),
            recipe,
            context: context.clone(),
        });
        Ok(())
    }

    fn finalize_pending(&mut self) -> Result<(), MakeError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };

        if pending.targets.len() == 1 && pending.targets[0] == ".EXPORT_ALL_VARIABLES" {
            self.vars.export_all_variables();
            return Ok(());
        }

        if self.default_target.is_none() {
            for target in &pending.targets {
                if !target.starts_with('.') {
                    self.default_target = Some(target.clone());
                    break;
                }
            }
        }

        let rule = Rule::new(pending.targets, pending.prerequisites, pending.recipe, pending.context);
        self.table.insert(rule)
    }

    fn handle_export(&mut self, rest: &str, context: &Context) -> Result<(), MakeError> {
        if rest.is_empty() {
            self.vars.export_all_variables();
            return Ok(());
        }

        match classify_line(rest) {
            LineShape::Assignment { name, op, rhs } => {
                self.apply_assignment(&name, &rhs, op, context)?;
                self.vars
                    .export(name.trim())
                    .map_err(|e| MakeError::new(e, context.clone()))?;
            }
            _ => {
                let expanded = expand(rest, &self.vars).map_err(|e| MakeError::new(e, context.clone()))?;
                for name in expanded.split_whitespace() {
                    self.vars
                        .export(name)
                        .map_err(|e| MakeError::new(e, context.clone()))?;
                }
            }
        }
        Ok(())
    }

    fn handle_unexport(&mut self, rest: &str, context: &Context) -> Result<(), MakeError> {
        let expanded = expand(rest, &self.vars).map_err(|e| MakeError::new(e, context.clone()))?;
        for name in expanded.split_whitespace() {
            self.vars.unexport(name);
        }
        Ok(())
    }

    fn handle_vpath(&mut self, rest: &str, context: &Context) -> Result<(), MakeError> {
        let expanded = expand(rest, &self.vars).map_err(|e| MakeError::new(e, context.clone()))?;
        let expanded = expanded.trim();
        if expanded.is_empty() {
            self.vpath_rules.clear();
            return Ok(());
        }
        let (pattern, dirs) = expanded
            .split_once(char::is_whitespace)
            .unwrap_or((expanded, ""));
        self.vpath_rules.push((pattern.to_string(), dirs.trim().to_string()));
        Ok(())
    }
}

/// Classify a non-directive, non-comment line as a macro assignment or a rule definition,
/// scanning left to right for the earliest assignment operator (`:=`, `?=`, `+=`, `=`) that
/// appears before any bare rule-separator `:`.
fn classify_line(line: &str) -> LineShape {
    let mut first_colon: Option<usize> = None;

    for (i, c) in line.char_indices() {
        if first_colon.is_none() && line[i..].starts_with(":=") {
            return LineShape::Assignment {
                name: line[..i].trim().to_string(),
                op: DefineOp::AssignImmediate,
                rhs: line[i + 2..].trim_start().to_string(),
            };
        }

        if c == ':' {
            if first_colon.is_none() {
                first_colon = Some(i);
            }
            continue;
        }

        if first_colon.is_none() {
            if line[i..].starts_with("?=") {
                return LineShape::Assignment {
                    name: line[..i].trim().to_string(),
                    op: DefineOp::AssignIfAbsent,
                    rhs: line[i + 2..].trim_start().to_string(),
                };
            }
            if line[i..].starts_with("+=") {
                return LineShape::Assignment {
                    name: line[..i].trim().to_string(),
                    op: DefineOp::AssignAppend,
                    rhs: line[i + 2..].trim_start().to_string(),
                };
            }
            if c == '=' {
                return LineShape::Assignment {
                    name: line[..i].trim().to_string(),
                    op: DefineOp::Assign,
                    rhs: line[i + 1..].trim_start().to_string(),
                };
            }
        }
    }

    match first_colon {
        Some(idx) => LineShape::Rule {
            targets: line[..idx].to_string(),
            rest: line[idx + 1..].to_string(),
        },
        None => LineShape::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParsedMakefile {
        let lines = LineReader::read(std::io::BufReader::new(src.as_bytes())).unwrap();
        MakefileParser::new(Vars::new([])).parse_lines(lines, None).unwrap()
    }

    #[test]
    fn test_simple_rule_and_recipe() {
        let parsed = parse("all: a.txt\n\techo hi\n");
        let rule = parsed.table.get_explicit("all").unwrap();
        assert_eq!(rule.prerequisites, vec!["a.txt"]);
        assert_eq!(rule.recipe, vec!["echo hi"]);
        assert_eq!(parsed.default_target, Some("all".to_string()));
    }

    #[test]
    fn test_deferred_vs_immediate_assignment() {
        let parsed = parse("B = base\nA = $(B)\nC := $(B)\nB = changed\n");
        assert_eq!(parsed.vars.get("A").value, "$(B)");
        assert_eq!(expand(&parsed.vars.get("A").value, &parsed.vars).unwrap(), "changed");
        assert_eq!(parsed.vars.get("C").value, "base");
    }

    #[test]
    fn test_append_and_if_absent() {
        let parsed = parse("A = one\nA += two\nA ?= three\n");
        assert_eq!(parsed.vars.get("A").value, "one two");
    }

    #[test]
    fn test_conditional_skips_inactive_branch() {
        let parsed = parse("ifeq (a,b)\nFOO = yes\nelse\nFOO = no\nendif\n");
        assert_eq!(parsed.vars.get("FOO").value, "no");
    }

    #[test]
    fn test_phony_and_pattern_rules_recorded() {
        let parsed = parse(".PHONY: clean\nclean:\n\techo clean\n%.o: %.c\n\techo compile\n");
        assert!(parsed.table.is_phony("clean"));
        assert_eq!(parsed.table.pattern_rules().len(), 1);
    }

    #[test]
    fn test_export_bare_name() {
        let parsed = parse("A = 1\nexport A\n");
        assert!(parsed.vars.get("A").exported);
    }

    #[test]
    fn test_export_all_variables_target() {
        let parsed = parse(".EXPORT_ALL_VARIABLES:\nA = 1\nB = 2\n");
        let env = parsed.vars.exported_environment().unwrap();
        assert_eq!(env.get("A"), Some(&"1".to_string()));
    }

    #[test]
    fn test_vpath_directive_recorded() {
        let parsed = parse("vpath %.c src:lib\n");
        assert_eq!(parsed.vpath_rules, vec![("%.c".to_string(), "src:lib".to_string())]);
    }

    #[test]
    fn test_inline_recipe_after_semicolon() {
        let parsed = parse("all: ; echo inline\n");
        let rule = parsed.table.get_explicit("all").unwrap();
        assert_eq!(rule.recipe, vec!["echo inline"]);
    }

    #[test]
    fn test_assignment_with_colon_in_value_is_not_misparsed_as_rule() {
        // `=` appears before any bare rule-separator `:`, so this is a macro assignment even
        // though the value itself contains a colon.
        let parsed = parse("URL = http://example.com\n");
        assert_eq!(parsed.vars.get("URL").value, "http://example.com");
    }
}
