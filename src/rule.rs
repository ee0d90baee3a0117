//! A single parsed rule: the targets it builds, what it depends on, and the recipe that builds
//! them.

use crate::context::Context;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    Explicit,
    /// Exactly one `%` in each target, e.g. `%.o: %.c`.
    Pattern,
    /// `.src.dst:` form, gated on both suffixes being registered via `.SUFFIXES`.
    Suffix,
    /// `.PHONY`, `.SUFFIXES`, `.DEFAULT`, etc.
    Special,
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub targets: Vec<String>,
    pub prerequisites: Vec<String>,
    pub recipe: Vec<String>,
    pub context: Context,
    pub kind: RuleKind,
}

impl Rule {
    pub fn new(
        targets: Vec<String>,
        prerequisites: Vec<String>,
        recipe: Vec<String>,
        context: Context,
    ) -> Self {
        let kind = if targets.len() == 1 && targets[0].starts_with('.') && targets[0].contains('.')
        {
            classify_dotted(&targets[0])
        } else if targets.iter().any(|t| t.contains('%')) {
            RuleKind::Pattern
        } else {
            RuleKind::Explicit
        };

        Self {
            targets,
            prerequisites,
            recipe,
            context,
            kind,
        }
    }

    /// Whether this rule's single target is a pattern rule's `%` template.
    pub fn is_pattern(&self) -> bool {
        self.kind == RuleKind::Pattern && self.targets.len() == 1 && self.targets[0].contains('%')
    }

    /// Whether this rule's single target is a `.x.y` suffix-rule template.
    pub fn is_suffix(&self) -> bool {
        self.kind == RuleKind::Suffix
    }
}

/// A target like `.c.o` is a suffix rule only if it has exactly two dotted components after the
/// leading dot (i.e. two suffixes chained); anything else starting with `.` (`.PHONY`, `.DEFAULT`,
/// `.RECIPEPREFIX`, …) is a special target, classified by name elsewhere.
fn classify_dotted(name: &str) -> RuleKind {
    let rest = &name[1..];
    if rest.matches('.').count() == 1 && !rest.starts_with('.') {
        RuleKind::Suffix
    } else {
        RuleKind::Special
    }
}
