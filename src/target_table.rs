//! Collects parsed rules into lookup tables the resolver consumes: explicit targets (with
//! multi-definition merge semantics), pattern/suffix templates, and the special-target state
//! (`.PHONY`, `.SUFFIXES`, `.DEFAULT`).

use std::collections::{HashMap, HashSet};

use crate::context::Context;
use crate::error::MakeError;
use crate::rule::{Rule, RuleKind};

#[derive(Clone, Debug)]
pub struct ExplicitRule {
    pub prerequisites: Vec<String>,
    pub recipe: Vec<String>,
    pub context: Context,
}

#[derive(Default)]
pub struct TargetTable {
    explicit: HashMap<String, ExplicitRule>,
    pattern_rules: Vec<Rule>,
    suffix_rules: Vec<Rule>,
    phony: HashSet<String>,
    suffixes: Vec<String>,
    default_rule: Option<ExplicitRule>,
}

impl TargetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parsed rule. Multiple explicit definitions of the same target merge their
    /// prerequisites (order-preserving, deduplicated); the most recently inserted non-empty
    /// recipe wins. This is behaviorally equivalent to merging while walking the file in reverse
    /// (the grounding algorithm): whichever definition comes last in the file supplies the
    /// recipe, and every definition's prerequisites accumulate.
    pub fn insert(&mut self, rule: Rule) -> Result<(), MakeError> {
        match rule.kind {
            RuleKind::Pattern => {
                self.pattern_rules.push(rule);
                return Ok(());
            }
            RuleKind::Suffix => {
                self.suffix_rules.push(rule);
                return Ok(());
            }
            RuleKind::Special => return self.handle_special(rule),
            RuleKind::Explicit => {}
        }

        for target in rule.targets.clone() {
            match self.explicit.get_mut(&target) {
                None => {
                    self.explicit.insert(
                        target,
                        ExplicitRule {
                            prerequisites: rule.prerequisites.clone(),
                            recipe: rule.recipe.clone(),
                            context: rule.context.clone(),
                        },
                    );
                }
                Some(existing) => {
                    for p in &rule.prerequisites {
                        if !existing.prerequisites.contains(p) {
                            existing.prerequisites.push(p.clone());
                        }
                    }
                    if !rule.recipe.is_empty() {
                        existing.recipe = rule.recipe.clone();
                        existing.context = rule.context.clone();
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_special(&mut self, rule: Rule) -> Result<(), MakeError> {
        let name = rule.targets.first().cloned().unwrap_or_default();
        match name.as_str() {
            ".PHONY" => {
                self.phony.extend(rule.prerequisites);
            }
            ".SUFFIXES" => {
                if rule.prerequisites.is_empty() {
                    self.suffixes.clear();
                } else {
                    self.suffixes.extend(rule.prerequisites);
                }
            }
            ".POSIX" => {}
            ".DEFAULT" => {
                self.default_rule = Some(ExplicitRule {
                    prerequisites: rule.prerequisites,
                    recipe: rule.recipe,
                    context: rule.context,
                });
            }
            _ => {
                // An unrecognized special target (or a false-positive from the dotted-name
                // heuristic) is kept as an ordinary explicit rule rather than silently dropped.
                self.explicit.insert(
                    name,
                    ExplicitRule {
                        prerequisites: rule.prerequisites,
                        recipe: rule.recipe,
                        context: rule.context,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn is_phony(&self, target: &str) -> bool {
        self.phony.contains(target)
    }

    pub fn get_explicit(&self, target: &str) -> Option<&ExplicitRule> {
        self.explicit.get(target)
    }

    pub fn has_explicit(&self, target: &str) -> bool {
        self.explicit.contains_key(target)
    }

    pub fn pattern_rules(&self) -> &[Rule] {
        &self.pattern_rules
    }

    pub fn suffix_rules(&self) -> &[Rule] {
        &self.suffix_rules
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn default_rule(&self) -> Option<&ExplicitRule> {
        self.default_rule.as_ref()
    }

    pub fn explicit_targets(&self) -> impl Iterator<Item = &String> {
        self.explicit.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(targets: &[&str], prereqs: &[&str], recipe: &[&str]) -> Rule {
        Rule::new(
            targets.iter().map(|s| s.to_string()).collect(),
            prereqs.iter().map(|s| s.to_string()).collect(),
            recipe.iter().map(|s| s.to_string()).collect(),
            Context::new(),
        )
    }

    #[test]
    fn test_merge_prerequisites_last_recipe_wins() {
        let mut table = TargetTable::new();
        table
            .insert(rule(&["all"], &["a"], &["recipe one"]))
            .unwrap();
        table.insert(rule(&["all"], &["b"], &[])).unwrap();

        let merged = table.get_explicit("all").unwrap();
        assert_eq!(merged.prerequisites, vec!["a", "b"]);
        assert_eq!(merged.recipe, vec!["recipe one"]);

        table
            .insert(rule(&["all"], &[], &["recipe two"]))
            .unwrap();
        let merged = table.get_explicit("all").unwrap();
        assert_eq!(merged.recipe, vec!["recipe two"]);
    }

    #[test]
    fn test_phony_target() {
        let mut table = TargetTable::new();
        table.insert(rule(&[".PHONY"], &["clean"], &[])).unwrap();
        assert!(table.is_phony("clean"));
        assert!(!table.is_phony("all"));
    }

    #[test]
    fn test_suffixes_set_and_clear() {
        let mut table = TargetTable::new();
        table.insert(rule(&[".SUFFIXES"], &[".c", ".o"], &[])).unwrap();
        assert_eq!(table.suffixes(), &[".c".to_string(), ".o".to_string()]);
        table.insert(rule(&[".SUFFIXES"], &[], &[])).unwrap();
        assert!(table.suffixes().is_empty());
    }

    #[test]
    fn test_default_rule() {
        let mut table = TargetTable::new();
        table
            .insert(rule(&[".DEFAULT"], &[], &["echo fallback"]))
            .unwrap();
        assert_eq!(
            table.default_rule().unwrap().recipe,
            vec!["echo fallback"]
        );
    }

    #[test]
    fn test_pattern_and_suffix_rules_stored_separately() {
        let mut table = TargetTable::new();
        table.insert(rule(&["%.o"], &["%.c"], &[])).unwrap();
        table.insert(rule(&[".c.o"], &[], &[])).unwrap();
        assert_eq!(table.pattern_rules().len(), 1);
        assert_eq!(table.suffix_rules().len(), 1);
    }
}
