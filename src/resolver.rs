//! Given a goal target and the parsed `TargetTable`, decides which targets must be rebuilt,
//! synthesizing pattern/suffix rules on demand and searching `VPATH`/`vpath` directories for
//! prerequisites that aren't in the current directory.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::context::Context;
use crate::error::MakeError;
use crate::makefile::opts::Opts;
use crate::target_table::TargetTable;

#[derive(Clone, Debug)]
pub struct ResolvedTarget {
    pub name: String,
    pub concrete_prereqs: Vec<String>,
    pub recipe: Vec<String>,
    pub phony: bool,
    pub mtime: Option<SystemTime>,
    pub exists_on_disk: bool,
    pub must_build: bool,
}

pub struct Resolver<'a> {
    table: &'a TargetTable,
    opts: &'a Opts,
    search_path: Vec<PathBuf>,
    vpath_rules: Vec<(String, Vec<PathBuf>)>,
    visiting: HashSet<String>,
    done: HashMap<String, ResolvedTarget>,
}

impl<'a> Resolver<'a> {
    pub fn new(table: &'a TargetTable, opts: &'a Opts) -> Self {
        Self {
            table,
            opts,
            search_path: Vec::new(),
            vpath_rules: Vec::new(),
            visiting: HashSet::new(),
            done: HashMap::new(),
        }
    }

    /// Set the search path from a `VPATH` macro assignment.
    pub fn set_vpath(&mut self, value: &str) {
        self.search_path = split_path_list(value);
    }

    /// Register a `vpath PATTERN DIRS` directive.
    pub fn add_vpath_rule(&mut self, pattern: &str, dirs: &str) {
        self.vpath_rules
            .push((pattern.to_string(), split_path_list(dirs)));
    }

    /// Every target resolved so far (the goal passed to `resolve` plus everything it transitively
    /// depended on). Used by the scheduler to build its dependency graph without re-walking rules.
    pub fn all_resolved(&self) -> &HashMap<String, ResolvedTarget> {
        &self.done
    }

    pub fn resolve(&mut self, goal: &str) -> Result<ResolvedTarget, MakeError> {
        if let Some(done) = self.done.get(goal) {
            return Ok(done.clone());
        }

        if !self.visiting.insert(goal.to_string()) {
            return Err(MakeError::new(
                format!("Circular dependency detected involving target '{}'", goal),
                Context::new(),
            ));
        }

        let result = self.resolve_inner(goal);
        self.visiting.remove(goal);

        let resolved = result?;
        self.done.insert(goal.to_string(), resolved.clone());
        Ok(resolved)
    }

    fn resolve_inner(&mut self, goal: &str) -> Result<ResolvedTarget, MakeError> {
        let (prerequisites, recipe) = self.rule_for(goal)?;
        let phony = self.table.is_phony(goal);

        let mut concrete_prereqs = Vec::with_capacity(prerequisites.len());
        let mut any_prereq_phony = false;
        let mut any_prereq_must_build = false;
        let mut newest_prereq_mtime: Option<SystemTime> = None;

        for prereq in &prerequisites {
            let resolved = self.resolve(prereq)?;
            any_prereq_phony |= resolved.phony;
            any_prereq_must_build |= resolved.must_build;
            if let Some(t) = resolved.mtime {
                newest_prereq_mtime = Some(newest_prereq_mtime.map_or(t, |cur| cur.max(t)));
            }
            concrete_prereqs.push(resolved.name);
        }

        let found = self.search(goal);
        let exists_on_disk = found.is_some();
        let mtime = found.as_ref().and_then(|p| self.mtime_of(p));

        let stale = match (mtime, newest_prereq_mtime) {
            (Some(target_time), Some(prereq_time)) => prereq_time >= target_time,
            (None, _) => true,
            (Some(_), None) => false,
        };

        // `-o FILE`/`--old-file` means: never run this target's own recipe, but it can still look
        // very old to anything that depends on it (via `mtime_of` forcing `UNIX_EPOCH`).
        let forced_old = self.opts.old_file.iter().any(|f| f == goal);

        let must_build = !forced_old
            && (self.opts.always_make
                || phony
                || !exists_on_disk
                || any_prereq_phony
                || any_prereq_must_build
                || stale);

        Ok(ResolvedTarget {
            name: goal.to_string(),
            concrete_prereqs,
            recipe,
            phony,
            mtime,
            exists_on_disk,
            must_build,
        })
    }

    /// Find the (prerequisites, recipe) pair for `goal`: explicit rule, else a synthesized
    /// pattern/suffix rule, else a bare source file, else `.DEFAULT`.
    fn rule_for(&self, goal: &str) -> Result<(Vec<String>, Vec<String>), MakeError> {
        if let Some(explicit) = self.table.get_explicit(goal) {
            return Ok((explicit.prerequisites.clone(), explicit.recipe.clone()));
        }

        for pattern_rule in self.table.pattern_rules() {
            let target_pattern = &pattern_rule.targets[0];
            if let Some(stem) = pattern_match(target_pattern, goal) {
                let prerequisites = pattern_rule
                    .prerequisites
                    .iter()
                    .map(|p| p.replacen('%', &stem, 1))
                    .collect();
                return Ok((prerequisites, pattern_rule.recipe.clone()));
            }
        }

        if !self.table.suffixes().is_empty() {
            for suffix_rule in self.table.suffix_rules() {
                let name = &suffix_rule.targets[0];
                if let Some((src_suffix, dst_suffix)) = split_suffix_pair(name) {
                    let registered = |s: &str| self.table.suffixes().iter().any(|x| x == s);
                    if goal.ends_with(&dst_suffix) && registered(&dst_suffix) && registered(&src_suffix) {
                        let stem = &goal[..goal.len() - dst_suffix.len()];
                        let source = format!("{}{}", stem, src_suffix);
                        if self.search(&source).is_some() {
                            return Ok((vec![source], suffix_rule.recipe.clone()));
                        }
                    }
                }
            }
        }

        if self.search(goal).is_some() {
            return Ok((vec![], vec![]));
        }

        if let Some(default) = self.table.default_rule() {
            return Ok((default.prerequisites.clone(), default.recipe.clone()));
        }

        Err(MakeError::new(
            format!("No rule to make target '{}'", goal),
            Context::new(),
        ))
    }

    /// Search the current directory, then any `vpath` rule matching `name`, then the generic
    /// `VPATH` list, for a file named `name`.
    fn search(&self, name: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(name);
        if direct.exists() {
            return Some(direct);
        }

        for (pattern, dirs) in &self.vpath_rules {
            if pattern_match(pattern, name).is_some() || pattern == name {
                for dir in dirs {
                    let candidate = dir.join(name);
                    if candidate.exists() {
                        return Some(candidate);
                    }
                }
            }
        }

        for dir in &self.search_path {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        None
    }

    fn mtime_of(&self, path: &Path) -> Option<SystemTime> {
        let display = path.to_string_lossy();
        if self.opts.old_file.iter().any(|f| f.as_str() == display) {
            return Some(SystemTime::UNIX_EPOCH);
        }
        if self.opts.new_file.iter().any(|f| f.as_str() == display) {
            return Some(SystemTime::now() + Duration::from_secs(365 * 24 * 3600));
        }
        std::fs::metadata(path).ok()?.modified().ok()
    }
}

/// Split a `VPATH`-style search path: try `;` first, then `:`, then whitespace, using the first
/// separator that yields more than one segment. Documented as surprising on Windows paths
/// containing `:` — an explicit separator setting would resolve that, but isn't implemented here.
fn split_path_list(value: &str) -> Vec<PathBuf> {
    for sep in [';', ':'] {
        let parts: Vec<&str> = value.split(sep).filter(|s| !s.is_empty()).collect();
        if parts.len() > 1 {
            return parts.into_iter().map(PathBuf::from).collect();
        }
    }
    value.split_whitespace().map(PathBuf::from).collect()
}

fn pattern_match(pattern: &str, word: &str) -> Option<String> {
    let (prefix, suffix) = pattern.split_once('%')?;
    if word.len() < prefix.len() + suffix.len() {
        return None;
    }
    if !word.starts_with(prefix) || !word.ends_with(suffix) {
        return None;
    }
    Some(word[prefix.len()..word.len() - suffix.len()].to_string())
}

/// Split a suffix-rule name like `.c.o` into (`.c`, `.o`).
fn split_suffix_pair(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix('.')?;
    let (src, dst) = rest.split_once('.')?;
    Some((format!(".{}", src), format!(".{}", dst)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;
    use std::fs;

    fn explicit(targets: &[&str], prereqs: &[&str], recipe: &[&str]) -> Rule {
        Rule::new(
            targets.iter().map(|s| s.to_string()).collect(),
            prereqs.iter().map(|s| s.to_string()).collect(),
            recipe.iter().map(|s| s.to_string()).collect(),
            Context::new(),
        )
    }

    #[test]
    fn test_phony_always_must_build() {
        let mut table = TargetTable::new();
        table.insert(explicit(&[".PHONY"], &["clean"], &[])).unwrap();
        table.insert(explicit(&["clean"], &[], &["echo cleaned"])).unwrap();
        let opts = Opts::default();
        let mut resolver = Resolver::new(&table, &opts);
        let resolved = resolver.resolve("clean").unwrap();
        assert!(resolved.must_build);
    }

    #[test]
    fn test_missing_rule_and_missing_file_errors() {
        let table = TargetTable::new();
        let opts = Opts::default();
        let mut resolver = Resolver::new(&table, &opts);
        assert!(resolver.resolve("nonexistent-target-xyz").is_err());
    }

    #[test]
    fn test_cycle_detection() {
        let mut table = TargetTable::new();
        table.insert(explicit(&["a"], &["b"], &[])).unwrap();
        table.insert(explicit(&["b"], &["a"], &[])).unwrap();
        let opts = Opts::default();
        let mut resolver = Resolver::new(&table, &opts);
        assert!(resolver.resolve("a").is_err());
    }

    #[test]
    fn test_pattern_rule_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        fs::write("a.c", "").unwrap();

        let mut table = TargetTable::new();
        table.insert(explicit(&["%.o"], &["%.c"], &["compile"])).unwrap();
        let opts = Opts::default();
        let mut resolver = Resolver::new(&table, &opts);
        let resolved = resolver.resolve("a.o").unwrap();
        assert_eq!(resolved.concrete_prereqs, vec!["a.c"]);
        assert_eq!(resolved.recipe, vec!["compile"]);

        std::env::set_current_dir(cwd).unwrap();
    }

    #[test]
    fn test_suffix_rule_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        fs::write("a.c", "").unwrap();

        let mut table = TargetTable::new();
        table
            .insert(explicit(&[".SUFFIXES"], &[".c", ".o"], &[]))
            .unwrap();
        table.insert(explicit(&[".c.o"], &[], &["compile"])).unwrap();
        let opts = Opts::default();
        let mut resolver = Resolver::new(&table, &opts);
        let resolved = resolver.resolve("a.o").unwrap();
        assert_eq!(resolved.concrete_prereqs, vec!["a.c"]);
        assert_eq!(resolved.recipe, vec!["compile"]);

        std::env::set_current_dir(cwd).unwrap();
    }

    #[test]
    fn test_suffix_rule_ignored_without_registered_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        fs::write("a.c", "").unwrap();

        let mut table = TargetTable::new();
        table.insert(explicit(&[".c.o"], &[], &["compile"])).unwrap();
        let opts = Opts::default();
        let mut resolver = Resolver::new(&table, &opts);
        assert!(resolver.resolve("a.o").is_err());

        std::env::set_current_dir(cwd).unwrap();
    }

    #[test]
    fn test_vpath_rule_locates_prerequisite_in_search_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        fs::create_dir("src").unwrap();
        fs::write("src/a.c", "").unwrap();

        let mut table = TargetTable::new();
        table.insert(explicit(&["%.o"], &["%.c"], &["compile"])).unwrap();
        let opts = Opts::default();
        let mut resolver = Resolver::new(&table, &opts);
        resolver.add_vpath_rule("%.c", "src");
        let resolved = resolver.resolve("a.o").unwrap();
        assert_eq!(resolved.concrete_prereqs, vec!["a.c"]);
        assert!(resolved.must_build);

        std::env::set_current_dir(cwd).unwrap();
    }

    #[test]
    fn test_generic_vpath_falls_back_when_no_vpath_rule_matches() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        fs::create_dir("lib").unwrap();
        fs::write("lib/dep.txt", "").unwrap();

        let table = TargetTable::new();
        let opts = Opts::default();
        let mut resolver = Resolver::new(&table, &opts);
        resolver.set_vpath("lib");
        assert!(resolver.search("dep.txt").is_some());

        std::env::set_current_dir(cwd).unwrap();
    }

    #[test]
    fn test_split_path_list_prefers_semicolon_then_colon_then_whitespace() {
        assert_eq!(
            split_path_list("a;b;c"),
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]
        );
        assert_eq!(
            split_path_list("a:b"),
            vec![PathBuf::from("a"), PathBuf::from("b")]
        );
        assert_eq!(split_path_list("a b"), vec![PathBuf::from("a"), PathBuf::from("b")]);
    }
}
