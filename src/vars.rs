//! The macro store: a `HashMap`-backed table of macro definitions, plus the bookkeeping macros
//! need beyond a plain string value — deferred vs. immediate expansion, and whether a macro is
//! exported to recipe subprocesses.
//!
//! The only other interesting behavior here is that for some special keys we have default values
//! which should be "resettable" by setting the value to blank, and that calling `get` on a key
//! that doesn't exist should return an empty `Var`. To support these behaviors without polluting
//! the underlying `HashMap` with lots of duplicate data, the `Vars` struct contains fields for
//! those heap-allocated "constant" objects. Since we always return a reference to a `Var`, this is
//! quite efficient.

use std::collections::HashMap;

const DEFAULT_RECIPE_PREFIX: char = '\t';

/// Represents the "raw" environment coming from the OS.
pub type Env = HashMap<String, String>;

/// How a macro's definition op should combine with any existing value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefineOp {
    /// `NAME = RHS` — store the template, expanded at every use.
    Assign,
    /// `NAME := RHS` — expand now, store the result.
    AssignImmediate,
    /// `NAME ?= RHS` — only takes effect if `NAME` is not already defined.
    AssignIfAbsent,
    /// `NAME += RHS` — append to the existing value (space-joined), keeping its existing kind.
    AssignAppend,
}

#[derive(Clone, Debug)]
pub struct Var {
    pub value: String,
    /// `true` for deferred (`=`) macros, `false` for immediate (`:=`) ones.
    pub recursive: bool,
    pub exported: bool,
    /// Set for command-line `NAME=VALUE` overrides and, under `-e`, for macros sourced from the
    /// environment: `define` becomes a no-op for a locked name, so later makefile assignments
    /// can't clobber it.
    locked: bool,
}

/// This wraps a `HashMap` and a default value, providing an easy way to get variables, handling
/// special and automatic variables properly.
#[derive(Clone, Debug)]
pub struct Vars {
    map: HashMap<String, Var>,
    blank: Var,
    default_recipe_prefix: Var,
    /// Set by `.EXPORT_ALL_VARIABLES`: every macro is exported regardless of its own flag.
    export_all: bool,
}

impl Vars {
    pub fn new<const N: usize>(init: [(&str, &str); N]) -> Self {
        let mut vars = Self {
            map: HashMap::new(),
            blank: Var {
                value: "".to_string(),
                recursive: false,
                exported: false,
                locked: false,
            },
            default_recipe_prefix: Var {
                value: DEFAULT_RECIPE_PREFIX.to_string(),
                recursive: false,
                exported: false,
                locked: false,
            },
            export_all: false,
        };

        for (k, v) in init {
            let _ = vars.set(k, v, false);
        }

        vars
    }

    pub fn get<S: AsRef<str>>(&self, k: S) -> &Var {
        let k = k.as_ref();
        match k {
            ".RECIPEPREFIX" => match self.map.get(k) {
                None => &self.default_recipe_prefix,
                Some(var) => {
                    if var.value.is_empty() {
                        &self.default_recipe_prefix
                    } else {
                        var
                    }
                }
            },
            _ => self.map.get(k).unwrap_or(&self.blank),
        }
    }

    pub fn is_defined<S: AsRef<str>>(&self, k: S) -> bool {
        self.map.contains_key(k.as_ref())
    }

    /// Every defined macro, for `-p`'s expanded-database dump.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Var)> {
        self.map.iter()
    }

    pub fn set<K: AsRef<str>, V: AsRef<str>>(
        &mut self,
        k: K,
        v: V,
        recursive: bool,
    ) -> Result<(), String> {
        let clean_key = k.as_ref().trim().to_string();
        validate_name(&clean_key)?;

        let existing = self.map.get(&clean_key);
        let exported = existing.map(|var| var.exported).unwrap_or(false);
        let locked = existing.map(|var| var.locked).unwrap_or(false);

        self.map.insert(
            clean_key,
            Var {
                value: v.as_ref().to_string(),
                recursive,
                exported,
                locked,
            },
        );
        Ok(())
    }

    /// Set a macro as a command-line `NAME=VALUE` override or (under `-e`) an environment-sourced
    /// macro: stored as an immediate, exported value, and locked so a later makefile assignment of
    /// the same name is ignored instead of clobbering it.
    pub fn set_override<K: AsRef<str>, V: AsRef<str>>(&mut self, k: K, v: V) -> Result<(), String> {
        let clean_key = k.as_ref().trim().to_string();
        validate_name(&clean_key)?;
        self.map.insert(
            clean_key,
            Var {
                value: v.as_ref().to_string(),
                recursive: false,
                exported: true,
                locked: true,
            },
        );
        Ok(())
    }

    /// Lock every macro currently in the store (used for `-e`/`--environment-overrides`, once the
    /// environment has been loaded in but before the makefile is parsed).
    pub fn lock_all(&mut self) {
        for var in self.map.values_mut() {
            var.locked = true;
        }
    }

    /// Apply a macro-definition operator. `rhs` is the raw (un-expanded) right-hand side text;
    /// for `AssignImmediate` it is expanded against the store as it stands right now. A no-op if
    /// `name` is locked by a command-line override or `-e`.
    pub fn define(&mut self, name: &str, rhs: &str, op: DefineOp) -> Result<(), String> {
        if self.map.get(name).map(|var| var.locked).unwrap_or(false) {
            return Ok(());
        }
        match op {
            DefineOp::Assign => self.set(name, rhs.to_string(), true),
            DefineOp::AssignImmediate => {
                let expanded = crate::expand::expand(rhs, self)?;
                self.set(name, expanded, false)
            }
            DefineOp::AssignIfAbsent => {
                if self.is_defined(name) {
                    Ok(())
                } else {
                    self.set(name, rhs.to_string(), true)
                }
            }
            DefineOp::AssignAppend => {
                let existing = self.get(name);
                let recursive = existing.recursive;
                let new_value = if existing.value.is_empty() {
                    rhs.to_string()
                } else {
                    format!("{} {}", existing.value, rhs)
                };
                self.set(name, new_value, recursive)
            }
        }
    }

    /// Mark an existing macro exported, creating a blank one if it doesn't exist yet (matching
    /// `export NAME` with no prior definition, which still takes effect once `NAME` is set).
    pub fn export(&mut self, name: &str) -> Result<(), String> {
        validate_name(name)?;
        self.map
            .entry(name.to_string())
            .or_insert_with(|| Var {
                value: String::new(),
                recursive: true,
                exported: false,
                locked: false,
            })
            .exported = true;
        Ok(())
    }

    pub fn unexport(&mut self, name: &str) {
        if let Some(var) = self.map.get_mut(name) {
            var.exported = false;
        }
    }

    pub fn export_all_variables(&mut self) {
        self.export_all = true;
    }

    /// Build the environment map that should be passed to a spawned recipe (or `$(MAKE)`
    /// sub-invocation): every exported macro, immediate-expanded.
    pub fn exported_environment(&self) -> Result<Env, String> {
        let mut env = Env::new();
        for (name, var) in &self.map {
            if self.export_all || var.exported {
                let value = if var.recursive {
                    crate::expand::expand(&var.value, self)?
                } else {
                    var.value.clone()
                };
                env.insert(name.clone(), value);
            }
        }
        Ok(env)
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    for ch in name.chars() {
        if ch.is_whitespace() {
            return Err("Variable contains whitespace.".to_string());
        }

        if let Some(bad_char) = match ch {
            ':' => Some(':'),
            '#' => Some('#'),
            '=' => Some('='),
            _ => None,
        } {
            return Err(format!("Variable contains bad character '{}'.", bad_char));
        }
    }
    Ok(())
}

impl From<Env> for Vars {
    fn from(env: Env) -> Self {
        let mut vars = Self::new([]);
        for (k, v) in env {
            vars.map.insert(
                k,
                Var {
                    value: v,
                    recursive: false,
                    exported: true,
                    locked: false,
                },
            );
        }
        vars
    }
}
