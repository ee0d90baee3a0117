//! Built-in `$(function arg…)` text functions.
//!
//! Each built-in is a plain `fn(&str) -> Result<String, String>` taking its already-expanded
//! argument text (per the design choice recorded in the spec: function arguments are expanded
//! before the built-in runs, never after) and producing replacement text. New built-ins register
//! into the same name-keyed table; nothing downstream needs to know how many there are.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Split `args` into exactly `n` comma-separated parts, with the final part containing any
/// remaining commas verbatim (so e.g. `subst`'s `TEXT` argument may itself contain commas).
fn split_commas(args: &str, n: usize) -> Vec<String> {
    let mut parts = Vec::with_capacity(n);
    let mut rest = args;
    for _ in 0..n - 1 {
        match rest.split_once(',') {
            Some((head, tail)) => {
                parts.push(head.to_string());
                rest = tail;
            }
            None => {
                parts.push(rest.to_string());
                rest = "";
            }
        }
    }
    parts.push(rest.to_string());
    parts
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Look up a built-in by name. Returns `None` if `name` is not a registered built-in.
pub fn lookup(name: &str) -> Option<fn(&str) -> Result<String, String>> {
    match name {
        "shell" => Some(fn_shell),
        "wildcard" => Some(fn_wildcard),
        "subst" => Some(fn_subst),
        "patsubst" => Some(fn_patsubst),
        "firstword" => Some(fn_firstword),
        "lastword" => Some(fn_lastword),
        "word" => Some(fn_word),
        "words" => Some(fn_words),
        "sort" => Some(fn_sort),
        "strip" => Some(fn_strip),
        "dir" => Some(fn_dir),
        "notdir" => Some(fn_notdir),
        "abspath" => Some(fn_abspath),
        "realpath" => Some(fn_realpath),
        _ => None,
    }
}

fn fn_shell(args: &str) -> Result<String, String> {
    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(args)
        .output()
        .map_err(|e| format!("Failed to run shell command `{}`: {}", args, e))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.trim_end().to_string())
}

fn fn_wildcard(args: &str) -> Result<String, String> {
    let mut matches = Vec::new();
    for pat in words(args) {
        let paths = glob::glob(pat).map_err(|e| format!("Bad glob pattern `{}`: {}", pat, e))?;
        for entry in paths.flatten() {
            let normalized = entry.to_string_lossy().into_owned();
            if !matches.contains(&normalized) {
                matches.push(normalized);
            }
        }
    }
    matches.sort();
    Ok(matches.join(" "))
}

fn fn_subst(args: &str) -> Result<String, String> {
    let parts = split_commas(args, 3);
    Ok(parts[2].replace(&parts[0], &parts[1]))
}

/// Match `word` against `pat` (which contains exactly one `%`), returning the text the `%`
/// captured, if any.
fn pattern_match<'a>(pat: &str, word: &'a str) -> Option<&'a str> {
    let (prefix, suffix) = pat.split_once('%')?;
    if word.len() < prefix.len() + suffix.len() {
        return None;
    }
    if !word.starts_with(prefix) || !word.ends_with(suffix) {
        return None;
    }
    Some(&word[prefix.len()..word.len() - suffix.len()])
}

fn fn_patsubst(args: &str) -> Result<String, String> {
    let parts = split_commas(args, 3);
    let (pat, repl, text) = (&parts[0], &parts[1], &parts[2]);

    let out: Vec<String> = words(text)
        .into_iter()
        .map(|word| match pattern_match(pat, word) {
            Some(stem) => repl.replacen('%', stem, 1),
            None => word.to_string(),
        })
        .collect();
    Ok(out.join(" "))
}

fn fn_firstword(args: &str) -> Result<String, String> {
    Ok(words(args).first().copied().unwrap_or("").to_string())
}

fn fn_lastword(args: &str) -> Result<String, String> {
    Ok(words(args).last().copied().unwrap_or("").to_string())
}

fn fn_word(args: &str) -> Result<String, String> {
    let parts = split_commas(args, 2);
    let n: usize = match parts[0].trim().parse() {
        Ok(n) if n >= 1 => n,
        _ => return Ok(String::new()),
    };
    Ok(words(&parts[1])
        .get(n - 1)
        .copied()
        .unwrap_or("")
        .to_string())
}

fn fn_words(args: &str) -> Result<String, String> {
    Ok(words(args).len().to_string())
}

fn fn_sort(args: &str) -> Result<String, String> {
    let mut w: Vec<&str> = words(args);
    w.sort_unstable();
    w.dedup();
    Ok(w.join(" "))
}

fn fn_strip(args: &str) -> Result<String, String> {
    Ok(words(args).join(" "))
}

fn fn_dir(args: &str) -> Result<String, String> {
    let out: Vec<String> = words(args)
        .into_iter()
        .map(|w| match Path::new(w).parent() {
            Some(p) if !p.as_os_str().is_empty() => format!("{}/", p.display()),
            _ => "./".to_string(),
        })
        .collect();
    Ok(out.join(" "))
}

fn fn_notdir(args: &str) -> Result<String, String> {
    let out: Vec<String> = words(args)
        .into_iter()
        .map(|w| {
            Path::new(w)
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect();
    Ok(out.join(" "))
}

fn fn_abspath(args: &str) -> Result<String, String> {
    let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
    let out: Vec<String> = words(args)
        .into_iter()
        .map(|w| normalize(&cwd.join(w)).to_string_lossy().into_owned())
        .collect();
    Ok(out.join(" "))
}

fn fn_realpath(args: &str) -> Result<String, String> {
    let out: Vec<String> = words(args)
        .into_iter()
        .filter_map(|w| std::fs::canonicalize(w).ok())
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    Ok(out.join(" "))
}

/// Collapse `.` and `..` components without touching the filesystem (unlike `realpath`, `abspath`
/// must work for paths that don't exist yet).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subst() {
        assert_eq!(fn_subst("a,b,banana").unwrap(), "bbnbbna");
    }

    #[test]
    fn test_patsubst() {
        assert_eq!(fn_patsubst("%.c,%.o,a.c b.c").unwrap(), "a.o b.o");
        assert_eq!(fn_patsubst("%.c,%.o,a.c README").unwrap(), "a.o README");
    }

    #[test]
    fn test_word_functions() {
        assert_eq!(fn_firstword("x y z").unwrap(), "x");
        assert_eq!(fn_lastword("x y z").unwrap(), "z");
        assert_eq!(fn_word("2, x y z").unwrap(), "y");
        assert_eq!(fn_word("9, x y z").unwrap(), "");
        assert_eq!(fn_words("x y z").unwrap(), "3");
    }

    #[test]
    fn test_sort_dedups_and_orders() {
        assert_eq!(fn_sort("c b a a").unwrap(), "a b c");
    }

    #[test]
    fn test_strip_collapses_whitespace() {
        assert_eq!(fn_strip("  a   b  ").unwrap(), "a b");
    }

    #[test]
    fn test_dir_and_notdir() {
        assert_eq!(fn_dir("a/b.c src/d.c").unwrap(), "a/ src/");
        assert_eq!(fn_notdir("a/b.c src/d.c").unwrap(), "b.c d.c");
        assert_eq!(fn_dir("b.c").unwrap(), "./");
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        assert!(lookup("not-a-function").is_none());
    }
}
