//! `rmake`: a portable, parallel reimplementation of the `make` build driver.
//!
//! This is the command-line front end; the actual parsing/resolution/scheduling engine lives in
//! the library crate so it can be driven by other applications too.

mod args;

use std::env;
use std::fs;
use std::path::PathBuf;

use clap::Parser;

use args::Args;

use rmake::{Context, DefaultLogger, Env, Logger, MakefileParser, Resolver, Scheduler};

/// An ordered list of filenames used to search for a makefile.
const MAKEFILE_SEARCH: [&str; 6] = [
    "makefile",
    "Makefile",
    "BSDmakefile",
    "BSDMakefile",
    "GNUmakefile",
    "GNUMakefile",
];

/// Search for a makefile to execute.
///
/// We have to take into account that the file system may be case-insensitive. Ideally, we want to
/// return the proper casing of the makefile (so the file is properly reported when logging), and we
/// also want to support weirdly-cased makefiles on case-insensitive file systems, such as
/// `MAKEFILE`. To that end, we first get a directory listing and try to find makefiles from that
/// list, which would ensure the proper casing is returned. As a fallback, we then iterate through
/// the `MAKEFILE_SEARCH` list and try to read them from the file system, which will do a
/// case-insensitive match on case-insensitive file systems, and therefore would return improper
/// casing (e.g., `MAKEFILE` would be returned as `makefile`, since that would be the first match).
fn find_makefile() -> Option<PathBuf> {
    if let Some(cwd_files) = fs::read_dir("./").ok().map(|rd| {
        rd.flatten()
            .filter_map(|rd| rd.path().file_name().map(PathBuf::from))
            .collect::<Vec<_>>()
    }) {
        for file in MAKEFILE_SEARCH {
            let f = PathBuf::from(file);
            if cwd_files.contains(&f) && f.is_file() {
                return Some(f);
            }
        }
    }

    for file in MAKEFILE_SEARCH {
        let f = PathBuf::from(file);
        if f.is_file() {
            return Some(f);
        }
    }

    None
}

/// Split a positional `NAME=VALUE` argument off from a goal target name, matching `make`'s
/// command-line macro override syntax. `NAME` must look like a macro name (no whitespace, no
/// `:`/`#`/`=`) or the argument is treated as an ordinary goal.
fn parse_macro_override(arg: &str) -> Option<(&str, &str)> {
    let (name, value) = arg.split_once('=')?;
    if name.is_empty()
        || name
            .chars()
            .any(|c| c.is_whitespace() || c == ':' || c == '#' || c == '=')
    {
        return None;
    }
    Some((name, value))
}

/// Print an error message and exit with code 2.
fn exit_with(msg: impl AsRef<str>, logger: &DefaultLogger, context: Option<&Context>) -> ! {
    logger.error(msg, context);
    std::process::exit(2)
}

/// Build the `MAKEFLAGS` string passed down to recursive `$(MAKE)` invocations, mirroring the
/// single-letter flags this invocation was started with.
fn make_flags(opts: &rmake::Opts) -> String {
    let mut flags = String::new();
    if opts.ignore_errors {
        flags.push('i');
    }
    if opts.keep_going {
        flags.push('k');
    }
    if opts.just_print {
        flags.push('n');
    }
    if opts.silent {
        flags.push('s');
    }
    if opts.always_make {
        flags.push('B');
    }
    if opts.max_jobs > 1 {
        flags.push_str(&format!(" -j{}", opts.max_jobs));
    }
    flags
}

fn main() {
    let args = Args::parse();
    let logger = DefaultLogger {};

    // Change to another directory, if specified by the arguments.
    let original_dir = if args.directory.is_empty() {
        None
    } else {
        let cwd = env::current_dir()
            .unwrap_or_else(|e| exit_with(format!("Failed to get cwd ({}).", e), &logger, None));

        let dir = args
            .directory
            .iter()
            .fold(PathBuf::new(), |dir, d| dir.join(d));
        logger.info(format!("Chdir to `{}`.", dir.display()), None);
        env::set_current_dir(&dir)
            .unwrap_or_else(|e| exit_with(format!("Chdir failed: {}.", e), &logger, None));

        Some(cwd)
    };

    if args.print_directory {
        if let Ok(cwd) = env::current_dir() {
            logger.info(format!("Entering directory `{}`", cwd.display()), None);
        }
    }

    // Determine the makefile to read.
    let makefile_path = match args.file {
        None => find_makefile().unwrap_or_else(|| exit_with("No makefile found.", &logger, None)),
        Some(ref file) => PathBuf::from(file),
    };

    let opts: rmake::Opts = args.clone().into();

    // Positional `NAME=VALUE` arguments override macros; everything else is a goal target.
    let mut goal_targets: Vec<String> = Vec::new();
    let mut cli_overrides: Vec<(String, String)> = Vec::new();
    for arg in &args.targets {
        match parse_macro_override(arg) {
            Some((name, value)) => cli_overrides.push((name.to_string(), value.to_string())),
            None => goal_targets.push(arg.clone()),
        }
    }

    let mut vars: rmake::Env = env::vars().collect::<Env>();
    vars.insert("MAKEFLAGS".to_string(), make_flags(&opts));
    let mut vars = rmake::Vars::from(vars);
    if opts.environment_overrides {
        vars.lock_all();
    }
    let _ = vars.set("MAKE", env::args().next().unwrap_or_else(|| "make".to_string()), false);
    for (name, value) in &cli_overrides {
        let _ = vars.set_override(name, value);
    }

    let parsed = match MakefileParser::parse_file(&makefile_path, vars) {
        Err(e) => exit_with(e.msg, &logger, Some(&e.context)),
        Ok(p) => p,
    };

    if opts.print_expanded {
        let mut entries: Vec<(&String, &rmake::Var)> = parsed.vars.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (name, var) in entries {
            println!("{} = {}", name, var.value);
        }
    }

    let mut resolver = Resolver::new(&parsed.table, &opts);
    resolver.set_vpath(&parsed.vars.get("VPATH").value);
    for (pattern, dirs) in &parsed.vpath_rules {
        resolver.add_vpath_rule(pattern, dirs);
    }

    let mut targets = goal_targets;
    if targets.is_empty() {
        match &parsed.default_target {
            None => exit_with(
                "No target specified and no default target found.",
                &logger,
                None,
            ),
            Some(t) => targets.push(t.clone()),
        }
    }

    for target in &targets {
        if let Err(e) = resolver.resolve(target) {
            exit_with(e.msg, &logger, Some(&e.context));
        }
    }

    let resolved = resolver.all_resolved().clone();
    let collapse_pipes_to_system = !parsed.vars.is_defined("_BUILTIN_SHELL");
    let shell = rmake::EmbeddedShell {
        collapse_pipes_to_system,
        fallback: rmake::SystemShell::default(),
    };
    let scheduler = Scheduler::new(&parsed.vars, &logger, &shell, &opts);

    if let Err(e) = scheduler.run(&targets.join(" "), &resolved) {
        exit_with(e.msg, &logger, Some(&e.context));
    }

    // A requested target that the scheduler didn't run (because it had no recipe to run, or
    // wasn't stale) is reported as up to date, same as the target actually being built is reported
    // via the scheduler's recipe echo.
    for target in &targets {
        if let Some(rt) = resolved.get(target) {
            if !(rt.must_build && !rt.recipe.is_empty()) {
                if opts.old_file.iter().any(|f| f == target) {
                    logger.info(format!("'{target}' is up to date (old)."), None);
                } else {
                    logger.info(format!("'{target}' is up to date."), None);
                }
            }
        }
    }

    if args.print_directory {
        if let Ok(cwd) = env::current_dir() {
            logger.info(format!("Leaving directory `{}`", cwd.display()), None);
        }
    }

    // Go back to the original directory, if we changed directory previously.
    if let Some(cwd) = original_dir {
        logger.info(format!("Chdir back to `{}`.", cwd.display()), None);
        env::set_current_dir(&cwd)
            .unwrap_or_else(|e| exit_with(format!("Chdir failed: {}.", e), &logger, None));
    }
}
