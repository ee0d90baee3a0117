//! Executes a single recipe command line, either by delegating to the host shell or through a
//! deliberately minimal embedded interpreter for hosts without one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::context::Context;
use crate::error::MakeError;

pub trait ShellBridge {
    fn run(&self, command: &str, env: &HashMap<String, String>, cwd: &Path) -> Result<i32, MakeError>;
}

/// Delegates to the host command interpreter: `$(SHELL) $(.SHELLFLAGS) command`.
pub struct SystemShell {
    pub shell: String,
    pub shell_flags: String,
}

impl Default for SystemShell {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            shell_flags: "-c".to_string(),
        }
    }
}

impl ShellBridge for SystemShell {
    fn run(&self, command: &str, env: &HashMap<String, String>, cwd: &Path) -> Result<i32, MakeError> {
        let status = Command::new(&self.shell)
            .args(self.shell_flags.split_whitespace())
            .arg(command)
            .envs(env)
            .current_dir(cwd)
            .status()
            .map_err(|e| MakeError::new(format!("Failed to run shell: {}", e), Context::new()))?;
        Ok(status.code().unwrap_or(1))
    }
}

/// A small, non-POSIX-complete shell for hosts that have no `/bin/sh`. Understands `||`, `&&`,
/// `;`, `|`, `>`/`>>`, `2>&1`, and a trailing `&` (treated as a sequence point, not true
/// backgrounding), plus the builtins `cd`, `exit`, `ls`, `pwd`, `echo`, `touch`, `cat`, `grep`,
/// `rm`, `mkdir`, `true`, `false`.
pub struct EmbeddedShell {
    /// When set, any segment containing `|` or `>` is handed wholesale to `fallback` instead of
    /// being interpreted here (the `_SYSTEM_SHELL_PIPES` macro).
    pub collapse_pipes_to_system: bool,
    pub fallback: SystemShell,
}

struct ShellState {
    cwd: PathBuf,
    env: HashMap<String, String>,
}

struct SimpleCommand {
    argv: Vec<String>,
    redirect_stdout: Option<(String, bool)>,
    merge_stderr: bool,
}

impl ShellBridge for EmbeddedShell {
    fn run(&self, command: &str, env: &HashMap<String, String>, cwd: &Path) -> Result<i32, MakeError> {
        if self.collapse_pipes_to_system && (command.contains('|') || command.contains('>')) {
            return self.fallback.run(command, env, cwd);
        }

        let mut state = ShellState {
            cwd: cwd.to_path_buf(),
            env: env.clone(),
        };
        eval_sequence(command, &mut state, self)
    }
}

fn eval_sequence(s: &str, state: &mut ShellState, shell: &EmbeddedShell) -> Result<i32, MakeError> {
    let mut status = 0;
    for segment in split_top_level_char(s, ';') {
        if segment.trim().is_empty() {
            continue;
        }
        status = eval_andor(segment.trim(), state, shell)?;
    }
    Ok(status)
}

fn eval_andor(s: &str, state: &mut ShellState, shell: &EmbeddedShell) -> Result<i32, MakeError> {
    if let Some((left, op, right)) = find_first_andor(s) {
        let left_status = eval_bg_seq(left.trim(), state, shell)?;
        match (op, left_status) {
            ("&&", status) if status != 0 => Ok(status),
            ("||", status) if status == 0 => Ok(status),
            _ => eval_andor(right.trim(), state, shell),
        }
    } else {
        eval_bg_seq(s, state, shell)
    }
}

/// `&` is treated purely as a sequence point here — recipes needing real backgrounding are out of
/// scope for this collaborator.
fn eval_bg_seq(s: &str, state: &mut ShellState, shell: &EmbeddedShell) -> Result<i32, MakeError> {
    let mut status = 0;
    for segment in split_top_level_char(s, '&') {
        if segment.trim().is_empty() {
            continue;
        }
        status = eval_pipeline(segment.trim(), state, shell)?;
    }
    Ok(status)
}

fn eval_pipeline(s: &str, state: &mut ShellState, shell: &EmbeddedShell) -> Result<i32, MakeError> {
    let stages: Vec<&str> = split_top_level_char(s, '|')
        .into_iter()
        .map(str::trim)
        .collect();

    if stages.len() == 1 {
        return eval_stage(stages[0], state, shell);
    }

    let mut children: Vec<Child> = Vec::new();
    let mut prev_stdout: Option<Stdio> = None;
    let mut last_plan = OutputPlan::Inherit;

    for (i, stage) in stages.iter().enumerate() {
        let cmd = parse_simple(stage)?;
        if cmd.argv.is_empty() {
            continue;
        }

        if let Some(status) = run_builtin(&cmd, state) {
            // A builtin mid-pipeline runs eagerly against our own stdio rather than truly
            // joining the pipe; acceptable for the minimal cases this collaborator targets.
            if i + 1 == stages.len() {
                return status;
            }
            continue;
        }

        let mut command = Command::new(&cmd.argv[0]);
        command.args(&cmd.argv[1..]).envs(&state.env).current_dir(&state.cwd);
        command.stdin(prev_stdout.take().unwrap_or(Stdio::inherit()));

        let is_last = i + 1 == stages.len();
        let plan = if is_last {
            configure_redirection(&mut command, &cmd)?
        } else {
            command.stdout(Stdio::piped());
            OutputPlan::Inherit
        };

        let mut child = command
            .spawn()
            .map_err(|e| MakeError::new(format!("Failed to run `{}`: {}", cmd.argv[0], e), Context::new()))?;

        if is_last {
            last_plan = plan;
        } else {
            prev_stdout = child.stdout.take().map(Stdio::from);
        }
        children.push(child);
    }

    let mut last_status = 0;
    let last_index = children.len().saturating_sub(1);
    for (i, child) in children.into_iter().enumerate() {
        let plan = if i == last_index {
            std::mem::replace(&mut last_plan, OutputPlan::Inherit)
        } else {
            OutputPlan::Inherit
        };
        last_status = finish_child(child, plan)?;
    }
    Ok(last_status)
}

fn eval_stage(stage: &str, state: &mut ShellState, _shell: &EmbeddedShell) -> Result<i32, MakeError> {
    let cmd = parse_simple(stage)?;
    if cmd.argv.is_empty() {
        return Ok(0);
    }
    if let Some(status) = run_builtin(&cmd, state) {
        return status;
    }

    let mut command = Command::new(&cmd.argv[0]);
    command.args(&cmd.argv[1..]).envs(&state.env).current_dir(&state.cwd);
    let plan = configure_redirection(&mut command, &cmd)?;
    let child = command
        .spawn()
        .map_err(|e| MakeError::new(format!("Failed to run `{}`: {}", cmd.argv[0], e), Context::new()))?;
    finish_child(child, plan)
}

/// What became of a stage's stdout/stderr once `configure_redirection` ran: whether they need
/// draining (and, for a `2>&1` merge with no file target, interleaving into our own stdout) before
/// the child can be waited on.
enum OutputPlan {
    Inherit,
    File,
    MergedPipes,
}

/// Wire up `command`'s stdout/stderr according to `cmd`'s redirection. A `2>&1` onto a file target
/// just duplicates the file handle for both streams (the OS does the merging); a `2>&1` onto the
/// inherited stdout has no file to dup, so both streams are piped instead and `finish_child` drains
/// and interleaves them afterward.
fn configure_redirection(command: &mut Command, cmd: &SimpleCommand) -> Result<OutputPlan, MakeError> {
    if let Some((path, append)) = &cmd.redirect_stdout {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .append(*append)
            .truncate(!*append)
            .open(path)
            .map_err(|e| MakeError::new(format!("Cannot open `{}`: {}", path, e), Context::new()))?;
        if cmd.merge_stderr {
            let stderr_file = file.try_clone().map_err(|e| {
                MakeError::new(format!("Cannot duplicate `{}`: {}", path, e), Context::new())
            })?;
            command.stdout(file);
            command.stderr(stderr_file);
        } else {
            command.stdout(file);
        }
        Ok(OutputPlan::File)
    } else if cmd.merge_stderr {
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        Ok(OutputPlan::MergedPipes)
    } else {
        Ok(OutputPlan::Inherit)
    }
}

/// Wait on `child`, draining its piped stdout/stderr into our own stdout first if they were piped
/// for a `2>&1` merge. Without this, a recipe that writes enough to stderr can fill the OS pipe
/// buffer and block forever with nothing reading it.
fn finish_child(mut child: Child, plan: OutputPlan) -> Result<i32, MakeError> {
    if let OutputPlan::MergedPipes = plan {
        let out = child.stdout.take();
        let err = child.stderr.take();
        let out_thread = out.map(|mut r| {
            std::thread::spawn(move || {
                let _ = std::io::copy(&mut r, &mut std::io::stdout());
            })
        });
        let err_thread = err.map(|mut r| {
            std::thread::spawn(move || {
                let _ = std::io::copy(&mut r, &mut std::io::stdout());
            })
        });
        let status = child
            .wait()
            .map_err(|e| MakeError::new(format!("Failed waiting on child: {}", e), Context::new()))?;
        if let Some(t) = out_thread {
            let _ = t.join();
        }
        if let Some(t) = err_thread {
            let _ = t.join();
        }
        return Ok(status.code().unwrap_or(1));
    }

    let status = child
        .wait()
        .map_err(|e| MakeError::new(format!("Failed waiting on child: {}", e), Context::new()))?;
    Ok(status.code().unwrap_or(1))
}

fn run_builtin(cmd: &SimpleCommand, state: &mut ShellState) -> Option<Result<i32, MakeError>> {
    match cmd.argv[0].as_str() {
        "cd" => {
            let target = cmd.argv.get(1).cloned().unwrap_or_default();
            let new_dir = if target.is_empty() {
                state.cwd.clone()
            } else {
                state.cwd.join(target)
            };
            if new_dir.is_dir() {
                state.cwd = new_dir;
                Some(Ok(0))
            } else {
                Some(Ok(1))
            }
        }
        "exit" => {
            let code = cmd
                .argv
                .get(1)
                .and_then(|s| s.parse::<i32>().ok())
                .unwrap_or(0);
            Some(Ok(code))
        }
        "echo" => {
            println!("{}", cmd.argv[1..].join(" "));
            Some(Ok(0))
        }
        "true" => Some(Ok(0)),
        "false" => Some(Ok(1)),
        "pwd" => {
            println!("{}", state.cwd.display());
            Some(Ok(0))
        }
        "ls" => {
            let dir = cmd
                .argv
                .get(1)
                .map(|p| resolve(state, p))
                .unwrap_or_else(|| state.cwd.clone());
            match std::fs::read_dir(&dir) {
                Ok(entries) => {
                    let mut names: Vec<String> = entries
                        .filter_map(|e| e.ok())
                        .filter_map(|e| e.file_name().into_string().ok())
                        .collect();
                    names.sort();
                    for name in names {
                        println!("{}", name);
                    }
                    Some(Ok(0))
                }
                Err(_) => Some(Ok(1)),
            }
        }
        "touch" => {
            let mut status = 0;
            for arg in &cmd.argv[1..] {
                let path = resolve(state, arg);
                let result = std::fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(false)
                    .open(&path)
                    .and_then(|f| f.set_modified(std::time::SystemTime::now()));
                if result.is_err() {
                    status = 1;
                }
            }
            Some(Ok(status))
        }
        "cat" => {
            let mut status = 0;
            for arg in &cmd.argv[1..] {
                match std::fs::read_to_string(resolve(state, arg)) {
                    Ok(content) => print!("{}", content),
                    Err(_) => status = 1,
                }
            }
            Some(Ok(status))
        }
        "grep" => {
            let Some(pattern) = cmd.argv.get(1) else {
                return Some(Ok(2));
            };
            let files = &cmd.argv[2..];
            if files.is_empty() {
                // No stdin support in this collaborator; recipes always pass file arguments.
                return Some(Ok(1));
            }
            let mut found = false;
            for file in files {
                match std::fs::read_to_string(resolve(state, file)) {
                    Ok(content) => {
                        for line in content.lines() {
                            if line.contains(pattern.as_str()) {
                                println!("{}", line);
                                found = true;
                            }
                        }
                    }
                    Err(_) => return Some(Ok(2)),
                }
            }
            Some(Ok(if found { 0 } else { 1 }))
        }
        "rm" => {
            let mut recursive = false;
            let mut force = false;
            let mut status = 0;
            for arg in &cmd.argv[1..] {
                if let Some(flags) = arg.strip_prefix('-') {
                    if flags.contains('r') || flags.contains('R') {
                        recursive = true;
                    }
                    if flags.contains('f') {
                        force = true;
                    }
                    continue;
                }
                let path = resolve(state, arg);
                let result = if recursive {
                    std::fs::remove_dir_all(&path).or_else(|_| std::fs::remove_file(&path))
                } else {
                    std::fs::remove_file(&path)
                };
                if result.is_err() && !force {
                    status = 1;
                }
            }
            Some(Ok(status))
        }
        "mkdir" => {
            let mut parents = false;
            let mut status = 0;
            for arg in &cmd.argv[1..] {
                if arg == "-p" {
                    parents = true;
                    continue;
                }
                let path = resolve(state, arg);
                let result = if parents {
                    std::fs::create_dir_all(&path)
                } else {
                    std::fs::create_dir(&path)
                };
                if result.is_err() {
                    status = 1;
                }
            }
            Some(Ok(status))
        }
        _ => None,
    }
}

/// Resolve a builtin's path argument against the shell's current working directory.
fn resolve(state: &ShellState, p: &str) -> PathBuf {
    let pb = PathBuf::from(p);
    if pb.is_absolute() {
        pb
    } else {
        state.cwd.join(pb)
    }
}

fn parse_simple(stage: &str) -> Result<SimpleCommand, MakeError> {
    let tokens = tokenize(stage);
    let mut argv = Vec::new();
    let mut redirect_stdout = None;
    let mut merge_stderr = false;

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "2>&1" => {
                merge_stderr = true;
                i += 1;
            }
            ">" | ">>" => {
                let append = tokens[i] == ">>";
                i += 1;
                let path = tokens
                    .get(i)
                    .cloned()
                    .ok_or_else(|| MakeError::new("Missing redirect target", Context::new()))?;
                redirect_stdout = Some((path, append));
                i += 1;
            }
            _ => {
                argv.push(tokens[i].clone());
                i += 1;
            }
        }
    }

    Ok(SimpleCommand {
        argv,
        redirect_stdout,
        merge_stderr,
    })
}

/// Whitespace-split `s` into words, treating `'...'`/`"..."` as a single word (quotes stripped)
/// and `\` as an escape for the following character.
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut has_token = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            has_token = true;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => {
                in_single = !in_single;
                has_token = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_token = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            _ => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Find the leftmost top-level `&&` or `||`, returning `(left, op, right)`.
fn find_first_andor(s: &str) -> Option<(&str, &'static str, &str)> {
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut in_single = false;
    let mut in_double = false;

    for window in 0..chars.len() {
        let (i, c) = chars[window];
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '&' | '|' if !in_single && !in_double => {
                if let Some(&(_, next)) = chars.get(window + 1) {
                    if next == c {
                        let op: &'static str = if c == '&' { "&&" } else { "||" };
                        let end = i + 2;
                        return Some((&s[..i], op, &s[end..]));
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Split `s` on top-level occurrences of `sep`, respecting quotes. Callers only reach this after
/// `find_first_andor` has already peeled off every top-level `&&`/`||`, so a lone `&` or `|` here
/// is never part of a doubled operator.
fn split_top_level_char(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut start = 0;

    for (byte_idx, c) in s.char_indices() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ if c == sep && !in_single && !in_double => {
                parts.push(&s[start..byte_idx]);
                start = byte_idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> EmbeddedShell {
        EmbeddedShell {
            collapse_pipes_to_system: false,
            fallback: SystemShell::default(),
        }
    }

    fn run(cmd: &str) -> i32 {
        let s = shell();
        s.run(cmd, &HashMap::new(), &std::env::current_dir().unwrap())
            .unwrap()
    }

    #[test]
    fn test_true_false_builtins() {
        assert_eq!(run("true"), 0);
        assert_eq!(run("false"), 1);
    }

    #[test]
    fn test_and_or_short_circuit() {
        assert_eq!(run("false && true"), 1);
        assert_eq!(run("true || false"), 0);
    }

    #[test]
    fn test_sequence_runs_all() {
        assert_eq!(run("false ; true"), 0);
    }

    #[test]
    fn test_file_builtins_touch_cat_rm() {
        let dir = tempfile::tempdir().unwrap();
        let s = shell();
        let env = HashMap::new();

        assert_eq!(s.run("touch a.txt", &env, dir.path()).unwrap(), 0);
        assert!(dir.path().join("a.txt").is_file());

        std::fs::write(dir.path().join("a.txt"), "hi\n").unwrap();
        assert_eq!(s.run("cat a.txt", &env, dir.path()).unwrap(), 0);

        assert_eq!(s.run("grep hi a.txt", &env, dir.path()).unwrap(), 0);
        assert_eq!(s.run("grep nope a.txt", &env, dir.path()).unwrap(), 1);

        assert_eq!(s.run("mkdir sub", &env, dir.path()).unwrap(), 0);
        assert!(dir.path().join("sub").is_dir());

        assert_eq!(s.run("rm a.txt", &env, dir.path()).unwrap(), 0);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_tokenize_respects_quotes() {
        assert_eq!(
            tokenize("echo 'a b' \"c d\""),
            vec!["echo", "a b", "c d"]
        );
    }

    #[test]
    fn test_find_first_andor() {
        let (l, op, r) = find_first_andor("a && b || c").unwrap();
        assert_eq!((l, op, r), ("a ", "&&", " b || c"));
    }
}
