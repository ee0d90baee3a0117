//! Runs the resolved target graph with a bounded pool of worker threads, each one driving a
//! target's recipe line-by-line through a `ShellBridge`.
//!
//! Targets advance through `Pending -> Ready -> Running -> (Done | Failed)`. A target becomes
//! `Ready` once every one of its prerequisites is `Done`; workers pull `Ready` targets off a shared
//! queue, run their recipe, and publish the result, which may make more targets `Ready`. No
//! external thread-pool crate is used — a `Mutex`+`Condvar` over a small state struct is enough for
//! the job counts this tool deals with.

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};

use crate::context::Context;
use crate::error::MakeError;
use crate::logger::Logger;
use crate::makefile::opts::Opts;
use crate::resolver::ResolvedTarget;
use crate::shell::ShellBridge;
use crate::vars::Vars;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Status {
    Pending,
    Ready,
    Running,
    Done,
    Failed,
}

/// The sigils a recipe line may be prefixed with (`@`, `-`, `+`), already stripped from the text
/// that gets macro-expanded and run.
#[derive(Debug)]
struct Sigils {
    silent: bool,
    ignore_error: bool,
    force_run: bool,
}

fn strip_sigils(line: &str) -> (Sigils, &str) {
    let mut silent = false;
    let mut ignore_error = false;
    let mut force_run = false;
    let mut rest = line;

    loop {
        match rest.chars().next() {
            Some('@') => {
                silent = true;
                rest = &rest[1..];
            }
            Some('-') => {
                ignore_error = true;
                rest = &rest[1..];
            }
            Some('+') => {
                force_run = true;
                rest = &rest[1..];
            }
            _ => break,
        }
    }

    (
        Sigils {
            silent,
            ignore_error,
            force_run,
        },
        rest,
    )
}

struct SharedState {
    status: HashMap<String, Status>,
    remaining_prereqs: HashMap<String, usize>,
    dependents: HashMap<String, Vec<String>>,
    ready_queue: VecDeque<String>,
    running_count: usize,
    aborting: bool,
    first_failure: Option<MakeError>,
}

pub struct Scheduler<'a, L: Logger, S: ShellBridge> {
    vars: &'a Vars,
    logger: &'a L,
    shell: &'a S,
    opts: &'a Opts,
}

impl<'a, L: Logger + Sync, S: ShellBridge + Sync> Scheduler<'a, L, S> {
    pub fn new(vars: &'a Vars, logger: &'a L, shell: &'a S, opts: &'a Opts) -> Self {
        Self {
            vars,
            logger,
            shell,
            opts,
        }
    }

    /// Build and run the graph rooted at `goal` from the already-resolved target map.
    pub fn run(&self, goal: &str, resolved: &HashMap<String, ResolvedTarget>) -> Result<(), MakeError> {
        let shared = Mutex::new(self.build_initial_state(goal, resolved));
        let condvar = Condvar::new();
        let jobs = self.opts.max_jobs.max(1);

        std::thread::scope(|scope| {
            for _ in 0..jobs {
                scope.spawn(move || self.worker(resolved, &shared, &condvar));
            }
        });

        let guard = shared.lock().unwrap();
        match &guard.first_failure {
            Some(_) => Err(failure_error(goal)),
            None => Ok(()),
        }
    }

    fn build_initial_state(&self, goal: &str, resolved: &HashMap<String, ResolvedTarget>) -> SharedState {
        let mut status = HashMap::new();
        let mut remaining_prereqs = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut ready_queue = VecDeque::new();

        for (name, target) in resolved {
            let needs_run = target.must_build && !target.recipe.is_empty();
            status.insert(name.clone(), if needs_run { Status::Pending } else { Status::Done });
            remaining_prereqs.insert(name.clone(), target.concrete_prereqs.len());
            for prereq in &target.concrete_prereqs {
                dependents.entry(prereq.clone()).or_default().push(name.clone());
            }
        }

        // Prerequisites that don't themselves need a recipe run are already `Done`; knock them out
        // of every dependent's count up front instead of waiting for a worker to "finish" them.
        for (name, target) in resolved {
            let needs_run = target.must_build && !target.recipe.is_empty();
            if !needs_run {
                for dependent in dependents.get(name).cloned().unwrap_or_default() {
                    if let Some(count) = remaining_prereqs.get_mut(&dependent) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }

        for (name, count) in &remaining_prereqs {
            if status.get(name) == Some(&Status::Pending) && *count == 0 {
                status.insert(name.clone(), Status::Ready);
                ready_queue.push_back(name.clone());
            }
        }

        // The goal itself might not appear in `resolved` if resolution failed earlier, but by the
        // time the scheduler runs it always will.
        let _ = goal;

        SharedState {
            status,
            remaining_prereqs,
            dependents,
            ready_queue,
            running_count: 0,
            aborting: false,
            first_failure: None,
        }
    }

    fn worker(
        &self,
        resolved: &HashMap<String, ResolvedTarget>,
        shared: &Mutex<SharedState>,
        condvar: &Condvar,
    ) {
        loop {
            let name = {
                let mut guard = shared.lock().unwrap();
                loop {
                    if let Some(name) = guard.ready_queue.pop_front() {
                        *guard.status.get_mut(&name).unwrap() = Status::Running;
                        guard.running_count += 1;
                        break Some(name);
                    }
                    if guard.running_count == 0 {
                        break None;
                    }
                    guard = condvar.wait(guard).unwrap();
                }
            };

            let Some(name) = name else { break };

            let target = &resolved[&name];
            let outcome = if shared.lock().unwrap().aborting && !self.opts.keep_going {
                Err(MakeError::new(format!("Skipped '{}'", name), Context::new()))
            } else {
                self.run_recipe(target)
            };

            let mut guard = shared.lock().unwrap();
            guard.running_count -= 1;
            match outcome {
                Ok(()) => {
                    guard.status.insert(name.clone(), Status::Done);
                    let dependents = guard.dependents.get(&name).cloned().unwrap_or_default();
                    for dependent in dependents {
                        if let Some(count) = guard.remaining_prereqs.get_mut(&dependent) {
                            *count = count.saturating_sub(1);
                            if *count == 0 && guard.status.get(&dependent) == Some(&Status::Pending) {
                                guard.status.insert(dependent.clone(), Status::Ready);
                                guard.ready_queue.push_back(dependent);
                            }
                        }
                    }
                }
                Err(err) => {
                    guard.status.insert(name.clone(), Status::Failed);
                    guard.aborting = true;
                    if guard.first_failure.is_none() {
                        guard.first_failure = Some(err);
                    }
                }
            }
            condvar.notify_all();
        }
    }

    /// Run every line of `target`'s recipe, stopping at the first command that fails unless that
    /// line is sigil- or flag-exempted from error checking.
    fn run_recipe(&self, target: &ResolvedTarget) -> Result<(), MakeError> {
        let mut local_vars = self.vars.clone();
        let _ = local_vars.set("@", target.name.clone(), false);
        let _ = local_vars.set("^", target.concrete_prereqs.join(" "), false);
        let first_prereq = target.concrete_prereqs.first().cloned().unwrap_or_default();
        let _ = local_vars.set("<", first_prereq, false);

        let cwd = std::env::current_dir()
            .map_err(|e| MakeError::new(format!("Cannot read working directory: {}", e), Context::new()))?;
        let env = local_vars
            .exported_environment()
            .map_err(|e| MakeError::new(e, Context::new()))?;

        for raw_line in &target.recipe {
            let (sigils, rest) = strip_sigils(raw_line);
            let command = crate::expand::expand(rest, &local_vars).map_err(|e| MakeError::new(e, Context::new()))?;
            if command.trim().is_empty() {
                continue;
            }

            if !sigils.silent && !self.opts.silent {
                self.logger.info(&command, None);
            }

            if self.opts.just_print && !sigils.force_run {
                continue;
            }

            let status = self.shell.run(&command, &env, &cwd)?;
            if status != 0 && !sigils.ignore_error && !self.opts.ignore_errors {
                return Err(MakeError::new(
                    format!("Recipe for target '{}' failed with exit code {}", target.name, status),
                    Context::new(),
                ));
            }
        }

        Ok(())
    }
}

fn failure_error(goal: &str) -> MakeError {
    MakeError::new(format!("Build of '{}' failed", goal), Context::new())
}
