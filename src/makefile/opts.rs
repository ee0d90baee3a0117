//! Options available for makefiles.

#[derive(Debug)]
pub struct Opts {
    /// Unconditionally make all targets.
    pub always_make: bool,

    /// Ignore errors from recipes.
    pub ignore_errors: bool,

    /// Don't execute recipes; just print them.
    pub just_print: bool,

    /// Consider FILE to be very old and do not remake it.
    pub old_file: Vec<String>,

    /// Consider FILE to be very new to simulate "what if" it changed.
    pub new_file: Vec<String>,

    /// Number of recipes the scheduler may run concurrently (`-j`). `1` is sequential.
    pub max_jobs: usize,

    /// Keep building independent targets after a recipe failure (`-k`).
    pub keep_going: bool,

    /// Suppress echoing recipe commands before running them (`-s`).
    pub silent: bool,

    /// Command-line `NAME=VALUE` overrides win over the same macro set in the environment or
    /// the makefile itself (`-e` flips the environment to take priority instead).
    pub environment_overrides: bool,

    /// Print the working directory before and after processing (`-w`/`--print-directory`).
    pub print_directory: bool,

    /// Print the expanded macro database before building (`-p`).
    pub print_expanded: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            always_make: false,
            ignore_errors: false,
            just_print: false,
            old_file: Vec::new(),
            new_file: Vec::new(),
            max_jobs: 1,
            keep_going: false,
            silent: false,
            environment_overrides: false,
            print_directory: false,
            print_expanded: false,
        }
    }
}
