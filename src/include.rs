//! Splices `include`/`-include`/`sinclude`/`.include` targets into the logical-line stream at
//! the point where the directive appears.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::context::Context;
use crate::error::MakeError;
use crate::line_reader::{LineReader, LogicalLine};
use crate::vars::Vars;

pub struct IncludeProcessor;

impl IncludeProcessor {
    pub fn is_directive(line: &str) -> bool {
        let t = line.trim_start();
        for kw in ["include", "-include", "sinclude"] {
            if t == kw || t.starts_with(&format!("{} ", kw)) {
                return true;
            }
        }
        t == ".include" || t.starts_with(".include ")
    }

    /// Resolve one include directive into the logical lines it contributes. A missing file is
    /// recovered silently for `-include`/`sinclude`/`.include`; a plain `include` is fatal.
    pub fn process(
        line: &str,
        vars: &Vars,
        context: &Context,
    ) -> Result<Vec<LogicalLine>, MakeError> {
        let trimmed = line.trim_start();
        let (recoverable, rest) = if let Some(rest) = trimmed.strip_prefix("-include") {
            (true, rest)
        } else if let Some(rest) = trimmed.strip_prefix("sinclude") {
            (true, rest)
        } else if let Some(rest) = trimmed.strip_prefix(".include") {
            (true, rest)
        } else if let Some(rest) = trimmed.strip_prefix("include") {
            (false, rest)
        } else {
            return Err(MakeError::new(
                format!("Not an include directive: {}", line),
                context.clone(),
            ));
        };

        let expanded = crate::expand::expand(rest, vars)
            .map_err(|e| MakeError::new(e, context.clone()))?;

        let mut out = Vec::new();
        for filename in expanded.split_whitespace() {
            let filename = filename.trim_matches('"').trim_matches('\'');
            match File::open(filename) {
                Ok(f) => {
                    let lines = LineReader::read(BufReader::new(f))
                        .map_err(|e| MakeError::new(e.to_string(), context.clone()))?;
                    for mut l in lines {
                        l.source = Some(PathBuf::from(filename));
                        out.push(l);
                    }
                }
                Err(e) => {
                    if recoverable {
                        continue;
                    }
                    return Err(MakeError::new(
                        format!("Included makefile not found: {} ({})", filename, e),
                        context.clone(),
                    ));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_recoverable_for_dash_include() {
        let vars = Vars::new([]);
        let context = Context::new();
        let result = IncludeProcessor::process("-include /no/such/file", &vars, &context).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_missing_file_fatal_for_plain_include() {
        let vars = Vars::new([]);
        let context = Context::new();
        assert!(IncludeProcessor::process("include /no/such/file", &vars, &context).is_err());
    }

    #[test]
    fn test_is_directive() {
        assert!(IncludeProcessor::is_directive("include foo.mk"));
        assert!(IncludeProcessor::is_directive("-include foo.mk"));
        assert!(IncludeProcessor::is_directive("sinclude foo.mk"));
        assert!(IncludeProcessor::is_directive(".include \"foo.mk\""));
        assert!(!IncludeProcessor::is_directive("included: foo.mk"));
    }
}
