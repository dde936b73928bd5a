//! Regex-driven line substitution over a G-code file.
//!
//! Simple glue compared to the preheat engine: every line is matched
//! against each configured rule in order, and matching rules rewrite the
//! line with capture-group expansion.

use std::io::{self, BufRead, Write};
use std::path::Path;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::config::SubstitutionConfig;
use crate::rewrite::{Rewrite, RewriteError};

#[derive(Error, Debug)]
pub enum SubstituteError {
    #[error("invalid substitution pattern {pattern:?}: {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("failed to read input file: {0}")]
    ReadInput(io::Error),
    #[error("failed to write output file: {0}")]
    WriteOutput(io::Error),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

/// Suffix of the sibling temporary file the rewritten stream goes to.
pub const OUTPUT_SUFFIX: &str = ".processed";

struct Rule {
    from: Regex,
    to: String,
}

/// Compiled substitution rules, applied to each line in configuration
/// order.
pub struct Substituter {
    rules: Vec<Rule>,
}

impl Substituter {
    pub fn from_config(config: &SubstitutionConfig) -> Result<Self, SubstituteError> {
        let mut rules = Vec::with_capacity(config.substitutions.len());
        for rule in &config.substitutions {
            let from = Regex::new(&rule.from).map_err(|source| SubstituteError::BadPattern {
                pattern: rule.from.clone(),
                source,
            })?;
            // A literal "\n" in the replacement stands for a real newline,
            // letting one input line expand to several output lines.
            let to = rule.to.replace("\\n", "\n");
            rules.push(Rule { from, to });
        }
        Ok(Self { rules })
    }

    /// Applies every matching rule in order. Capture groups in the
    /// replacement expand regex-style ($1, ${name}).
    pub fn apply(&self, line: &str) -> String {
        let mut line = line.to_string();
        for rule in &self.rules {
            if rule.from.is_match(&line) {
                debug!(pattern = %rule.from, "substituting");
                line = rule.from.replace_all(&line, rule.to.as_str()).into_owned();
            }
        }
        line
    }

    pub fn process<R: BufRead, W: Write>(
        &self,
        input: R,
        output: &mut W,
    ) -> Result<(), SubstituteError> {
        for line in input.lines() {
            let line = line.map_err(SubstituteError::ReadInput)?;
            writeln!(output, "{}", self.apply(&line)).map_err(SubstituteError::WriteOutput)?;
        }
        Ok(())
    }
}

/// Rewrites `path` in place through the configured substitutions.
pub fn run(path: &Path, config: &SubstitutionConfig) -> Result<(), SubstituteError> {
    let substituter = Substituter::from_config(config)?;
    let mut rewrite = Rewrite::begin(path, OUTPUT_SUFFIX)?;
    substituter.process(&mut rewrite.input, &mut rewrite.output)?;
    rewrite.commit(false)?;
    Ok(())
}
