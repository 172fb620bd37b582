use std::io::{self, Write};

use serde::Serialize;

use crate::domain::UploadOutcome;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_outcomes(outcomes: &[UploadOutcome]) -> io::Result<()> {
        Self::print_json(&outcomes)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    /// Successes go to stdout in green, errors to stderr in red with their detail.
    pub fn print_outcomes(outcomes: &[UploadOutcome]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        let mut stderr = io::stderr().lock();
        Self::write_outcomes(outcomes, &mut stdout, &mut stderr)
    }

    pub fn write_outcomes<O: Write, E: Write>(
        outcomes: &[UploadOutcome],
        out: &mut O,
        err: &mut E,
    ) -> io::Result<()> {
        if outcomes.is_empty() {
            writeln!(out, "No results uploaded.")?;
            return Ok(());
        }
        writeln!(out, "Upload results:")?;
        for outcome in outcomes {
            let uuid = outcome.sample_uuid.as_deref().unwrap_or("-");
            let line = format!(
                "  - {} ({uuid}): {}",
                outcome.sample_name, outcome.result_type
            );
            if outcome.is_error() {
                writeln!(err, "{RED}{line}{RESET}")?;
                let detail = outcome.exception.as_deref().unwrap_or("unknown error");
                writeln!(err, "{RED}    {detail}{RESET}")?;
            } else {
                writeln!(out, "{GREEN}{line}{RESET}")?;
            }
        }

        let failed = outcomes.iter().filter(|outcome| outcome.is_error()).count();
        writeln!(
            out,
            "{CYAN}{} uploaded, {failed} failed{RESET}",
            outcomes.len() - failed
        )?;
        Ok(())
    }

    pub fn print_uuid(name: &str, uuid: &str) {
        println!("{name}\t{uuid}");
    }
}
