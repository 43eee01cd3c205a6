// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Asking for the project name the output files are named after

use crate::error::CliError;
use std::io::{BufRead, Write};

pub const NAME_QUESTION: &str = "Please enter the project name with no spaces in name: ";

/// Check a project name. It becomes a file name, so it may not be empty, contain whitespace
/// or path separators, or start with a dot.
pub fn check_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        Err("the name is empty")
    } else if name.chars().any(char::is_whitespace) {
        Err("the name contains spaces")
    } else if name.contains(['/', '\\']) {
        Err("the name contains a path separator")
    } else if name.starts_with('.') {
        Err("the name starts with a dot")
    } else {
        Ok(())
    }
}

/// Ask for a name until a valid one is entered. Fails if the input ends first.
pub fn ask_name<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<String, CliError> {
    let mut answer = String::new();
    loop {
        write!(output, "{NAME_QUESTION}")
            .and_then(|()| output.flush())
            .map_err(|e| CliError::io("<stdout>", e))?;
        answer.truncate(0);
        let read = input
            .read_line(&mut answer)
            .map_err(|e| CliError::io("<stdin>", e))?;
        if read == 0 {
            return Err(CliError::NoName);
        }
        if let Some('\n') = answer.chars().next_back() {
            answer.pop();
        }
        if let Some('\r') = answer.chars().next_back() {
            answer.pop();
        }
        match check_name(&answer) {
            Ok(()) => return Ok(answer),
            Err(reason) => writeln!(output, "Invalid name '{answer}': {reason}")
                .map_err(|e| CliError::io("<stdout>", e))?,
        }
    }
}
