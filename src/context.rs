//! Context-driven values: user data, local commands and console input
//!
//! These run before a request is sent. Commands and prompts block the
//! calling thread and have no timeout.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::process::Command;

use crate::error::{Error, Result};

/// Look up a variable in the user data mapping
pub fn lookup_variable(user_data: &HashMap<String, String>, name: &str) -> Option<String> {
    user_data.get(name).cloned()
}

/// Run a command line through the platform shell and capture its output
///
/// Returns standard output with one trailing line terminator removed.
/// A command that cannot start or exits unsuccessfully is an error.
pub fn run_command(plugin: &str, command: &str) -> Result<String> {
    tracing::debug!(plugin = %plugin, command = %command, "running command");

    let output = shell(command).output().map_err(|source| Error::CommandSpawn {
        plugin: plugin.to_string(),
        command: command.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(Error::CommandFailed {
            plugin: plugin.to_string(),
            command: command.to_string(),
            status: output.status,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(strip_line_terminator(&stdout).to_string())
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

fn strip_line_terminator(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

/// Ask for a value until a non-empty line is entered
///
/// Writes the prompt to `writer` labelled with `label` and returns the line
/// read from `reader` without its terminator.
pub fn prompt_line<R, W>(label: &str, reader: &mut R, writer: &mut W) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    let input_error = |reason: String| Error::PromptInput {
        plugin: label.to_string(),
        reason,
    };

    loop {
        writeln!(writer, "Please provide the input value").map_err(|e| input_error(e.to_string()))?;
        write!(writer, "{} = ", label).map_err(|e| input_error(e.to_string()))?;
        writer.flush().map_err(|e| input_error(e.to_string()))?;

        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| input_error(e.to_string()))?;
        if read == 0 {
            return Err(input_error("end of input".to_string()));
        }

        let line = strip_line_terminator(&line);
        if !line.is_empty() {
            return Ok(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_lookup_variable() {
        let user_data = HashMap::from([("username".to_string(), "admin".to_string())]);
        assert_eq!(lookup_variable(&user_data, "username"), Some("admin".to_string()));
        assert_eq!(lookup_variable(&user_data, "password"), None);
    }

    #[test]
    fn test_strip_single_terminator() {
        assert_eq!(strip_line_terminator("value\n"), "value");
        assert_eq!(strip_line_terminator("value\r\n"), "value");
        assert_eq!(strip_line_terminator("value\n\n"), "value\n");
        assert_eq!(strip_line_terminator("value"), "value");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command() {
        assert_eq!(run_command("otp", "echo 123456").unwrap(), "123456");
        assert_eq!(run_command("multi", "printf 'a\\nb\\n'").unwrap(), "a\nb");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_failure() {
        let result = run_command("broken", "exit 3");
        assert!(matches!(result, Err(Error::CommandFailed { .. })));
    }

    #[test]
    fn test_prompt_retries_until_non_empty() {
        let mut reader = Cursor::new("\n\r\n424242\n");
        let mut writer = Vec::new();

        let value = prompt_line("mfa_code", &mut reader, &mut writer).unwrap();
        assert_eq!(value, "424242");

        let shown = String::from_utf8(writer).unwrap();
        assert_eq!(shown.matches("mfa_code = ").count(), 3);
    }

    #[test]
    fn test_prompt_end_of_input() {
        let mut reader = Cursor::new("");
        let mut writer = Vec::new();
        let result = prompt_line("mfa_code", &mut reader, &mut writer);
        assert!(matches!(result, Err(Error::PromptInput { .. })));
    }
}
