//! Executes a single external command: print it, spawn it, await its exit.

use crate::error::BuildError;
use crate::jobs::JobPool;
use std::process::Stdio;

/// True if a token would need quoting to survive a POSIX shell.
fn needs_quoting(token: &str) -> bool {
    token.is_empty()
        || token.starts_with('=')
        || token.bytes().any(|b| {
            matches!(
                b,
                b' ' | b'\t'
                    | b'\n'
                    | b'!'
                    | b'"'
                    | b'\''
                    | b'#'
                    | b'$'
                    | b'&'
                    | b'('
                    | b')'
                    | b'*'
                    | b','
                    | b';'
                    | b'<'
                    | b'>'
                    | b'?'
                    | b'['
                    | b'\\'
                    | b']'
                    | b'^'
                    | b'`'
                    | b'{'
                    | b'|'
                    | b'}'
                    | b'~'
            )
        })
}

/// Renders a command vector so it can be copied into a shell: tokens with
/// metacharacters (or a leading `=`) are single-quoted, with embedded single
/// quotes escaped as `'\''`.
pub fn render_command(command: &[String]) -> String {
    let mut out = String::new();
    for (i, token) in command.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if needs_quoting(token) {
            out.push('\'');
            out.push_str(&token.replace('\'', "'\\''"));
            out.push('\'');
        } else {
            out.push_str(token);
        }
    }
    out
}

/// Runs one command under the job pool.  The executable is spawned directly
/// (no shell) with stdin closed and stdout/stderr inherited.  A spawn error
/// or non-zero exit is a `BuildError` naming the rendered command.
pub async fn run_command(jobs: &JobPool, command: &[String], label: &str) -> Result<(), BuildError> {
    let _slot = jobs.slot().await;

    let rendered = render_command(command);
    println!("{}: {}", label, rendered);

    let status = tokio::process::Command::new(&command[0])
        .args(&command[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|err| BuildError::new(format!("failed to run {}: {}", rendered, err)))?;

    if !status.success() {
        return Err(BuildError::new(format!(
            "command {} failed: {}",
            rendered, status
        )));
    }
    Ok(())
}
