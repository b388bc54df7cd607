//! Evaluate expressions from the command line or an interactive prompt

use std::io::{BufRead, Write};

use super::CliError;
use crate::{Scope, resolve_expression};

/// Evaluate each expression and print its value on its own line.
///
/// Stops at the first failing expression.
pub fn evaluate_expressions<W: Write>(
    expressions: &[String],
    scope: &Scope,
    out: &mut W,
) -> Result<(), CliError> {
    for expression in expressions {
        let value = resolve_expression(expression, scope)?;
        writeln!(out, "{}", value.to_display_string())?;
    }
    Ok(())
}

/// Read expressions line by line until `exit` or end of input.
///
/// Failures are printed and the loop continues. The prompt is only shown
/// when `interactive` is set.
pub fn run_repl<R: BufRead, W: Write>(
    scope: &Scope,
    input: R,
    out: &mut W,
    interactive: bool,
) -> Result<(), CliError> {
    let mut lines = input.lines();
    loop {
        if interactive {
            write!(out, "> ")?;
            out.flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let line = line.trim();
        if line == "exit" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        match resolve_expression(line, scope) {
            Ok(value) => writeln!(out, "{}", value.to_display_string())?,
            Err(e) => writeln!(out, "Error: {}", e)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_repl_continues_after_errors() {
        let input = Cursor::new("1 + 1\nmissing\n'done'\nexit\n'never'\n");
        let mut out = Vec::new();
        run_repl(&Scope::new(), input, &mut out, false).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "2\nError: Unknown variable: missing\ndone\n"
        );
    }

    #[test]
    fn test_evaluate_expressions() {
        let mut out = Vec::new();
        evaluate_expressions(&["0..2".to_string(), "'a' + 1".to_string()], &Scope::new(), &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[0,1,2]\na1\n");
    }
}
