//! Interactive exploration of explanations.
//!
//! A small command loop over arbitrary input/output streams, so it works
//! on a terminal as well as under test. Commands:
//!
//! ```text
//! explain rel(arg, ...)   print the derivation tree of a tuple
//! rules rel               list the rules deriving a relation
//! setdepth n              change the recursion bound
//! format ascii|json       switch the output rendering
//! exit                    leave the loop
//! ```

use std::io::{BufRead, Write};

use crate::{error::Error, interpreter::Interpreter};

use super::explain::Explainer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Ascii,
    Json,
}

/// Run the interactive exploration loop until `exit` or end of input.
pub fn explore(
    engine: &Interpreter,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<(), Error> {
    let mut explainer = Explainer::new(engine)?;
    let mut format = OutputFormat::Ascii;

    writeln!(output, "Explore the current results; `exit` leaves.")?;
    for line in input.lines() {
        let line = line?;
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        let (verb, rest) = match command.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (command, ""),
        };

        match verb {
            "exit" | "quit" => break,
            "setdepth" => match rest.parse::<usize>() {
                Ok(depth) => {
                    explainer.set_depth_limit(depth);
                    writeln!(output, "depth limit is now {}", explainer.depth_limit())?;
                }
                Err(_) => writeln!(output, "usage: setdepth <number>")?,
            },
            "format" => match rest {
                "ascii" => format = OutputFormat::Ascii,
                "json" => format = OutputFormat::Json,
                _ => writeln!(output, "usage: format ascii|json")?,
            },
            "rules" => match engine.unit().rules() {
                Some(catalog) => {
                    let mut any = false;
                    for (index, rule) in catalog.rules_for(rest) {
                        writeln!(output, "R{}: {rule}", index + 1)?;
                        any = true;
                    }
                    if !any {
                        writeln!(output, "no rules derive \"{rest}\"")?;
                    }
                }
                None => writeln!(output, "no rule metadata available")?,
            },
            "explain" => match parse_query(rest) {
                Some((relation, arguments)) => {
                    match explainer.explain(relation, &arguments) {
                        Ok(tree) => match format {
                            OutputFormat::Ascii => write!(output, "{}", tree.ascii())?,
                            OutputFormat::Json => writeln!(
                                output,
                                "{}",
                                tree.json(explainer.with_heights())
                            )?,
                        },
                        Err(error) => writeln!(output, "{error}")?,
                    }
                }
                None => writeln!(output, "usage: explain rel(arg, ...)")?,
            },
            _ => {
                writeln!(
                    output,
                    "commands: explain rel(arg, ...) | rules rel | setdepth n | format ascii|json | exit"
                )?;
            }
        }
    }

    Ok(())
}

/// Split `rel(a, b)` into the relation name and its argument strings.
fn parse_query(text: &str) -> Option<(&str, Vec<String>)> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close < open {
        return None;
    }
    let relation = text[..open].trim();
    if relation.is_empty() {
        return None;
    }
    let inner = &text[open + 1..close];
    let arguments = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner
            .split(',')
            .map(|argument| argument.trim().to_owned())
            .collect()
    };
    Some((relation, arguments))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_parsing() {
        let (relation, arguments) = parse_query("target(\"2\")").unwrap();
        assert_eq!(relation, "target");
        assert_eq!(arguments, vec!["\"2\"".to_owned()]);

        let (relation, arguments) = parse_query("path(1, 3)").unwrap();
        assert_eq!(relation, "path");
        assert_eq!(arguments, vec!["1".to_owned(), "3".to_owned()]);

        assert!(parse_query("no parens").is_none());
        assert!(parse_query(")(").is_none());
    }
}
