use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use codesnake::{Block, CodeWidth, Label, LineIndex};
use log::debug;
use squawk::{
    codegen::{emit_function, EmitOptions},
    compile,
    pipeline::{Compilation, Diagnostic},
    Fuel, Value,
};
use yansi::Paint;

/// Compile Squawk into three-address code
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Source file to compile; starts a REPL when omitted
    file: Option<PathBuf>,
    /// Run a function of the compiled file, e.g. `--run factorial 5`
    #[arg(long, num_args = 1.., allow_hyphen_values = true, value_name = "FUNCTION [ARGS]")]
    run: Option<Vec<String>>,
    /// Instruction budget for each run
    #[arg(long, default_value_t = 1_000_000)]
    fuel: u32,
    /// Leave the comment banner out of the listing
    #[arg(long)]
    no_banner: bool,
    #[arg(long, value_enum, default_value_t = Emit::Text)]
    emit: Emit,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    /// Assembly-like listing
    Text,
    /// The instruction records themselves
    Debug,
}

fn make_block<'a>(idx: &'a LineIndex, diagnostic: &Diagnostic) -> Option<Block<&'a str, String>> {
    let span = diagnostic.span.clone()?;
    Block::new(
        idx,
        [Label::new(span)
            .with_text(diagnostic.message.as_str().red().to_string())
            .with_style(|s| s.red().to_string())],
    )
}

fn report(name: &str, source: &str, diagnostics: &[Diagnostic]) {
    let idx = LineIndex::new(source);
    for diagnostic in diagnostics {
        eprintln!("{} {}", "error:".red().bold(), diagnostic.message);
        let Some(block) = make_block(&idx, diagnostic) else {
            continue;
        };
        let block = block.map_code(|c| CodeWidth::new(c, c.len()));
        eprintln!("{}[{name}]", block.prologue());
        eprint!("{block}");
        eprintln!("{}", block.epilogue());
    }
}

fn parse_values(args: &[impl AsRef<str>]) -> anyhow::Result<Vec<Value>> {
    args.iter()
        .map(|arg| match arg.as_ref() {
            "true" => Ok(1),
            "false" => Ok(0),
            arg => arg
                .parse::<Value>()
                .with_context(|| format!("`{arg}` is not an integer")),
        })
        .collect()
}

fn run(
    compilation: &Compilation,
    call: &[impl AsRef<str>],
    fuel: &mut Fuel,
) -> anyhow::Result<Value> {
    let Some((function, args)) = call.split_first() else {
        bail!("no function given to run");
    };
    let values = parse_values(args)?;
    debug!("running {}{values:?}", function.as_ref());
    Ok(compilation.machine().call(function.as_ref(), &values, fuel)?)
}

fn compile_file(path: &Path, args: &Args) -> anyhow::Result<()> {
    let source =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path.display().to_string();

    let compilation = match compile(&source) {
        Ok(compilation) => compilation,
        Err(error) => {
            report(&name, &source, &error.diagnostics());
            bail!("could not parse {name}");
        }
    };
    let diagnostics = compilation
        .errors()
        .iter()
        .map(Diagnostic::from)
        .collect::<Vec<_>>();
    report(&name, &source, &diagnostics);

    match args.emit {
        Emit::Text => print!(
            "{}",
            compilation.render(&EmitOptions {
                banner: !args.no_banner
            })
        ),
        Emit::Debug => println!("{:#?}", compilation.program()),
    }

    if let Some(call) = &args.run {
        let value = run(&compilation, call.as_slice(), &mut Fuel::with(args.fuel))?;
        println!("{value}");
    }

    if !diagnostics.is_empty() {
        bail!("{} function(s) in {name} failed to lower", diagnostics.len());
    }
    Ok(())
}

/// Source a REPL line was checked against, with what went wrong
#[derive(Debug)]
struct Rejected {
    source: String,
    diagnostics: Vec<Diagnostic>,
}

/// Definitions the REPL has accepted so far
#[derive(Debug, Default)]
struct Session {
    definitions: String,
}

impl Session {
    /// Accepts `line` only if the session still compiles with it, and returns the listing
    /// of the functions it defined.
    fn define(&mut self, line: &str) -> Result<String, Rejected> {
        let offset = self.definitions.len();
        let source = format!("{}{line}\n", self.definitions);
        let compilation = match compile(&source) {
            Ok(compilation) => compilation,
            Err(error) => {
                let diagnostics = error.diagnostics();
                return Err(Rejected { source, diagnostics });
            }
        };
        if !compilation.errors().is_empty() {
            let diagnostics = compilation.errors().iter().map(Diagnostic::from).collect();
            return Err(Rejected { source, diagnostics });
        }

        // only list what this line defined
        let mut listing = String::new();
        for function in &compilation.ast.functions {
            if function.span.as_ref().is_some_and(|span| span.start >= offset) {
                if let Some(lowered) = compilation.program().function(&function.name) {
                    listing.push_str(&emit_function(lowered));
                }
            }
        }
        self.definitions = source;
        Ok(listing)
    }

    fn reset(&mut self) {
        self.definitions = String::new();
    }

    fn run(&self, call: &[impl AsRef<str>], fuel: &mut Fuel) -> anyhow::Result<Value> {
        let compilation = compile(&self.definitions)?;
        run(&compilation, call, fuel)
    }
}

fn repl(args: &Args) -> anyhow::Result<()> {
    let mut readline = rustyline::DefaultEditor::new()?;
    let mut session = Session::default();
    let mut fuel = Fuel::with(args.fuel);

    while let Ok(input) = readline.readline(">> ") {
        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        readline.add_history_entry(line)?;

        let words = line.split_whitespace().collect::<Vec<_>>();
        match words.as_slice() {
            [":quit" | ":q"] => break,
            [":reset"] => session.reset(),
            [":run", call @ ..] => {
                fuel.refill(args.fuel, args.fuel);
                match session.run(call, &mut fuel) {
                    Ok(value) => println!("{value}"),
                    Err(error) => eprintln!("{} {error}", "error:".red().bold()),
                }
            }
            [command, ..] if command.starts_with(':') => {
                eprintln!("{} unknown command `{command}`", "error:".red().bold());
            }
            _ => match session.define(line) {
                Ok(listing) => print!("{listing}"),
                Err(rejected) => report("repl", &rejected.source, &rejected.diagnostics),
            },
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match &args.file {
        Some(path) => compile_file(path, &args),
        None => repl(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use assert2::{check, let_assert};
    use squawk::{runtime::RuntimeError, Fuel};

    #[test]
    fn define_lists_only_the_new_function() {
        let mut session = Session::default();
        let_assert!(Ok(listing) = session.define("fn one() -> Int = 1"));
        check!(listing == "function one():\n    mov t0, 1\n    ret t0\n");

        let_assert!(Ok(listing) = session.define("fn two() -> Int = one() + one()"));
        check!(listing.starts_with("function two():\n"));
        check!(!listing.contains("function one"));
        check!(session.run(&["two"], &mut Fuel::default()).ok() == Some(2));
    }

    #[test]
    fn rejected_lines_leave_the_session_alone() {
        let mut session = Session::default();
        let_assert!(Ok(_) = session.define("fn one() -> Int = 1"));
        let_assert!(Err(rejected) = session.define("fn bad() -> Int = missing"));
        check!(rejected.diagnostics.len() == 1);
        check!(rejected.source.ends_with("fn bad() -> Int = missing\n"));
        let_assert!(Err(_) = session.define("fn broken( -> Int = 1"));
        check!(session.definitions == "fn one() -> Int = 1\n");
    }

    #[test]
    fn reset_forgets_definitions() {
        let mut session = Session::default();
        let_assert!(Ok(_) = session.define("fn one() -> Int = 1"));
        check!(session.run(&["one"], &mut Fuel::default()).ok() == Some(1));

        session.reset();
        check!(session.definitions.is_empty());
        let_assert!(Err(error) = session.run(&["one"], &mut Fuel::default()));
        let_assert!(
            Some(RuntimeError::UnknownFunction { name }) = error.downcast_ref::<RuntimeError>()
        );
        check!(name.as_ref() == "one");
    }
}
