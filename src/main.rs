//! Interactive demo shell for the command engine.
//!
//! Registers a couple of example commands and reads lines in a loop, handing
//! each one to [`Engine::execute`].

use anyhow::Result;
use argh::FromArgs;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use command_engine::container::{Buildable, ResolutionError, ResolvedDeps};
use command_engine::{ArgumentSet, Command, CommandArgs, DefaultRegistry, Engine, MappingError};

#[derive(FromArgs)]
/// Interactive demo shell for the command engine.
struct ReplOptions {
    /// prompt shown before each input line
    #[argh(option, default = "String::from(\"> \")")]
    prompt: String,
}

struct GreetArgs {
    name: String,
    shout: bool,
}

impl CommandArgs for GreetArgs {
    fn from_arguments(arguments: &ArgumentSet<'_>) -> Result<Self, MappingError> {
        Ok(GreetArgs {
            name: arguments.required("name")?,
            shout: arguments.optional("shout")?,
        })
    }
}

/// `greet -name world [-shout]`
struct GreetCommand;

impl Buildable for GreetCommand {
    fn assemble(_deps: &mut ResolvedDeps) -> Result<Self, ResolutionError> {
        Ok(GreetCommand)
    }
}

impl Command for GreetCommand {
    type Args = GreetArgs;

    fn execute(&self, args: GreetArgs) -> Result<()> {
        let greeting = format!("hello, {}!", args.name);
        if args.shout {
            println!("{}", greeting.to_uppercase());
        } else {
            println!("{greeting}");
        }
        Ok(())
    }
}

struct SumArgs {
    left: i64,
    right: i64,
}

impl CommandArgs for SumArgs {
    fn from_arguments(arguments: &ArgumentSet<'_>) -> Result<Self, MappingError> {
        Ok(SumArgs {
            left: arguments.required("left")?,
            right: arguments.required("right")?,
        })
    }
}

/// `sum -left 2 -right 3`
struct SumCommand;

impl Buildable for SumCommand {
    fn assemble(_deps: &mut ResolvedDeps) -> Result<Self, ResolutionError> {
        Ok(SumCommand)
    }
}

impl Command for SumCommand {
    type Args = SumArgs;

    fn execute(&self, args: SumArgs) -> Result<()> {
        println!("{}", args.left + args.right);
        Ok(())
    }
}

fn main() -> Result<()> {
    let options: ReplOptions = argh::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut registry = DefaultRegistry::new();
    registry.register::<GreetCommand>("greet");
    registry.register::<SumCommand>("sum");
    let mut engine = Engine::with_defaults(registry);

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline(&options.prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(line.as_str())?;
                if let Err(err) = engine.execute(&line) {
                    eprintln!("error: {err}");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("error: {err:?}");
                break;
            }
        }
    }

    Ok(())
}
