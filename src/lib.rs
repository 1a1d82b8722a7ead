//! A command-dispatch engine for building command-line applications.
//!
//! One raw line of text (or an argv-style array) becomes a call to a
//! strongly-typed command handler. The pipeline is small and synchronous:
//! the [`lexer`] splits the input into positioned segments, the [`parser`]
//! decodes them into a command name plus named argument pairs, the
//! [`mapper`] converts those pairs into the argument schema the command
//! declares, and the [`container`] constructs the handler together with its
//! dependency graph. The [`Engine`] ties the pieces together and guarantees
//! the handler is released once execution finishes, successfully or not.
//!
//! Example
//! ```
//! use command_engine::container::{Buildable, ResolvedDeps, ResolutionError};
//! use command_engine::{ArgumentSet, Command, CommandArgs, DefaultRegistry, Engine, MappingError};
//!
//! struct PingArgs {
//!     count: u32,
//! }
//!
//! impl CommandArgs for PingArgs {
//!     fn from_arguments(arguments: &ArgumentSet<'_>) -> Result<Self, MappingError> {
//!         Ok(PingArgs {
//!             count: arguments.optional("count")?,
//!         })
//!     }
//! }
//!
//! struct Ping;
//!
//! impl Buildable for Ping {
//!     fn assemble(_deps: &mut ResolvedDeps) -> Result<Self, ResolutionError> {
//!         Ok(Ping)
//!     }
//! }
//!
//! impl Command for Ping {
//!     type Args = PingArgs;
//!
//!     fn execute(&self, args: PingArgs) -> anyhow::Result<()> {
//!         assert_eq!(args.count, 3);
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = DefaultRegistry::new();
//! registry.register::<Ping>("ping");
//!
//! let mut engine = Engine::with_defaults(registry);
//! engine.execute("ping -count 3").unwrap();
//! ```

mod builtin;
pub mod command;
pub mod container;
pub mod engine;
pub mod lexer;
pub mod mapper;
pub mod output;
pub mod parser;

pub use command::{
    AnyCommand, Command, CommandExecutor, CommandFactory, CommandRegistry, CommandSpec,
    ContainerFactory, DefaultRegistry, DirectExecutor, ResolvedCommand,
};
pub use container::{Dispose, ResolutionError, TypeContainer};
pub use engine::{Engine, EngineError};
pub use lexer::{Segment, SegmentError};
pub use mapper::{ArgValue, ArgumentMapper, ArgumentSet, CommandArgs, EmptyArgs, MappingError};
pub use output::{CapturedOutput, OutputWriter, StdoutWriter};
pub use parser::Argument;
