//! Built-in commands, resolved through a container seeded with the engine's
//! own collaborators.
//!
//! The engine consults the system registry before the user registry, so
//! these names shadow user registrations. Each built-in declares the
//! collaborator handles it needs as ordinary constructor dependencies and is
//! wired up by the same [`TypeContainer`](crate::container::TypeContainer)
//! machinery user commands go through.

use std::rc::Rc;

use anyhow::Result;

use crate::command::{Command, CommandSpec};
use crate::container::{Buildable, Dependency, ResolutionError, ResolvedDeps};
use crate::engine::{OutputHandle, RegistryHandle, SystemRegistryHandle};
use crate::mapper::EmptyArgs;

/// Registry of built-in commands.
pub struct SystemRegistry {
    specs: Vec<CommandSpec>,
}

impl SystemRegistry {
    /// The built-ins known to the engine. Hosts cannot remove these.
    pub(crate) fn create_and_initialize() -> Self {
        let specs = vec![CommandSpec::of::<HelpCommand>("help")];
        SystemRegistry { specs }
    }

    pub fn find(&self, name: &str) -> Option<&CommandSpec> {
        self.specs.iter().find(|spec| spec.name() == name)
    }

    pub fn command_names(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.name().to_owned()).collect()
    }
}

/// Lists every registered command through the output writer, built-ins
/// first, then user commands in registration order.
pub(crate) struct HelpCommand {
    system: Rc<SystemRegistryHandle>,
    registry: Rc<RegistryHandle>,
    output: Rc<OutputHandle>,
}

impl Buildable for HelpCommand {
    fn dependencies() -> Vec<Dependency> {
        vec![
            Dependency::provided::<SystemRegistryHandle>(),
            Dependency::provided::<RegistryHandle>(),
            Dependency::provided::<OutputHandle>(),
        ]
    }

    fn assemble(deps: &mut ResolvedDeps) -> Result<Self, ResolutionError> {
        Ok(HelpCommand {
            system: deps.take()?,
            registry: deps.take()?,
            output: deps.take()?,
        })
    }
}

impl Command for HelpCommand {
    type Args = EmptyArgs;

    fn execute(&self, _args: EmptyArgs) -> Result<()> {
        self.output.write_line("available commands:");
        for name in self.system.command_names() {
            self.output.write_line(&format!("  {name}"));
        }
        for name in self.registry.command_names() {
            self.output.write_line(&format!("  {name}"));
        }
        Ok(())
    }
}
