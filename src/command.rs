//! Command capability traits and the collaborator contracts consumed by the
//! dispatch engine.
//!
//! A command handler implements [`Command`], declaring the argument schema
//! it executes with as an associated type. [`CommandSpec`] reifies a command
//! type so registries can hand it around by name: it knows how to map raw
//! arguments into the declared schema and how to resolve a handler instance
//! through a [`TypeContainer`]. The registry, factory and executor traits are
//! the seams a host application plugs its own implementations into.

use std::any::Any;
use std::rc::Rc;

use anyhow::Result;

use crate::container::{Buildable, ResolutionError, Resolved, TypeContainer};
use crate::mapper::{ArgumentSet, CommandArgs, MappingError};

/// A strongly-typed command handler.
pub trait Command {
    /// Argument schema the handler executes with.
    type Args: CommandArgs;

    fn execute(&self, args: Self::Args) -> Result<()>;
}

/// Object-safe view of a [`Command`], used by the engine and the executor.
///
/// Implemented for every `Command` automatically; the boxed argument value
/// must be an instance of the declared schema.
pub trait AnyCommand {
    fn execute_any(&self, args: Box<dyn Any>) -> Result<()>;
}

impl<C: Command + 'static> AnyCommand for C {
    fn execute_any(&self, args: Box<dyn Any>) -> Result<()> {
        let args = args
            .downcast::<C::Args>()
            .map_err(|_| anyhow::anyhow!("argument instance does not match the declared schema"))?;
        self.execute(*args)
    }
}

/// A reified command type: its name, how to map raw arguments into its
/// declared schema, and how to resolve a handler instance.
pub struct CommandSpec {
    name: String,
    map_arguments: fn(&ArgumentSet<'_>) -> Result<Box<dyn Any>, MappingError>,
    resolve: fn(&TypeContainer) -> Result<ResolvedCommand, ResolutionError>,
}

impl CommandSpec {
    pub fn of<C>(name: impl Into<String>) -> Self
    where
        C: Command + Buildable,
    {
        CommandSpec {
            name: name.into(),
            map_arguments: |arguments| {
                C::Args::from_arguments(arguments).map(|args| Box::new(args) as Box<dyn Any>)
            },
            resolve: |container| {
                container.resolve::<C>().map(|resolved| {
                    let (instance, owned) = resolved.into_parts();
                    ResolvedCommand {
                        inner: Resolved::from_parts(instance as Rc<dyn AnyCommand>, owned),
                    }
                })
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn map_arguments(
        &self,
        arguments: &ArgumentSet<'_>,
    ) -> Result<Box<dyn Any>, MappingError> {
        (self.map_arguments)(arguments)
    }

    pub(crate) fn resolve_with(
        &self,
        container: &TypeContainer,
    ) -> Result<ResolvedCommand, ResolutionError> {
        (self.resolve)(container)
    }
}

/// A resolved handler instance together with the ownership record of every
/// disposable newly created while resolving it.
pub struct ResolvedCommand {
    inner: Resolved<dyn AnyCommand>,
}

impl ResolvedCommand {
    pub fn command(&self) -> &dyn AnyCommand {
        &**self.inner.instance()
    }

    pub(crate) fn into_inner(self) -> Resolved<dyn AnyCommand> {
        self.inner
    }
}

/// Lookup of user-registered commands by name.
pub trait CommandRegistry {
    fn find(&self, name: &str) -> Option<&CommandSpec>;

    /// Registered command names, in registration order.
    fn command_names(&self) -> Vec<String>;
}

/// Insertion-ordered registry backed by a vector; lookups take the first
/// spec registered under a name.
#[derive(Default)]
pub struct DefaultRegistry {
    specs: Vec<CommandSpec>,
}

impl DefaultRegistry {
    pub fn new() -> Self {
        DefaultRegistry::default()
    }

    /// Registers the command type `C` under `name`.
    pub fn register<C>(&mut self, name: &str)
    where
        C: Command + Buildable,
    {
        self.specs.push(CommandSpec::of::<C>(name));
    }
}

impl CommandRegistry for DefaultRegistry {
    fn find(&self, name: &str) -> Option<&CommandSpec> {
        self.specs.iter().find(|spec| spec.name() == name)
    }

    fn command_names(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.name().to_owned()).collect()
    }
}

/// Produces and releases handler instances on behalf of the engine.
pub trait CommandFactory {
    /// Resolves a handler for `spec`. `Ok(None)` means the factory silently
    /// failed — the engine treats that as a fatal contract violation.
    /// Resolution failures propagate as errors.
    fn resolve(&mut self, spec: &CommandSpec) -> Result<Option<ResolvedCommand>, ResolutionError>;

    /// Releases a handler previously produced by
    /// [`CommandFactory::resolve`].
    fn release(&mut self, command: ResolvedCommand);
}

/// Container-backed factory: handlers and their dependency graphs are
/// constructed through a [`TypeContainer`], and release cascades disposal
/// over everything newly created for the handler.
#[derive(Default)]
pub struct ContainerFactory {
    container: TypeContainer,
}

impl ContainerFactory {
    pub fn new() -> Self {
        ContainerFactory::default()
    }

    /// A factory over a prepared container, typically one with shared
    /// services registered as instances.
    pub fn with_container(container: TypeContainer) -> Self {
        ContainerFactory { container }
    }
}

impl CommandFactory for ContainerFactory {
    fn resolve(&mut self, spec: &CommandSpec) -> Result<Option<ResolvedCommand>, ResolutionError> {
        spec.resolve_with(&self.container).map(Some)
    }

    fn release(&mut self, command: ResolvedCommand) {
        self.container.release(command.into_inner());
    }
}

/// Invokes a resolved handler with its mapped argument instance.
pub trait CommandExecutor {
    fn execute(&self, command: &dyn AnyCommand, args: Box<dyn Any>) -> Result<()>;
}

/// Default executor: direct invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectExecutor;

impl CommandExecutor for DirectExecutor {
    fn execute(&self, command: &dyn AnyCommand, args: Box<dyn Any>) -> Result<()> {
        command.execute_any(args)
    }
}
