//! The dispatch engine: sequences command lookup, argument mapping, handler
//! resolution, execution and release.
//!
//! Each `execute` call runs start-to-finish on the caller's thread and keeps
//! no state across calls. Errors are never recovered internally; the only
//! guaranteed cleanup is the release of the handler once one has been
//! resolved, which runs on the success and failure paths alike.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::builtin::SystemRegistry;
use crate::command::{CommandExecutor, CommandFactory, CommandRegistry, CommandSpec};
use crate::container::{ResolutionError, TypeContainer};
use crate::lexer::SegmentError;
use crate::mapper::{ArgumentMapper, MappingError};
use crate::output::{OutputWriter, StdoutWriter};
use crate::parser::{self, Argument};

/// Errors surfaced by [`Engine::execute`]. Nothing is retried or converted
/// into a partial result; every failure is final for that invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] SegmentError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("the command {name:?} is not supported")]
    UnknownCommand { name: String },

    #[error("command factory {factory} returned no instance for command {command:?}")]
    FactoryContractViolation {
        command: String,
        factory: &'static str,
    },

    #[error("command failed: {0}")]
    Command(anyhow::Error),
}

/// Shared view of the user command registry, registered into the container
/// seeded for built-in commands.
#[derive(Clone)]
pub struct RegistryHandle(Rc<dyn CommandRegistry>);

impl RegistryHandle {
    pub fn find(&self, name: &str) -> Option<&CommandSpec> {
        self.0.find(name)
    }

    pub fn command_names(&self) -> Vec<String> {
        self.0.command_names()
    }
}

/// Shared view of the built-in command registry.
#[derive(Clone)]
pub struct SystemRegistryHandle(Rc<SystemRegistry>);

impl SystemRegistryHandle {
    pub fn command_names(&self) -> Vec<String> {
        self.0.command_names()
    }
}

/// Shared view of the user command factory.
#[derive(Clone)]
pub struct FactoryHandle(Rc<RefCell<dyn CommandFactory>>);

/// Shared view of the argument mapper.
#[derive(Clone)]
pub struct MapperHandle(Rc<ArgumentMapper>);

impl MapperHandle {
    pub fn mapper(&self) -> &ArgumentMapper {
        &self.0
    }
}

/// Shared view of the command executor.
#[derive(Clone)]
pub struct ExecutorHandle(Rc<dyn CommandExecutor>);

/// Shared view of the settable output writer.
#[derive(Clone)]
pub struct OutputHandle(Rc<RefCell<Box<dyn OutputWriter>>>);

impl OutputHandle {
    pub fn write_line(&self, line: &str) {
        self.0.borrow_mut().write_line(line);
    }
}

/// The command-dispatch engine.
///
/// Holds the two registries (built-in and user), the argument mapper, and
/// the host-supplied factory and executor. See the crate documentation for
/// a complete example.
pub struct Engine {
    registry: Rc<dyn CommandRegistry>,
    factory: Rc<RefCell<dyn CommandFactory>>,
    factory_label: &'static str,
    mapper: Rc<ArgumentMapper>,
    executor: Rc<dyn CommandExecutor>,
    system: Rc<SystemRegistry>,
    output: Rc<RefCell<Box<dyn OutputWriter>>>,
}

impl Engine {
    pub fn new<R, F, E>(registry: R, factory: F, executor: E) -> Self
    where
        R: CommandRegistry + 'static,
        F: CommandFactory + 'static,
        E: CommandExecutor + 'static,
    {
        Engine {
            registry: Rc::new(registry),
            factory_label: std::any::type_name::<F>(),
            factory: Rc::new(RefCell::new(factory)),
            mapper: Rc::new(ArgumentMapper::new()),
            executor: Rc::new(executor),
            system: Rc::new(SystemRegistry::create_and_initialize()),
            output: Rc::new(RefCell::new(Box::new(StdoutWriter))),
        }
    }

    /// An engine over the given registry with the container-backed factory
    /// and the direct executor.
    pub fn with_defaults(registry: crate::command::DefaultRegistry) -> Self {
        Engine::new(
            registry,
            crate::command::ContainerFactory::new(),
            crate::command::DirectExecutor,
        )
    }

    pub fn registry(&self) -> &dyn CommandRegistry {
        &*self.registry
    }

    pub fn mapper(&self) -> &ArgumentMapper {
        &self.mapper
    }

    /// Replaces the sink built-in commands write to.
    pub fn set_output_writer(&mut self, writer: impl OutputWriter + 'static) {
        *self.output.borrow_mut() = Box::new(writer);
    }

    /// Executes a single raw command line.
    pub fn execute(&mut self, line: &str) -> Result<(), EngineError> {
        let name = parser::extract_command_name(line);
        let arguments = parser::extract_arguments(line)?;
        self.dispatch(&name, &arguments)
    }

    /// Executes an argv-style invocation: `argv[0]` is the command name and
    /// every later element that does not look like a flag is wrapped in
    /// quotes before re-tokenizing, so raw values containing spaces survive
    /// without the caller pre-quoting them.
    pub fn execute_argv<S: AsRef<str>>(&mut self, argv: &[S]) -> Result<(), EngineError> {
        let name = argv
            .first()
            .map(|element| element.as_ref().to_owned())
            .unwrap_or_default();
        let requoted: Vec<String> = argv
            .iter()
            .skip(1)
            .map(|element| {
                let raw = element.as_ref();
                if raw.starts_with('-') {
                    raw.to_owned()
                } else {
                    format!("\"{raw}\"")
                }
            })
            .collect();
        let arguments = parser::parse_arguments(&requoted.join(" "))?;
        self.dispatch(&name, &arguments)
    }

    fn dispatch(&mut self, name: &str, arguments: &[Argument]) -> Result<(), EngineError> {
        debug!(command = name, arguments = arguments.len(), "dispatching");

        let system = self.system.clone();
        if let Some(spec) = system.find(name) {
            return self.run_system(spec, arguments);
        }

        let registry = self.registry.clone();
        let Some(spec) = registry.find(name) else {
            return Err(EngineError::UnknownCommand {
                name: name.to_owned(),
            });
        };
        self.run_user(spec, arguments)
    }

    /// Built-ins resolve through a dedicated container seeded with the
    /// engine's collaborators, and are not released through the factory.
    fn run_system(&mut self, spec: &CommandSpec, arguments: &[Argument]) -> Result<(), EngineError> {
        debug!(command = spec.name(), "running built-in command");

        let container = self.seeded_container();
        let resolved = spec.resolve_with(&container)?;
        let args = self.mapper.map_for(spec, arguments)?;
        self.executor
            .execute(resolved.command(), args)
            .map_err(EngineError::Command)
    }

    fn run_user(&mut self, spec: &CommandSpec, arguments: &[Argument]) -> Result<(), EngineError> {
        let args = self.mapper.map_for(spec, arguments)?;

        let resolved = self.factory.borrow_mut().resolve(spec)?.ok_or_else(|| {
            EngineError::FactoryContractViolation {
                command: spec.name().to_owned(),
                factory: self.factory_label,
            }
        })?;

        let result = self.executor.execute(resolved.command(), args);
        // The handler is released whether or not execution succeeded.
        self.factory.borrow_mut().release(resolved);
        result.map_err(EngineError::Command)
    }

    fn seeded_container(&self) -> TypeContainer {
        let mut container = TypeContainer::new();
        container.register_instance(Rc::new(RegistryHandle(self.registry.clone())));
        container.register_instance(Rc::new(FactoryHandle(self.factory.clone())));
        container.register_instance(Rc::new(MapperHandle(self.mapper.clone())));
        container.register_instance(Rc::new(ExecutorHandle(self.executor.clone())));
        container.register_instance(Rc::new(SystemRegistryHandle(self.system.clone())));
        container.register_instance(Rc::new(OutputHandle(self.output.clone())));
        container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{
        Command, ContainerFactory, DefaultRegistry, DirectExecutor, ResolvedCommand,
    };
    use crate::container::{Buildable, Dependency, Dispose, ResolvedDeps};
    use crate::mapper::{ArgumentSet, CommandArgs, EmptyArgs};
    use crate::output::CapturedOutput;
    use std::cell::Cell;

    /// Shared recorder the test commands write their invocations into.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    struct CopyArgs {
        from: String,
        verbose: bool,
    }

    impl CommandArgs for CopyArgs {
        fn from_arguments(arguments: &ArgumentSet<'_>) -> Result<Self, MappingError> {
            Ok(CopyArgs {
                from: arguments.required("from")?,
                verbose: arguments.optional("verbose")?,
            })
        }
    }

    struct CopyCommand {
        recorder: Rc<Recorder>,
    }

    impl Buildable for CopyCommand {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::provided::<Recorder>()]
        }

        fn assemble(deps: &mut ResolvedDeps) -> Result<Self, ResolutionError> {
            Ok(CopyCommand {
                recorder: deps.take()?,
            })
        }
    }

    impl Command for CopyCommand {
        type Args = CopyArgs;

        fn execute(&self, args: CopyArgs) -> anyhow::Result<()> {
            self.recorder
                .calls
                .borrow_mut()
                .push(format!("{} verbose={}", args.from, args.verbose));
            Ok(())
        }
    }

    fn engine_with_recorder() -> (Engine, Rc<Recorder>) {
        let recorder = Rc::new(Recorder::default());
        let mut container = TypeContainer::new();
        container.register_instance(recorder.clone());

        let mut registry = DefaultRegistry::new();
        registry.register::<CopyCommand>("copy");

        let engine = Engine::new(
            registry,
            ContainerFactory::with_container(container),
            DirectExecutor,
        );
        (engine, recorder)
    }

    #[test]
    fn executes_a_raw_line_end_to_end() {
        let (mut engine, recorder) = engine_with_recorder();

        engine.execute("copy -from here -verbose").unwrap();

        assert_eq!(*recorder.calls.borrow(), vec!["here verbose=true"]);
    }

    #[test]
    fn argv_values_with_spaces_survive_requoting() {
        let (mut engine, recorder) = engine_with_recorder();

        engine
            .execute_argv(&["copy", "-from", "a b c", "-verbose"])
            .unwrap();

        assert_eq!(*recorder.calls.borrow(), vec!["a b c verbose=true"]);
    }

    #[test]
    fn argv_and_line_forms_produce_the_same_argument_list() {
        let (mut by_argv, argv_recorder) = engine_with_recorder();
        let (mut by_line, line_recorder) = engine_with_recorder();

        by_argv
            .execute_argv(&["copy", "value with spaces", "-from", "x"])
            .unwrap();
        by_line.execute("copy \"value with spaces\" -from x").unwrap();

        assert_eq!(*argv_recorder.calls.borrow(), *line_recorder.calls.borrow());
    }

    #[test]
    fn an_unknown_command_names_the_offender() {
        let (mut engine, _) = engine_with_recorder();

        let err = engine.execute("teleport -to mars").unwrap_err();

        match err {
            EngineError::UnknownCommand { name } => assert_eq!(name, "teleport"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mapping_errors_surface_before_resolution() {
        let (mut engine, recorder) = engine_with_recorder();

        let err = engine.execute("copy -verbose").unwrap_err();

        assert!(matches!(
            err,
            EngineError::Mapping(MappingError::MissingRequiredArgument { .. })
        ));
        assert!(recorder.calls.borrow().is_empty());
    }

    #[test]
    fn parse_errors_surface_with_their_offset() {
        let (mut engine, _) = engine_with_recorder();

        let err = engine.execute("copy -from \"here").unwrap_err();

        match err {
            EngineError::Parse(parse) => {
                assert_eq!(parse.error_offset, 5);
                assert_eq!(parse.input, "\"here");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct SilentFactory;

    impl CommandFactory for SilentFactory {
        fn resolve(
            &mut self,
            _spec: &CommandSpec,
        ) -> Result<Option<ResolvedCommand>, ResolutionError> {
            Ok(None)
        }

        fn release(&mut self, _command: ResolvedCommand) {}
    }

    #[test]
    fn a_factory_returning_nothing_violates_its_contract() {
        let mut registry = DefaultRegistry::new();
        registry.register::<CopyCommand>("copy");
        let mut engine = Engine::new(registry, SilentFactory, DirectExecutor);

        let err = engine.execute("copy -from here").unwrap_err();

        match err {
            EngineError::FactoryContractViolation { command, factory } => {
                assert_eq!(command, "copy");
                assert!(factory.contains("SilentFactory"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Disposable handler that fails on execution.
    struct FailingCommand {
        disposals: Cell<u32>,
    }

    impl Buildable for FailingCommand {
        fn assemble(_deps: &mut ResolvedDeps) -> Result<Self, ResolutionError> {
            Ok(FailingCommand {
                disposals: Cell::new(0),
            })
        }

        fn disposal(self: &Rc<Self>) -> Option<Rc<dyn Dispose>> {
            Some(self.clone() as Rc<dyn Dispose>)
        }
    }

    impl Dispose for FailingCommand {
        fn dispose(&self) {
            self.disposals.set(self.disposals.get() + 1);
        }
    }

    impl Command for FailingCommand {
        type Args = EmptyArgs;

        fn execute(&self, _args: EmptyArgs) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    /// Factory wrapper counting how often the engine calls `release`.
    struct CountingFactory {
        inner: ContainerFactory,
        releases: Rc<Cell<u32>>,
    }

    impl CommandFactory for CountingFactory {
        fn resolve(
            &mut self,
            spec: &CommandSpec,
        ) -> Result<Option<ResolvedCommand>, ResolutionError> {
            self.inner.resolve(spec)
        }

        fn release(&mut self, command: ResolvedCommand) {
            self.releases.set(self.releases.get() + 1);
            self.inner.release(command);
        }
    }

    #[test]
    fn the_handler_is_released_exactly_once_when_execution_fails() {
        let mut registry = DefaultRegistry::new();
        registry.register::<FailingCommand>("fail");

        let releases = Rc::new(Cell::new(0));
        let factory = CountingFactory {
            inner: ContainerFactory::new(),
            releases: releases.clone(),
        };
        let mut engine = Engine::new(registry, factory, DirectExecutor);

        let err = engine.execute("fail").unwrap_err();

        assert!(matches!(err, EngineError::Command(_)));
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn the_handler_is_released_after_a_successful_run() {
        let recorder = Rc::new(Recorder::default());
        let mut container = TypeContainer::new();
        container.register_instance(recorder.clone());

        let mut registry = DefaultRegistry::new();
        registry.register::<CopyCommand>("copy");

        let releases = Rc::new(Cell::new(0));
        let factory = CountingFactory {
            inner: ContainerFactory::with_container(container),
            releases: releases.clone(),
        };
        let mut engine = Engine::new(registry, factory, DirectExecutor);

        engine.execute("copy -from here").unwrap();

        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn a_pre_registered_handler_is_not_disposed_by_release() {
        let shared = Rc::new(FailingCommand {
            disposals: Cell::new(0),
        });
        let mut container = TypeContainer::new();
        container.register_instance(shared.clone());

        let mut registry = DefaultRegistry::new();
        registry.register::<FailingCommand>("fail");
        let mut engine = Engine::new(
            registry,
            ContainerFactory::with_container(container),
            DirectExecutor,
        );

        let err = engine.execute("fail").unwrap_err();

        assert!(matches!(err, EngineError::Command(_)));
        assert_eq!(shared.disposals.get(), 0);
    }

    #[test]
    fn help_lists_built_in_and_user_commands() {
        let (mut engine, _) = engine_with_recorder();
        let (writer, lines) = CapturedOutput::with_handle();
        engine.set_output_writer(writer);

        engine.execute("help").unwrap();

        let lines = lines.borrow();
        assert_eq!(lines[0], "available commands:");
        assert!(lines.contains(&"  help".to_owned()));
        assert!(lines.contains(&"  copy".to_owned()));
    }

    #[test]
    fn empty_input_is_an_unknown_command() {
        let (mut engine, _) = engine_with_recorder();

        let err = engine.execute("").unwrap_err();

        assert!(matches!(err, EngineError::UnknownCommand { name } if name.is_empty()));
    }
}
