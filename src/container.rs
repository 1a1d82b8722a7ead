//! A minimal type container: recursive dependency resolution with cascading
//! disposal of everything newly created under a resolution root.
//!
//! Construction is ordinary dispatch over the [`Buildable`] capability: a
//! type exposes its constructor parameter list ([`Buildable::dependencies`])
//! and a factory function ([`Buildable::assemble`]); no runtime introspection
//! is involved. Resolution walks the parameter list depth-first, hands each
//! pending construction to the pluggable [`Creator`], and returns the
//! instance together with an explicit ownership record of every disposable
//! it newly created. Releasing the root walks that record.
//!
//! Cyclic dependency graphs are a caller error: resolution recurses until
//! the stack gives out.

use std::any::{Any, TypeId, type_name};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

/// Errors raised during dependency resolution.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// A parameter declared as externally provided was never registered.
    #[error("no instance registered for type {type_name}")]
    NotRegistered { type_name: &'static str },

    /// The creator returned an instance of a different type than requested.
    #[error("creator returned a mismatched instance for type {type_name}")]
    CreatorContract { type_name: &'static str },

    /// A constructor argument value did not match the declared parameter
    /// type, or too few values were supplied.
    #[error("constructor argument for {type_name} has the wrong type")]
    ArgumentMismatch { type_name: &'static str },
}

/// Disposal capability: releases held resources when the owner is released.
///
/// Takes `&self` because resolved instances are shared; implementors keep
/// their disposal state behind interior mutability.
pub trait Dispose {
    fn dispose(&self);
}

/// Construction capability used by [`TypeContainer::resolve`].
pub trait Buildable: Any + Sized {
    /// Constructor parameter list, in declaration order.
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    /// Builds the instance from resolved parameter values, taken in the
    /// order declared by [`Buildable::dependencies`].
    fn assemble(deps: &mut ResolvedDeps) -> Result<Self, ResolutionError>;

    /// Disposal view of the instance. Types carrying the [`Dispose`]
    /// capability override this to hand back themselves so releasing their
    /// resolution root can cascade onto them.
    fn disposal(self: &Rc<Self>) -> Option<Rc<dyn Dispose>> {
        None
    }
}

/// One constructor parameter of a buildable type.
pub struct Dependency {
    type_id: TypeId,
    type_name: &'static str,
    blueprint: Option<Blueprint>,
}

impl Dependency {
    /// A parameter satisfied by a pre-registered instance or, failing that,
    /// by recursive construction.
    pub fn on<D: Buildable>() -> Self {
        Dependency {
            type_id: TypeId::of::<D>(),
            type_name: type_name::<D>(),
            blueprint: Some(Blueprint::of::<D>()),
        }
    }

    /// A parameter that must be satisfied by a pre-registered instance.
    pub fn provided<D: Any>() -> Self {
        Dependency {
            type_id: TypeId::of::<D>(),
            type_name: type_name::<D>(),
            blueprint: None,
        }
    }
}

/// How to construct one type: the reified [`Buildable`] contract.
struct Blueprint {
    type_id: TypeId,
    type_name: &'static str,
    dependencies: fn() -> Vec<Dependency>,
    construct: fn(Vec<Rc<dyn Any>>) -> Result<Rc<dyn Any>, ResolutionError>,
    disposal: fn(&Rc<dyn Any>) -> Option<Rc<dyn Dispose>>,
}

impl Blueprint {
    fn of<T: Buildable>() -> Self {
        Blueprint {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            dependencies: T::dependencies,
            construct: |values| {
                let mut deps = ResolvedDeps::new(values);
                T::assemble(&mut deps).map(|instance| Rc::new(instance) as Rc<dyn Any>)
            },
            disposal: |instance| {
                instance
                    .clone()
                    .downcast::<T>()
                    .ok()
                    .and_then(|typed| T::disposal(&typed))
            },
        }
    }
}

/// Resolved constructor parameter values, consumed in declaration order.
pub struct ResolvedDeps {
    values: VecDeque<Rc<dyn Any>>,
}

impl ResolvedDeps {
    fn new(values: Vec<Rc<dyn Any>>) -> Self {
        ResolvedDeps {
            values: values.into(),
        }
    }

    /// Takes the next parameter value, downcast to its declared type.
    pub fn take<T: Any>(&mut self) -> Result<Rc<T>, ResolutionError> {
        self.values
            .pop_front()
            .ok_or(ResolutionError::ArgumentMismatch {
                type_name: type_name::<T>(),
            })?
            .downcast::<T>()
            .map_err(|_| ResolutionError::ArgumentMismatch {
                type_name: type_name::<T>(),
            })
    }
}

/// A pending construction: the requested type and its resolved constructor
/// argument values, handed to the [`Creator`].
pub struct CreationRequest {
    type_id: TypeId,
    type_name: &'static str,
    arguments: Vec<Rc<dyn Any>>,
    construct: fn(Vec<Rc<dyn Any>>) -> Result<Rc<dyn Any>, ResolutionError>,
}

impl CreationRequest {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn arguments(&self) -> &[Rc<dyn Any>] {
        &self.arguments
    }

    /// Direct construction from the resolved arguments.
    pub fn construct(self) -> Result<Rc<dyn Any>, ResolutionError> {
        (self.construct)(self.arguments)
    }
}

/// The pluggable function turning a type and its resolved constructor
/// arguments into an instance.
pub trait Creator {
    fn create(&self, request: CreationRequest) -> Result<Rc<dyn Any>, ResolutionError>;
}

/// Default creator: direct construction.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectCreator;

impl Creator for DirectCreator {
    fn create(&self, request: CreationRequest) -> Result<Rc<dyn Any>, ResolutionError> {
        request.construct()
    }
}

/// A resolved instance together with its ownership record: every disposable
/// newly created while resolving it, the root included when it is
/// disposable. Pre-registered instances never enter the record because they
/// are owned by whoever registered them.
pub struct Resolved<T: ?Sized> {
    instance: Rc<T>,
    owned: Vec<Rc<dyn Dispose>>,
}

impl<T: ?Sized> std::fmt::Debug for Resolved<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("type", &type_name::<T>())
            .field("owned", &self.owned.len())
            .finish()
    }
}

impl<T: ?Sized> Resolved<T> {
    pub(crate) fn from_parts(instance: Rc<T>, owned: Vec<Rc<dyn Dispose>>) -> Self {
        Resolved { instance, owned }
    }

    pub fn instance(&self) -> &Rc<T> {
        &self.instance
    }

    pub(crate) fn into_parts(self) -> (Rc<T>, Vec<Rc<dyn Dispose>>) {
        (self.instance, self.owned)
    }
}

impl<T: Dispose + 'static> Resolved<T> {
    /// Adopts an already-built disposable so it can be released directly,
    /// without having gone through [`TypeContainer::resolve`].
    pub fn from_raw(instance: Rc<T>) -> Self {
        let owned: Vec<Rc<dyn Dispose>> = vec![instance.clone()];
        Resolved { instance, owned }
    }
}

/// Generic recursive dependency resolver with per-resolution disposal
/// tracking.
pub struct TypeContainer {
    instances: HashMap<TypeId, Rc<dyn Any>>,
    creator: Box<dyn Creator>,
}

impl Default for TypeContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContainer {
    pub fn new() -> Self {
        Self::with_creator(DirectCreator)
    }

    /// A container whose constructions go through `creator` instead of
    /// direct construction.
    pub fn with_creator(creator: impl Creator + 'static) -> Self {
        TypeContainer {
            instances: HashMap::new(),
            creator: Box::new(creator),
        }
    }

    /// Pins a concrete, externally-owned instance: future resolutions of
    /// `T` return it directly, without construction and without disposal
    /// tracking.
    pub fn register_instance<T: Any>(&mut self, instance: Rc<T>) {
        self.instances.insert(TypeId::of::<T>(), instance);
    }

    /// Resolves an instance of `T`, constructing its dependency graph
    /// depth-first. Newly created disposables are recorded in the returned
    /// ownership record for [`TypeContainer::release`] to cascade over.
    pub fn resolve<T: Buildable>(&self) -> Result<Resolved<T>, ResolutionError> {
        if let Some(existing) = self.instances.get(&TypeId::of::<T>()) {
            let instance =
                existing
                    .clone()
                    .downcast::<T>()
                    .map_err(|_| ResolutionError::ArgumentMismatch {
                        type_name: type_name::<T>(),
                    })?;
            return Ok(Resolved::from_parts(instance, Vec::new()));
        }

        let mut owned = Vec::new();
        let instance = self
            .build(&Blueprint::of::<T>(), &mut owned)?
            .downcast::<T>()
            .map_err(|_| ResolutionError::CreatorContract {
                type_name: type_name::<T>(),
            })?;
        Ok(Resolved::from_parts(instance, owned))
    }

    fn build(
        &self,
        blueprint: &Blueprint,
        owned: &mut Vec<Rc<dyn Dispose>>,
    ) -> Result<Rc<dyn Any>, ResolutionError> {
        trace!(type_name = blueprint.type_name, "constructing");

        let mut arguments = Vec::new();
        for dependency in (blueprint.dependencies)() {
            arguments.push(self.resolve_dependency(&dependency, owned)?);
        }

        let request = CreationRequest {
            type_id: blueprint.type_id,
            type_name: blueprint.type_name,
            arguments,
            construct: blueprint.construct,
        };
        let instance = self.creator.create(request)?;
        if (*instance).type_id() != blueprint.type_id {
            return Err(ResolutionError::CreatorContract {
                type_name: blueprint.type_name,
            });
        }

        if let Some(handle) = (blueprint.disposal)(&instance) {
            owned.push(handle);
        }
        Ok(instance)
    }

    fn resolve_dependency(
        &self,
        dependency: &Dependency,
        owned: &mut Vec<Rc<dyn Dispose>>,
    ) -> Result<Rc<dyn Any>, ResolutionError> {
        if let Some(existing) = self.instances.get(&dependency.type_id) {
            return Ok(existing.clone());
        }
        match &dependency.blueprint {
            Some(blueprint) => self.build(blueprint, owned),
            None => Err(ResolutionError::NotRegistered {
                type_name: dependency.type_name,
            }),
        }
    }

    /// Releases a resolution root: disposes every handle in its ownership
    /// record exactly once, regardless of how many paths reference it.
    /// Order among siblings is unspecified.
    pub fn release<T: ?Sized>(&self, resolved: Resolved<T>) {
        let (_, owned) = resolved.into_parts();
        let mut seen: Vec<*const ()> = Vec::new();
        for handle in owned {
            let identity = Rc::as_ptr(&handle) as *const ();
            if seen.contains(&identity) {
                continue;
            }
            seen.push(identity);
            handle.dispose();
        }
    }
}
