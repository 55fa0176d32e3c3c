//! Type-keyed component resolver.
//!
//! A [`TypeResolver`] maps a backend discriminant to exactly one component
//! registration. Components declare their own backend type; the resolver
//! reads it at construction time and never trusts the caller to supply it.
//!
//! Two lifecycles are supported:
//! - **singleton**: one shared instance, for stateless components.
//! - **transient**: a fresh instance per resolution, for components that
//!   carry per-operation state (readers, writers).

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Implemented by every capability; the value is the resolver key.
pub trait BackendComponent {
    type Kind: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn backend_type(&self) -> Self::Kind;
}

/// Builds one fresh component instance.
pub type Factory<C> = Arc<dyn Fn() -> anyhow::Result<Box<C>> + Send + Sync>;

/// How a component is registered.
pub enum Registration<C: ?Sized> {
    Singleton(Arc<C>),
    Transient(Factory<C>),
}

impl<C: ?Sized> Registration<C> {
    #[must_use]
    pub fn singleton(component: Arc<C>) -> Self {
        Self::Singleton(component)
    }

    pub fn transient<F>(factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<C>> + Send + Sync + 'static,
    {
        Self::Transient(Arc::new(factory))
    }
}

impl<C: ?Sized> Clone for Registration<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Singleton(c) => Self::Singleton(Arc::clone(c)),
            Self::Transient(f) => Self::Transient(Arc::clone(f)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no {capability} registered for backend type {backend}")]
    NotRegistered {
        capability: &'static str,
        backend: String,
    },
    #[error("{capability} registered twice for backend type {backend}")]
    Duplicate {
        capability: &'static str,
        backend: String,
    },
    #[error("{capability} factory failed: {message}")]
    FactoryFailed {
        capability: &'static str,
        message: String,
    },
    #[error("{capability} for backend type {backend} is a singleton, not transient")]
    NotTransient {
        capability: &'static str,
        backend: String,
    },
}

/// Resolver for one capability interface.
pub struct TypeResolver<K, C: ?Sized> {
    capability: &'static str,
    registrations: HashMap<K, Registration<C>>,
}

impl<K, C> TypeResolver<K, C>
where
    K: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static,
    C: ?Sized + BackendComponent<Kind = K>,
{
    /// Build the resolver from every registration of one capability.
    ///
    /// Transient factories are invoked once here to learn the backend type
    /// they produce, so a factory that cannot build an instance fails at
    /// startup rather than at first use.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Duplicate`] when two registrations declare
    /// the same backend type and [`ResolveError::FactoryFailed`] when a
    /// transient factory errors.
    pub fn new(
        capability: &'static str,
        registrations: impl IntoIterator<Item = Registration<C>>,
    ) -> Result<Self, ResolveError> {
        let mut map = HashMap::new();
        for registration in registrations {
            let kind = match &registration {
                Registration::Singleton(component) => component.backend_type(),
                Registration::Transient(factory) => factory()
                    .map_err(|e| ResolveError::FactoryFailed {
                        capability,
                        message: format!("{e:#}"),
                    })?
                    .backend_type(),
            };
            if map.insert(kind, registration).is_some() {
                return Err(ResolveError::Duplicate {
                    capability,
                    backend: kind.to_string(),
                });
            }
        }
        Ok(Self {
            capability,
            registrations: map,
        })
    }

    /// An empty resolver; every lookup misses.
    #[must_use]
    pub fn empty(capability: &'static str) -> Self {
        Self {
            capability,
            registrations: HashMap::new(),
        }
    }

    #[must_use]
    pub fn capability(&self) -> &'static str {
        self.capability
    }

    /// Resolve a component, building a fresh one for transient registrations.
    ///
    /// # Errors
    ///
    /// Fails when nothing is registered for `kind` or the factory errors.
    pub fn resolve(&self, kind: K) -> Result<Arc<C>, ResolveError> {
        match self.registration(kind)? {
            Registration::Singleton(component) => Ok(Arc::clone(component)),
            Registration::Transient(factory) => self.build(factory).map(Arc::from),
        }
    }

    /// Like [`resolve`](Self::resolve) but never fails.
    #[must_use]
    pub fn try_resolve(&self, kind: K) -> Option<Arc<C>> {
        match self.resolve(kind) {
            Ok(component) => Some(component),
            Err(ResolveError::NotRegistered { .. }) => None,
            Err(e) => {
                tracing::warn!(
                    capability = self.capability,
                    backend = %kind,
                    error = %e,
                    "Component resolution failed"
                );
                None
            }
        }
    }

    /// Build a fresh, exclusively owned instance.
    ///
    /// # Errors
    ///
    /// Fails when nothing is registered, the registration is a singleton,
    /// or the factory errors.
    pub fn resolve_transient(&self, kind: K) -> Result<Box<C>, ResolveError> {
        match self.registration(kind)? {
            Registration::Transient(factory) => self.build(factory),
            Registration::Singleton(_) => Err(ResolveError::NotTransient {
                capability: self.capability,
                backend: kind.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn is_registered(&self, kind: K) -> bool {
        self.registrations.contains_key(&kind)
    }

    /// Registered backend types, in no particular order.
    #[must_use]
    pub fn registered_types(&self) -> Vec<K> {
        self.registrations.keys().copied().collect()
    }

    fn registration(&self, kind: K) -> Result<&Registration<C>, ResolveError> {
        self.registrations
            .get(&kind)
            .ok_or_else(|| ResolveError::NotRegistered {
                capability: self.capability,
                backend: kind.to_string(),
            })
    }

    fn build(&self, factory: &Factory<C>) -> Result<Box<C>, ResolveError> {
        factory().map_err(|e| ResolveError::FactoryFailed {
            capability: self.capability,
            message: format!("{e:#}"),
        })
    }
}

impl<K: fmt::Debug, C: ?Sized> fmt::Debug for TypeResolver<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeResolver")
            .field("capability", &self.capability)
            .field("backends", &self.registrations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use martflow_types::backend::StorageType;

    use super::*;

    trait Counter: BackendComponent<Kind = StorageType> + Send + Sync {
        fn bump(&mut self) -> usize;
    }

    struct Fixed {
        kind: StorageType,
        count: usize,
    }

    impl BackendComponent for Fixed {
        type Kind = StorageType;

        fn backend_type(&self) -> StorageType {
            self.kind
        }
    }

    impl Counter for Fixed {
        fn bump(&mut self) -> usize {
            self.count += 1;
            self.count
        }
    }

    fn transient(kind: StorageType) -> Registration<dyn Counter> {
        Registration::transient(move || Ok(Box::new(Fixed { kind, count: 0 }) as Box<dyn Counter>))
    }

    #[test]
    fn resolves_component_declaring_requested_type() {
        let resolver = TypeResolver::new(
            "counter",
            [
                Registration::singleton(Arc::new(Fixed {
                    kind: StorageType::BigQuery,
                    count: 0,
                }) as Arc<dyn Counter>),
                transient(StorageType::Athena),
            ],
        )
        .unwrap();

        for kind in StorageType::ALL {
            assert_eq!(resolver.resolve(kind).unwrap().backend_type(), kind);
        }
    }

    #[test]
    fn unregistered_type_fails_resolve_and_try_resolve_is_empty() {
        let resolver = TypeResolver::new("counter", [transient(StorageType::Athena)]).unwrap();
        let err = resolver.resolve(StorageType::BigQuery).err().unwrap();
        assert!(matches!(err, ResolveError::NotRegistered { .. }));
        assert!(resolver.try_resolve(StorageType::BigQuery).is_none());
    }

    #[test]
    fn transient_instances_are_independent() {
        let resolver = TypeResolver::new("counter", [transient(StorageType::Athena)]).unwrap();
        let mut a = resolver.resolve_transient(StorageType::Athena).unwrap();
        let mut b = resolver.resolve_transient(StorageType::Athena).unwrap();
        assert_eq!(a.bump(), 1);
        assert_eq!(a.bump(), 2);
        assert_eq!(b.bump(), 1);
    }

    #[test]
    fn singleton_is_not_transient() {
        let resolver = TypeResolver::new(
            "counter",
            [Registration::singleton(Arc::new(Fixed {
                kind: StorageType::BigQuery,
                count: 0,
            }) as Arc<dyn Counter>)],
        )
        .unwrap();
        let err = resolver.resolve_transient(StorageType::BigQuery).err().unwrap();
        assert!(matches!(err, ResolveError::NotTransient { .. }));
        let first = resolver.resolve(StorageType::BigQuery).unwrap();
        let second = resolver.resolve(StorageType::BigQuery).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let err = TypeResolver::new(
            "counter",
            [transient(StorageType::Athena), transient(StorageType::Athena)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::Duplicate {
                capability: "counter",
                backend: "ATHENA".into()
            }
        );
    }

    #[test]
    fn failing_factory_rejected_at_construction() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let registration: Registration<dyn Counter> = Registration::transient(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("no runtime available")
        });
        let err = TypeResolver::new("counter", [registration]).unwrap_err();
        assert!(matches!(err, ResolveError::FactoryFailed { .. }));
        assert!(err.to_string().contains("no runtime available"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
