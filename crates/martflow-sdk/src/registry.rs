//! Capability registry.
//!
//! Connectors push their components into a [`CapabilitiesBuilder`]; the
//! engine builds it once at startup into [`Capabilities`], one resolver per
//! capability interface.

use std::sync::Arc;

use martflow_types::backend::{DestinationType, StorageType};

use crate::capability::{
    CredentialsProcessor, CredentialsValidator, DestinationAccessValidator, QueryBuilder,
    ReportReader, ReportWriter, SchemaMerger, SchemaParser, SchemaProvider, SecretKeyRotator,
    SqlDryRunExecutor, StorageAccessValidator, TitleGenerator,
};
use crate::resolver::{Registration, ResolveError, TypeResolver};

type Regs<C> = Vec<Registration<C>>;

/// Storage-side resolvers.
#[derive(Debug)]
pub struct StorageCapabilities {
    pub access_validators: TypeResolver<StorageType, dyn StorageAccessValidator>,
    pub query_builders: TypeResolver<StorageType, dyn QueryBuilder>,
    pub schema_providers: TypeResolver<StorageType, dyn SchemaProvider>,
    pub schema_mergers: TypeResolver<StorageType, dyn SchemaMerger>,
    pub schema_parsers: TypeResolver<StorageType, dyn SchemaParser>,
    pub readers: TypeResolver<StorageType, dyn ReportReader>,
    pub dry_runners: TypeResolver<StorageType, dyn SqlDryRunExecutor>,
    pub title_generators: TypeResolver<StorageType, dyn TitleGenerator>,
}

/// Destination-side resolvers.
#[derive(Debug)]
pub struct DestinationCapabilities {
    pub access_validators: TypeResolver<DestinationType, dyn DestinationAccessValidator>,
    pub credentials_validators: TypeResolver<DestinationType, dyn CredentialsValidator>,
    pub credentials_processors: TypeResolver<DestinationType, dyn CredentialsProcessor>,
    pub secret_key_rotators: TypeResolver<DestinationType, dyn SecretKeyRotator>,
    pub writers: TypeResolver<DestinationType, dyn ReportWriter>,
}

/// Every resolver the engine dispatches through.
#[derive(Debug)]
pub struct Capabilities {
    pub storage: StorageCapabilities,
    pub destination: DestinationCapabilities,
}

impl Capabilities {
    #[must_use]
    pub fn builder() -> CapabilitiesBuilder {
        CapabilitiesBuilder::default()
    }
}

#[derive(Default)]
pub struct CapabilitiesBuilder {
    storage_access_validators: Regs<dyn StorageAccessValidator>,
    query_builders: Regs<dyn QueryBuilder>,
    schema_providers: Regs<dyn SchemaProvider>,
    schema_mergers: Regs<dyn SchemaMerger>,
    schema_parsers: Regs<dyn SchemaParser>,
    readers: Regs<dyn ReportReader>,
    dry_runners: Regs<dyn SqlDryRunExecutor>,
    title_generators: Regs<dyn TitleGenerator>,
    destination_access_validators: Regs<dyn DestinationAccessValidator>,
    credentials_validators: Regs<dyn CredentialsValidator>,
    credentials_processors: Regs<dyn CredentialsProcessor>,
    secret_key_rotators: Regs<dyn SecretKeyRotator>,
    writers: Regs<dyn ReportWriter>,
}

impl CapabilitiesBuilder {
    pub fn storage_access_validator(&mut self, c: Arc<dyn StorageAccessValidator>) -> &mut Self {
        self.storage_access_validators.push(Registration::singleton(c));
        self
    }

    pub fn query_builder(&mut self, c: Arc<dyn QueryBuilder>) -> &mut Self {
        self.query_builders.push(Registration::singleton(c));
        self
    }

    pub fn schema_provider(&mut self, c: Arc<dyn SchemaProvider>) -> &mut Self {
        self.schema_providers.push(Registration::singleton(c));
        self
    }

    pub fn schema_merger(&mut self, c: Arc<dyn SchemaMerger>) -> &mut Self {
        self.schema_mergers.push(Registration::singleton(c));
        self
    }

    pub fn schema_parser(&mut self, c: Arc<dyn SchemaParser>) -> &mut Self {
        self.schema_parsers.push(Registration::singleton(c));
        self
    }

    /// Readers are transient: `factory` runs once per resolution.
    pub fn report_reader<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Box<dyn ReportReader>> + Send + Sync + 'static,
    {
        self.readers.push(Registration::transient(factory));
        self
    }

    pub fn sql_dry_run_executor(&mut self, c: Arc<dyn SqlDryRunExecutor>) -> &mut Self {
        self.dry_runners.push(Registration::singleton(c));
        self
    }

    pub fn title_generator(&mut self, c: Arc<dyn TitleGenerator>) -> &mut Self {
        self.title_generators.push(Registration::singleton(c));
        self
    }

    pub fn destination_access_validator(
        &mut self,
        c: Arc<dyn DestinationAccessValidator>,
    ) -> &mut Self {
        self.destination_access_validators.push(Registration::singleton(c));
        self
    }

    pub fn credentials_validator(&mut self, c: Arc<dyn CredentialsValidator>) -> &mut Self {
        self.credentials_validators.push(Registration::singleton(c));
        self
    }

    pub fn credentials_processor(&mut self, c: Arc<dyn CredentialsProcessor>) -> &mut Self {
        self.credentials_processors.push(Registration::singleton(c));
        self
    }

    pub fn secret_key_rotator(&mut self, c: Arc<dyn SecretKeyRotator>) -> &mut Self {
        self.secret_key_rotators.push(Registration::singleton(c));
        self
    }

    /// Writers are transient: `factory` runs once per resolution.
    pub fn report_writer<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Box<dyn ReportWriter>> + Send + Sync + 'static,
    {
        self.writers.push(Registration::transient(factory));
        self
    }

    /// Build every resolver.
    ///
    /// # Errors
    ///
    /// Fails on the first duplicate registration or failing factory.
    pub fn build(self) -> Result<Capabilities, ResolveError> {
        let storage = StorageCapabilities {
            access_validators: TypeResolver::new(
                "storage access validator",
                self.storage_access_validators,
            )?,
            query_builders: TypeResolver::new("query builder", self.query_builders)?,
            schema_providers: TypeResolver::new("schema provider", self.schema_providers)?,
            schema_mergers: TypeResolver::new("schema merger", self.schema_mergers)?,
            schema_parsers: TypeResolver::new("schema parser", self.schema_parsers)?,
            readers: TypeResolver::new("report reader", self.readers)?,
            dry_runners: TypeResolver::new("sql dry-run executor", self.dry_runners)?,
            title_generators: TypeResolver::new("title generator", self.title_generators)?,
        };
        let destination = DestinationCapabilities {
            access_validators: TypeResolver::new(
                "destination access validator",
                self.destination_access_validators,
            )?,
            credentials_validators: TypeResolver::new(
                "credentials validator",
                self.credentials_validators,
            )?,
            credentials_processors: TypeResolver::new(
                "credentials processor",
                self.credentials_processors,
            )?,
            secret_key_rotators: TypeResolver::new(
                "secret key rotator",
                self.secret_key_rotators,
            )?,
            writers: TypeResolver::new("report writer", self.writers)?,
        };
        tracing::debug!(
            storages = ?storage.readers.registered_types(),
            destinations = ?destination.writers.registered_types(),
            "Capability registry built"
        );
        Ok(Capabilities {
            storage,
            destination,
        })
    }
}
