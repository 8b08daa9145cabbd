pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::{ConfigLoader, ContainerConfig};
pub use errors::{ConfigError, ContainerError, ContainerResult};
pub use infrastructure::container::{
    downcast, shapes, Arguments, Constructor, ContainerStats, ContractType, Deferred, ExportFactory,
    GenericDefinition, GenericImplementation, Implementation, ImplementationType, Instance, Metadata,
    MetadataExportFactory, MetadataValue, MetadataView, Parameter, Registration, ResolverEngine, ServiceContainer,
    ServiceLifetime, ServiceList, ServiceSequence, ServiceSource,
};
pub use infrastructure::{ContainerBuilder, Module, ModuleError, ModuleManager, ModuleStatus};
