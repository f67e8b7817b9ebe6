//! Metadata cache: schemes, types and the external type registry.

pub mod external_types;
pub mod facade;
pub mod store;

pub use external_types::{
    ExternalType, ExternalTypeBinding, ExternalTypeDescriptor, ExternalTypeRegistry,
    MetadataProvider, ScanReport, TypeCatalog,
};
pub use facade::{MetadataCache, MetadataRegistry};
pub use store::DomainMetadataStore;
