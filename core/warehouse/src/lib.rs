//! MotherDuck connection lifecycle and ephemeral staging catalogs (spec
//! §4.4, §4.9).

mod connection_factory;
mod staging_catalog;

pub use connection_factory::ConnectionFactory;
pub use staging_catalog::StagingCatalog;
