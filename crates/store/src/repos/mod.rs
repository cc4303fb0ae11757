//! Repository traits for artifact store operations.

pub mod clusters;
pub mod datasets;
pub mod fingerprints;
pub mod graphs;
pub mod links;
pub mod positions;
pub mod sweep;
pub mod users;

pub use clusters::ClusterRepo;
pub use datasets::DatasetRepo;
pub use fingerprints::FingerprintRepo;
pub use graphs::GraphRepo;
pub use links::AnalysisLinkRepo;
pub use positions::PositionRepo;
pub use sweep::SweepRepo;
pub use users::UserRepo;
