//! Core data models for Biblio.
//!
//! These types are shared across all Biblio crates and represent the
//! bibliographic records and the authority data they reference.

pub mod common;
pub mod dataset;
pub mod directory;
pub mod publication;

pub use common::{
    AccessLevel, Contributor, ContributorRole, Identifier, Link, RecordCommon, RelatedOrganization,
    RelatedProject, Status, Text,
};
pub use dataset::Dataset;
pub use directory::{Organization, OrganizationKind, Person, Project, Role, User};
pub use publication::{Conference, OrcidWork, Publication, PublicationFile, PublicationKind};
