use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Generic suffix used for kinds that have no dedicated extension.
pub const GENERIC_EXTENSION: &str = ".xml";

/// Kind of a repository element.
///
/// The kind decides the node-name extension, which is what lets a pipeline
/// and a job with the same name live side by side in one folder. Known kinds
/// form a closed set; anything else is carried as [`ElementKind::Other`] so
/// that paths can still be computed, but the repository refuses to save it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    /// A data pipeline (transformation).
    Transformation,
    /// An orchestration job.
    Job,
    /// A database connection definition.
    Database,
    /// A remote execution server definition.
    SlaveServer,
    /// A cluster scheduling schema.
    ClusterSchema,
    /// A partitioning schema.
    PartitionSchema,
    /// A pipeline step (sub-object of a transformation).
    Step,
    /// A job entry (sub-object of a job).
    JobEntry,
    /// Any tag outside the known set.
    Other(String),
}

impl ElementKind {
    /// All known kinds, in a stable order.
    pub const KNOWN: [ElementKind; 8] = [
        ElementKind::Transformation,
        ElementKind::Job,
        ElementKind::Database,
        ElementKind::SlaveServer,
        ElementKind::ClusterSchema,
        ElementKind::PartitionSchema,
        ElementKind::Step,
        ElementKind::JobEntry,
    ];

    /// Map a type tag to a kind. Unknown tags become [`ElementKind::Other`].
    pub fn from_tag(tag: &str) -> Result<Self, TypeError> {
        let kind = match tag.trim() {
            "" => return Err(TypeError::EmptyKindTag),
            "transformation" => Self::Transformation,
            "job" => Self::Job,
            "database" => Self::Database,
            "slave" => Self::SlaveServer,
            "cluster" => Self::ClusterSchema,
            "partition" => Self::PartitionSchema,
            "step" => Self::Step,
            "jobentry" => Self::JobEntry,
            other => Self::Other(other.to_string()),
        };
        Ok(kind)
    }

    /// The type tag of this kind.
    pub fn tag(&self) -> &str {
        match self {
            Self::Transformation => "transformation",
            Self::Job => "job",
            Self::Database => "database",
            Self::SlaveServer => "slave",
            Self::ClusterSchema => "cluster",
            Self::PartitionSchema => "partition",
            Self::Step => "step",
            Self::JobEntry => "jobentry",
            Self::Other(tag) => tag,
        }
    }

    /// The fixed node-name extension for this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Transformation => ".ktr",
            Self::Job => ".kjb",
            Self::Database => ".kdb",
            Self::SlaveServer => ".ksl",
            Self::ClusterSchema => ".kcs",
            Self::PartitionSchema => ".kps",
            Self::Step => ".kst",
            Self::JobEntry => ".kje",
            Self::Other(_) => GENERIC_EXTENSION,
        }
    }

    /// Sub-object kinds only exist as children of another element.
    pub fn is_sub_object(&self) -> bool {
        matches!(self, Self::Step | Self::JobEntry)
    }

    /// Returns `true` for kinds outside the known set.
    pub fn is_other(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
