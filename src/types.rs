//! NewType wrappers for strong typing throughout the pipeline.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a gene name where a sample ID is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Sample identifier supplied alongside a BAM (e.g. "PT-0042-N").
    ///
    /// Used to name per-sample output directories and, for some tools,
    /// passed straight through as the run name.
    SampleId
);

newtype_string!(
    /// HLA locus name as understood by HLAscan (e.g. "HLA-A").
    HlaGene
);

newtype_string!(
    /// Unique name of a job within a graph (e.g. "lilac/PT-0042-N").
    ///
    /// Names double as checkpoint keys in the job store, so they must be
    /// stable across a start and its restarts.
    JobName
);

newtype_string!(
    /// Identifier of one workflow, minted when its job store is created.
    WorkflowId
);

impl WorkflowId {
    /// Mint a fresh random workflow ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_id_creation() {
        let id = SampleId::new("PT-0042-N");
        assert_eq!(id.as_str(), "PT-0042-N");
        assert_eq!(id.to_string(), "PT-0042-N");
    }

    #[test]
    fn test_sample_id_from_string() {
        let id: SampleId = "PT-1".into();
        assert_eq!(id.as_str(), "PT-1");

        let id: SampleId = String::from("PT-2").into();
        assert_eq!(id.into_inner(), "PT-2");
    }

    #[test]
    fn test_job_name_serde() {
        let name = JobName::new("lilac/PT-1");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"lilac/PT-1\"");

        let parsed: JobName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn test_workflow_ids_are_unique() {
        let a = WorkflowId::generate();
        let b = WorkflowId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_borrow() {
        use std::borrow::Borrow;
        let gene = HlaGene::new("HLA-A");
        let s: &str = gene.borrow();
        assert_eq!(s, "HLA-A");
    }
}
