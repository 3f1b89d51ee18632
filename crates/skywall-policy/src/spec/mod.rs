//! Input object graphs for the supported policy schema versions
//!
//! Both versions canonicalize into the output sections in
//! [`crate::sections`]; `v1beta2` converts into the `v1beta1` shapes where
//! the semantics coincide so the compiler core works on one input form.

pub mod v1beta1;
pub mod v1beta2;

use serde::Deserialize;

/// Envelope of a cluster-fetched custom resource: only the `spec` matters
#[derive(Debug, Clone, Deserialize)]
pub struct SpecWrapper<T> {
    /// The resource spec
    pub spec: T,
}
