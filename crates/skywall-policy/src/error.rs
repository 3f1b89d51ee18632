//! Policy compilation errors

/// Result alias for policy compilation
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Errors produced while compiling policy
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Failed to resolve {kind} '{name}': {reason}")]
    UnresolvedReference {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("Invalid policy input: {0}")]
    InvalidInput(String),

    #[error("Cluster API error: {0}")]
    Cluster(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PolicyError {
    /// A named reference that could not be resolved
    pub fn unresolved(kind: &'static str, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_reference_display() {
        let err = PolicyError::unresolved("practice", "webapp-default", "not found");
        assert_eq!(
            err.to_string(),
            "Failed to resolve practice 'webapp-default': not found"
        );
    }
}
