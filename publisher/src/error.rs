use thiserror::Error;

/// Errors raised by a counter subsystem implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubsystemError {
    #[error("access is denied: {0}")]
    AccessDenied(String),

    #[error("counter category not found: {0}")]
    CategoryNotFound(String),

    #[error("counter '{counter}' not found in category '{category}'")]
    CounterNotFound { category: String, counter: String },
}

/// Fatal: the counter category could not be created or opened.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("not allowed to create counter category '{category}': {source}")]
    AccessDenied {
        category: String,
        #[source]
        source: SubsystemError,
    },

    #[error("failed to provision counter category '{category}': {source}")]
    Subsystem {
        category: String,
        #[source]
        source: SubsystemError,
    },
}

impl ProvisioningError {
    pub(crate) fn from_subsystem(category: &str, source: SubsystemError) -> Self {
        let category = category.to_string();
        match source {
            SubsystemError::AccessDenied(_) => Self::AccessDenied { category, source },
            other => Self::Subsystem {
                category,
                source: other,
            },
        }
    }

    /// Operator guidance when the failure is a privilege problem.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::AccessDenied { .. } => Some(
                "run the publisher with a principal allowed to create counter categories \
                 (e.g. an elevated/administrator session)",
            ),
            Self::Subsystem { .. } => None,
        }
    }
}

/// Recoverable failure inside one generator, aggregator or reporter iteration.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("counter update failed: {0}")]
    Counter(#[from] SubsystemError),

    #[error("allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },

    #[error("worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("operation cancelled")]
    Cancelled,
}

/// Top-level error of a publisher run.
#[derive(Error, Debug)]
pub enum PublisherError {
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
