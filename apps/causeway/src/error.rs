use thiserror::Error;

/// Failures a single hub operation can produce.
///
/// Every variant is reported back to the originating session only, as a
/// structured error notice; none of them is fatal to the hub and none of
/// them triggers a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("invalid pin")]
    InvalidPin,
    #[error("service name and url are required")]
    MissingServiceFields,
    #[error("client not registered")]
    NotRegistered,
    #[error("target client not found")]
    TargetNotFound,
}
