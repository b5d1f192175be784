use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("no hardware memory context is available")]
    ContextUnavailable,

    #[error("memory registration failed: {0}")]
    RegistrationFailed(String),

    #[error("deregistration of unknown region (lkey {0:#x})")]
    UnknownRegion(u32),
}
