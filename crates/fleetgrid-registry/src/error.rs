//! Registry errors.

use fleetgrid_state::{StateError, Status};
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("alias {0} already exists")]
    Conflict(String),

    #[error(transparent)]
    State(#[from] StateError),
}

impl RegistryError {
    pub fn status(&self) -> Status {
        match self {
            RegistryError::InvalidParameter(_) => Status::InvalidParameter,
            RegistryError::NotFound(_) => Status::NotFound,
            RegistryError::Conflict(_) => Status::Conflict,
            RegistryError::State(e) => e.status(),
        }
    }
}
