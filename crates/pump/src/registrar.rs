use tableraft_lineage::{BranchBirthCertificate, BranchHistory, HistoryError};
use tableraft_primitives::BranchId;
use thiserror::Error;
use tracing::debug;

/// Durable record of branch birth certificates.
///
/// A successful return means the certificate is persisted; the pump does not
/// publish contracts naming a branch before that.
pub trait BranchRegistrar {
    fn register_branch(
        &mut self,
        branch: BranchId,
        certificate: &BranchBirthCertificate,
    ) -> Result<(), RegistrarError>;
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistrarError {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("registrar unavailable: {0}")]
    Unavailable(String),
}

/// Keeps the registered branches in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRegistrar {
    history: BranchHistory,
}

impl InMemoryRegistrar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn history(&self) -> &BranchHistory {
        &self.history
    }
}

impl From<BranchHistory> for InMemoryRegistrar {
    fn from(history: BranchHistory) -> Self {
        Self { history }
    }
}

impl BranchRegistrar for InMemoryRegistrar {
    fn register_branch(
        &mut self,
        branch: BranchId,
        certificate: &BranchBirthCertificate,
    ) -> Result<(), RegistrarError> {
        if !self.history.insert(branch, certificate.clone())? {
            debug!(%branch, "Branch already registered");
        }

        Ok(())
    }
}
