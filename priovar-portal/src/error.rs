use priovar_http::HttpError;
use thiserror::Error;

use crate::record::RecordId;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("backend request failed: {0}")]
    Http(#[from] HttpError),

    #[error("patient {0} is not in the current list")]
    UnknownPatient(RecordId),

    #[error("patient {0} has no file attached")]
    MissingFile(RecordId),

    #[error("file of patient {0} carries neither a VCF id nor a FASTQ pair id")]
    MissingFileId(RecordId),

    #[error("no {0} is waiting for confirmation")]
    NothingPending(&'static str),

    #[error("no health center selected")]
    NoHealthCenter,

    #[error("session store error: {0}")]
    Session(String),
}

impl PortalError {
    pub fn session<T: Into<String>>(msg: T) -> Self {
        Self::Session(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
