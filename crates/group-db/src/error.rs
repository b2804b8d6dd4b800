use thiserror::Error;
use vault_primitives::{ActionError, CodecError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GroupDbError {
    #[error("no such account")]
    NoSuchAccount,

    #[error("no such element")]
    NoSuchElement,

    #[error("account already exists")]
    AccountAlreadyExists,

    #[error("action kept a value it did not provide")]
    MissingValue,

    #[error("action rejected: {0}")]
    Action(#[from] ActionError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("store error: {0}")]
    Store(#[from] eyre::Report),
}
