use thiserror::Error;

use crate::response::ResponseStatus;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Illegal response status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: ResponseStatus,
        to: ResponseStatus,
    },
}
