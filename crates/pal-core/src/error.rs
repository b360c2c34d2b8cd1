use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Unknown unit system code: {code}")]
    UnknownUnitCode { code: i32 },

    #[error("Unknown unit system label: {label}")]
    UnknownUnitLabel { label: String },
}
