use thiserror::Error;

/// Raised when an agent is constructed without one of its required parameters.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("{0} parameter missing")]
    Missing(&'static str),
    #[error("tool `{0}` is declared but has no registered handler")]
    UnhandledTool(String),
    #[error("handler `{0}` is registered but no tool spec declares it")]
    UndeclaredHandler(String),
}

/// Treats `None`, blank strings and empty collections alike as a missing parameter.
pub fn require<T>(value: Option<T>, parameter: &'static str) -> Result<T, ArgumentError>
where
    T: Presence,
{
    match value {
        Some(value) if value.is_present() => Ok(value),
        _ => Err(ArgumentError::Missing(parameter)),
    }
}

pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}
