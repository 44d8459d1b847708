use crate::capability::LoadError;
use crate::script::SyntaxError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Capability surface is incomplete; missing: {}", missing.join(", "))]
    IncompleteSurface { missing: Vec<&'static str> },

    #[error("Unknown capability name: {name}")]
    UnknownCapability { name: String },

    #[error("Invalid config: {message}")]
    InvalidConfig { message: String },
}
