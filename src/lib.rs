mod deferred;
mod error;
mod outcome;
mod state;
mod types;

pub use deferred::Deferred;
pub use error::Error;
pub use outcome::Try;
pub use state::State;
pub use types::BoxError;
