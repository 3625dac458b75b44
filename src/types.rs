use crate::outcome::Try;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type Continuation<A> = Box<dyn FnOnce(Try<A>) + Send>;
