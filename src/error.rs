use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use simple_error::SimpleError;

use crate::types::BoxError;

const FILTERED_OUT: &str = "filtered out";

// Clones share one allocation, so a propagated failure stays the same error.
#[derive(Clone)]
pub struct Error {
    inner: Arc<dyn std::error::Error + Send + Sync>,
}

impl Error {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::from(SimpleError::new(message))
    }

    pub fn filtered_out() -> Self {
        Self::msg(FILTERED_OUT)
    }

    // `panic!` payloads are `&str` or `String`; anything else only keeps the fact it panicked
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "panicked with a non-string payload".to_string(),
            },
        };
        Self::msg(message)
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    pub fn is_filtered_out(&self) -> bool {
        self.downcast_ref::<SimpleError>()
            .is_some_and(|err| err.as_str() == FILTERED_OUT)
    }

    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }
}

impl<E> From<E> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self { inner: Arc::new(err) }
    }
}

impl From<Error> for BoxError {
    fn from(err: Error) -> Self {
        Box::new(Shared(err.inner))
    }
}

impl Deref for Error {
    type Target = dyn std::error::Error + Send + Sync;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

// Lets an `Error` leave the crate as a boxed std error without losing its source chain.
struct Shared(Arc<dyn std::error::Error + Send + Sync>);

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for Shared {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let err = Error::msg("boom");
        let copy = err.clone();
        assert!(Error::ptr_eq(&err, &copy));
        assert!(!Error::ptr_eq(&err, &Error::msg("boom")));
    }

    #[test]
    fn panic_payloads_are_coerced() {
        let err = Error::from_panic(Box::new("static message"));
        assert_eq!(err.to_string(), "static message");

        let err = Error::from_panic(Box::new(format!("formatted {}", 7)));
        assert_eq!(err.to_string(), "formatted 7");

        let err = Error::from_panic(Box::new(42_u8));
        assert_eq!(err.to_string(), "panicked with a non-string payload");
    }

    #[test]
    fn wraps_std_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::from(io);
        assert_eq!(err.to_string(), "missing");
        assert_eq!(
            err.downcast_ref::<std::io::Error>().map(|io| io.kind()),
            Some(std::io::ErrorKind::NotFound)
        );
    }

    #[test]
    fn filtered_out_is_recognized() {
        assert!(Error::filtered_out().is_filtered_out());
        assert!(!Error::msg("something else").is_filtered_out());
    }

    #[test]
    fn converts_into_box_error() {
        let boxed: BoxError = Error::msg("boxed").into();
        assert_eq!(boxed.to_string(), "boxed");
    }
}
