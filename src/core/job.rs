//! Work items and panic payload handling

use std::any::Any;

/// A unit of work: argument-less, result-less, run at most once
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Box a closure into a [`Work`] item
pub fn work<F>(f: F) -> Work
where
    F: FnOnce() + Send + 'static,
{
    Box::new(f)
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
