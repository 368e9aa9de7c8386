//! Application layer: data-access contracts and the reference caches.

pub mod error;
pub mod reference;
pub mod repos;
