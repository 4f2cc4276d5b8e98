// Shared HTTP and normalization helpers (always available)
pub mod common;

#[cfg(feature = "ancestry")]
pub mod ancestry;
#[cfg(feature = "familysearch")]
pub mod familysearch;
#[cfg(feature = "findmypast")]
pub mod findmypast;
#[cfg(feature = "myheritage")]
pub mod myheritage;
