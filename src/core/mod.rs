// Core pieces with no network dependency: query encoding, cancellation, errors.
pub mod cancel;
pub mod error;
pub mod query;
