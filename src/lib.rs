//! Purpose: Client library for a hosted search index service, shared by the `algolia` CLI and tests.
//! Exports: `api` (client, index operations, browse iteration, transport) and `core`.
//! Role: Library backing the binary; `api` is the supported surface.
//! Invariants: Network I/O only happens behind `api::RequestExecutor`.
//! Invariants: Core modules are pure and hold no hidden global state.
pub mod api;
pub mod core;
