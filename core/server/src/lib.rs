//! RPC-facing glue: request/response shapes, `RequestContext`, and the
//! `DestinationService` that wires the ingestion pipeline together (spec.md
//! §4.14).

mod request_context;
mod service;
mod types;

pub use request_context::RequestContext;
pub use service::{Destination, DestinationService};
pub use types::*;
