//! Service layer for the GeoJSON upload API.
//! - `geojson`: document model and the shallow shape validator.
//! - `storage`: the `DocumentStore` seam and its filesystem implementation.
//! - Handlers in the `server` crate only talk to these through `ServiceError`.

pub mod errors;
pub mod geojson;
pub mod runtime;
pub mod storage;
