//! ALFA Reveal - Progressive Fetch
//!
//! Streamed HTTP retrieval with chunk-level progress and cooperative abort.

pub mod collector;
pub mod progressive;
pub mod transport;
pub mod units;

pub use collector::{collect, Collected, Flow, TransferBuffer};
pub use progressive::{Blob, Progress, ProgressiveFetcher};
pub use transport::{BodyStream, HttpTransport, Response, Transport};
pub use units::SizeUnits;
