//! Background workers (projection feeds).

pub mod projection_worker;

pub use projection_worker::{ProjectionWorker, WorkerHandle};
