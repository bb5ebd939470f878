//! The client error module.

use std::io;

use thiserror::Error;

/// The failure classes surfaced by the daemon.
///
/// No variant is fatal to the whole process. Every failure is scoped to the
/// interface and family it was raised for, and an interface holding a valid
/// lease keeps it through a failed operation. Packet level trouble never
/// reaches this type, the engines drop bad datagrams and keep running.
#[derive(Debug, Error)]
pub enum Error {
    /// A socket or other resource operation failed.
    #[error("resource: {0}")]
    Resource(io::Error),
    /// The configuration failed validation.
    #[error("configuration: {0}")]
    Config(&'static str),
}
