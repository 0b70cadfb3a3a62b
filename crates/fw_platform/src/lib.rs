pub mod config;
pub mod storage;
pub mod transport;

pub use config::AppConfig;
pub use storage::{FileStore, MemoryStore, Storage, StorageError};
pub use transport::{
    HttpTransport, Method, Request, ScriptedTransport, Transport, TransportError, TransportState,
};
