pub mod blob;
mod memory;
mod sqlite;

pub use blob::{BlobError, decode_f64_blob, encode_f64_blob};
pub use memory::MemoryProvider;
pub use sqlite::{
    ChiDatabase, ID_CHUNK_SIZE, MAX_BOUND_PARAMETERS, MAX_UNION_QUERIES, SqliteProvider,
};
