//! Persistence for learner training state.
//!
//! Two forms are supported: JSON, which is what travels inside `run`
//! requests and `move` responses, and a compact binary file (postcard
//! payload framed by a magic/version header and a CRC32C trailer) for
//! keeping a lineage on disk between sessions.

mod training;

pub use training::{
    SerializationError,
    to_json,
    from_json,
    to_bytes,
    from_bytes,
    write_to_path,
    read_from_path,
};
