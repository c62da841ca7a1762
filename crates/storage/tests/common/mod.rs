pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{backends, read_all, seeded_bytes, write_block};
