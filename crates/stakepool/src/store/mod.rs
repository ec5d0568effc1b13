//! Persistence of engine state.

mod sqlite;

pub use sqlite::{StateStore, StoreError, StoredSnapshot};
