pub mod line_index;
pub mod location;
pub mod resolver;

pub use line_index::LineIndex;
pub use location::{LocationRef, parse_location};
pub use resolver::{Occurrence, PrepareRename, find_occurrences, prepare_rename, token_at};
