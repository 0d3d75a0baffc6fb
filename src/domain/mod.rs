pub mod record;
pub mod source;

pub use record::{Record, RecordSet};
pub use source::Source;
