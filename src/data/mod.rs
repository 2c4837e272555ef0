//! Records and the bounded buffer that holds them.
pub mod record;
pub mod record_buffer;

pub use record::{parse_record, Record};
pub use record_buffer::RecordBuffer;
