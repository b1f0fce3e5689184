//! TFRecord output for the TensorFlow Object Detection API.
//!
//! - [`proto`]: `tf.train.Example` messages.
//! - [`RecordWriter`] / [`RecordReader`]: the length + masked CRC32C framing.
//! - [`ExampleRecord`]: one annotated image in the feature layout expected by
//!   object-detection input readers.

mod example;
pub mod proto;
mod reader;
mod writer;

pub use example::{BoxRecord, ExampleRecord, JPEG_FORMAT};
pub use reader::{read_records, RecordReader};
pub use writer::{masked_crc32c, RecordWriter};
