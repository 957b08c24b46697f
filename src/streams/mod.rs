//! Stream layer: the scratch buffer, the decoding input stream and the
//! encoding output stream, plus the pieces they are built from.

pub mod checksums;
pub mod inflate;
pub mod input_stream;
pub mod limited_buffer;
pub mod output_stream;

mod prle;
mod source_reader;

pub use checksums::ChecksumAccumulator;
pub use input_stream::{InputStream, InputStreamBuilder, UnpackResult};
pub use limited_buffer::LimitedBuffer;
pub use output_stream::{OutputStream, OutputStreamBuilder, PackSource};

#[cfg(test)]
pub(crate) use prle::encode as prle_encode;
