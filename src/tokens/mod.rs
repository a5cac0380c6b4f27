pub mod codec;
pub mod service;

pub use codec::{CodecError, HmacCodec};
