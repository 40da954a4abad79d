mod buffer;

pub use buffer::BitsBuffer;
