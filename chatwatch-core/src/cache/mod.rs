pub mod message_buffer;

pub use message_buffer::MessageBuffer;
