pub mod barrier;
pub mod command_buffer;
pub mod command_pool;
pub mod encoder;
