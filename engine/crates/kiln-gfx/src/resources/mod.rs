pub mod allocator;
pub mod buffer;
pub mod render_target_cache;
pub mod texture;
