pub mod audio_api;
pub mod config;
pub mod generator;
pub mod middle;
pub mod pipeline;
pub mod shared;
pub mod sync;
pub mod trigger;
