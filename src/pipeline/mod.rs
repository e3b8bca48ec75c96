pub mod migrate;
pub mod persistence;
pub mod project;
pub mod song_state;
pub mod sparse;
pub mod transpose;

pub use persistence::SetStore;
pub use project::{Pattern, Song, Step, Track};
pub use song_state::SongState;
pub use transpose::{TransposeSequence, TransposeStep};
