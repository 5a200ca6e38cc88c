pub mod config;
pub mod matching;
pub mod progress;
pub mod sessions;

pub use config::*;
pub use matching::*;
pub use progress::*;
pub use sessions::*;
