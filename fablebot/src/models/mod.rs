//! Data models for fablebot entities.

mod author;
mod story;

pub use author::{Author, Options, RegistryError};
pub use story::Story;
