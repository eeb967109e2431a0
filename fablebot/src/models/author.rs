//! Author model: a chat identity with its stories and options.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::story::Story;

/// Default meta-command prefix for new authors.
const DEFAULT_PREFIX: &str = "?";

/// Validation failures for registry mutations. Always user-facing, never
/// operator faults.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("story name is empty")]
    EmptyName,

    #[error("story name '{0}' must be a single word without spaces")]
    InvalidName(String),

    #[error("no story found with name '{0}'")]
    UnknownStory(String),

    #[error("cannot set an empty prefix")]
    EmptyPrefix,

    #[error("option name '{0}' is unknown")]
    UnknownOption(String),
}

/// User-configurable values, used when routing commands and formatting
/// output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Prefix marking a message as a meta-command during a live session.
    pub prefix: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

/// A chat identity together with its stories and options.
///
/// Stories keep insertion order; names are unique within one author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    /// Opaque identity string, stable per chat identity.
    pub id: String,
    /// Per-author options.
    pub options: Options,
    /// Stories in creation order.
    pub stories: Vec<Story>,
}

impl Author {
    /// Create a new author with default options and no stories.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            options: Options::default(),
            stories: Vec::new(),
        }
    }

    /// Look up a story by name.
    pub fn story(&self, name: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.name == name)
    }

    /// Create a story with the given name, or replace the source of an
    /// existing one. Returns the story ready for compilation.
    pub fn upsert_story(
        &mut self,
        name: &str,
        source: Vec<u8>,
    ) -> Result<&mut Story, RegistryError> {
        validate_name(name)?;

        let index = match self.stories.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.stories.push(Story::new(name, self.id.clone()));
                self.stories.len() - 1
            }
        };

        let story = &mut self.stories[index];
        story.set_source(source);
        Ok(story)
    }

    /// Remove the named story.
    pub fn remove_story(&mut self, name: &str) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        match self.stories.iter().position(|s| s.name == name) {
            Some(index) => {
                self.stories.remove(index);
                Ok(())
            }
            None => Err(RegistryError::UnknownStory(name.to_string())),
        }
    }

    /// Set a named option. Option names are matched case-insensitively;
    /// only `prefix` is recognized.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), RegistryError> {
        match name.to_lowercase().as_str() {
            "prefix" => {
                if value.is_empty() {
                    return Err(RegistryError::EmptyPrefix);
                }
                self.options.prefix = value.to_string();
                Ok(())
            }
            _ => Err(RegistryError::UnknownOption(name.to_string())),
        }
    }
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::EmptyName);
    }
    if name.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}
