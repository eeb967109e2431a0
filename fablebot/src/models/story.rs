//! Story model: one named interactive-fiction program belonging to an author.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named Inform 7 program, in source and (optionally) compiled form.
///
/// `build` stays `None` until the first successful compile, and is only ever
/// replaced wholesale: a failed compile leaves the previous build intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    /// User-provided name, unique within one author. A single
    /// whitespace-free token.
    pub name: String,
    /// ID of the owning author, kept for lookups.
    pub author_id: String,
    /// When the story was first added (UTC).
    pub created_at: DateTime<Utc>,
    /// When the source or build last changed (UTC).
    pub updated_at: DateTime<Utc>,
    /// Raw Inform 7 source text.
    pub source: Vec<u8>,
    /// Compiled Z-machine story file, absent until the first good build.
    pub build: Option<Vec<u8>>,
}

impl Story {
    /// Create a new story with empty source and no build.
    pub fn new(name: impl Into<String>, author_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            author_id: author_id.into(),
            created_at: now,
            updated_at: now,
            source: Vec::new(),
            build: None,
        }
    }

    /// Replace the source text, touching the update timestamp.
    pub fn set_source(&mut self, source: Vec<u8>) {
        self.source = source;
        self.updated_at = Utc::now();
    }

    /// Record a successful build, touching the update timestamp.
    pub fn set_build(&mut self, build: Vec<u8>) {
        self.build = Some(build);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_story_has_no_build() {
        let story = Story::new("cave", "alice");
        assert_eq!(story.name, "cave");
        assert_eq!(story.author_id, "alice");
        assert!(story.source.is_empty());
        assert!(story.build.is_none());
    }

    #[test]
    fn set_source_touches_updated_at() {
        let mut story = Story::new("cave", "alice");
        let before = story.updated_at;
        story.set_source(b"\"Cave\" by Alice".to_vec());
        assert!(story.updated_at >= before);
        assert!(!story.source.is_empty());
    }

    #[test]
    fn set_build_keeps_source() {
        let mut story = Story::new("cave", "alice");
        story.set_source(b"src".to_vec());
        story.set_build(vec![1, 2, 3]);
        assert_eq!(story.source, b"src");
        assert_eq!(story.build.as_deref(), Some(&[1u8, 2, 3][..]));
    }
}
