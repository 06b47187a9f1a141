//! Box slug policy.
//!
//! A slug is the only box identifier that leaves the system (printed in the
//! box's code image, used in `/boxes/slug/{slug}` lookups). Callers may
//! choose one; otherwise a random token is generated.

use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Longest accepted caller-supplied slug.
pub const MAX_SLUG_LEN: usize = 128;

/// Source of fresh slugs.
pub trait SlugGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Generates random v4 UUIDs in their hyphenated lowercase form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSlugGenerator;

impl SlugGenerator for UuidSlugGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Where the slug of a new box came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugChoice {
    /// Supplied by the caller; used verbatim.
    Supplied(String),
    /// Produced by a [`SlugGenerator`].
    Generated(String),
}

impl SlugChoice {
    pub fn as_str(&self) -> &str {
        match self {
            SlugChoice::Supplied(s) | SlugChoice::Generated(s) => s,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, SlugChoice::Generated(_))
    }
}

/// Checks that a slug is non-empty, bounded, and made of URL-unreserved
/// characters only (`A-Z a-z 0-9 - . _ ~`).
pub fn validate_slug(slug: &str) -> StoreResult<()> {
    if slug.is_empty() {
        return Err(StoreError::validation("slug must not be empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(StoreError::validation(format!(
            "slug must be at most {} characters",
            MAX_SLUG_LEN
        )));
    }
    if let Some(c) = slug.chars().find(|c| !is_unreserved(*c)) {
        return Err(StoreError::validation(format!(
            "slug contains invalid character '{}'",
            c
        )));
    }
    Ok(())
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// Picks the slug for a new box: the caller's if non-empty (validated),
/// otherwise a generated one.
pub fn choose_slug(supplied: Option<&str>, generator: &dyn SlugGenerator) -> StoreResult<SlugChoice> {
    match supplied {
        Some(s) if !s.is_empty() => {
            validate_slug(s)?;
            Ok(SlugChoice::Supplied(s.to_string()))
        }
        _ => Ok(SlugChoice::Generated(generator.generate())),
    }
}
