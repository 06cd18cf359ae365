//! Logical and physical index names.
//!
//! A logical name (`{prefix}__{endpoint}__{tag}`) is what readers query; it is
//! always an alias. Behind it sit at most two physical indices, the logical
//! name suffixed with `-odd` or `-even`. Exactly one of them is live at any
//! time; the other is absent, staged or stale.

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// Type tag of the asset index.
pub const ASSET_TAG: &str = "asset";

/// Type tag of the asset folder index.
pub const ASSET_FOLDER_TAG: &str = "assetfolder";

/// Type tag of the object folder index.
pub const OBJECT_FOLDER_TAG: &str = "objectfolder";

/// Separator between name segments.
pub const SEGMENT_SEPARATOR: &str = "__";

const FORBIDDEN: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ':', ' '];

/// Checks one name segment against the engine's index naming rules.
pub(crate) fn validate_segment(kind: &str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::invalid_input(format!("{} must not be empty", kind)));
    }
    if value.contains(SEGMENT_SEPARATOR) {
        return Err(CoreError::invalid_input(format!(
            "{} '{}' must not contain '{}'",
            kind, value, SEGMENT_SEPARATOR
        )));
    }
    if value.starts_with('_') || value.ends_with('_') {
        return Err(CoreError::invalid_input(format!(
            "{} '{}' must not start or end with '_'",
            kind, value
        )));
    }
    if value.chars().any(|c| c.is_uppercase() || c.is_whitespace() || FORBIDDEN.contains(&c)) {
        return Err(CoreError::invalid_input(format!(
            "{} '{}' must be lowercase and free of reserved characters",
            kind, value
        )));
    }
    Ok(())
}

/// Stable name readers query; bound as an alias to the live physical index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalIndexName {
    name: String,
    tag_start: usize,
}

impl LogicalIndexName {
    /// Builds `{prefix}__{endpoint}__{tag}`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if a segment is empty, contains
    /// `__`, starts or ends with `_`, or holds uppercase letters or characters
    /// the engine rejects.
    pub fn new(prefix: &str, endpoint: &str, tag: &str) -> CoreResult<Self> {
        validate_segment("index prefix", prefix)?;
        validate_segment("endpoint name", endpoint)?;
        validate_segment("type tag", tag)?;

        let name = format!(
            "{}{sep}{}{sep}{}",
            prefix,
            endpoint,
            tag,
            sep = SEGMENT_SEPARATOR
        );
        let tag_start = name.len() - tag.len();
        Ok(Self { name, tag_start })
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Returns the type tag segment.
    pub fn tag(&self) -> &str {
        &self.name[self.tag_start..]
    }

    /// Returns the physical index name with the given parity.
    pub fn physical(&self, parity: Parity) -> PhysicalIndexName {
        PhysicalIndexName::new(self.clone(), parity)
    }

    /// Wildcard matching every index of an endpoint.
    pub fn endpoint_pattern(prefix: &str, endpoint: &str) -> String {
        format!(
            "{}{sep}{}{sep}*",
            prefix,
            endpoint,
            sep = SEGMENT_SEPARATOR
        )
    }

    /// Parses a name produced by [`LogicalIndexName::new`].
    pub fn parse(name: &str) -> CoreResult<Self> {
        let mut parts = name.splitn(3, SEGMENT_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(endpoint), Some(tag)) => Self::new(prefix, endpoint, tag),
            _ => Err(CoreError::invalid_input(format!(
                "'{}' is not a logical index name",
                name
            ))),
        }
    }
}

impl fmt::Display for LogicalIndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.name)
    }
}

impl AsRef<str> for LogicalIndexName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// Which of the two physical slots an index occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parity {
    /// The `-odd` slot.
    Odd,
    /// The `-even` slot. First-time creation always uses it.
    Even,
}

impl Parity {
    /// Returns the other slot.
    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            Parity::Odd => Parity::Even,
            Parity::Even => Parity::Odd,
        }
    }

    /// Returns the name suffix without the dash.
    pub fn suffix(self) -> &'static str {
        match self {
            Parity::Odd => "odd",
            Parity::Even => "even",
        }
    }
}

/// A concrete index: `{logical}-odd` or `{logical}-even`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalIndexName {
    logical: LogicalIndexName,
    parity: Parity,
    name: String,
}

impl PhysicalIndexName {
    /// Creates the physical name for a logical name and parity.
    pub fn new(logical: LogicalIndexName, parity: Parity) -> Self {
        let name = format!("{}-{}", logical, parity.suffix());
        Self {
            logical,
            parity,
            name,
        }
    }

    /// Parses `{logical}-odd` / `{logical}-even`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the suffix is missing or the
    /// logical part is not a valid logical name.
    pub fn parse(name: &str) -> CoreResult<Self> {
        let (logical, parity) = if let Some(logical) = name.strip_suffix("-odd") {
            (logical, Parity::Odd)
        } else if let Some(logical) = name.strip_suffix("-even") {
            (logical, Parity::Even)
        } else {
            return Err(CoreError::invalid_input(format!(
                "'{}' has no -odd/-even suffix",
                name
            )));
        };
        Ok(Self::new(LogicalIndexName::parse(logical)?, parity))
    }

    /// Returns true if `name` ends in a parity suffix.
    pub fn has_parity_suffix(name: &str) -> bool {
        name.ends_with("-odd") || name.ends_with("-even")
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Returns the logical name (alias) this index serves.
    pub fn logical(&self) -> &LogicalIndexName {
        &self.logical
    }

    /// Returns the parity slot.
    pub fn parity(&self) -> Parity {
        self.parity
    }

    /// Returns the inactive sibling (the other parity slot). Pure, no I/O.
    #[must_use]
    pub fn sibling(&self) -> Self {
        Self::new(self.logical.clone(), self.parity.toggle())
    }
}

impl fmt::Display for PhysicalIndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.name)
    }
}

impl AsRef<str> for PhysicalIndexName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}
