use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::blobref::BlobRef;
use crate::error::{TypeError, TypeResult};

/// Characters that may not appear in a shard segment.
///
/// `/` separates segments in the rendered path and `;` delimits the
/// registration payload, so neither can be part of a name.
const FORBIDDEN_CHARS: &[char] = &['/', ';', '\n', '\r'];

/// Ordered folder-name segments a blob is filed under.
///
/// Shard paths only bound how many children any one remote folder holds;
/// they are not part of a blob's identity.
///
/// A segment may not itself parse as a [`BlobRef`]: top-level shard folders
/// and registration entries share the store root with blobs, and a
/// reference-shaped name there would be mistaken for one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ShardPath(Vec<String>);

impl ShardPath {
    /// Build a shard path, validating every segment.
    pub fn new<I, S>(segments: I) -> TypeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(Self(segments))
    }

    /// The empty path (blobs filed directly under the store root).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment: the name a registration entry is keyed by.
    pub fn top(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Remaining segments joined with `/`; empty for one-segment paths.
    pub fn sub(&self) -> String {
        self.0.get(1..).map(|rest| rest.join("/")).unwrap_or_default()
    }
}

impl fmt::Display for ShardPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl TryFrom<Vec<String>> for ShardPath {
    type Error = TypeError;

    fn try_from(segments: Vec<String>) -> TypeResult<Self> {
        Self::new(segments)
    }
}

impl From<ShardPath> for Vec<String> {
    fn from(path: ShardPath) -> Self {
        path.0
    }
}

impl FromStr for ShardPath {
    type Err = TypeError;

    /// Parse `aa/bb`; the empty string is the root path.
    fn from_str(s: &str) -> TypeResult<Self> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        Self::new(s.split('/'))
    }
}

fn validate_segment(segment: &str) -> TypeResult<()> {
    if segment.is_empty() {
        return Err(TypeError::InvalidShardSegment {
            segment: segment.to_string(),
            reason: "segment must not be empty".into(),
        });
    }
    if let Some(ch) = segment.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(TypeError::InvalidShardSegment {
            segment: segment.to_string(),
            reason: format!("contains forbidden character: {ch:?}"),
        });
    }
    if BlobRef::try_parse(segment).is_some() {
        return Err(TypeError::InvalidShardSegment {
            segment: segment.to_string(),
            reason: "segment must not be a blob reference".into(),
        });
    }
    Ok(())
}

/// Derives shard paths from reference digests.
///
/// With the default scheme (`depth = 2`, `width = 2`) the reference
/// `sha1-abcdef…` is filed under `ab/cd`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardScheme {
    /// Number of folder levels.
    pub depth: usize,
    /// Hex digits consumed per level.
    pub width: usize,
}

impl Default for ShardScheme {
    fn default() -> Self {
        Self { depth: 2, width: 2 }
    }
}

impl ShardScheme {
    /// Shortest digest of any supported hash (sha1).
    const MIN_DIGEST_LEN: usize = 40;

    pub fn new(depth: usize, width: usize) -> TypeResult<Self> {
        let scheme = Self { depth, width };
        scheme.validate()?;
        Ok(scheme)
    }

    /// Check that the scheme can be applied to every supported digest.
    pub fn validate(&self) -> TypeResult<()> {
        if self.depth > 0 && self.width == 0 {
            return Err(TypeError::InvalidShardScheme("width must be positive".into()));
        }
        if self.depth.saturating_mul(self.width) > Self::MIN_DIGEST_LEN {
            return Err(TypeError::InvalidShardScheme(format!(
                "depth * width must not exceed {}",
                Self::MIN_DIGEST_LEN
            )));
        }
        Ok(())
    }

    /// The shard path for `blob`.
    ///
    /// An unvalidated scheme never panics: levels that run past the end of
    /// the digest are dropped, and a zero width yields the root path.
    pub fn path_for(&self, blob: &BlobRef) -> ShardPath {
        if self.width == 0 {
            return ShardPath::root();
        }
        let digest = blob.digest_hex();
        ShardPath(
            (0..self.depth)
                .map_while(|level| {
                    let start = level.checked_mul(self.width)?;
                    digest.get(start..start.checked_add(self.width)?)
                })
                .map(str::to_string)
                .collect(),
        )
    }
}
