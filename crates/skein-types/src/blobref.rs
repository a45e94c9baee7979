use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Hash function a [`BlobRef`] digest was produced with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashKind {
    Sha1,
    Sha224,
    Sha256,
    Blake3,
}

impl HashKind {
    /// All supported hash functions.
    pub const ALL: [HashKind; 4] = [
        HashKind::Sha1,
        HashKind::Sha224,
        HashKind::Sha256,
        HashKind::Blake3,
    ];

    /// Canonical name used as the reference prefix.
    pub fn name(&self) -> &'static str {
        match self {
            HashKind::Sha1 => "sha1",
            HashKind::Sha224 => "sha224",
            HashKind::Sha256 => "sha256",
            HashKind::Blake3 => "blake3",
        }
    }

    /// Number of hex digits in a digest of this kind.
    pub fn hex_len(&self) -> usize {
        match self {
            HashKind::Sha1 => 40,
            HashKind::Sha224 => 56,
            HashKind::Sha256 | HashKind::Blake3 => 64,
        }
    }

    /// Look up a hash function by its canonical name.
    pub fn from_name(name: &str) -> TypeResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == name)
            .ok_or_else(|| TypeError::UnknownHash(name.to_string()))
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Content-addressed reference naming a blob.
///
/// The canonical textual form is `<hash>-<digest>`, where `<digest>` is the
/// lowercase hex encoding of the content hash (e.g. `sha1-0beec7b5…`). A
/// `BlobRef` can only be built through [`BlobRef::parse`] or by hashing
/// content, so every value in circulation is well-formed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobRef {
    kind: HashKind,
    digest: String,
}

impl BlobRef {
    /// Parse a reference from its canonical textual form.
    pub fn parse(s: &str) -> TypeResult<Self> {
        let invalid = |reason: &str| TypeError::InvalidBlobRef {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (name, digest) = s.split_once('-').ok_or_else(|| invalid("missing '-'"))?;
        let kind = HashKind::from_name(name).map_err(|_| invalid("unknown hash function"))?;
        if digest.len() != kind.hex_len() {
            return Err(invalid(&format!(
                "expected {} hex digits, got {}",
                kind.hex_len(),
                digest.len()
            )));
        }
        if !digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(invalid("digest must be lowercase hex"));
        }
        Ok(Self {
            kind,
            digest: digest.to_string(),
        })
    }

    /// Like [`BlobRef::parse`], but returns `None` instead of an error.
    ///
    /// Used wherever non-blob names are expected and simply skipped.
    pub fn try_parse(s: &str) -> Option<Self> {
        Self::parse(s).ok()
    }

    /// Build a reference from a raw digest.
    pub fn from_digest(kind: HashKind, digest: &[u8]) -> TypeResult<Self> {
        Self::parse(&format!("{}-{}", kind.name(), hex::encode(digest)))
    }

    /// Compute the BLAKE3 reference of `data`.
    pub fn blake3_of(data: &[u8]) -> Self {
        Self {
            kind: HashKind::Blake3,
            digest: blake3::hash(data).to_hex().to_string(),
        }
    }

    /// The hash function of this reference.
    pub fn kind(&self) -> HashKind {
        self.kind
    }

    /// The lowercase hex digest, without the hash prefix.
    pub fn digest_hex(&self) -> &str {
        &self.digest
    }

    /// Short form for log lines: hash name plus the first 8 digest digits.
    pub fn short(&self) -> String {
        format!("{}-{}", self.kind.name(), &self.digest[..8])
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({})", self.short())
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.name(), self.digest)
    }
}

impl FromStr for BlobRef {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobRef {
    type Error = TypeError;

    fn try_from(s: String) -> TypeResult<Self> {
        Self::parse(&s)
    }
}

impl From<BlobRef> for String {
    fn from(r: BlobRef) -> Self {
        r.to_string()
    }
}

/// A blob reference annotated with the size of its stored content.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SizedRef {
    pub blob: BlobRef,
    pub size: u64,
}

impl SizedRef {
    pub fn new(blob: BlobRef, size: u64) -> Self {
        Self { blob, size }
    }
}

impl fmt::Display for SizedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.blob, self.size)
    }
}
