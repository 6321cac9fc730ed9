use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// width of an object id in bytes
pub const ID_LEN: usize = 20;

/// width of an object id in hex characters
pub const HEX_LEN: usize = ID_LEN * 2;

/// 20-byte content hash used as the key into the object store
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; ID_LEN]);

impl ObjectId {
    /// zero id (useful as sentinel)
    pub const ZERO: ObjectId = ObjectId([0u8; ID_LEN]);

    /// create from raw bytes
    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// create from a slice, which must be exactly 20 bytes long
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; ID_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// parse from hex string
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != HEX_LEN {
            return Err(Error::InvalidHashHex(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|_| Error::InvalidHashHex(s.to_string()))?;
        Self::from_slice(&bytes).ok_or_else(|| Error::InvalidHashHex(s.to_string()))
    }

    /// true if `s` has the shape of a full hex id
    pub fn looks_like_hex(s: &str) -> bool {
        s.len() == HEX_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// get raw bytes
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// abbreviated hex form for display
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }

    /// split into path components for object store
    /// returns (first 2 hex chars, remaining 38 hex chars)
    pub fn to_path_components(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[..2].to_string(), hex[2..].to_string())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..12])
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// digest function producing object ids from canonical object bytes
pub trait ObjectHasher: Send + Sync {
    fn digest(&self, data: &[u8]) -> ObjectId;
}

/// SHA-1, byte compatible with existing git repositories
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha1Hasher;

impl ObjectHasher for Sha1Hasher {
    fn digest(&self, data: &[u8]) -> ObjectId {
        ObjectId(Sha1::digest(data).into())
    }
}

/// SHA-256 truncated to the 20-byte id width
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl ObjectHasher for Sha256Hasher {
    fn digest(&self, data: &[u8]) -> ObjectId {
        let full = Sha256::digest(data);
        let mut arr = [0u8; ID_LEN];
        arr.copy_from_slice(&full[..ID_LEN]);
        ObjectId(arr)
    }
}

/// hash algorithm selected in the repository configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashKind {
    #[default]
    Sha1,
    Sha256,
}

impl HashKind {
    pub fn hasher(self) -> Box<dyn ObjectHasher> {
        match self {
            HashKind::Sha1 => Box::new(Sha1Hasher),
            HashKind::Sha256 => Box::new(Sha256Hasher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "abcdef0123456789abcdef0123456789abcdef01";

    #[test]
    fn test_id_hex_roundtrip() {
        let original = ObjectId::from_hex(HEX).unwrap();
        assert_eq!(original.to_hex(), HEX);
        let parsed: ObjectId = HEX.parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_id_invalid_hex() {
        assert!(ObjectId::from_hex("not valid hex").is_err());
        assert!(ObjectId::from_hex("abcd").is_err());
        assert!(ObjectId::from_hex(&format!("{}ff", HEX)).is_err());
        assert!(ObjectId::from_hex("zzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn test_id_path_components() {
        let id = ObjectId::from_hex(HEX).unwrap();
        let (dir, file) = id.to_path_components();
        assert_eq!(dir, "ab");
        assert_eq!(file, "cdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_id_ordering() {
        let a = ObjectId::from_hex("0000000000000000000000000000000000000001").unwrap();
        let b = ObjectId::from_hex("0000000000000000000000000000000000000002").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_sha1_matches_git_empty_blob() {
        // `git hash-object -t blob /dev/null`
        let id = Sha1Hasher.digest(b"blob 0\0");
        assert_eq!(id.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn test_hashers_differ() {
        let a = Sha1Hasher.digest(b"blob 5\0hello");
        let b = Sha256Hasher.digest(b"blob 5\0hello");
        assert_ne!(a, b);
        assert_eq!(a, Sha1Hasher.digest(b"blob 5\0hello"));
    }

    #[test]
    fn test_looks_like_hex() {
        assert!(ObjectId::looks_like_hex(HEX));
        assert!(!ObjectId::looks_like_hex("refs/heads/main"));
        assert!(!ObjectId::looks_like_hex(&HEX[..39]));
    }

    #[test]
    fn test_id_serde_json() {
        let id = ObjectId::from_hex(HEX).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", HEX));
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
