use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::types::object::split_headers;
use crate::types::Signature;

/// a commit object pointing to a tree with parents and signatures
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// root tree id
    pub tree: ObjectId,
    /// parent commit ids (empty for initial, 1 for linear, 2+ for merge)
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    /// commit message, stored verbatim
    pub message: String,
}

impl Commit {
    /// create a new commit
    pub fn new(
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author: Signature,
        committer: Signature,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            author,
            committer,
            message: message.into(),
        }
    }

    /// is this an initial commit (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// is this a merge commit (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn first_parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }

    /// commit time used for ordering (committer timestamp)
    pub fn time(&self) -> i64 {
        self.committer.time
    }

    /// first line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub(crate) fn encode_body(&self) -> Vec<u8> {
        let mut out = String::with_capacity(256 + self.message.len());
        out.push_str(&format!("tree {}\n", self.tree));
        for parent in &self.parents {
            out.push_str(&format!("parent {}\n", parent));
        }
        out.push_str(&format!("author {}\n", self.author));
        out.push_str(&format!("committer {}\n", self.committer));
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    pub(crate) fn decode_body(id: ObjectId, body: &[u8]) -> Result<Self> {
        let (headers, message) = split_headers(id, body)?;

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for (key, value) in headers {
            match key {
                "tree" if tree.is_none() => tree = Some(parse_id(id, &value)?),
                "parent" => parents.push(parse_id(id, &value)?),
                "author" if author.is_none() => author = Some(parse_sig(id, &value)?),
                "committer" if committer.is_none() => committer = Some(parse_sig(id, &value)?),
                "tree" | "author" | "committer" => {
                    return Err(Error::malformed(id, format!("duplicate {} header", key)));
                }
                // gpgsig, encoding, mergetag: not modelled
                _ => {}
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| Error::malformed(id, "commit missing tree"))?,
            parents,
            author: author.ok_or_else(|| Error::malformed(id, "commit missing author"))?,
            committer: committer.ok_or_else(|| Error::malformed(id, "commit missing committer"))?,
            message,
        })
    }
}

pub(crate) fn parse_id(id: ObjectId, value: &str) -> Result<ObjectId> {
    ObjectId::from_hex(value).map_err(|_| Error::malformed(id, format!("bad id {:?}", value)))
}

pub(crate) fn parse_sig(id: ObjectId, value: &str) -> Result<Signature> {
    Signature::parse(value).map_err(|e| Error::malformed(id, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(time: i64) -> Signature {
        Signature::new("Author", "author@example.com", time, 60).unwrap()
    }

    fn id(hex_digit: char) -> ObjectId {
        ObjectId::from_hex(&hex_digit.to_string().repeat(40)).unwrap()
    }

    #[test]
    fn test_commit_new() {
        let c = Commit::new(ObjectId::ZERO, vec![], sig(1), sig(2), "message");
        assert_eq!(c.tree, ObjectId::ZERO);
        assert!(c.is_root());
        assert!(!c.is_merge());
        assert_eq!(c.time(), 2);
        assert_eq!(c.first_parent(), None);
    }

    #[test]
    fn test_commit_merge() {
        let c = Commit::new(ObjectId::ZERO, vec![id('1'), id('2')], sig(0), sig(0), "merge");
        assert!(c.is_merge());
        assert_eq!(c.first_parent(), Some(id('1')));
    }

    #[test]
    fn test_commit_encoding_layout() {
        let c = Commit::new(id('a'), vec![id('b')], sig(10), sig(20), "subject\n\nbody\n");
        let body = String::from_utf8(c.encode_body()).unwrap();
        let expected = format!(
            "tree {}\nparent {}\nauthor Author <author@example.com> 10 +0100\ncommitter Author <author@example.com> 20 +0100\n\nsubject\n\nbody\n",
            id('a'),
            id('b')
        );
        assert_eq!(body, expected);
    }

    #[test]
    fn test_commit_body_roundtrip() {
        let c = Commit::new(id('a'), vec![id('b'), id('c')], sig(10), sig(20), "no trailing newline");
        let decoded = Commit::decode_body(ObjectId::ZERO, &c.encode_body()).unwrap();
        assert_eq!(c, decoded);
        assert_eq!(decoded.summary(), "no trailing newline");
    }

    #[test]
    fn test_commit_decode_skips_unknown_headers() {
        let raw = format!(
            "tree {}\nauthor A <a@b> 1 +0000\ncommitter A <a@b> 1 +0000\ngpgsig -----BEGIN\n line two\n -----END\n\nmsg",
            id('a')
        );
        let c = Commit::decode_body(ObjectId::ZERO, raw.as_bytes()).unwrap();
        assert_eq!(c.tree, id('a'));
        assert_eq!(c.message, "msg");
    }

    #[test]
    fn test_commit_decode_missing_tree() {
        let raw = "author A <a@b> 1 +0000\ncommitter A <a@b> 1 +0000\n\nmsg";
        let result = Commit::decode_body(ObjectId::ZERO, raw.as_bytes());
        assert!(matches!(result, Err(Error::MalformedObject { .. })));
    }
}
