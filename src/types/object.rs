use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::types::{Commit, Tag, Tree};

/// the four kinds of stored object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            _ => Err(Error::UnknownObjectType(s.to_string())),
        }
    }
}

/// a stored object
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
            Object::Tag(_) => ObjectKind::Tag,
        }
    }

    /// canonical encoding: `<kind> <len>\0<body>`
    ///
    /// the object id is the digest of exactly these bytes.
    pub fn encode(&self) -> Vec<u8> {
        let body = match self {
            Object::Blob(data) => return frame(ObjectKind::Blob, data),
            Object::Tree(tree) => tree.encode_body(),
            Object::Commit(commit) => commit.encode_body(),
            Object::Tag(tag) => tag.encode_body(),
        };
        frame(self.kind(), &body)
    }

    /// decode canonical bytes read back for `id`
    pub fn decode(id: ObjectId, raw: &[u8]) -> Result<Self> {
        let (kind, body) = split_frame(id, raw)?;
        Ok(match kind {
            ObjectKind::Blob => Object::Blob(body.to_vec()),
            ObjectKind::Tree => Object::Tree(Tree::decode_body(id, body)?),
            ObjectKind::Commit => Object::Commit(Commit::decode_body(id, body)?),
            ObjectKind::Tag => Object::Tag(Tag::decode_body(id, body)?),
        })
    }

    pub fn into_commit(self, id: ObjectId) -> Result<Commit> {
        match self {
            Object::Commit(commit) => Ok(commit),
            other => Err(other.type_error(id, ObjectKind::Commit)),
        }
    }

    pub fn into_tree(self, id: ObjectId) -> Result<Tree> {
        match self {
            Object::Tree(tree) => Ok(tree),
            other => Err(other.type_error(id, ObjectKind::Tree)),
        }
    }

    pub fn into_blob(self, id: ObjectId) -> Result<Vec<u8>> {
        match self {
            Object::Blob(data) => Ok(data),
            other => Err(other.type_error(id, ObjectKind::Blob)),
        }
    }

    pub fn into_tag(self, id: ObjectId) -> Result<Tag> {
        match self {
            Object::Tag(tag) => Ok(tag),
            other => Err(other.type_error(id, ObjectKind::Tag)),
        }
    }

    fn type_error(&self, id: ObjectId, expected: ObjectKind) -> Error {
        Error::InvalidObjectType {
            id,
            expected: expected.as_str(),
            actual: self.kind().as_str(),
        }
    }
}

fn frame(kind: ObjectKind, body: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind, body.len());
    let mut out = Vec::with_capacity(header.len() + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body);
    out
}

/// split `<kind> <len>\0<body>`, checking the declared length
pub(crate) fn split_frame(id: ObjectId, raw: &[u8]) -> Result<(ObjectKind, &[u8])> {
    let nul = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::malformed(id, "missing object header"))?;
    let header = std::str::from_utf8(&raw[..nul])
        .map_err(|_| Error::malformed(id, "object header is not utf-8"))?;
    let (kind, len) = header
        .split_once(' ')
        .ok_or_else(|| Error::malformed(id, "malformed object header"))?;
    let kind: ObjectKind = kind
        .parse()
        .map_err(|_| Error::malformed(id, format!("unknown object kind {:?}", kind)))?;
    let len: usize = len
        .parse()
        .map_err(|_| Error::malformed(id, "malformed object length"))?;

    let body = &raw[nul + 1..];
    if body.len() != len {
        return Err(Error::malformed(
            id,
            format!("declared length {} but body is {} bytes", len, body.len()),
        ));
    }
    Ok((kind, body))
}

/// split a commit/tag body into header fields and the message
///
/// continuation lines (leading space) are folded into the previous value.
pub(crate) fn split_headers(id: ObjectId, body: &[u8]) -> Result<(Vec<(&str, String)>, String)> {
    let text = std::str::from_utf8(body).map_err(|_| Error::malformed(id, "body is not utf-8"))?;

    let (head, message) = match text.find("\n\n") {
        Some(pos) => (&text[..pos], &text[pos + 2..]),
        None => (text.strip_suffix('\n').unwrap_or(text), ""),
    };

    let mut headers: Vec<(&str, String)> = Vec::new();
    for line in head.lines() {
        if let Some(cont) = line.strip_prefix(' ') {
            let last = headers
                .last_mut()
                .ok_or_else(|| Error::malformed(id, "continuation before first header"))?;
            last.1.push('\n');
            last.1.push_str(cont);
            continue;
        }
        let (key, value) = line
            .split_once(' ')
            .ok_or_else(|| Error::malformed(id, format!("malformed header line {:?}", line)))?;
        headers.push((key, value.to_string()));
    }

    Ok((headers, message.to_string()))
}
