use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::types::commit::{parse_id, parse_sig};
use crate::types::object::split_headers;
use crate::types::{ObjectKind, Signature};

/// an annotated tag object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub target: ObjectId,
    pub target_kind: ObjectKind,
    pub tagger: Signature,
    pub name: String,
    pub message: String,
}

impl Tag {
    pub fn new(
        target: ObjectId,
        target_kind: ObjectKind,
        name: impl Into<String>,
        tagger: Signature,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target,
            target_kind,
            tagger,
            name: name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn encode_body(&self) -> Vec<u8> {
        let mut out = String::with_capacity(192 + self.message.len());
        out.push_str(&format!("object {}\n", self.target));
        out.push_str(&format!("type {}\n", self.target_kind));
        out.push_str(&format!("tag {}\n", self.name));
        out.push_str(&format!("tagger {}\n", self.tagger));
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    pub(crate) fn decode_body(id: ObjectId, body: &[u8]) -> Result<Self> {
        let (headers, message) = split_headers(id, body)?;

        let mut target = None;
        let mut target_kind = None;
        let mut name = None;
        let mut tagger = None;

        for (key, value) in headers {
            match key {
                "object" => target = Some(parse_id(id, &value)?),
                "type" => {
                    let kind = value
                        .parse::<ObjectKind>()
                        .map_err(|e| Error::malformed(id, e.to_string()))?;
                    target_kind = Some(kind);
                }
                "tag" => name = Some(value),
                "tagger" => tagger = Some(parse_sig(id, &value)?),
                _ => {}
            }
        }

        Ok(Self {
            target: target.ok_or_else(|| Error::malformed(id, "tag missing object"))?,
            target_kind: target_kind.ok_or_else(|| Error::malformed(id, "tag missing type"))?,
            tagger: tagger.ok_or_else(|| Error::malformed(id, "tag missing tagger"))?,
            name: name.ok_or_else(|| Error::malformed(id, "tag missing name"))?,
            message,
        })
    }
}
