use tracing::debug;

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::refs::{validate_ref_name, RefUpdate, Reference};
use crate::repo::Repository;
use crate::types::{Object, Signature, Tag};

const TAG_PREFIX: &str = "refs/tags/";

/// a tag ref and, for annotated tags, the tag object it names
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagInfo {
    pub name: String,
    /// what `refs/tags/<name>` points at
    pub target: ObjectId,
    /// the tag object for annotated tags
    pub annotation: Option<Tag>,
}

impl TagInfo {
    /// object the tag ultimately names
    pub fn peeled(&self) -> ObjectId {
        self.annotation.as_ref().map_or(self.target, |tag| tag.target)
    }
}

/// write an annotated tag object and point `refs/tags/<name>` at it
pub fn create_tag(
    repo: &Repository,
    name: &str,
    target: ObjectId,
    tagger: Signature,
    message: &str,
    force: bool,
) -> Result<ObjectId> {
    let refname = tag_refname(name)?;
    let kind = repo.objects().read_kind(&target)?;

    let tag = Tag::new(target, kind, name, tagger, message);
    let id = repo.objects().write_tag(&tag)?;

    point_tag(repo, &refname, id, force)?;
    debug!(tag = name, id = %id.short(), "created annotated tag");
    Ok(id)
}

/// point `refs/tags/<name>` directly at an existing object
pub fn create_lightweight_tag(repo: &Repository, name: &str, target: ObjectId, force: bool) -> Result<()> {
    let refname = tag_refname(name)?;
    if !repo.objects().exists(&target) {
        return Err(Error::ObjectNotFound(target));
    }
    point_tag(repo, &refname, target, force)
}

pub fn delete_tag(repo: &Repository, name: &str) -> Result<()> {
    repo.refs().delete(&tag_refname(name)?)
}

/// every tag, ordered by name
pub fn tags(repo: &Repository) -> Result<Vec<TagInfo>> {
    let mut result = Vec::new();

    for reference in repo.refs().list(Some(TAG_PREFIX))? {
        let Reference::Direct { name, target } = reference else {
            continue;
        };
        let short = name.trim_start_matches(TAG_PREFIX).to_string();

        let annotation = match repo.objects().read(&target)? {
            Object::Tag(tag) => Some(tag),
            _ => None,
        };

        result.push(TagInfo {
            name: short,
            target,
            annotation,
        });
    }

    Ok(result)
}

fn point_tag(repo: &Repository, refname: &str, target: ObjectId, force: bool) -> Result<()> {
    repo.refs().update(refname, |current| {
        if current.is_some() && !force {
            return Err(Error::RefExists(refname.to_string()));
        }
        Ok(RefUpdate::Set(target))
    })?;
    Ok(())
}

fn tag_refname(name: &str) -> Result<String> {
    let refname = format!("{}{}", TAG_PREFIX, name);
    validate_ref_name(&refname)?;
    Ok(refname)
}
