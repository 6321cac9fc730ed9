use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::fs::atomic_write;
use crate::hash::{ObjectHasher, ObjectId};
use crate::types::{split_frame, Commit, Object, ObjectKind, Tag, Tree};

/// upper bound on tag-to-tag indirection when peeling
const MAX_PEEL_DEPTH: usize = 32;

/// loose-object store keyed by content hash
///
/// each object lives at `objects/<2 hex>/<38 hex>` and holds the canonical
/// encoding compressed with zstd. the id is the digest of the uncompressed
/// canonical bytes, so it is independent of the compression level.
pub struct ObjectStore {
    root: PathBuf,
    tmp: PathBuf,
    hasher: Box<dyn ObjectHasher>,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>, tmp: impl Into<PathBuf>, hasher: Box<dyn ObjectHasher>) -> Self {
        Self {
            root: root.into(),
            tmp: tmp.into(),
            hasher,
        }
    }

    /// root directory of the store
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// compute the id an object would be stored under
    pub fn hash(&self, object: &Object) -> ObjectId {
        self.hasher.digest(&object.encode())
    }

    /// write an object, returning its id
    ///
    /// identical content always maps to the same id; an object that is
    /// already present is not rewritten.
    pub fn write(&self, object: &Object) -> Result<ObjectId> {
        let canonical = object.encode();
        let id = self.hasher.digest(&canonical);
        let path = self.object_path(&id);

        // dedup: if object already exists, we're done
        if path.exists() {
            return Ok(id);
        }

        // compress with zstd (level 3 - fast, reasonable ratio)
        let compressed = zstd::encode_all(&canonical[..], 3).map_err(|e| Error::Io {
            path: PathBuf::from("<zstd>"),
            source: e,
        })?;

        // concurrent writers of the same id rename identical bytes onto the same path
        atomic_write(&self.tmp, &path, &compressed)?;
        debug!(id = %id.short(), kind = %object.kind(), bytes = canonical.len(), "wrote object");

        Ok(id)
    }

    /// write raw blob content
    pub fn write_blob(&self, data: &[u8]) -> Result<ObjectId> {
        self.write(&Object::Blob(data.to_vec()))
    }

    pub fn write_tree(&self, tree: &Tree) -> Result<ObjectId> {
        self.write(&Object::Tree(tree.clone()))
    }

    pub fn write_commit(&self, commit: &Commit) -> Result<ObjectId> {
        self.write(&Object::Commit(commit.clone()))
    }

    pub fn write_tag(&self, tag: &Tag) -> Result<ObjectId> {
        self.write(&Object::Tag(tag.clone()))
    }

    /// read the verified canonical bytes of an object
    pub fn read_raw(&self, id: &ObjectId) -> Result<Vec<u8>> {
        let path = self.object_path(id);

        let compressed = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ObjectNotFound(*id)
            } else {
                Error::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        let canonical = zstd::decode_all(&compressed[..])
            .map_err(|e| Error::malformed(*id, format!("decompression failed: {}", e)))?;

        // verify hash
        if self.hasher.digest(&canonical) != *id {
            return Err(Error::CorruptObject(*id));
        }

        Ok(canonical)
    }

    /// read and decode an object
    pub fn read(&self, id: &ObjectId) -> Result<Object> {
        let canonical = self.read_raw(id)?;
        Object::decode(*id, &canonical)
    }

    /// kind of a stored object
    pub fn read_kind(&self, id: &ObjectId) -> Result<ObjectKind> {
        let canonical = self.read_raw(id)?;
        let (kind, _) = split_frame(*id, &canonical)?;
        Ok(kind)
    }

    pub fn read_blob(&self, id: &ObjectId) -> Result<Vec<u8>> {
        self.read(id)?.into_blob(*id)
    }

    pub fn read_tree(&self, id: &ObjectId) -> Result<Tree> {
        self.read(id)?.into_tree(*id)
    }

    pub fn read_commit(&self, id: &ObjectId) -> Result<Commit> {
        self.read(id)?.into_commit(*id)
    }

    pub fn read_tag(&self, id: &ObjectId) -> Result<Tag> {
        self.read(id)?.into_tag(*id)
    }

    /// follow annotated tags until a non-tag object is reached
    pub fn peel(&self, id: &ObjectId) -> Result<(ObjectId, Object)> {
        let mut current = *id;
        for _ in 0..MAX_PEEL_DEPTH {
            match self.read(&current)? {
                Object::Tag(tag) => current = tag.target,
                other => return Ok((current, other)),
            }
        }
        Err(Error::malformed(*id, "tag chain too deep"))
    }

    /// peel through tags to a commit
    pub fn peel_to_commit(&self, id: &ObjectId) -> Result<(ObjectId, Commit)> {
        let (peeled, object) = self.peel(id)?;
        Ok((peeled, object.into_commit(peeled)?))
    }

    /// check if an object exists in the store
    pub fn exists(&self, id: &ObjectId) -> bool {
        self.object_path(id).exists()
    }

    /// get the filesystem path to an object
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let (dir, file) = id.to_path_components();
        self.root.join(dir).join(file)
    }

    /// list every stored object id, sorted
    pub fn list(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();

        if !self.root.exists() {
            return Ok(ids);
        }

        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| Error::Io {
                path: self.root.clone(),
                source: e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walkdir error")
                }),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let parent_name = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or("");

            let hex = format!("{}{}", parent_name, file_name);
            if let Ok(id) = ObjectId::from_hex(&hex) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}
