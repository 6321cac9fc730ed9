use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::{ObjectId, ID_LEN};

/// a directory tree - collection of entries sorted by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// create a new tree, validating and sorting entries
    ///
    /// entries may be given in any order; the result is canonical.
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        // sort by name (byte-wise)
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        for window in entries.windows(2) {
            if window[0].name == window[1].name {
                return Err(Error::DuplicateEntryName(window[0].name.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// create an empty tree
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    /// get entries slice
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// consume and return entries
    pub fn into_entries(self) -> Vec<TreeEntry> {
        self.entries
    }

    /// look up entry by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.find(name).ok().map(|i| &self.entries[i])
    }

    /// insert or replace an entry, keeping the tree canonical
    pub fn upsert(&mut self, entry: TreeEntry) -> Result<()> {
        validate_entry_name(&entry.name)?;
        match self.find(&entry.name) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
        Ok(())
    }

    /// remove an entry by name, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<TreeEntry> {
        self.find(name).ok().map(|i| self.entries.remove(i))
    }

    /// number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// is tree empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, name: &str) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
    }

    /// encode entries as `<octal mode> <name>\0<raw id>`
    pub(crate) fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 32);
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.as_octal().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.target.as_bytes());
        }
        out
    }

    pub(crate) fn decode_body(id: ObjectId, body: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut rest = body;

        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| Error::malformed(id, "tree entry missing mode"))?;
            let mode = std::str::from_utf8(&rest[..space])
                .ok()
                .and_then(FileMode::from_octal)
                .ok_or_else(|| Error::malformed(id, "invalid tree entry mode"))?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::malformed(id, "tree entry missing name terminator"))?;
            let name = std::str::from_utf8(&rest[..nul])
                .map_err(|_| Error::malformed(id, "tree entry name is not utf-8"))?
                .to_string();
            rest = &rest[nul + 1..];

            if rest.len() < ID_LEN {
                return Err(Error::malformed(id, "truncated tree entry id"));
            }
            let target = ObjectId::from_slice(&rest[..ID_LEN])
                .ok_or_else(|| Error::malformed(id, "truncated tree entry id"))?;
            rest = &rest[ID_LEN..];

            entries.push(TreeEntry { name, mode, target });
        }

        Tree::new(entries).map_err(|e| Error::malformed(id, e.to_string()))
    }
}

/// validate an entry name
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}

/// a single entry in a tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub mode: FileMode,
    pub target: ObjectId,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, mode: FileMode, target: ObjectId) -> Self {
        Self {
            name: name.into(),
            mode,
            target,
        }
    }

    pub fn blob(name: impl Into<String>, target: ObjectId) -> Self {
        Self::new(name, FileMode::Blob, target)
    }

    pub fn tree(name: impl Into<String>, target: ObjectId) -> Self {
        Self::new(name, FileMode::Tree, target)
    }

    pub fn is_tree(&self) -> bool {
        self.mode == FileMode::Tree
    }
}

/// file mode of a tree entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    /// subdirectory
    Tree,
    /// regular file
    Blob,
    /// executable file
    Executable,
    /// symbolic link
    Symlink,
    /// submodule commit
    Commit,
}

impl FileMode {
    pub fn as_octal(self) -> &'static str {
        match self {
            FileMode::Tree => "40000",
            FileMode::Blob => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Commit => "160000",
        }
    }

    pub fn from_octal(s: &str) -> Option<Self> {
        match s {
            "40000" | "040000" => Some(FileMode::Tree),
            "100644" | "100664" => Some(FileMode::Blob),
            "100755" => Some(FileMode::Executable),
            "120000" => Some(FileMode::Symlink),
            "160000" => Some(FileMode::Commit),
            _ => None,
        }
    }

    /// kind name for display, as `ls-tree` prints it
    pub fn type_name(self) -> &'static str {
        match self {
            FileMode::Tree => "tree",
            FileMode::Commit => "commit",
            FileMode::Blob | FileMode::Executable | FileMode::Symlink => "blob",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ObjectId {
        ObjectId::from_bytes([n; ID_LEN])
    }

    #[test]
    fn test_tree_sorting() {
        let tree = Tree::new(vec![
            TreeEntry::blob("zebra", id(1)),
            TreeEntry::blob("apple", id(2)),
            TreeEntry::tree("mango", id(3)),
        ])
        .unwrap();

        let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_tree_sorting_bytewise() {
        let tree = Tree::new(vec![
            TreeEntry::blob("b", id(1)),
            TreeEntry::blob("B", id(2)),
            TreeEntry::blob("a", id(3)),
        ])
        .unwrap();

        let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["B", "a", "b"]);
    }

    #[test]
    fn test_tree_duplicate_names() {
        let result = Tree::new(vec![
            TreeEntry::blob("same", id(1)),
            TreeEntry::blob("same", id(2)),
        ]);
        assert!(matches!(result, Err(Error::DuplicateEntryName(_))));
    }

    #[test]
    fn test_tree_invalid_names() {
        for bad in ["", "a/b", "x\0y", ".", ".."] {
            let result = Tree::new(vec![TreeEntry::blob(bad, id(1))]);
            assert!(
                matches!(result, Err(Error::InvalidEntryName(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_tree_get() {
        let tree = Tree::new(vec![
            TreeEntry::blob("a", id(1)),
            TreeEntry::blob("b", id(2)),
        ])
        .unwrap();

        assert_eq!(tree.get("b").unwrap().target, id(2));
        assert!(tree.get("c").is_none());
    }

    #[test]
    fn test_tree_upsert_and_remove() {
        let mut tree = Tree::empty();
        tree.upsert(TreeEntry::blob("m", id(1))).unwrap();
        tree.upsert(TreeEntry::blob("a", id(2))).unwrap();
        tree.upsert(TreeEntry::blob("m", id(3))).unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.entries()[0].name, "a");
        assert_eq!(tree.get("m").unwrap().target, id(3));

        let removed = tree.remove("a").unwrap();
        assert_eq!(removed.target, id(2));
        assert!(tree.remove("a").is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_tree_body_roundtrip() {
        let tree = Tree::new(vec![
            TreeEntry::blob("file.txt", id(1)),
            TreeEntry::tree("dir", id(2)),
            TreeEntry::new("run.sh", FileMode::Executable, id(3)),
            TreeEntry::new("link", FileMode::Symlink, id(4)),
            TreeEntry::new("sub", FileMode::Commit, id(5)),
        ])
        .unwrap();

        let body = tree.encode_body();
        let decoded = Tree::decode_body(ObjectId::ZERO, &body).unwrap();
        assert_eq!(tree, decoded);
    }

    #[test]
    fn test_tree_decode_truncated() {
        let tree = Tree::new(vec![TreeEntry::blob("f", id(1))]).unwrap();
        let body = tree.encode_body();
        let result = Tree::decode_body(ObjectId::ZERO, &body[..body.len() - 3]);
        assert!(matches!(result, Err(Error::MalformedObject { .. })));
    }

    #[test]
    fn test_file_mode_octal() {
        for mode in [
            FileMode::Tree,
            FileMode::Blob,
            FileMode::Executable,
            FileMode::Symlink,
            FileMode::Commit,
        ] {
            assert_eq!(FileMode::from_octal(mode.as_octal()), Some(mode));
        }
        assert_eq!(FileMode::from_octal("777"), None);
    }
}
