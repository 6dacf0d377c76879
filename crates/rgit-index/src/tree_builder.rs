//! Fold index entries into tree objects, bottom-up.

use bstr::{BString, ByteSlice};
use rgit_hash::ObjectId;
use rgit_object::{FileMode, Object, Tree, TreeEntry};
use rgit_odb::ObjectStore;

use crate::{Index, IndexError};

/// Compose tree objects for the whole index and return the root tree id.
pub(crate) fn build_trees<S: ObjectStore>(
    store: &S,
    index: &Index,
) -> Result<ObjectId, IndexError> {
    let flat: Vec<(BString, FileMode, ObjectId)> = index
        .iter()
        .map(|e| (e.path.clone(), e.mode, e.oid))
        .collect();
    build_subtree(store, &flat)
}

/// Build the tree for one directory level. `entries` hold paths relative
/// to this level, in sorted order.
fn build_subtree<S: ObjectStore>(
    store: &S,
    entries: &[(BString, FileMode, ObjectId)],
) -> Result<ObjectId, IndexError> {
    let mut tree_entries: Vec<TreeEntry> = Vec::new();
    let mut i = 0;

    while i < entries.len() {
        let (path, mode, oid) = &entries[i];
        match path.find_byte(b'/') {
            None => {
                tree_entries.push(TreeEntry {
                    mode: *mode,
                    name: path.clone(),
                    oid: *oid,
                });
                i += 1;
            }
            Some(slash) => {
                // Collect the run of entries sharing this directory prefix.
                let dir = BString::from(&path[..slash]);
                let mut sub: Vec<(BString, FileMode, ObjectId)> = Vec::new();
                while i < entries.len() {
                    let (p, m, o) = &entries[i];
                    let Some(s) = p.find_byte(b'/') else { break };
                    if p[..s] != dir[..] {
                        break;
                    }
                    sub.push((BString::from(&p[s + 1..]), *m, *o));
                    i += 1;
                }
                let sub_oid = build_subtree(store, &sub)?;
                tree_entries.push(TreeEntry {
                    mode: FileMode::Tree,
                    name: dir,
                    oid: sub_oid,
                });
            }
        }
    }

    let tree = Object::Tree(Tree::new(tree_entries));
    Ok(store.add_object(&tree)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexEntry, StatData};
    use rgit_object::Blob;
    use rgit_odb::MemoryObjectStore;

    fn add_blob(store: &MemoryObjectStore, data: &[u8]) -> ObjectId {
        store
            .add_object(&Object::Blob(Blob::new(data.to_vec())))
            .unwrap()
    }

    fn indexed(paths: &[(&str, ObjectId)]) -> Index {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::open(dir.path().join("index")).unwrap();
        for (path, oid) in paths {
            index.insert(IndexEntry {
                path: BString::from(*path),
                oid: *oid,
                mode: FileMode::Regular,
                stat: StatData::default(),
            });
        }
        index
    }

    #[test]
    fn flat_index_becomes_single_tree() {
        let store = MemoryObjectStore::new();
        let a = add_blob(&store, b"a");
        let b = add_blob(&store, b"b");
        let index = indexed(&[("a.txt", a), ("b.txt", b)]);

        let root = index.commit(&store).unwrap();
        let Object::Tree(tree) = store.get(&root).unwrap().unwrap() else {
            panic!("expected tree");
        };
        assert_eq!(tree.entries.len(), 2);
        assert_eq!(tree.entry(b"a.txt").unwrap().oid, a);
    }

    #[test]
    fn nested_paths_become_subtrees() {
        let store = MemoryObjectStore::new();
        let main = add_blob(&store, b"fn main() {}\n");
        let readme = add_blob(&store, b"# readme\n");
        let index = indexed(&[("README", readme), ("src/main.rs", main)]);

        let root = index.commit(&store).unwrap();
        let Object::Tree(tree) = store.get(&root).unwrap().unwrap() else {
            panic!("expected tree");
        };
        assert_eq!(tree.entries.len(), 2);

        let src = tree.entry(b"src").unwrap();
        assert!(src.mode.is_tree());
        let Object::Tree(subtree) = store.get(&src.oid).unwrap().unwrap() else {
            panic!("expected subtree");
        };
        assert_eq!(subtree.entry(b"main.rs").unwrap().oid, main);
    }

    #[test]
    fn empty_index_yields_empty_tree() {
        let store = MemoryObjectStore::new();
        let index = indexed(&[]);
        let root = index.commit(&store).unwrap();
        // Well-known id of the empty tree.
        assert_eq!(root.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn deep_nesting() {
        let store = MemoryObjectStore::new();
        let blob = add_blob(&store, b"deep");
        let index = indexed(&[("a/b/c/d.txt", blob)]);

        let root = index.commit(&store).unwrap();
        let mut current = root;
        for name in [b"a".as_ref(), b"b".as_ref(), b"c".as_ref()] {
            let Object::Tree(tree) = store.get(&current).unwrap().unwrap() else {
                panic!("expected tree");
            };
            current = tree.entry(name).unwrap().oid;
        }
        let Object::Tree(leaf_tree) = store.get(&current).unwrap().unwrap() else {
            panic!("expected tree");
        };
        assert_eq!(leaf_tree.entry(b"d.txt").unwrap().oid, blob);
    }
}
