use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use rgit_hash::ObjectId;
use rgit_object::Object;

use crate::{ObjectStore, OdbError};

/// Disk-backed object store over a loose-object directory.
///
/// Each object lives at `objects/XX/YYYY...` where `XX` is the first hex
/// byte of its id. File contents are a zlib stream of
/// `"<type> <size>\0<content>"`.
pub struct DiskObjectStore {
    objects_dir: PathBuf,
    compression: flate2::Compression,
}

impl DiskObjectStore {
    /// Open the object store rooted at the given objects directory.
    pub fn open(objects_dir: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            compression: flate2::Compression::default(),
        }
    }

    /// Create the objects directory skeleton and open the store.
    pub fn init(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref();
        for dir in [
            objects_dir.to_path_buf(),
            objects_dir.join("info"),
            objects_dir.join("pack"),
        ] {
            fs::create_dir_all(&dir).map_err(|e| OdbError::IoPath {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(Self::open(objects_dir))
    }

    /// Path to the objects directory.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// The file path for a given object id.
    pub fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir.join(oid.loose_path())
    }
}

impl ObjectStore for DiskObjectStore {
    fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    fn get(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        let path = self.object_path(oid);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OdbError::IoPath { path, source: e }),
        };

        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .map_err(|e| OdbError::Decompress {
                oid: *oid,
                source: e,
            })?;

        Ok(Some(Object::parse(&raw)?))
    }

    fn add_object(&self, obj: &Object) -> Result<ObjectId, OdbError> {
        let raw = obj.serialize();
        let oid = obj.id();

        if self.contains(&oid) {
            return Ok(oid);
        }

        let final_path = self.object_path(&oid);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).map_err(|e| OdbError::IoPath {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        // Compress into a temp file beside the fan-out dirs, then rename.
        let tmp_path = self
            .objects_dir
            .join(format!("tmp_obj_{}_{}", std::process::id(), oid.to_hex()));
        let file = fs::File::create(&tmp_path).map_err(|e| OdbError::IoPath {
            path: tmp_path.clone(),
            source: e,
        })?;
        let mut encoder = ZlibEncoder::new(file, self.compression);
        encoder.write_all(&raw)?;
        encoder.finish()?;

        match fs::rename(&tmp_path, &final_path) {
            Ok(()) => {}
            Err(_) if final_path.exists() => {
                // Another writer stored the same content first.
                let _ = fs::remove_file(&tmp_path);
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(OdbError::IoPath {
                    path: final_path,
                    source: e,
                });
            }
        }

        Ok(oid)
    }

    fn iter_oids(&self) -> Result<Vec<ObjectId>, OdbError> {
        let mut oids = Vec::new();
        let entries = match fs::read_dir(&self.objects_dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(oids),
            Err(e) => return Err(OdbError::Io(e)),
        };

        for entry in entries {
            let entry = entry?;
            let fan = entry.file_name();
            let Some(fan) = fan.to_str() else { continue };
            if fan.len() != 2 || !fan.bytes().all(|b| b.is_ascii_hexdigit()) {
                continue;
            }
            for obj in fs::read_dir(entry.path())? {
                let obj = obj?;
                let rest = obj.file_name();
                let Some(rest) = rest.to_str() else { continue };
                let hex = format!("{fan}{rest}");
                if let Ok(oid) = ObjectId::from_hex(&hex) {
                    oids.push(oid);
                }
            }
        }

        Ok(oids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgit_object::Blob;

    #[test]
    fn init_creates_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let objects = dir.path().join("objects");
        DiskObjectStore::init(&objects).unwrap();
        assert!(objects.join("info").is_dir());
        assert!(objects.join("pack").is_dir());
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::init(dir.path().join("objects")).unwrap();

        let obj = Object::Blob(Blob::new(b"loose content\n".to_vec()));
        let oid = store.add_object(&obj).unwrap();

        assert!(store.contains(&oid));
        assert_eq!(store.get(&oid).unwrap().unwrap(), obj);
    }

    #[test]
    fn missing_object_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::init(dir.path().join("objects")).unwrap();
        let oid = ObjectId::from_bytes(&[7u8; 20]).unwrap();
        assert!(!store.contains(&oid));
        assert!(store.get(&oid).unwrap().is_none());
        assert!(matches!(
            store.get_required(&oid),
            Err(OdbError::NotFound(_))
        ));
    }

    #[test]
    fn add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::init(dir.path().join("objects")).unwrap();

        let obj = Object::Blob(Blob::new(b"same".to_vec()));
        let a = store.add_object(&obj).unwrap();
        let b = store.add_object(&obj).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn enumerates_written_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::init(dir.path().join("objects")).unwrap();

        let a = store
            .add_object(&Object::Blob(Blob::new(b"a".to_vec())))
            .unwrap();
        let b = store
            .add_object(&Object::Blob(Blob::new(b"b".to_vec())))
            .unwrap();

        let mut oids = store.iter_oids().unwrap();
        oids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(oids, expected);
    }

    #[test]
    fn object_path_uses_fanout() {
        let store = DiskObjectStore::open("/tmp/objects");
        let oid = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        assert_eq!(
            store.object_path(&oid),
            PathBuf::from("/tmp/objects/da/39a3ee5e6b4b0d3255bfef95601890afd80709")
        );
    }
}
