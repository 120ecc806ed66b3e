//! A JSON-file-backed document collection. Every mutation rewrites the
//! collection's dump file; there are no transactions and no coordination
//! across collections, so a replace is the unit of persistence.

use super::doc_id::DocId;
use crate::store::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// A document with a generated identifier slot.
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Singular name used in NotFound messages.
    const NAME: &'static str;

    fn doc_id(&self) -> Option<DocId>;
    fn set_doc_id(&mut self, id: DocId);
}

pub struct DocCollection<T> {
    file_path: PathBuf,
    docs: Mutex<BTreeMap<String, T>>,
}

impl<T: Document> DocCollection<T> {
    fn load_dump_from_file(file_path: &PathBuf) -> StoreResult<BTreeMap<String, T>> {
        let mut file = File::open(file_path)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Opens the collection, starting empty when the dump file does not
    /// exist yet.
    pub fn open(file_path: PathBuf) -> DocCollection<T> {
        DocCollection {
            docs: Mutex::new(Self::load_dump_from_file(&file_path).unwrap_or_default()),
            file_path,
        }
    }

    fn save_dump(&self, docs: &BTreeMap<String, T>) -> StoreResult<()> {
        let json_string = serde_json::to_string_pretty(docs)?;
        let mut file = File::create(&self.file_path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }

    pub fn find_all(&self) -> Vec<T> {
        self.docs.lock().unwrap().values().cloned().collect()
    }

    pub fn find_by_id(&self, id: &DocId) -> Option<T> {
        self.docs.lock().unwrap().get(&id.to_string()).cloned()
    }

    pub fn find_one(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.docs.lock().unwrap().values().find(|d| predicate(d)).cloned()
    }

    /// Full collection scan with a filter predicate.
    pub fn filter_by(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.docs
            .lock()
            .unwrap()
            .values()
            .filter(|d| predicate(d))
            .cloned()
            .collect()
    }

    /// Inserts the document under a freshly generated time-ordered id.
    pub fn insert_one(&self, doc: &mut T) -> StoreResult<()> {
        let id = DocId::generate();
        doc.set_doc_id(id);
        let mut docs = self.docs.lock().unwrap();
        docs.insert(id.to_string(), doc.clone());
        self.save_dump(&docs)
    }

    /// Whole-document replace keyed by id. The caller must hold the full
    /// fetched document; there is no partial update.
    pub fn replace_one(&self, doc: &T) -> StoreResult<()> {
        let id = doc.doc_id().ok_or(StoreError::NotFound(T::NAME))?;
        let mut docs = self.docs.lock().unwrap();
        let key = id.to_string();
        if !docs.contains_key(&key) {
            return Err(StoreError::NotFound(T::NAME));
        }
        docs.insert(key, doc.clone());
        self.save_dump(&docs)
    }

    pub fn delete_by_id(&self, id: &DocId) -> StoreResult<()> {
        let mut docs = self.docs.lock().unwrap();
        if docs.remove(&id.to_string()).is_none() {
            return Err(StoreError::NotFound(T::NAME));
        }
        self.save_dump(&docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
    struct Note {
        id: Option<DocId>,
        text: String,
    }

    impl Document for Note {
        const NAME: &'static str = "note";

        fn doc_id(&self) -> Option<DocId> {
            self.id
        }

        fn set_doc_id(&mut self, id: DocId) {
            self.id = Some(id);
        }
    }

    fn temp_collection(name: &str) -> DocCollection<Note> {
        let dir = std::env::temp_dir().join(format!("fonoteca-coll-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.json", name));
        let _ = std::fs::remove_file(&path);
        DocCollection::open(path)
    }

    #[test]
    fn insert_assigns_id_and_persists() {
        let collection = temp_collection("insert");
        let mut note = Note {
            id: None,
            text: "hello".to_string(),
        };
        collection.insert_one(&mut note).unwrap();
        let id = note.id.unwrap();

        // A fresh handle must see the persisted dump.
        let reopened: DocCollection<Note> = DocCollection::open(collection.file_path.clone());
        assert_eq!(reopened.find_by_id(&id).unwrap().text, "hello");
    }

    #[test]
    fn replace_requires_existing_document() {
        let collection = temp_collection("replace");
        let ghost = Note {
            id: Some(DocId::generate()),
            text: "ghost".to_string(),
        };
        assert!(matches!(
            collection.replace_one(&ghost),
            Err(StoreError::NotFound(_))
        ));

        let mut note = Note {
            id: None,
            text: "v1".to_string(),
        };
        collection.insert_one(&mut note).unwrap();
        note.text = "v2".to_string();
        collection.replace_one(&note).unwrap();
        assert_eq!(collection.find_by_id(&note.id.unwrap()).unwrap().text, "v2");
    }

    #[test]
    fn delete_missing_is_not_found() {
        let collection = temp_collection("delete");
        assert!(matches!(
            collection.delete_by_id(&DocId::generate()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn filter_scans_the_whole_collection() {
        let collection = temp_collection("filter");
        for text in ["alpha", "beta", "alpine"] {
            let mut note = Note {
                id: None,
                text: text.to_string(),
            };
            collection.insert_one(&mut note).unwrap();
        }
        let hits = collection.filter_by(|n| n.text.starts_with("al"));
        assert_eq!(hits.len(), 2);
    }
}
