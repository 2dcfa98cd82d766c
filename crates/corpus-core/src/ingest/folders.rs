//! Folder tree derivation.
//!
//! Documents carry a forward-slash `folder_id`; the tree is rebuilt from the
//! document list alone, so rebuilding from the same list yields a
//! structurally equal tree. Documents with an empty `folder_id` live at the
//! KB root and appear in no folder.

use std::collections::{HashMap, HashSet};

use crate::types::{Document, Folder};

/// Build the hierarchical folder structure for a document list.
pub fn build_folder_structure(documents: &[Document]) -> Vec<Folder> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names: HashMap<String, String> = HashMap::new();
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    let mut files: HashMap<String, Vec<String>> = HashMap::new();
    let mut roots: Vec<String> = Vec::new();

    for doc in documents {
        if doc.folder_id.is_empty() {
            continue;
        }

        let mut current = String::new();
        for part in doc.folder_id.split('/') {
            if part.is_empty() {
                continue;
            }
            let parent = current.clone();
            current = if current.is_empty() {
                part.to_string()
            } else {
                format!("{}/{}", current, part)
            };

            if seen.insert(current.clone()) {
                names.insert(current.clone(), part.to_string());
                if parent.is_empty() {
                    roots.push(current.clone());
                } else {
                    children.entry(parent).or_default().push(current.clone());
                }
            }
        }
    }

    for doc in documents {
        if seen.contains(&doc.folder_id) {
            files
                .entry(doc.folder_id.clone())
                .or_default()
                .push(doc.id.clone());
        }
    }

    roots
        .iter()
        .map(|id| assemble(id, &names, &children, &files))
        .collect()
}

fn assemble(
    id: &str,
    names: &HashMap<String, String>,
    children: &HashMap<String, Vec<String>>,
    files: &HashMap<String, Vec<String>>,
) -> Folder {
    Folder {
        id: id.to_string(),
        name: names.get(id).cloned().unwrap_or_default(),
        folders: children
            .get(id)
            .map(|kids| {
                kids.iter()
                    .map(|kid| assemble(kid, names, children, files))
                    .collect()
            })
            .unwrap_or_default(),
        files: files.get(id).cloned().unwrap_or_default(),
        is_open: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, folder: &str) -> Document {
        Document {
            id: id.to_string(),
            title: format!("{}.txt", id),
            doc_type: "text".into(),
            date: "2024-01-01T00:00:00Z".into(),
            tags: vec![],
            source: "local_store".into(),
            description: String::new(),
            url: String::new(),
            folder_id: folder.to_string(),
            original: None,
        }
    }

    #[test]
    fn builds_two_root_folders_with_one_file_each() {
        let docs = vec![doc("d1", "a"), doc("d2", "b")];
        let tree = build_folder_structure(&docs);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "a");
        assert_eq!(tree[0].files, vec!["d1"]);
        assert!(tree[0].folders.is_empty());
        assert_eq!(tree[1].name, "b");
        assert_eq!(tree[1].files, vec!["d2"]);
    }

    #[test]
    fn nests_intermediate_folders() {
        let docs = vec![doc("d1", "a/b/c"), doc("d2", "a/b"), doc("d3", "a")];
        let tree = build_folder_structure(&docs);

        assert_eq!(tree.len(), 1);
        let a = &tree[0];
        assert_eq!(a.id, "a");
        assert_eq!(a.files, vec!["d3"]);

        let b = &a.folders[0];
        assert_eq!(b.id, "a/b");
        assert_eq!(b.name, "b");
        assert_eq!(b.files, vec!["d2"]);

        let c = &b.folders[0];
        assert_eq!(c.id, "a/b/c");
        assert_eq!(c.files, vec!["d1"]);
    }

    #[test]
    fn root_documents_appear_in_no_folder() {
        let docs = vec![doc("d1", ""), doc("d2", "a")];
        let tree = build_folder_structure(&docs);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].files, vec!["d2"]);
    }

    #[test]
    fn rebuild_is_structurally_idempotent() {
        let docs = vec![
            doc("d1", "a/b"),
            doc("d2", "a"),
            doc("d3", "b"),
            doc("d4", "a/b"),
        ];
        let first = build_folder_structure(&docs);
        let second = build_folder_structure(&docs);
        assert_eq!(first, second);
    }
}
