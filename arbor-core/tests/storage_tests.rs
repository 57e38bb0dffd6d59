use arbor_core::{HEADER_SIZE, NaryTree, TreeError, TreeFile};
use std::fs;
use tempfile::{NamedTempFile, tempdir};

fn directory_tree() -> NaryTree<String> {
    let mut tree = NaryTree::with_root("/".to_string()).unwrap();
    let root = tree.root().unwrap();
    let etc = tree.insert(root, "etc".to_string()).unwrap();
    tree.insert(etc, "hosts".to_string()).unwrap();
    tree.insert(etc, "passwd".to_string()).unwrap();
    let usr = tree.insert(root, "usr".to_string()).unwrap();
    tree.insert(usr, "bin".to_string()).unwrap();
    tree
}

fn names(tree: &NaryTree<String>) -> Vec<String> {
    tree.preorder().map(|n| n.payload().clone()).collect()
}

#[test]
fn test_save_and_load() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();
    let tree = directory_tree();

    tree.save(path).unwrap();
    let loaded: NaryTree<String> = NaryTree::load(path).unwrap();

    assert_eq!(loaded.len(), 6);
    assert_eq!(loaded.depth(), 3);
    assert_eq!(names(&loaded), names(&tree));
}

#[test]
fn test_save_empty_tree() {
    let temp_file = NamedTempFile::new().unwrap();
    let tree: NaryTree<u64> = NaryTree::new();

    tree.save(temp_file.path()).unwrap();
    let loaded: NaryTree<u64> = NaryTree::load(temp_file.path()).unwrap();

    assert!(loaded.is_empty());
}

#[test]
fn test_integer_payloads_survive() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("numbers.arbor");

    let mut tree = NaryTree::with_root(-1i64).unwrap();
    let mut current = tree.root().unwrap();
    for i in 0..300 {
        current = tree.insert(current, i * 1_000_000_007).unwrap();
    }
    tree.save(&path).unwrap();

    let loaded: NaryTree<i64> = NaryTree::load(&path).unwrap();
    let before: Vec<i64> = tree.preorder().map(|n| *n.payload()).collect();
    let after: Vec<i64> = loaded.preorder().map(|n| *n.payload()).collect();
    assert_eq!(before, after);
    assert_eq!(loaded.depth(), 301);
}

#[test]
fn test_file_layout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.arbor");
    directory_tree().save(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert!(bytes.len() > HEADER_SIZE);
    assert_eq!(&bytes[..8], b"ARBORBP\0");

    let encoding = TreeFile::new(&path).load::<String>().unwrap();
    assert_eq!(encoding.node_count(), 6);
    assert_eq!(encoding.structure_bits().len(), 12);
}

#[test]
fn test_truncated_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.arbor");
    directory_tree().save(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let err = NaryTree::<String>::load(&path).unwrap_err();
    assert!(matches!(err.downcast_ref::<TreeError>(), Some(TreeError::CorruptEncoding(_))));
}

#[test]
fn test_flipped_structure_bit_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.arbor");
    directory_tree().save(&path).unwrap();

    // Record: node count, bit length, then the first structure byte
    let mut bytes = fs::read(&path).unwrap();
    bytes[HEADER_SIZE + 16] ^= 0b0000_0001;
    fs::write(&path, &bytes).unwrap();

    let err = NaryTree::<String>::load(&path).unwrap_err();
    assert!(matches!(err.downcast_ref::<TreeError>(), Some(TreeError::CorruptEncoding(_))));
}

#[test]
fn test_wrong_payload_type_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.arbor");
    directory_tree().save(&path).unwrap();

    assert!(NaryTree::<u64>::load(&path).is_err());
}

#[test]
fn test_load_missing_file() {
    let dir = tempdir().unwrap();
    let err = NaryTree::<String>::load(dir.path().join("missing.arbor")).unwrap_err();
    assert!(err.downcast_ref::<TreeError>().is_none());
}
