use arbor_core::{BitSeq, NaryTree, NodeId, SuccinctEncoding, TreeError, TreeOptions};

fn chain(len: u32) -> NaryTree<u32> {
    let options = TreeOptions { rebalance_every: 0, ..TreeOptions::default() };
    let mut tree = NaryTree::with_options(options).unwrap();
    let mut current = tree.set_root(1).unwrap();
    for i in 2..=len {
        current = tree.insert(current, i).unwrap();
    }
    tree
}

#[test]
fn test_balancing_a_chain() {
    let mut tree = chain(10);
    assert_eq!(tree.depth(), 10);

    tree.height_balance(3).unwrap();

    assert!(tree.depth() <= 4);
    assert_eq!(tree.len(), 10);
    let mut payloads: Vec<u32> = tree.preorder().map(|n| *n.payload()).collect();
    payloads.sort_unstable();
    assert_eq!(payloads, (1..=10).collect::<Vec<_>>());
}

#[test]
fn test_encoding_of_root_with_two_children() {
    let mut tree = NaryTree::with_root("root").unwrap();
    let root = tree.root().unwrap();
    tree.insert(root, "A").unwrap();
    tree.insert(root, "B").unwrap();

    let encoding = tree.encode().unwrap();

    let bits: Vec<bool> = encoding.structure_bits().iter().collect();
    assert_eq!(bits, [true, true, false, true, false, false]);
    assert_eq!(encoding.data(), ["root", "A", "B"]);
    assert_eq!(encoding.node_count(), 3);
}

#[test]
fn test_truncated_encodings_are_corrupt() {
    // Odd length
    let odd: BitSeq = [true, true, false].into_iter().collect();
    let result = NaryTree::decode(SuccinctEncoding::from_parts(odd, vec!['a', 'b'], 2));
    assert!(matches!(result, Err(TreeError::CorruptEncoding(_))));

    // Opens never closed
    let unmatched: BitSeq = [true, true, true, true].into_iter().collect();
    let result = NaryTree::decode(SuccinctEncoding::from_parts(unmatched, vec!['a', 'b'], 2));
    assert!(matches!(result, Err(TreeError::CorruptEncoding(_))));

    // Close before open
    let inverted: BitSeq = [false, true, true, false].into_iter().collect();
    let result = NaryTree::decode(SuccinctEncoding::from_parts(inverted, vec!['a', 'b'], 2));
    assert!(matches!(result, Err(TreeError::CorruptEncoding(_))));
}

#[test]
fn test_empty_tree_encoding() {
    let tree: NaryTree<String> = NaryTree::new();
    let encoding = tree.encode().unwrap();

    assert!(encoding.structure_bits().is_empty());
    assert!(encoding.data().is_empty());
    assert_eq!(encoding.node_count(), 0);

    let decoded = NaryTree::decode(encoding).unwrap();
    assert!(decoded.is_empty());
    assert_eq!(decoded.root(), None);
    assert_eq!(decoded.depth(), 0);
}

#[test]
fn test_insert_under_stale_handle_fails() {
    let mut tree = chain(5);
    let root = tree.root().unwrap();
    tree.relayout().unwrap();

    let result = tree.insert(root, 99);
    assert!(matches!(result, Err(TreeError::InvalidParent(_))));
    assert_eq!(tree.len(), 5);
}

#[test]
fn test_second_root_is_rejected() {
    let mut tree = NaryTree::with_root(0u8).unwrap();
    assert!(matches!(tree.set_root(1), Err(TreeError::InvalidArgument(_))));
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_height_balance_rejects_zero_factor() {
    let mut tree = chain(4);
    assert!(matches!(tree.height_balance(0), Err(TreeError::InvalidArgument(_))));
    assert_eq!(tree.depth(), 4);
}

#[test]
fn test_balance_remap_carries_handles() {
    let options = TreeOptions { rebalance_every: 0, ..TreeOptions::default() };
    let mut tree = NaryTree::with_options(options).unwrap();
    let mut handles: Vec<NodeId> = vec![tree.set_root(0u32).unwrap()];
    for i in 1..40 {
        let parent = handles[(i as usize - 1) / 2];
        handles.push(tree.insert(parent, i).unwrap());
    }

    let remap = tree.height_balance(4).unwrap();

    for (i, old) in handles.iter().enumerate() {
        let new = remap.resolve(*old).unwrap();
        assert_eq!(tree.payload(new), Some(&(i as u32)));
    }
}

#[test]
fn test_children_follow_insertion_order() {
    let options = TreeOptions { rebalance_every: 0, ..TreeOptions::default() };
    let mut tree = NaryTree::with_options(options).unwrap();
    let root = tree.set_root("root".to_string()).unwrap();
    let a = tree.insert(root, "a".to_string()).unwrap();
    let b = tree.insert(root, "b".to_string()).unwrap();
    tree.insert(a, "a1".to_string()).unwrap();
    tree.insert(root, "c".to_string()).unwrap();
    tree.insert(b, "b1".to_string()).unwrap();

    let names: Vec<&str> = tree.preorder().map(|n| n.payload().as_str()).collect();
    assert_eq!(names, ["root", "a", "a1", "b", "b1", "c"]);

    let root = tree.root().unwrap();
    assert_eq!(tree.child_count(root), Some(3));
    let third = tree.child_at(root, 2).unwrap();
    assert_eq!(tree.payload(third).map(String::as_str), Some("c"));
    assert_eq!(tree.child_at(root, 3), None);
}

#[test]
fn test_relayout_is_level_order() {
    let options = TreeOptions { rebalance_every: 0, ..TreeOptions::default() };
    let mut tree = NaryTree::with_options(options).unwrap();
    let root = tree.set_root('r').unwrap();
    let a = tree.insert(root, 'a').unwrap();
    tree.insert(a, 'x').unwrap();
    tree.insert(root, 'b').unwrap();

    tree.relayout().unwrap();

    let mut physical = Vec::new();
    tree.for_each_slot(|_, &c| physical.push(c));
    assert_eq!(physical, ['r', 'a', 'b', 'x']);
    assert_eq!(tree.locality_score(), 1.0);
}

#[test]
fn test_stats_of_small_tree() {
    let mut tree = NaryTree::with_root(0u64).unwrap();
    let root = tree.root().unwrap();
    let a = tree.insert(root, 1).unwrap();
    tree.insert(root, 2).unwrap();
    tree.insert(a, 3).unwrap();

    let stats = tree.stats();
    assert_eq!(stats.total_nodes, 4);
    assert_eq!(stats.leaf_nodes, 2);
    assert_eq!(stats.internal_nodes, 2);
    assert_eq!(stats.max_depth, 3);
    assert_eq!(stats.min_children, 1);
    assert_eq!(stats.max_children, 2);
    assert!((stats.avg_children_per_node - 1.5).abs() < 1e-9);

    let memory = tree.memory_stats();
    assert!(memory.node_memory_bytes > 0);
    assert!(memory.total_estimated_bytes >= memory.node_memory_bytes);
}

#[test]
fn test_decode_is_breadth_first_and_fresh() {
    let mut tree = NaryTree::with_root(0u16).unwrap();
    let root = tree.root().unwrap();
    let a = tree.insert(root, 1).unwrap();
    tree.insert(a, 3).unwrap();
    tree.insert(root, 2).unwrap();

    let decoded = NaryTree::decode(tree.encode().unwrap()).unwrap();

    assert_eq!(decoded.store().epoch(), 0);
    assert_eq!(decoded.store().tombstones(), 0);
    let order: Vec<u16> = decoded.breadth_first().map(|n| *n.payload()).collect();
    assert_eq!(order, [0, 1, 2, 3]);
    assert!(!decoded.needs_rebalancing(3));
}

#[test]
fn test_position_and_payload_mut() {
    let mut tree = NaryTree::with_root(10i32).unwrap();
    let root = tree.root().unwrap();
    tree.insert(root, 20).unwrap();
    tree.insert(root, 30).unwrap();

    let found = tree.position(|&v| v == 30).unwrap();
    *tree.payload_mut(found).unwrap() += 1;

    assert_eq!(tree.payload(found), Some(&31));
    assert_eq!(tree.parent_of(found), Some(root));
    assert_eq!(tree.position(|&v| v == 99), None);
}

#[test]
fn test_drain_payloads_in_preorder() {
    let mut tree = NaryTree::with_root("r").unwrap();
    let root = tree.root().unwrap();
    let a = tree.insert(root, "a").unwrap();
    tree.insert(root, "b").unwrap();
    tree.insert(a, "a1").unwrap();

    let drained = tree.drain_payloads();

    assert_eq!(drained, ["r", "a", "a1", "b"]);
    assert!(tree.is_empty());
    assert!(!tree.is_valid(root));
}

#[test]
fn test_deep_chain_does_not_overflow_stack() {
    let depth = 100_000;
    let mut tree = chain(depth);
    assert_eq!(tree.depth(), depth as usize);

    let decoded = NaryTree::decode(tree.encode().unwrap()).unwrap();
    assert_eq!(decoded.depth(), depth as usize);

    tree.height_balance(8).unwrap();
    assert!(tree.depth() <= 7);
}

#[cfg(feature = "serde")]
#[test]
fn test_options_from_json() {
    let options: TreeOptions = serde_json::from_str(r#"{"rebalance_every": 7}"#).unwrap();
    assert_eq!(options.rebalance_every, 7);
    assert_eq!(options.default_branching_factor, 3);

    let encoding = NaryTree::with_root(5u32).unwrap().encode().unwrap();
    let json = serde_json::to_string(&encoding).unwrap();
    let back: SuccinctEncoding<u32> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, encoding);
}

#[cfg(feature = "serde")]
#[test]
fn test_json_bits_are_checked_before_decode() {
    // 16 bits claimed, one byte supplied
    let short = r#"{"structure_bits":{"bytes":[255],"len":16},"data":[1,2,3,4,5,6,7,8],"node_count":8}"#;
    let err = serde_json::from_str::<SuccinctEncoding<u32>>(short).unwrap_err();
    assert!(err.to_string().contains("corrupt encoding"));

    // Padding bits past the sixth bit are set
    let padded = r#"{"structure_bits":{"bytes":[203],"len":6},"data":[1,2,3],"node_count":3}"#;
    assert!(serde_json::from_str::<SuccinctEncoding<u32>>(padded).is_err());

    // Well-framed bits that close before opening still fail in decode
    let inverted = r#"{"structure_bits":{"bytes":[2],"len":2},"data":[1],"node_count":1}"#;
    let encoding: SuccinctEncoding<u32> = serde_json::from_str(inverted).unwrap();
    assert!(matches!(NaryTree::decode(encoding), Err(TreeError::CorruptEncoding(_))));
}
