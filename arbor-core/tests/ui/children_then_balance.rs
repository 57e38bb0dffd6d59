//! Iterating children borrows the tree for the whole loop.
//!
//! If this code compiles, there is a bug in the API design.

use arbor_core::NaryTree;

fn main() {
    let mut tree = NaryTree::with_root(0u32).unwrap();
    let root = tree.root().unwrap();
    for i in 1..5 {
        tree.insert(root, i).unwrap();
    }

    for child in tree.children_of(root) {
        // ERROR: height_balance() needs &mut self while the iterator borrows &self
        tree.height_balance(2).unwrap();
        println!("{child}");
    }
}
