//! A `NodeRef` borrows the tree, so the tree cannot be mutated while the
//! view is alive.
//!
//! If this code compiles, there is a bug in the API design.

use arbor_core::NaryTree;

fn main() {
    let mut tree = NaryTree::with_root(1u32).unwrap();
    let root = tree.root().unwrap();

    let view = tree.node(root).unwrap();

    // ERROR: insert() needs &mut self while `view` borrows &self
    tree.insert(root, 2).unwrap();

    println!("{}", view.payload());
}
