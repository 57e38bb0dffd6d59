//! A preorder walk yields views into the tree, so clearing mid-walk is
//! rejected.
//!
//! If this code compiles, there is a bug in the API design.

use arbor_core::NaryTree;

fn main() {
    let mut tree = NaryTree::with_root('r').unwrap();
    let root = tree.root().unwrap();
    tree.insert(root, 'a').unwrap();

    for node in tree.preorder() {
        // ERROR: clear() needs &mut self while `node` borrows &self
        tree.clear();
        println!("{}", node.payload());
    }
}
