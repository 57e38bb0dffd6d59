//! A payload reference cannot survive a re-layout, which moves every node.
//!
//! If this code compiles, there is a bug in the API design.

use arbor_core::NaryTree;

fn main() {
    let mut tree = NaryTree::with_root(String::from("root")).unwrap();
    let root = tree.root().unwrap();
    tree.insert(root, String::from("child")).unwrap();

    let name = tree.payload(root).unwrap();

    // ERROR: relayout() needs &mut self while `name` borrows &self
    tree.relayout().unwrap();

    println!("{name}");
}
