// tests/test_quadtree.rs
// Public-API checks of quadtree lookup, growth, and containment invariants.

use ember3d::geom::Aabb2;
use ember3d::QuadTree;
use glam::Vec2;

#[test]
fn two_level_tree_resolves_expected_leaves() {
    let mut tree: QuadTree<()> = QuadTree::new(Aabb2::new(Vec2::ZERO, Vec2::splat(2.0)), 1);

    let leaf = tree.child_at(Vec2::new(0.5, 0.5)).unwrap();
    assert_eq!(leaf.level(), 0);
    assert_eq!(leaf.aabb(), Aabb2::new(Vec2::ZERO, Vec2::splat(1.0)));

    let leaf = tree.child_at(Vec2::new(1.5, 1.5)).unwrap();
    assert_eq!(leaf.aabb(), Aabb2::new(Vec2::splat(1.0), Vec2::splat(2.0)));
}

#[test]
fn grow_produces_doubled_root_with_old_tree_in_origin_quadrant() {
    let tree: Box<QuadTree<u8>> = Box::new(QuadTree::new(
        Aabb2::new(Vec2::ZERO, Vec2::splat(4.0)),
        2,
    ));
    let root = tree.grow();

    assert_eq!(root.level(), 3);
    assert_eq!(root.aabb(), Aabb2::new(Vec2::ZERO, Vec2::splat(8.0)));

    let slots: Vec<usize> = (0..4).filter(|&i| root.child(i).is_some()).collect();
    assert_eq!(slots, vec![0], "old root belongs in the bottom-left quadrant");
    assert_eq!(
        root.child(0).unwrap().aabb(),
        Aabb2::new(Vec2::ZERO, Vec2::splat(4.0))
    );
}

#[test]
fn repeated_growth_keeps_containment() {
    let mut root: Box<QuadTree<u8>> = Box::new(QuadTree::new(
        Aabb2::new(Vec2::ZERO, Vec2::splat(1.0)),
        0,
    ));
    for _ in 0..4 {
        root = root.grow();
    }
    assert_eq!(root.level(), 4);
    assert_eq!(root.aabb(), Aabb2::new(Vec2::ZERO, Vec2::splat(16.0)));

    // Every reachable child must be contained in its parent.
    fn assert_contained(node: &QuadTree<u8>) {
        for i in 0..4 {
            if let Some(child) = node.child(i) {
                assert!(node.aabb().contains_point(child.aabb().min));
                assert!(node.aabb().contains_point(child.aabb().max));
                assert_contained(child);
            }
        }
    }
    assert_contained(&root);
}

#[test]
fn traverse_counts_match_grid_enumeration() {
    let k = 2u32;
    let cells = 1u32 << k; // per axis
    let mut tree: QuadTree<u32> = QuadTree::new(
        Aabb2::new(Vec2::ZERO, Vec2::splat(cells as f32)),
        k,
    );

    let mut direct_sum = 0u32;
    for y in 0..cells {
        for x in 0..cells {
            let value = y * cells + x;
            let leaf = tree
                .child_at(Vec2::new(x as f32 + 0.5, y as f32 + 0.5))
                .unwrap();
            leaf.data = Some(value);
            direct_sum += value;
        }
    }

    let mut traversed_sum = 0u32;
    let mut leaves = 0u32;
    tree.traverse(&mut |node| {
        if node.is_leaf() {
            traversed_sum += node.data.unwrap();
            leaves += 1;
        }
        true
    });

    assert_eq!(leaves, 4u32.pow(k));
    assert_eq!(traversed_sum, direct_sum);
}
