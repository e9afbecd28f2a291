use pdfbands::segments::derive_segments;
use pdfbands::split_lines::SplitLineRegistry;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Add(f64),
    Delete(usize),
    Move(usize, f64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-0.5f64..1.5).prop_map(Op::Add),
        any::<usize>().prop_map(Op::Delete),
        (any::<usize>(), 0.05f64..=0.95).prop_map(|(i, p)| Op::Move(i, p)),
    ]
}

fn apply(registry: &mut SplitLineRegistry, op: &Op) {
    match *op {
        Op::Add(position) => {
            registry.add_line(position);
        }
        Op::Delete(pick) if !registry.is_empty() => {
            let id = registry.lines()[pick % registry.len()].id;
            registry.delete_line(id);
        }
        Op::Move(pick, position) if !registry.is_empty() => {
            let id = registry.lines()[pick % registry.len()].id;
            registry.move_line(id, position);
        }
        _ => {}
    }
}

proptest! {
    #[test]
    fn lines_stay_sorted_and_in_range(ops in prop::collection::vec(op(), 0..40)) {
        let mut registry = SplitLineRegistry::new();
        for op in &ops {
            apply(&mut registry, op);

            let positions = registry.positions();
            prop_assert!(positions.windows(2).all(|w| w[0] <= w[1]), "unsorted: {positions:?}");
            prop_assert!(
                positions.iter().all(|p| (0.05..=0.95).contains(p)),
                "out of range: {positions:?}"
            );
        }
    }

    #[test]
    fn segments_tile_page(ops in prop::collection::vec(op(), 0..40)) {
        let mut registry = SplitLineRegistry::new();
        for op in &ops {
            apply(&mut registry, op);
        }

        let positions = registry.positions();
        let segments = derive_segments(&positions).unwrap();
        let mut distinct = positions.clone();
        distinct.dedup();

        prop_assert_eq!(segments.len(), distinct.len() + 1);
        prop_assert_eq!(segments[0].start_ratio, 0.0);
        prop_assert_eq!(segments[segments.len() - 1].end_ratio, 1.0);
        let total: f64 = segments.iter().map(|s| s.end_ratio - s.start_ratio).sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
    }
}

#[test]
fn add_line_at_same_spot_is_nudged() {
    let mut registry = SplitLineRegistry::new();
    registry.add_line(0.5);
    registry.add_line(0.5);
    let positions = registry.positions();
    assert!((positions[0] - 0.5).abs() < 1e-12);
    assert!((positions[1] - 0.6).abs() < 1e-12);
}

#[test]
fn presets_give_equal_bands() {
    for parts in 1..=6 {
        let mut registry = SplitLineRegistry::new();
        registry.apply_preset(parts).unwrap();
        let segments = derive_segments(&registry.positions()).unwrap();

        assert_eq!(segments.len(), parts);
        for segment in &segments {
            assert!((segment.height_ratio() - 1.0 / parts as f64).abs() < 1e-9);
        }
    }
}
