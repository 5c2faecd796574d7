use keyarray::{AllocPolicy, KeyArray, KeyBuilder, KeyError, KeyMode, MAX_SUBSCRIPT_DEPTH, Source, Value};

fn key(subs: &[&str]) -> KeyArray {
    let values: Vec<Value> = subs.iter().map(|s| Value::from(*s)).collect();
    KeyArray::construct("^k", Source::List(&values), &[]).unwrap()
}

fn strings(key: &KeyArray) -> Vec<String> {
    key.subscripts()
        .into_iter()
        .map(|s| String::from_utf8(s).unwrap())
        .collect()
}

#[test]
fn append_is_associative() {
    let base = key(&["a"]);
    let stepwise = base
        .append(&["b".into(), "c".into()])
        .unwrap()
        .append(&["d".into()])
        .unwrap();
    let base = key(&["a"]);
    let at_once = base
        .append(&["b".into(), "c".into(), "d".into()])
        .unwrap();
    assert_eq!(stepwise.depth(), at_once.depth());
    assert_eq!(stepwise.subscripts(), at_once.subscripts());
}

#[test]
fn in_place_append_is_invisible_to_the_original() {
    let parent = key(&["a", "b"]);
    let before = parent.clone();
    let child = parent.append(&["c".into()]).unwrap();

    assert!(child.shares_block(&parent));
    assert_eq!(child.header().depth, 3);
    assert_eq!(strings(&child), ["a", "b", "c"]);
    assert_eq!(before.depth(), 2);
    assert_eq!(strings(&before), ["a", "b"]);
    assert_eq!(parent.to_string(), r#"^k("a","b")"#);
}

#[test]
fn claimed_next_slot_forces_copy() {
    let parent = key(&["a"]);
    let first = parent.append(&["x".into()]).unwrap();
    let second = parent.append(&["y".into()]).unwrap();

    assert!(first.shares_block(&parent));
    assert!(!second.shares_block(&parent));
    assert_eq!(strings(&first), ["a", "x"]);
    assert_eq!(strings(&second), ["a", "y"]);

    // The copy is a fresh growable block with its own slack.
    let grandchild = second.append(&["z".into()]).unwrap();
    assert!(grandchild.shares_block(&second));
    assert_eq!(strings(&first), ["a", "x"]);
}

#[test]
fn slot_slack_runs_out() {
    let mut current = key(&[]);
    let slack = AllocPolicy::default().overalloc_slots;
    let root = current.clone();
    for i in 0..slack {
        let next = current.append(&[Value::from(i as i64)]).unwrap();
        assert!(next.shares_block(&root), "append {i} should be in place");
        current = next;
    }
    let next = current.append(&["over".into()]).unwrap();
    assert!(!next.shares_block(&root));
    assert_eq!(next.depth(), slack + 1);
    assert_eq!(next.header().depth_alloc, slack + 1 + AllocPolicy::default().overalloc_slots);
}

#[test]
fn arena_overflow_mid_append_moves_to_new_block() {
    let policy = AllocPolicy {
        typical_subscript_len: 1,
        ..AllocPolicy::default()
    };
    let parent = KeyBuilder::new("n")
        .source(Source::List(&["a".into()]))
        .policy(policy)
        .build()
        .unwrap();
    let long = "L".repeat(40);
    let child = parent
        .append(&["b".into(), long.as_str().into(), "c".into()])
        .unwrap();

    assert!(!child.shares_block(&parent));
    assert_eq!(strings(&child), ["a", "b", long.as_str(), "c"]);
    // Nothing was committed to the parent's block.
    assert_eq!(parent.header().depth, 1);
    let sibling = parent.append(&["d".into()]).unwrap();
    assert!(sibling.shares_block(&parent));
    assert_eq!(strings(&sibling), ["a", "d"]);
}

#[test]
fn depth_cap_leaves_input_unmodified() {
    let values: Vec<Value> = (0..MAX_SUBSCRIPT_DEPTH as i64 - 1).map(Value::from).collect();
    let near_full = KeyArray::construct("g", Source::List(&values), &[]).unwrap();
    let header = near_full.header();

    let err = near_full
        .append(&["x".into(), "y".into()])
        .unwrap_err();
    assert_eq!(
        err,
        KeyError::DepthExceeded {
            operation: "append to key array",
            max: MAX_SUBSCRIPT_DEPTH,
            requested: MAX_SUBSCRIPT_DEPTH + 1,
        }
    );
    assert_eq!(near_full.header(), header);
    assert_eq!(near_full.depth(), MAX_SUBSCRIPT_DEPTH - 1);

    let full = near_full.append(&["x".into()]).unwrap();
    assert_eq!(full.depth(), MAX_SUBSCRIPT_DEPTH);
}

#[test]
fn type_error_claims_nothing() {
    let parent = key(&["a"]);
    let err = parent
        .append(&["ok".into(), Value::Boolean(false)])
        .unwrap_err();
    assert!(matches!(err, KeyError::TypeError { position: 3, found: "boolean", .. }));
    assert_eq!(parent.header().depth, 1);
    assert!(parent.append(&["b".into()]).unwrap().shares_block(&parent));
}

#[test]
fn mutable_keys_always_copy_on_append() {
    let mutable = key(&["a", "b"]).into_mutable();
    let child = mutable.append(&["c".into()]).unwrap();
    assert!(!child.shares_block(&mutable));
    assert_eq!(child.mode(), KeyMode::Growable);
    assert_eq!(strings(&child), ["a", "b", "c"]);

    let mut mutable = mutable;
    mutable.substitute("B").unwrap();
    assert_eq!(strings(&child), ["a", "b", "c"]);
    assert_eq!(strings(&mutable), ["a", "B"]);
}

#[test]
fn outstanding_borrow_falls_back_to_copy() {
    let parent = key(&["a"]);
    let name = parent.name();
    let child = parent.append(&["b".into()]).unwrap();
    assert_eq!(&*name, b"^k");
    assert!(!child.shares_block(&parent));
    assert_eq!(strings(&child), ["a", "b"]);
}

#[test]
fn overlong_addition_claims_nothing() {
    let parent = key(&["a"]);
    let long = vec![b'x'; keyarray::config::MAX_SUBSCRIPT_LEN + 1];
    let err = parent
        .append(&["ok".into(), Value::from(&long)])
        .unwrap_err();
    assert!(matches!(err, KeyError::TooLong { position: 3, .. }));
    assert_eq!(parent.header().depth, 1);
    assert!(parent.append(&["b".into()]).unwrap().shares_block(&parent));
}
