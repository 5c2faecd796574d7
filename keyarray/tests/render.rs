use keyarray::{KeyArray, KeyError, Rendered, Source, Value};

fn key(name: &str, subs: &[&str]) -> KeyArray {
    let values: Vec<Value> = subs.iter().map(|s| Value::from(*s)).collect();
    KeyArray::construct(name, Source::List(&values), &[]).unwrap()
}

#[test]
fn canonical_integers_render_bare() {
    let k = key("^n", &["5", "05", "abc", "-3"]);
    let rendered = k.render(None).unwrap();
    assert_eq!(rendered.text, r#"5,"05","abc",-3"#);
    assert_eq!(rendered.name.as_deref(), Some(&b"^n"[..]));
}

#[test]
fn numbers_from_host_values() {
    let values = [Value::from(12), Value::from(-7), Value::from(1.5), Value::from(2.0)];
    let k = KeyArray::construct("^n", Source::List(&values), &[]).unwrap();
    assert_eq!(k.render(None).unwrap().text, r#"12,-7,"1.5","2.0""#);
}

#[test]
fn depth_limit() {
    let k = key("^n", &["a", "1", "b"]);
    assert_eq!(k.render(Some(2)).unwrap().text, r#""a",1"#);
    assert_eq!(k.render(Some(3)).unwrap(), k.render(None).unwrap());
    assert_eq!(
        k.render(Some(0)).unwrap(),
        Rendered {
            text: String::new(),
            name: Some(b"^n".to_vec()),
        }
    );
}

#[test]
fn depth_limit_out_of_range() {
    let k = key("^n", &["a"]);
    assert_eq!(
        k.render(Some(2)).unwrap_err(),
        KeyError::RangeError {
            operation: "render key array",
            requested: 2,
            depth: 1,
        }
    );
    let err = k.render(Some(-1)).unwrap_err();
    assert!(err.is_range_error());
    assert_eq!(
        err.to_string(),
        "Cannot render key array: -1 is not a valid node depth in the range 0-1"
    );
}

#[test]
fn empty_name_is_absent() {
    let k = key("", &[]);
    let rendered = k.render(None).unwrap();
    assert_eq!(rendered.text, "");
    assert_eq!(rendered.name, None);
}

#[test]
fn rendering_respects_view_depth() {
    let parent = key("^v", &["a"]);
    let _child = parent.append(&["b".into()]).unwrap();
    assert_eq!(parent.render(None).unwrap().text, r#""a""#);
}

#[test]
fn special_bytes_are_escaped() {
    let raw: &[u8] = b"q\"\\\n\x01";
    let k = KeyArray::construct("^e", Source::List(&[Value::String(raw)]), &[]).unwrap();
    assert_eq!(k.render(None).unwrap().text, r#""q\"\\\n\001""#);
}

#[test]
fn display_and_debug() {
    let k = key("^d", &["x", "10"]);
    assert_eq!(k.to_string(), r#"^d("x",10)"#);
    assert_eq!(key("^d", &[]).to_string(), "^d");
    assert!(format!("{k:?}").contains(r#"^d("x",10)"#));
}

#[test]
fn raw_view_points_into_the_block() {
    let k = key("^raw", &["ab", "cde"]);
    let raw = k.raw();
    assert_eq!(raw.depth(), 2);
    assert_eq!(raw.varname().len_used, 4);
    let read = |b: &keyarray::RawBuffer| unsafe {
        std::slice::from_raw_parts(b.buf_addr, b.len_used as usize).to_vec()
    };
    assert_eq!(read(raw.varname()), b"^raw");
    let subs: Vec<_> = raw.subsarray().iter().map(read).collect();
    assert_eq!(subs, [b"ab".to_vec(), b"cde".to_vec()]);
    assert_eq!(raw.subsarray()[1].len_alloc, 3);
    // Packed: each subscript starts where the previous one ends.
    let addr = |i: usize| raw.subsarray()[i].buf_addr as usize;
    assert_eq!(addr(0), raw.varname().buf_addr as usize + 4);
    assert_eq!(addr(1), addr(0) + 2);
}

#[test]
fn raw_view_is_taken_again_after_growth() {
    let parent = key("^raw", &["ab"]);
    let before: Vec<_> = {
        let raw = parent.raw();
        std::iter::once(*raw.varname())
            .chain(raw.subsarray().iter().copied())
            .collect()
    };

    // In-place growth writes past the parent's depth; a fresh view of the parent matches the
    // old descriptors exactly and the child's view extends them.
    let child = parent.append(&["cd".into()]).unwrap();
    assert!(child.shares_block(&parent));
    let after = parent.raw();
    assert_eq!(*after.varname(), before[0]);
    assert_eq!(after.subsarray(), &before[1..]);

    let grown = child.raw();
    assert_eq!(grown.depth(), 2);
    assert_eq!(&grown.subsarray()[..1], &before[1..]);
    let tail = grown.subsarray()[1];
    let bytes = unsafe { std::slice::from_raw_parts(tail.buf_addr, tail.len_used as usize) };
    assert_eq!(bytes, b"cd");
}
