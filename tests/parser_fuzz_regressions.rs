//! The parser must never panic, regardless of input. These are small,
//! hand-picked inputs rather than a full fuzz corpus; the fuzz target under
//! fuzz/ covers the broader input space.

use betrace::dsl;

#[test]
fn never_panics_on_empty_input() {
    assert!(dsl::compile("").is_err());
}

#[test]
fn never_panics_on_truncated_rule() {
    assert!(dsl::compile("when {").is_err());
}

#[test]
fn never_panics_on_unicode_garbage() {
    assert!(dsl::compile("when { \u{1F600} } always { y }").is_err());
}

#[test]
fn never_panics_on_deeply_nested_parens() {
    let mut source = "when { ".to_string();
    for _ in 0..2000 {
        source.push('(');
    }
    source.push_str("x");
    for _ in 0..2000 {
        source.push(')');
    }
    source.push_str(" } always { y }");
    // Either rejected for exceeding the depth limit or for a syntax error;
    // must not panic or hang.
    let _ = dsl::compile(&source);
}

#[test]
fn never_panics_on_oversized_source() {
    let source = "x".repeat(200_000);
    assert!(dsl::compile(&source).is_err());
}
