//! End-to-end properties of the formula engine.

use pretty_assertions::assert_eq;
use tallysheet::engine::{
    CellKey, EngineConfig, ErrorTag, Sheet, Value, col_to_letters, format_address, letters_to_col,
    parse_address,
};

fn key(name: &str) -> CellKey {
    CellKey::from_str(name).unwrap()
}

#[test]
fn test_address_round_trip() {
    for row in [1, 2, 9, 10, 99, 1000] {
        for col in [1, 2, 25, 26, 27, 52, 53, 702, 703, 16384] {
            let text = format_address(row, col);
            let cell = parse_address(&text).unwrap();
            assert_eq!((cell.row(), cell.col()), (row, col), "{text}");
            assert!(!cell.row_fixed && !cell.col_fixed);
        }
    }
}

#[test]
fn test_column_letters_monotonic() {
    let mut previous = String::new();
    for col in 1..=2000 {
        let letters = col_to_letters(col);
        assert_eq!(letters_to_col(&letters), Some(col));
        assert!(
            letters.len() > previous.len()
                || (letters.len() == previous.len() && letters > previous),
            "{previous} -> {letters}"
        );
        previous = letters;
    }
}

#[test]
fn test_cache_follows_chain_edits() {
    let mut sheet = Sheet::new();
    sheet.set_cell(key("A1"), "1");
    sheet.set_cell(key("B1"), "=A1+1");
    sheet.set_cell(key("C1"), "=B1*10");
    assert_eq!(sheet.value_of(key("C1")), Value::Number(20.0));
    assert_eq!(sheet.cached(key("B1")), Some(Value::Number(2.0)));

    sheet.set_cell(key("A1"), "5");
    assert_eq!(sheet.cached(key("B1")), None);
    assert_eq!(sheet.cached(key("C1")), None);
    assert_eq!(sheet.value_of(key("C1")), Value::Number(60.0));
    assert!(sheet.links().is_consistent());
}

#[test]
fn test_cycle_is_contained() {
    let mut sheet = Sheet::new();
    sheet.set_cell(key("A1"), "=B1");
    sheet.set_cell(key("B1"), "=A1");
    sheet.set_cell(key("C1"), "3");
    sheet.set_cell(key("D1"), "=C1*2");

    assert_eq!(sheet.value_of(key("A1")), Value::Error(ErrorTag::Loop));
    assert_eq!(sheet.raw(key("A1")).as_deref(), Some("#ErrLop#:=B1"));
    assert_eq!(sheet.raw(key("B1")).as_deref(), Some("#ErrLop#:=A1"));
    assert_eq!(sheet.value_of(key("D1")), Value::Number(6.0));
}

#[test]
fn test_blank_cells() {
    let mut sheet = Sheet::new();
    sheet.set_cell(key("A1"), "=Z99+1");
    assert_eq!(sheet.value_of(key("A1")), Value::Number(1.0));
    assert_eq!(sheet.display_value(key("Z99")), "");

    sheet.set_cell(key("B1"), "2");
    sheet.set_cell(key("B3"), "4");
    sheet.set_cell(key("C1"), "=PRODUCT(B1:B3)");
    sheet.set_cell(key("C2"), "=COUNT(B1:B3)");
    assert_eq!(sheet.value_of(key("C1")), Value::Number(8.0));
    assert_eq!(sheet.value_of(key("C2")), Value::Number(2.0));
}

#[test]
fn test_variance_edge_cases() {
    let mut sheet = Sheet::new();
    sheet.set_cell(key("A1"), "5");
    sheet.set_cell(key("B1"), "=VAR(A1:A1)");
    sheet.set_cell(key("B2"), "=VARP(A1:A1)");
    assert_eq!(sheet.value_of(key("B1")), Value::Error(ErrorTag::Exc));
    assert_eq!(sheet.value_of(key("B2")), Value::Number(0.0));

    sheet.set_cell(key("A2"), "7");
    sheet.set_cell(key("B1"), "=VAR(A1:A2)");
    sheet.set_cell(key("B2"), "=STDDEVP(A1:A2)");
    assert_eq!(sheet.value_of(key("B1")), Value::Number(2.0));
    assert_eq!(sheet.value_of(key("B2")), Value::Number(1.0));
}

#[test]
fn test_passthrough_allowlist() {
    let mut sheet = Sheet::new();
    sheet.set_cell(key("A1"), "16");
    sheet.set_cell(key("B1"), "=sqrt(A1) + pow(2, 3)");
    sheet.set_cell(key("B2"), "=system(1)");
    assert_eq!(sheet.value_of(key("B1")), Value::Number(12.0));
    assert_eq!(sheet.value_of(key("B2")), Value::Error(ErrorTag::PFn));
    assert_eq!(sheet.display_value(key("B2")), "#ErrPFn#");
}

#[test]
fn test_long_chain_with_small_budget() {
    let config = EngineConfig {
        max_call_depth: 8,
        ..EngineConfig::default()
    };
    let mut sheet = Sheet::with_config(config);
    sheet.set_cell(CellKey::new(1, 1), "1");
    for row in 2..=200 {
        sheet.set_cell(CellKey::new(row, 1), &format!("=A{}+1", row - 1));
    }
    let report = sheet.recompute_all(true);
    assert!(report.is_complete());
    assert_eq!(sheet.cached(CellKey::new(200, 1)), Some(Value::Number(200.0)));
    assert!(!sheet.needs_recalc());
}
