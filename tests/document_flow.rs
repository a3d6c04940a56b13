//! Document-level edits, structural changes and persistence.

use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tallysheet::engine::{ErrorTag, Value};
use tallysheet::{CellKey, Document, Placement, SheetConfig};

fn key(name: &str) -> CellKey {
    CellKey::from_str(name).unwrap()
}

fn raw(doc: &Document, name: &str) -> Option<String> {
    doc.sheet.raw(key(name))
}

#[test]
fn test_insert_row_rebases_reference() {
    let mut doc = Document::new();
    doc.set_cell_from_input(key("A1"), "3").unwrap();
    doc.set_cell_from_input(key("B1"), "=A1+1").unwrap();
    doc.insert_rows(1, Placement::Before, 1).unwrap();
    assert_eq!(raw(&doc, "B2").as_deref(), Some("=A2+1"));
    assert_eq!(doc.sheet.value_of(key("B2")), Value::Number(4.0));
}

#[test]
fn test_delete_row_keeps_numeral_in_tag() {
    let mut doc = Document::new();
    doc.set_cell_from_input(key("A1"), "1").unwrap();
    doc.set_cell_from_input(key("B1"), "2").unwrap();
    doc.set_cell_from_input(key("C2"), "=A1+B1").unwrap();
    doc.delete_rows(1, 1).unwrap();
    assert_eq!(raw(&doc, "C1").as_deref(), Some("=#ErrRow#A1+#ErrRow#B1"));
    assert_eq!(doc.sheet.value_of(key("C1")), Value::Error(ErrorTag::Row));
    assert_eq!(doc.display_value(key("C1")), "#ErrRow#");
}

#[test]
fn test_fixed_addresses_on_paste_and_insert() {
    let mut doc = Document::new();
    doc.set_cell_from_input(key("A1"), "10").unwrap();
    doc.set_cell_from_input(key("D1"), "=$A$1+1").unwrap();

    doc.copy_cell(key("D1"));
    doc.paste_cell(key("E2"), true).unwrap();
    assert_eq!(raw(&doc, "E2").as_deref(), Some("=$A$1+1"));

    doc.insert_cols(1, Placement::Before, 1).unwrap();
    assert_eq!(raw(&doc, "E1").as_deref(), Some("=$B$1+1"));
    assert_eq!(doc.sheet.value_of(key("E1")), Value::Number(11.0));
}

#[test]
fn test_precision_from_config() {
    let config = SheetConfig::from_toml_str("[display]\nprecision = 2\n").unwrap();
    let mut doc = Document::with_config(config);
    doc.set_cell_from_input(key("A1"), "=1/3").unwrap();
    assert_eq!(doc.display_value(key("A1")), "0.33");
}

#[test]
fn test_save_load_round_trip() {
    let path = std::env::temp_dir().join(format!(
        "tallysheet_flow_{}_{}_{:?}.tsh",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
        std::thread::current().id(),
    ));
    struct Cleanup(PathBuf);
    impl Drop for Cleanup {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }
    let _cleanup = Cleanup(path.clone());

    let mut doc = Document::new();
    doc.fill_numbers(key("A1"), key("A4"), 1.0, 1.0).unwrap();
    doc.set_cell_from_input(key("B1"), "=SUM(A1:A4)").unwrap();
    doc.set_cell_from_input(key("C1"), "note; with separator").unwrap();
    doc.save_file_as(&path).unwrap();

    let mut reloaded = Document::new();
    reloaded.load_file(&path).unwrap();
    assert_eq!(reloaded.to_text(), doc.to_text());
    assert_eq!(reloaded.sheet.value_of(key("B1")), Value::Number(10.0));
    assert_eq!(raw(&reloaded, "C1").as_deref(), Some("note; with separator"));
}
