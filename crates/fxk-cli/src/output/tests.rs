// Tests for output rendering

use super::*;
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Write sink the test can read back after the writer is done with it
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn writer(format: OutputFormat, quiet: bool) -> (OutputWriter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let writer = OutputWriter::with_writer(format, false, quiet, Box::new(buffer.clone()));
    (writer, buffer)
}

#[test]
fn test_machine_formats_skip_messages() {
    let (mut out, buffer) = writer(OutputFormat::Json, false);
    out.info("info").unwrap();
    out.success("done").unwrap();
    out.warning("careful").unwrap();
    out.table(&["A"], vec![vec!["1".into()]]).unwrap();
    assert_eq!(buffer.contents(), "");

    out.data(&json!({"a": 1})).unwrap();
    assert_eq!(buffer.contents(), "{\"a\":1}\n");
}

#[test]
fn test_quiet_human_still_writes_data() {
    let (mut out, buffer) = writer(OutputFormat::Human, true);
    out.success("done").unwrap();
    out.data(&json!("value")).unwrap();
    assert_eq!(buffer.contents(), "\"value\"\n");
}

#[test]
fn test_yaml_output() {
    let (mut out, buffer) = writer(OutputFormat::Yaml, false);
    out.data(&json!({"name": "default"})).unwrap();
    assert_eq!(buffer.contents(), "name: default\n");
}

#[test]
fn test_normalized_result_is_redacted() {
    let (mut out, buffer) = writer(OutputFormat::Json, false);
    let result = Normalized::success(json!({"accessToken": "tok", "corpId": "corp"}));
    out.normalized(&result).unwrap();

    let printed: Value = serde_json::from_str(buffer.contents().trim()).unwrap();
    assert_eq!(printed["result"], "success");
    assert_eq!(printed["data"]["accessToken"], "***");
    assert_eq!(printed["data"]["corpId"], "corp");
}

#[test]
fn test_normalized_is_silent_for_humans() {
    let (mut out, buffer) = writer(OutputFormat::Human, false);
    out.normalized(&Normalized::success(1)).unwrap();
    assert_eq!(buffer.contents(), "");
}

#[test]
fn test_table_alignment() {
    let (mut out, buffer) = writer(OutputFormat::Human, false);
    out.table(
        &["ID", "Name"],
        vec![
            vec!["AccountObj".into(), "Account".into()],
            vec!["x".into(), "Acct One".into()],
        ],
    )
    .unwrap();

    let lines: Vec<String> = buffer.contents().lines().map(str::to_string).collect();
    assert_eq!(lines[0], "ID         │ Name");
    assert_eq!(lines[1], "───────────┼─────────");
    assert_eq!(lines[2], "AccountObj │ Account");
    assert_eq!(lines[3], "x          │ Acct One");
}

#[test]
fn test_format_value_compact() {
    assert_eq!(format_value_compact(&json!("a")), "a");
    assert_eq!(format_value_compact(&Value::Null), "-");
    assert_eq!(format_value_compact(&json!([1, 2])), "[1, 2]");
    assert_eq!(format_value_compact(&json!([1, 2, 3, 4])), "[4 items]");
    assert_eq!(format_value_compact(&json!({"a": 1})), "{1 fields}");
}
