use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::shell::{
    command::Command,
    error::ExecutionError,
    execute::SCAN_BUFFER_SIZE,
    integration_tests::helper::{
        MISSING, expect_exit_failure, expect_preparation_failure, line_sink,
    },
};

#[tokio::test]
async fn lines_success() {
    let (lines, sink) = line_sink();
    Command::new("cat")
        .stdin(&b"1\n2\n3\n"[..])
        .echo(false)
        .lines(sink)
        .await
        .unwrap();

    assert_eq!(lines.lock().unwrap().as_slice(), ["1", "2", "3"]);
}

#[tokio::test]
async fn lines_delivers_final_line_without_newline() {
    let (lines, sink) = line_sink();
    Command::new("printf")
        .arg("a\\nb")
        .echo(false)
        .lines(sink)
        .await
        .unwrap();

    assert_eq!(lines.lock().unwrap().as_slice(), ["a", "b"]);
}

#[tokio::test]
async fn lines_strips_carriage_return() {
    let (lines, sink) = line_sink();
    Command::new("cat")
        .stdin(&b"one\r\ntwo\r\n"[..])
        .echo(false)
        .lines(sink)
        .await
        .unwrap();

    assert_eq!(lines.lock().unwrap().as_slice(), ["one", "two"]);
}

#[tokio::test]
async fn lines_delivers_long_lines_whole() {
    for len in [2 * SCAN_BUFFER_SIZE, 64 * 1024] {
        let line = "x".repeat(len);
        let (lines, sink) = line_sink();
        Command::new("cat")
            .stdin(std::io::Cursor::new(line.clone().into_bytes()))
            .echo(false)
            .lines(sink)
            .await
            .unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], line);
    }
}

#[tokio::test]
async fn lines_includes_stderr() {
    let (lines, sink) = line_sink();
    let err = Command::new("cat")
        .arg(MISSING)
        .echo(false)
        .lines(sink)
        .await
        .unwrap_err();

    expect_exit_failure(&err, "cat", &[MISSING], 1);
    let lines = lines.lock().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(MISSING));
}

#[tokio::test]
async fn lines_keeps_order_within_each_stream() {
    let (lines, sink) = line_sink();
    Command::new("sh")
        .args(["-c", "for i in 1 2 3 4 5; do echo out$i; echo err$i 1>&2; done"])
        .echo(false)
        .lines(sink)
        .await
        .unwrap();

    let lines = lines.lock().unwrap();
    let out: Vec<_> = lines.iter().filter(|l| l.starts_with("out")).cloned().collect();
    let err: Vec<_> = lines.iter().filter(|l| l.starts_with("err")).cloned().collect();
    assert_eq!(out, ["out1", "out2", "out3", "out4", "out5"]);
    assert_eq!(err, ["err1", "err2", "err3", "err4", "err5"]);
}

#[tokio::test]
async fn lines_unknown_program() {
    let (lines, sink) = line_sink();
    let err = Command::new(MISSING)
        .echo(false)
        .lines(sink)
        .await
        .unwrap_err();

    expect_preparation_failure(&err, MISSING);
    assert!(lines.lock().unwrap().is_empty());
}

#[tokio::test]
#[should_panic]
async fn must_lines_panics() {
    Command::new("cat")
        .arg(MISSING)
        .echo(false)
        .must_lines(|_| {})
        .await;
}

#[tokio::test]
async fn must_lines_panics_with_error_payload() {
    let cmd = Command::new(MISSING).echo(false);
    let payload = AssertUnwindSafe(cmd.must_lines(|_| {}))
        .catch_unwind()
        .await
        .unwrap_err();

    let err = ExecutionError::from_panic(payload.as_ref()).unwrap();
    expect_preparation_failure(err, MISSING);
}

#[tokio::test]
async fn byte_lines_delivers_raw_bytes() {
    let mut received = Vec::new();
    Command::new("printf")
        .arg("a\\377b\\r\\nplain\\n")
        .echo(false)
        .byte_lines(|line| received.push(line))
        .await
        .unwrap();

    assert_eq!(received, [b"a\xffb".to_vec(), b"plain".to_vec()]);
}

#[tokio::test]
async fn lines_replaces_invalid_utf8() {
    let (lines, sink) = line_sink();
    Command::new("printf")
        .arg("a\\377b\\n")
        .echo(false)
        .lines(sink)
        .await
        .unwrap();

    assert_eq!(lines.lock().unwrap().as_slice(), ["a\u{FFFD}b"]);
}

#[tokio::test]
async fn must_byte_lines_panics_with_error_payload() {
    let cmd = Command::new("cat").arg(MISSING).echo(false);
    let payload = AssertUnwindSafe(cmd.must_byte_lines(|_| {}))
        .catch_unwind()
        .await
        .unwrap_err();

    let err = ExecutionError::from_panic(payload.as_ref()).unwrap();
    expect_exit_failure(err, "cat", &[MISSING], 1);
}
