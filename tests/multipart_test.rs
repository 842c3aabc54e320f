//! Multipart bodies parsed back with an RFC 2046 reader.

use bytes::Bytes;
use std::io::Write;
use tasknet::http::multipart::{Form, Part, DEFAULT_FIELD_NAME};

struct ParsedPart {
    headers: Vec<(String, String)>,
    data: Vec<u8>,
}

impl ParsedPart {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split<'a>(mut body: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    while let Some(at) = find(body, delimiter) {
        pieces.push(&body[..at]);
        body = &body[at + delimiter.len()..];
    }
    pieces.push(body);
    pieces
}

fn parse(body: &[u8], boundary: &str) -> Vec<ParsedPart> {
    let open = format!("--{boundary}\r\n");
    let close = format!("\r\n--{boundary}--\r\n");
    assert!(body.starts_with(open.as_bytes()), "missing opening boundary");
    assert!(body.ends_with(close.as_bytes()), "missing closing boundary");

    let inner = &body[open.len()..body.len() - close.len()];
    let delimiter = format!("\r\n--{boundary}\r\n");

    split(inner, delimiter.as_bytes())
        .into_iter()
        .map(|raw| {
            let end = find(raw, b"\r\n\r\n").expect("part without header block");
            let headers = std::str::from_utf8(&raw[..end])
                .unwrap()
                .split("\r\n")
                .map(|line| {
                    let (k, v) = line.split_once(": ").unwrap();
                    (k.to_string(), v.to_string())
                })
                .collect();
            ParsedPart {
                headers,
                data: raw[end + 4..].to_vec(),
            }
        })
        .collect()
}

#[test]
fn test_parts_round_trip_in_order() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{\"from\":\"disk\"}").unwrap();

    let form = Form::new()
        .text("title", "hello")
        .part(Part::bytes(Bytes::from_static(&[0u8, 1, 2, 255])).name("blob").content_type("application/octet-stream"))
        .part(Part::file(file.path()).name("doc").file_name("doc.json"));

    let body = form.encode().unwrap();
    let parts = parse(&body, form.boundary());

    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].data, b"hello");
    assert_eq!(
        parts[0].header("Content-Type"),
        Some("text/plain; charset=utf-8")
    );
    assert!(parts[0]
        .header("Content-Disposition")
        .unwrap()
        .starts_with("form-data; name=\"title\""));

    assert_eq!(parts[1].data, vec![0u8, 1, 2, 255]);
    assert_eq!(parts[1].header("Content-Type"), Some("application/octet-stream"));

    assert_eq!(parts[2].data, b"{\"from\":\"disk\"}");
    assert_eq!(
        parts[2].header("Content-Disposition"),
        Some("form-data; name=\"doc\"; filename=\"doc.json\"")
    );
}

#[test]
fn test_single_part_defaults() {
    let form = Form::with_boundary("XyZ").part(Part::bytes("{}"));
    let body = form.encode().unwrap();
    let parts = parse(&body, "XyZ");

    assert_eq!(parts.len(), 1);
    let disposition = parts[0].header("Content-Disposition").unwrap();
    assert!(disposition.contains(&format!("name=\"{DEFAULT_FIELD_NAME}\"")));
    assert_eq!(parts[0].header("Content-Type"), Some("application/json"));
}

#[test]
fn test_many_parts_and_length() {
    let form = (0..25).fold(Form::new(), |form, i| {
        form.text(format!("field{i}"), format!("value number {i}"))
    });

    let body = form.encode().unwrap();
    assert_eq!(form.content_length(), Some(body.len()));

    let parts = parse(&body, form.boundary());
    assert_eq!(parts.len(), 25);
    for (i, part) in parts.iter().enumerate() {
        assert_eq!(part.data, format!("value number {i}").as_bytes());
    }
}

#[test]
fn test_quoted_names_escaped() {
    let form = Form::with_boundary("b").part(Part::bytes("x").name("a\"b").file_name("c\\d"));
    let body = form.encode().unwrap();
    let parts = parse(&body, "b");
    assert_eq!(
        parts[0].header("Content-Disposition"),
        Some("form-data; name=\"a\\\"b\"; filename=\"c\\\\d\"")
    );
}

#[test]
fn test_missing_file_is_encoding_error() {
    let form = Form::new().part(Part::file("/nonexistent/tasknet/part.bin"));
    assert!(form.content_length().is_none());
    assert!(matches!(
        form.encode(),
        Err(tasknet::NetError::Encoding(_))
    ));
}
