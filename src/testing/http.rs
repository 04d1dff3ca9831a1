//! Multipart request bodies for HTTP tests.

/// Boundary used by `multipart_upload`
pub const BOUNDARY: &str = "beat-analysis-test-boundary";

/// `Content-Type` header value matching `multipart_upload`
pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Encode a single file part as a `multipart/form-data` body
pub fn multipart_upload(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_wraps_payload_in_boundaries() {
        let body = multipart_upload("file", "a.wav", "audio/wav", b"xyz");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--beat-analysis-test-boundary\r\n"));
        assert!(text.contains("name=\"file\"; filename=\"a.wav\""));
        assert!(text.contains("Content-Type: audio/wav\r\n\r\nxyz\r\n"));
        assert!(text.ends_with("--beat-analysis-test-boundary--\r\n"));
    }
}
