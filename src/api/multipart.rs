//! Minimal `multipart/form-data` reader for the upload endpoint.

use anyhow::{anyhow, Result};

use super::http::find;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// Boundary parameter of a `multipart/form-data` content type.
pub(crate) fn boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';').map(str::trim);
    let media = params.next()?;
    if !media.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn parse(body: &[u8], boundary: &str) -> Result<Vec<FormPart>> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut separator = b"\r\n".to_vec();
    separator.extend_from_slice(&delimiter);

    let mut pos = find(body, &delimiter, 0)
        .ok_or_else(|| anyhow!("multipart boundary not found in body"))?
        + delimiter.len();
    let mut parts = Vec::new();
    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            break;
        }
        if !rest.starts_with(b"\r\n") {
            return Err(anyhow!("malformed multipart delimiter"));
        }
        let header_start = pos + 2;
        let header_end = find(body, b"\r\n\r\n", header_start)
            .ok_or_else(|| anyhow!("multipart part without header terminator"))?;
        let headers = String::from_utf8_lossy(&body[header_start..header_end]);
        let data_start = header_end + 4;
        let data_end = find(body, &separator, data_start)
            .ok_or_else(|| anyhow!("multipart body not terminated"))?;

        if let Some((name, filename)) = disposition(&headers) {
            parts.push(FormPart {
                name,
                filename,
                data: body[data_start..data_end].to_vec(),
            });
        }
        pos = data_end + separator.len();
    }
    Ok(parts)
}

/// `name` and optional `filename` from a part's Content-Disposition header.
fn disposition(headers: &str) -> Option<(String, Option<String>)> {
    let line = headers.split("\r\n").find(|line| {
        line.split_once(':')
            .is_some_and(|(key, _)| key.trim().eq_ignore_ascii_case("content-disposition"))
    })?;
    let (_, value) = line.split_once(':')?;
    let mut name = None;
    let mut filename = None;
    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim().trim_matches('"').to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(raw),
            "filename" => filename = Some(raw),
            _ => {}
        }
    }
    Some((name?, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(boundary: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            b"Content-Disposition: form-data; name=\"video\"; filename=\"lot.mp4\"\r\n",
        );
        out.extend_from_slice(b"Content-Type: video/mp4\r\n\r\n");
        out.extend_from_slice(b"\x00\x01\r\n\x02binary");
        out.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
        out.extend_from_slice(b"Content-Disposition: form-data; name=\"note\"\r\n\r\n");
        out.extend_from_slice(b"hello");
        out.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        out
    }

    #[test]
    fn reads_boundary_from_content_type() {
        assert_eq!(
            boundary("multipart/form-data; boundary=\"abc123\"").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            boundary("Multipart/Form-Data;boundary=xyz").as_deref(),
            Some("xyz")
        );
        assert_eq!(boundary("application/json"), None);
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[test]
    fn parses_binary_and_text_parts() {
        let parts = parse(&body("XyZ"), "XyZ").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "video");
        assert_eq!(parts[0].filename.as_deref(), Some("lot.mp4"));
        assert_eq!(parts[0].data, b"\x00\x01\r\n\x02binary");
        assert_eq!(parts[1].name, "note");
        assert_eq!(parts[1].filename, None);
        assert_eq!(parts[1].data, b"hello");
    }

    #[test]
    fn rejects_unterminated_body() {
        let mut data = body("XyZ");
        data.truncate(data.len() - 12);
        assert!(parse(&data, "XyZ").is_err());
    }
}
