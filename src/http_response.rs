use std::borrow::Cow;

pub fn parse_http_status_code(raw: &[u8]) -> Option<u16> {
    let (header_text, _) = parse_http_response_parts(raw)?;
    header_text
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
}

/// Whether `raw` holds a complete response, judged by Content-Length or the
/// chunked terminator. With neither header the response is only done at EOF.
pub fn is_complete_http_response(raw: &[u8]) -> bool {
    let Some(header_end) = raw.windows(4).position(|window| window == b"\r\n\r\n") else {
        return false;
    };
    let headers = &raw[..header_end + 4];
    let body = &raw[header_end + 4..];
    let header_text = String::from_utf8_lossy(headers).to_ascii_lowercase();

    if header_text.contains("transfer-encoding: chunked") {
        return body.windows(5).any(|window| window == b"0\r\n\r\n");
    }

    if let Some(content_length) = header_text
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
    {
        return body.len() >= content_length;
    }

    false
}

fn parse_http_response_parts(raw: &[u8]) -> Option<(Cow<'_, str>, &[u8])> {
    let header_end = raw.windows(4).position(|window| window == b"\r\n\r\n")?;
    let (header_bytes, body_bytes) = raw.split_at(header_end + 4);
    Some((String::from_utf8_lossy(header_bytes), body_bytes))
}
