use super::NntpError;

/// One status line from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub message: String,
}

/// Parse `"NNN message"`. The line must be at least four characters, have a
/// space at offset 3, and start with a three-digit code.
pub fn parse_status_line(line: &str) -> Result<Reply, NntpError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let bytes = line.as_bytes();
    if bytes.len() < 4 || bytes[3] != b' ' || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(NntpError::Protocol(format!("invalid response line: {line:?}")));
    }
    let code = line[..3]
        .parse::<u16>()
        .map_err(|e| NntpError::Protocol(format!("invalid status code in {line:?}: {e}")))?;
    Ok(Reply {
        code,
        message: line[4..].to_string(),
    })
}

/// Match `code` against an expectation of one, two or three digits.
///
/// `0` accepts anything; `3` accepts any 3xx; `24` accepts 240..=249; `240`
/// accepts only 240.
pub fn code_matches(expect: u16, code: u16) -> bool {
    match expect {
        0 => true,
        1..=9 => code / 100 == expect,
        10..=99 => code / 10 == expect,
        _ => code == expect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_code_and_message() {
        let reply = parse_status_line("240 article posted ok\r\n").unwrap();
        assert_eq!(reply.code, 240);
        assert_eq!(reply.message, "article posted ok");

        let bare = parse_status_line("200 ").unwrap();
        assert_eq!(bare.code, 200);
        assert_eq!(bare.message, "");
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in ["", "200", "20 x", "2000 x", "abc def", "200-multi"] {
            assert!(
                matches!(parse_status_line(line), Err(NntpError::Protocol(_))),
                "{line:?} should be rejected"
            );
        }
    }

    #[test]
    fn matches_by_width() {
        assert!(code_matches(0, 503));
        assert!(code_matches(3, 340));
        assert!(code_matches(3, 381));
        assert!(!code_matches(3, 240));
        assert!(code_matches(24, 240));
        assert!(code_matches(24, 249));
        assert!(!code_matches(24, 250));
        assert!(code_matches(240, 240));
        assert!(!code_matches(240, 241));
        assert!(code_matches(2, 281));
        assert!(!code_matches(2, 481));
    }
}
