//! LSP-style `Content-Length` framing (spec §4.A, §6.1).

use acpbridge_core::Error;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const HEADER_PREFIX: &str = "Content-Length:";

/// Reads one frame from `reader`.
///
/// Returns `Ok(None)` on a clean EOF before any header bytes are read.
/// A missing or malformed `Content-Length` header is logged and the reader
/// resynchronizes by discarding lines until the next header-shaped line or
/// EOF, per spec: "log and resynchronize by discarding until the next
/// header-shaped line".
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Value>, Error>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let content_length = match read_content_length(reader).await? {
            Some(n) => n,
            None => return Ok(None),
        };

        let mut body = vec![0u8; content_length];
        if content_length > 0 {
            tokio::io::AsyncReadExt::read_exact(reader, &mut body).await?;
        }

        let value: Value = serde_json::from_slice(&body)?;
        return Ok(Some(value));
    }
}

/// Reads headers up to the blank line and returns the parsed `Content-Length`,
/// or `None` on EOF. Non-header-shaped lines and unparseable lengths are
/// logged and skipped so the stream resynchronizes on the next valid header.
async fn read_content_length<R>(reader: &mut R) -> Result<Option<usize>, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut length: Option<usize> = None;
    let mut saw_any_line = false;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            // EOF. If we were mid-header, that's a framing error; if we
            // hadn't seen anything yet, it's a clean shutdown.
            if saw_any_line {
                return Err(Error::Framing("EOF while reading headers".into()));
            }
            return Ok(None);
        }
        saw_any_line = true;

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            // Blank line: end of headers.
            return match length {
                Some(n) => Ok(Some(n)),
                None => {
                    tracing::warn!("frame had no Content-Length header, resynchronizing");
                    length = None;
                    continue;
                }
            };
        }

        if let Some(rest) = trimmed.strip_prefix(HEADER_PREFIX) {
            match rest.trim().parse::<usize>() {
                Ok(n) => length = Some(n),
                Err(_) => {
                    tracing::warn!(header = trimmed, "malformed Content-Length, resynchronizing");
                    length = None;
                }
            }
        }
        // Other headers are ignored per spec ("Additional headers are ignored").
    }
}

/// Serializes `value` with no insignificant whitespace and writes it as one
/// framed message: `Content-Length: <N>\r\n\r\n<N bytes of JSON>`.
pub async fn write_frame<W>(writer: &mut W, value: &Value) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn round_trips_a_well_formed_frame() {
        let value = serde_json::json!({"jsonrpc":"2.0","id":1,"method":"ping","params":{}});
        let mut buf = Vec::new();
        write_frame(&mut buf, &value).await.unwrap();

        let body = serde_json::to_vec(&value).unwrap();
        let expected = format!("Content-Length: {}\r\n\r\n", body.len());
        assert!(buf.starts_with(expected.as_bytes()));

        let mut reader = BufReader::new(&buf[..]);
        let parsed = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(parsed, value);
    }

    #[tokio::test]
    async fn zero_length_frame_is_a_parse_error_not_a_lockup() {
        let input = b"Content-Length: 0\r\n\r\n".to_vec();
        let mut reader = BufReader::new(&input[..]);
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_returns_none() {
        let input: Vec<u8> = Vec::new();
        let mut reader = BufReader::new(&input[..]);
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resynchronizes_past_a_malformed_header() {
        let good = serde_json::json!({"jsonrpc":"2.0","method":"ping","params":{}});
        let good_body = serde_json::to_vec(&good).unwrap();
        let input = format!(
            "Content-Length: not-a-number\r\n\r\nContent-Length: {}\r\n\r\n",
            good_body.len()
        );
        let mut bytes = input.into_bytes();
        bytes.extend_from_slice(&good_body);

        let mut reader = BufReader::new(&bytes[..]);
        let parsed = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(parsed, good);
    }
}
