use super::ServerError;
use crate::protocol::ParseError;
use bytes::BytesMut;
use futures::SinkExt;
use std::{io, time::Duration};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_util::codec::{Decoder, FramedWrite, LinesCodec, LinesCodecError};

/// Newline-delimited reader with a hard per-line limit.
///
/// Drives [`LinesCodec`] over its own buffer rather than through `FramedRead`
/// so that an oversized line is reported once and the following lines are
/// still decoded from whatever is already buffered.
pub struct LineReader<R> {
    reader: R,
    codec: LinesCodec,
    buffer: BytesMut,
    max_line_len: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R, max_line_len: usize) -> Self {
        Self {
            reader,
            codec: LinesCodec::new_with_max_length(max_line_len),
            buffer: BytesMut::with_capacity(1024),
            max_line_len,
            eof: false,
        }
    }

    /// Reads the next line. An oversized or non-UTF-8 line yields
    /// `ServerError::Protocol` and the reader stays usable; end of stream
    /// yields `ServerError::ConnectionClosed`.
    pub async fn read_line(&mut self) -> Result<String, ServerError> {
        loop {
            let decoded = if self.eof {
                self.codec.decode_eof(&mut self.buffer)
            } else {
                self.codec.decode(&mut self.buffer)
            };

            match decoded {
                Ok(Some(line)) => return Ok(line),
                Ok(None) if self.eof => return Err(ServerError::ConnectionClosed),
                Ok(None) => {}
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    return Err(ParseError::LineTooLong {
                        max: self.max_line_len,
                    }
                    .into())
                }
                // The codec has already consumed the offending line.
                Err(LinesCodecError::Io(err)) if err.kind() == io::ErrorKind::InvalidData => {
                    return Err(ParseError::InvalidUtf8.into())
                }
                Err(LinesCodecError::Io(err)) => return Err(ServerError::Io(err)),
            }

            self.buffer.reserve(1024);
            if self.reader.read_buf(&mut self.buffer).await? == 0 {
                self.eof = true;
            }
        }
    }

    /// Like [`LineReader::read_line`], bounded by `limit` when one is given.
    /// Expiry is reported as `Ok(None)` so callers can attach the peer.
    pub async fn read_line_within(
        &mut self,
        limit: Option<Duration>,
    ) -> Result<Option<String>, ServerError> {
        match limit {
            Some(limit) => match tokio::time::timeout(limit, self.read_line()).await {
                Ok(result) => result.map(Some),
                Err(_) => Ok(None),
            },
            None => self.read_line().await.map(Some),
        }
    }
}

/// Newline-terminating writer.
pub struct LineWriter<W> {
    inner: FramedWrite<W, LinesCodec>,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    pub async fn write_line(&mut self, line: &str) -> Result<(), ServerError> {
        self.inner.send(line).await.map_err(|err| match err {
            LinesCodecError::Io(err) => ServerError::Io(err),
            other => ServerError::Codec(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_reads_lines_and_strips_crlf() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut reader = LineReader::new(server, 64);

        client.write_all(b"first\r\nsecond\n").await.unwrap();
        assert_eq!(reader.read_line().await.unwrap(), "first");
        assert_eq!(reader.read_line().await.unwrap(), "second");

        drop(client);
        assert!(matches!(
            reader.read_line().await,
            Err(ServerError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected_then_reader_recovers() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut reader = LineReader::new(server, 8);

        client
            .write_all(b"this line is far too long\nok\n")
            .await
            .unwrap();
        assert!(matches!(
            reader.read_line().await,
            Err(ServerError::Protocol(ParseError::LineTooLong { max: 8 }))
        ));
        assert_eq!(reader.read_line().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_rejected_then_reader_recovers() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut reader = LineReader::new(server, 64);

        client.write_all(b"Lahore,IT,caf\xe9\nnext\n").await.unwrap();
        assert!(matches!(
            reader.read_line().await,
            Err(ServerError::Protocol(ParseError::InvalidUtf8))
        ));
        assert_eq!(reader.read_line().await.unwrap(), "next");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_within_deadline() {
        let (_client, server) = tokio::io::duplex(64);
        let mut reader = LineReader::new(server, 64);
        let result = reader
            .read_line_within(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_writer_appends_newline() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut writer = LineWriter::new(client);
        writer.write_line("AUTH_OK").await.unwrap();
        drop(writer);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut server, &mut buf)
            .await
            .unwrap();
        assert_eq!(buf, b"AUTH_OK\n");
    }
}
