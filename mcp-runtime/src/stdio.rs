use serde_json::Value;
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use crate::server::{McpServer, parse_error_response};

/// Largest `Content-Length` payload accepted from a client.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// How a message arrived; replies go back the same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Framing {
    /// One JSON document per line (the MCP stdio convention)
    Lines,
    /// `Content-Length` headers followed by the payload
    ContentLength,
}

/// Serve one protocol-server instance over the process stdin/stdout.
pub async fn serve_stdio(server: &McpServer) -> io::Result<()> {
    let reader = BufReader::new(io::stdin());
    let writer = io::stdout();
    serve(server, reader, writer).await
}

/// Read messages until EOF, answering each in arrival order.
pub async fn serve<R, W>(server: &McpServer, mut reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!(
        event = "mcp_stdio_started",
        instance_id = %server.instance_id(),
        "MCP stdio server ready"
    );

    while let Some((framing, payload)) = read_message(&mut reader).await? {
        let responses = match serde_json::from_slice::<Value>(&payload) {
            Ok(incoming) => server.handle_incoming_message(incoming).await,
            Err(err) => {
                tracing::warn!(
                    event = "mcp_stdio_parse_error",
                    error = %err,
                    "Discarding unparseable MCP message"
                );
                vec![parse_error_response()]
            }
        };
        for response in responses {
            write_message(&mut writer, framing, &response).await?;
        }
    }

    tracing::info!(event = "mcp_stdio_closed", "MCP stdio input closed");
    Ok(())
}

async fn read_message<R>(reader: &mut R) -> io::Result<Option<(Framing, Vec<u8>)>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.to_ascii_lowercase().starts_with("content-length:") {
            return Ok(Some((Framing::Lines, trimmed.as_bytes().to_vec())));
        }
        break;
    }

    let mut content_length = parse_content_length(&line)?;
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if header.to_ascii_lowercase().starts_with("content-length:") {
            content_length = parse_content_length(header)?;
        }
    }

    if content_length > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Content-Length {content_length} exceeds the {MAX_MESSAGE_BYTES} byte limit"),
        ));
    }

    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;
    Ok(Some((Framing::ContentLength, payload)))
}

fn parse_content_length(header: &str) -> io::Result<usize> {
    header
        .split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_default()
        .parse::<usize>()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid Content-Length header"))
}

async fn write_message<W>(writer: &mut W, framing: Framing, value: &Value) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::Lines => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
    }
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::{ClientConfig, KnowledgeGraphClient};
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn server() -> McpServer {
        let client = KnowledgeGraphClient::new(
            ClientConfig::new("test-key").with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        McpServer::new(Arc::new(ToolRegistry::new(client)))
    }

    async fn run(input: &[u8]) -> String {
        let mut output = Vec::new();
        serve(&server(), input, &mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn line_delimited_session_answers_in_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test-client","version":"1.0.0"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#,
            "\n"
        );

        let output = run(input.as_bytes()).await;
        let lines: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(lines[1]["id"], 2);
        assert_eq!(lines[1]["result"]["tools"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn content_length_framing_is_mirrored() {
        let body = r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#;
        let input = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);

        let output = run(input.as_bytes()).await;
        let (header, payload) = output.split_once("\r\n\r\n").unwrap();
        assert!(header.starts_with("Content-Length: "));
        let response: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(response, json!({ "jsonrpc": "2.0", "id": 7, "result": {} }));
    }

    #[tokio::test]
    async fn garbage_line_yields_parse_error_and_keeps_serving() {
        let input = "this is not json\n{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}\n";
        let output = run(input.as_bytes()).await;
        let lines: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["error"]["code"], -32700);
        assert_eq!(lines[1]["id"], 3);
    }

    #[tokio::test]
    async fn oversized_content_length_is_rejected_before_reading() {
        let input = format!("Content-Length: {}\r\n\r\n{{}}", usize::MAX);
        let mut output = Vec::new();
        let err = serve(&server(), input.as_bytes(), &mut output)
            .await
            .expect_err("huge Content-Length should fail");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(output.is_empty());

        let just_over = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_BYTES + 1);
        let err = serve(&server(), just_over.as_bytes(), &mut Vec::new())
            .await
            .expect_err("limit is exclusive of larger values");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn truncated_headers_are_an_error() {
        let mut output = Vec::new();
        let err = serve(&server(), &b"Content-Length: 10\r\n"[..], &mut output)
            .await
            .expect_err("EOF inside headers should fail");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
