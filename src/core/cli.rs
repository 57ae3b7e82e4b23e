use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::network::dht::{ClientApi, DhtNode};
use crate::utils::Result;

const USAGE: &str = "Unknown command. Use put <content>, get <hash>, print, store or exit.\n";

/// Line-oriented interactive shell over any async reader and writer
pub struct Shell {
    node: Arc<DhtNode>,
    client: Arc<dyn ClientApi>,
}

impl Shell {
    pub fn new(node: Arc<DhtNode>, client: Arc<dyn ClientApi>) -> Self {
        Self { node, client }
    }

    /// Serve commands until `exit` or end of input
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        writer
            .write_all(b"Node shell started. Commands: put <content>, get <hash>, print, store, exit\n")
            .await?;
        let mut lines = reader.lines();

        loop {
            writer.write_all(b"> ").await?;
            writer.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            match self.execute(line.trim()).await {
                Some(output) => writer.write_all(output.as_bytes()).await?,
                None => {
                    writer.write_all(b"Shutting down node.\n").await?;
                    break;
                }
            }
        }

        writer.flush().await?;
        Ok(())
    }

    /// Run one command line. `None` ends the session.
    pub async fn execute(&self, line: &str) -> Option<String> {
        let (command, argument) = match line.split_once(' ') {
            Some((command, argument)) => (command, argument.trim()),
            None => (line, ""),
        };

        let output = match command {
            "" => String::new(),
            "put" if argument.is_empty() => "Usage: put <content>\n".to_string(),
            "put" => self.put(argument).await,
            "get" if argument.is_empty() => "Usage: get <hash>\n".to_string(),
            "get" => self.get(argument).await,
            "print" => self.node.routing_table_dump().await,
            "store" => self.node.store_dump().await,
            "exit" => return None,
            _ => USAGE.to_string(),
        };
        Some(output)
    }

    async fn put(&self, content: &str) -> String {
        match self.client.send_store_message(content.as_bytes()).await {
            Ok(receipt) => format!(
                "Content stored!\nHash: {}\nPacket ID: {}\nReplicas: {}\n",
                receipt.key,
                receipt.packet_id,
                receipt.replicas.len()
            ),
            Err(e) => format!("Error storing content: {}\n", e),
        }
    }

    async fn get(&self, hash: &str) -> String {
        let reply = match self.client.send_find_value_message(hash).await {
            Ok(reply) => reply,
            Err(e) => return format!("Error retrieving content: {}\n", e),
        };

        match (&reply.payload.source_contact, &reply.payload.data) {
            (Some(source), Some(data)) => format!(
                "Content retrieved!\nHash: {}\nContent: {}\nSource: {}\n",
                reply.payload.key,
                String::from_utf8_lossy(data),
                source.id
            ),
            (None, _) => "Error retrieving content: no source contact found\n".to_string(),
            (_, None) => "Error retrieving content: empty reply\n".to_string(),
        }
    }
}
