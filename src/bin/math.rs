//! 数学 MCP 服务器（stdio）：add / multiply
//!
//! stdout 承载 MCP 协议，日志写 stderr。

use anyhow::Context;
use nomu::observability;
use nomu::servers::MathServer;
use rmcp::{transport::stdio, ServiceExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_stderr();
    tracing::info!("math MCP server starting");

    let service = MathServer::new()
        .serve(stdio())
        .await
        .context("Failed to start MCP server")?;
    service.waiting().await?;
    Ok(())
}
