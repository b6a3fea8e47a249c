mod server;
mod utils;

use anyhow::Result;
use rmcp::{transport::stdio, ServiceExt};
use tracing::info;
use utils::{init_logging, SapGuiWrapper};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    info!("Starting SAP GUI MCP server");

    let wrapper = SapGuiWrapper::new();
    let service = wrapper.clone().serve(stdio()).await?;
    service.waiting().await?;

    // Mirror an operator closing SAP at the end of the day: leave no
    // logged-in session behind when the client disconnects.
    wrapper.shutdown().await;
    info!("SAP GUI MCP server stopped");
    Ok(())
}
