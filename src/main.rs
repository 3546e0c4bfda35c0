//! Anonymous report service binary entry point.

use anyhow::Context as _;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    anonreport::run().await.context("failed to run application")
}
