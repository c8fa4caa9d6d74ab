use anyhow::Result;
use warden::cli::{actions, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let (dsn, action) = start()?;

    // Handle the action
    actions::admin::handle(&dsn, action).await?;

    Ok(())
}
