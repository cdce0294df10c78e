// cbt CLI entry point

use cbt_cli::CommandRouter;

#[tokio::main]
async fn main() {
    if let Err(e) = CommandRouter::route().await {
        eprintln!("{}", e.user_message());
        tracing::debug!("{}", e.technical_details());
        std::process::exit(1);
    }
}
