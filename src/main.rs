use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "signet", about = "Signet - encrypted messaging core")]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
	/// Run the application (default)
	Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	match cli.command.unwrap_or(Commands::Run) {
		Commands::Run => signet_core::run().await,
	}
}
