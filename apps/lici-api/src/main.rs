use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = lici_api::Args::parse();
	lici_api::run(args).await
}
