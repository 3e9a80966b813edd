use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = ccc_api::Args::parse();

	ccc_api::run(args).await
}
