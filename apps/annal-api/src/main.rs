use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = annal_api::Args::parse();

	annal_api::run(args).await
}
