fn main() -> anyhow::Result<()> {
    acbpak::cli::run_cli()
}
