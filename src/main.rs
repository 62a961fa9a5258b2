fn main() -> anyhow::Result<()> {
    neta_tui::cli::run()
}
