/// Offline CLI for browsing the Whisperly client state
fn main() -> anyhow::Result<()> {
    whisperly_core::cli_app::run(std::env::args().collect())
}
