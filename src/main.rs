use anyhow::Result;

mod app;
mod logging;

fn main() -> Result<()> {
    let args = atomic_paths::cli::parse();
    app::run(args)
}
