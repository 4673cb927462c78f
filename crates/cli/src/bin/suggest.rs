use anyhow::Result;

fn main() -> Result<()> {
    suggest_cli::main_entry()
}
