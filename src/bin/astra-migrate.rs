//! Binary entry point for the orchestrator. All logic lives in the `cli` crate;
//! this file only wires up the global allocator and forwards to `cli::run`.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    std::process::exit(cli::run());
}
