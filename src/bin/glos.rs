/// Glos CLI
///
/// Loads a compiled unit (JSON or binary) and runs its entry function on the VM.

use glos_vm::cli;

fn main() {
    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
