//! Entry point for the `greenway` command.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = greenway_cli::run() {
        eprintln!("greenway: {err}");
        std::process::exit(1);
    }
}
