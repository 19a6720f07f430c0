fn main() {
    if let Err(e) = uberize_cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
