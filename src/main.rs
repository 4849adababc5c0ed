fn main() {
    if let Err(e) = thinkchat::cli::main() {
        eprintln!("❌ Error: {e}");
        std::process::exit(1);
    }
}
