fn main() {
    if let Err(e) = passerelle::cli::main() {
        eprintln!("❌ Error: {e}");
        std::process::exit(1);
    }
}
