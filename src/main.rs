fn main() {
    if let Err(err) = plotweave::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
