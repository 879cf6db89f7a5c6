fn main() {
    if let Err(err) = orthoflow::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
