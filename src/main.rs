fn main() {
    if let Err(err) = claims_prep::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
