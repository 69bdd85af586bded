fn main() {
    if let Err(e) = dubbing_desk_lib::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
