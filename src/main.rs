fn main() {
    if let Err(e) = rotation_pilot_lib::run() {
        // Refusal to start (bad arguments or configuration) — say why and exit non-zero.
        eprintln!("rotation-pilot: {:#}", e);
        std::process::exit(1);
    }
}
