fn main() {
    if let Err(err) = rollcall_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
