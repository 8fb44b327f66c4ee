fn main() {
    if let Err(e) = vmsh::main_inner() {
        eprintln!("vmsh: {e:#}");
        std::process::exit(1);
    }
}
