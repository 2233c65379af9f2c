fn main() {
    std::process::exit(roam_cli::run_from_env());
}
