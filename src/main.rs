fn main() {
    if let Err(err) = hubreport::cli::run() {
        hubreport::ui::eprintln_error(&err);
        std::process::exit(hubreport::exit::exit_code(&err));
    }
}
