use strata_cli::output::print_error;

fn main() {
    if let Err(err) = strata_cli::run() {
        for line in err.messages() {
            print_error(&line);
        }
        std::process::exit(1);
    }
}
