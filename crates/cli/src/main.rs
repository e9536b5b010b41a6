use std::process::ExitCode;

fn main() -> ExitCode {
    skinmatch_cli::run()
}
