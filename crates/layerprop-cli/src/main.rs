use std::process::ExitCode;

fn main() -> ExitCode {
    layerprop_cli::run()
}
