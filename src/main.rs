use std::process::ExitCode;

fn main() -> ExitCode {
    tally_lib::run()
}
