use std::process::ExitCode;

use zod_jsonschema::cli;

fn main() -> ExitCode {
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.init_logging();
    match command_line_interface.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", cli::render_error(&error));
            ExitCode::FAILURE
        }
    }
}
