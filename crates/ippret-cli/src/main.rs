use std::{
    env, fs,
    io::{self, BufReader},
    panic,
    process::ExitCode,
};

use ippret::{InterpretError, Runner, StdOutput};

const USAGE: &str = "\
Usage: interpret [--source FILE] [--input FILE]

Loads an XML representation of an IPPcode21 program and interprets it.
At least one of --source and --input must be used; the omitted one is read
from stdin.

Options:
  -s, --source FILE  path to the program source XML
  -i, --input FILE   path to a file with input for the interpreted program
  -h, --help         print this help and exit
";

enum Cli {
    Run { source: Option<String>, input: Option<String> },
    Help,
}

fn main() -> ExitCode {
    // last-resort wrapper: any unexpected failure becomes exit code 99
    match panic::catch_unwind(run) {
        Ok(code) => code,
        Err(_) => {
            eprintln!("internal error: the interpreter failed unexpectedly");
            ExitCode::from(99)
        }
    }
}

fn run() -> ExitCode {
    let (source_path, input_path) = match parse_args(env::args().skip(1)) {
        Ok(Cli::Help) => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Ok(Cli::Run { source, input }) => (source, input),
        Err(error) => {
            eprintln!("{error}");
            eprint!("{USAGE}");
            return ExitCode::from(error.exit_code());
        }
    };

    let source = match read_source(source_path.as_deref()) {
        Ok(source) => source,
        Err(error) => return report(&error),
    };
    let runner = match Runner::new(&source) {
        Ok(runner) => runner,
        Err(error) => return report(&error),
    };

    let mut output = StdOutput::new();
    let result = match input_path {
        Some(path) => match fs::File::open(&path) {
            Ok(file) => runner.run(BufReader::new(file), &mut output),
            Err(error) => {
                return report(&InterpretError::input_open(format!(
                    "error opening one of the input files: {error} ({path})"
                )));
            }
        },
        None => runner.run(io::stdin().lock(), &mut output),
    };

    match result {
        Ok(exit_code) => ExitCode::from(exit_code),
        Err(error) => report(&error),
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cli, InterpretError> {
    let mut source: Option<String> = None;
    let mut input: Option<String> = None;
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_owned(), Some(value.to_owned())),
            None => (arg, None),
        };
        match flag.as_str() {
            "-h" | "--help" => return Ok(Cli::Help),
            "-s" | "--source" => assign(&mut source, flag_value(&flag, inline, &mut args)?)?,
            "-i" | "--input" => assign(&mut input, flag_value(&flag, inline, &mut args)?)?,
            other => return Err(InterpretError::cli_usage(format!("unknown argument '{other}'"))),
        }
    }
    if source.is_none() && input.is_none() {
        return Err(InterpretError::cli_usage("source XML or input file must be supplied"));
    }
    Ok(Cli::Run { source, input })
}

fn flag_value(
    flag: &str,
    inline: Option<String>,
    args: &mut impl Iterator<Item = String>,
) -> Result<String, InterpretError> {
    inline
        .or_else(|| args.next())
        .ok_or_else(|| InterpretError::cli_usage(format!("missing value for '{flag}'")))
}

fn assign(slot: &mut Option<String>, value: String) -> Result<(), InterpretError> {
    if slot.is_some() {
        return Err(InterpretError::cli_usage(
            "only one occurrence of --source or --input is allowed",
        ));
    }
    *slot = Some(value);
    Ok(())
}

fn read_source(path: Option<&str>) -> Result<String, InterpretError> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|error| {
            InterpretError::input_open(format!("error opening one of the input files: {error} ({path})"))
        }),
        None => io::read_to_string(io::stdin())
            .map_err(|error| InterpretError::input_open(format!("error reading program source from stdin: {error}"))),
    }
}

/// Prints the error line and, for runtime errors, the captured context dump.
fn report(error: &InterpretError) -> ExitCode {
    eprintln!("{error}");
    if let Some(dump) = error.context_dump() {
        eprint!("{dump}");
    }
    ExitCode::from(error.exit_code())
}
