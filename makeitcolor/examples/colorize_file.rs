//! Colorize a single image file without the HTTP server.
//!
//! ```text
//! cargo run --example colorize_file -- old.jpg colorized.png python3 infer.py {input} {output}
//! ```

use std::{env, fs, process};

use colorizers::{CommandColorizer, ConversionWorkflow, InputContract};

fn main() {
    makeitcolor::init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 3 {
        eprintln!("usage: colorize_file <input> <output.png> <program> [args...]");
        process::exit(2);
    }
    let (input, output, command) = (&args[0], &args[1], args[2..].to_vec());

    let work_dir = env::temp_dir().join("makeitcolor");
    let colorizer = match CommandColorizer::new(command, InputContract::Path, &work_dir) {
        Ok(colorizer) => colorizer,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };
    let workflow = ConversionWorkflow::new(colorizer, work_dir);

    let result = fs::read(input)
        .map_err(|e| e.to_string())
        .and_then(|bytes| workflow.run(&bytes).map_err(|e| e.to_string()))
        .and_then(|conversion| {
            fs::write(output, &conversion.artifact.bytes).map_err(|e| e.to_string())
        });

    if let Err(e) = result {
        eprintln!("colorization failed: {}", e);
        process::exit(1);
    }
}
