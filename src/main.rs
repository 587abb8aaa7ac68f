use clap::Parser as ClapParser;
use rill_lang::output::{to_json, to_json_pretty};
use rill_lang::{Engine, Value};
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(name = "rill")]
#[command(about = "Rill - an embeddable expression language with streamed evaluation")]
#[command(version)]
struct Cli {
    /// Path to a file containing a single expression
    file: PathBuf,

    /// Pretty-print the result
    #[arg(short, long)]
    pretty: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let source = std::fs::read_to_string(&cli.file)
        .map_err(|e| format!("Cannot read {}: {}", cli.file.display(), e))?;

    // A JSON context may be piped on stdin
    let context = if !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| e.to_string())?;
        if buffer.trim().is_empty() {
            Value::Object(HashMap::new())
        } else {
            let json: serde_json::Value = serde_json::from_str(&buffer)
                .map_err(|e| format!("Invalid JSON context: {}", e))?;
            Value::from(json)
        }
    } else {
        Value::Object(HashMap::new())
    };

    let engine = Engine::new();
    let result = engine
        .eval_in(source.trim_end(), &context)
        .map_err(|e| e.to_string())?;

    match result {
        Value::Undefined => println!("undefined"),
        other => {
            let json = if cli.pretty {
                to_json_pretty(&other)
            } else {
                to_json(&other)
            };
            println!("{}", json);
        }
    }
    Ok(())
}
