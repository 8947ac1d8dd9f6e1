use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use notecalc::{EvalOptions, Evaluator, Sheet, StaticMarketData, VarStore};

struct Args {
    json: bool,
    strict: bool,
    locale: Option<String>,
    file: Option<String>,
}

fn main() -> Result<(), io::Error> {
    let raw: Vec<String> = env::args().skip(1).collect();

    // Check for version and help flags
    if raw.iter().any(|a| a == "-v" || a == "--version") {
        println!("notecalc version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if raw.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            print_help();
            return Ok(());
        }
    };

    let text = match &args.file {
        Some(path) => match load_file(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error loading file '{}': {}", path, e);
                return Ok(());
            }
        },
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut options = EvalOptions::default();
    if let Some(locale) = &args.locale {
        options = options.with_locale(locale);
    }
    if args.strict {
        options = options.strict();
    }

    let evaluator = Evaluator::default();
    let market = StaticMarketData::fallback();
    let mut store = VarStore::new();
    let mut sheet = Sheet::from_text("main", &text);
    sheet.evaluate(&evaluator, &market, &mut store, &options);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        for outcome in sheet.outcomes.iter().flatten() {
            let line = serde_json::to_string(outcome).map_err(io::Error::other)?;
            writeln!(out, "{}", line)?;
        }
    } else {
        for (line, shown) in sheet.lines.iter().zip(sheet.display_lines()) {
            if shown.is_empty() {
                writeln!(out, "{}", line)?;
            } else {
                writeln!(out, "{} => {}", line, shown)?;
            }
        }
    }
    Ok(())
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut args = Args { json: false, strict: false, locale: None, file: None };
    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => args.json = true,
            "--strict" => args.strict = true,
            "--locale" => match iter.next() {
                Some(tag) => args.locale = Some(tag.clone()),
                None => return Err("--locale needs a tag, e.g. --locale pt-BR".to_string()),
            },
            flag if flag.starts_with('-') => return Err(format!("Unknown option: {}", flag)),
            path => args.file = Some(path.to_string()),
        }
    }
    Ok(args)
}

fn load_file(file_path: &str) -> io::Result<String> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(io::Error::new(io::ErrorKind::NotFound, format!("File not found: {}", file_path)));
    }
    fs::read_to_string(path)
}

fn print_help() {
    println!("notecalc v{} - Natural-language line calculator with units, currencies and dates", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("  notecalc [OPTIONS] [FILE]   Evaluate every line of FILE (or stdin)");
    println!();
    println!("OPTIONS:");
    println!("  --json                      Print one JSON outcome per evaluated line");
    println!("  --locale TAG                Number formatting locale (default en-US)");
    println!("  --strict                    Reject adding values of different dimensions");
    println!("  -v, --version               Display version information");
    println!("  -h, --help                  Display this help message");
    println!();
    println!("EXAMPLES:");
    println!("  echo '1500 g in kg' | notecalc");
    println!("  notecalc --locale pt-BR budget.txt");
    println!();
}
