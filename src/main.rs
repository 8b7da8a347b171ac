use std::fs;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use codeline::lex::{self, StringTerminationError};
use codeline::{EncodingConfig, Interpreter, Registry};
use miette::IntoDiagnostic;
use miette::WrapErr;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Keyword code range, as START:END.
    #[arg(long, global = true, value_parser = parse_range, default_value = "100:199")]
    keyword_range: (i32, i32),

    /// Operator code range, as START:END.
    #[arg(long, global = true, value_parser = parse_range, default_value = "200:299")]
    operator_range: (i32, i32),

    /// Symbol code range, as START:END.
    #[arg(long, global = true, value_parser = parse_range, default_value = "300:699")]
    symbol_range: (i32, i32),

    /// Literal code range, as START:END.
    #[arg(long, global = true, value_parser = parse_range, default_value = "700:999")]
    literal_range: (i32, i32),
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the lexemes of every line with their codes.
    Encode { filename: PathBuf },
    /// Execute every line as a statement and dump the symbols.
    Run { filename: PathBuf },
}

fn parse_range(s: &str) -> Result<(i32, i32), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got `{s}`"))?;
    let bound = |n: &str| n.trim().parse::<i32>().map_err(|e| format!("`{n}`: {e}"));
    Ok((bound(start)?, bound(end)?))
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = EncodingConfig::new(
        args.keyword_range,
        args.operator_range,
        args.symbol_range,
        args.literal_range,
    )?;
    let registry = Registry::with_lexicon(config).wrap_err("setting up the lexicon failed")?;

    let (Commands::Encode { filename } | Commands::Run { filename }) = &args.command;
    let file_contents = fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))?;

    match args.command {
        Commands::Encode { filename } => {
            let mut registry = registry;
            for (number, tokens) in lex::lines(filename.to_str(), &file_contents) {
                let tokens = tokens.map_err(unterminated)?;
                println!("{number} >  {}", echo(&tokens));
                let encoded = tokens
                    .iter()
                    .map(|lexeme| {
                        let token = registry.encode(lexeme)?;
                        Ok(format!("{}({})", token.lexeme, token.code))
                    })
                    .collect::<Result<Vec<_>, codeline::RegistryError>>()?;
                println!("      enc: {}", encoded.join(" "));
            }
        }
        Commands::Run { filename } => {
            let mut interpreter = Interpreter::new(registry, |line| println!("{line}"));
            let mut failed = 0;
            for (number, tokens) in lex::lines(filename.to_str(), &file_contents) {
                let tokens = tokens.map_err(unterminated)?;
                println!("{number} >  {}", echo(&tokens));
                if !interpreter.execute(&tokens) {
                    failed += 1;
                }
            }
            println!("{}", interpreter.dump_symbols());

            if failed > 0 {
                tracing::warn!(failed, "some statements were rejected");
                std::process::exit(65);
            }
        }
    }
    Ok(())
}

fn unterminated(e: miette::Error) -> miette::Error {
    if let Some(unterminated) = e.downcast_ref::<StringTerminationError>() {
        eprintln!("[line {}] Error: Unterminated string", unterminated.line());
    }
    e
}

fn echo(tokens: &[&str]) -> String {
    format!("{}, EOL", tokens.join(", "))
}
