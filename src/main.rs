use clap::{Parser as ClapParser, Subcommand};
use jsonte::cli::{self, CliError, CompileOptions};
use std::{
    io::{self, BufReader},
    path::PathBuf,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ClapParser)]
#[command(name = "jsonte")]
#[command(about = "jsonte - Resolve expressions and directives embedded in JSON templates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate expressions, or start a prompt when none are given
    Eval {
        /// Expressions to evaluate
        expressions: Vec<String>,

        /// JSON file or directory of JSON files to use as scope
        #[arg(short, long)]
        scope: Vec<PathBuf>,
    },

    /// Compile .modl and .templ files into JSON
    Compile {
        /// Files or directories to compile
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// JSON file or directory of JSON files to use as scope
        #[arg(short, long)]
        scope: Vec<PathBuf>,

        /// Directory to write outputs to (prints to stdout if not provided)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Delete sources after they compile successfully
        #[arg(long)]
        remove_src: bool,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Eval { expressions, scope } => run_eval(expressions, scope),
        Commands::Compile {
            paths,
            scope,
            out,
            remove_src,
            pretty,
        } => run_compile(CompileOptions {
            paths,
            scope,
            out,
            remove_src,
            pretty,
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_eval(expressions: Vec<String>, scope: Vec<PathBuf>) -> Result<(), CliError> {
    let scope = cli::load_scope(&scope)?;
    let mut stdout = io::stdout();

    if expressions.is_empty() {
        let interactive = atty::is(atty::Stream::Stdin);
        cli::run_repl(&scope, BufReader::new(io::stdin()), &mut stdout, interactive)
    } else {
        cli::evaluate_expressions(&expressions, &scope, &mut stdout)
    }
}

fn run_compile(options: CompileOptions) -> Result<(), CliError> {
    let report = cli::execute_compile(&options, &mut io::stdout())?;
    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::CompileFailed {
            failed: report.failures.len(),
            total: report.total,
        })
    }
}
