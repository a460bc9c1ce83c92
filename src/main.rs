//=====================================================
// File: main.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: TideScript CLI entry point
// Objective: Command-line interface for executing .tds source files and for
//            importing modules through the local/remote resolver chain
//=====================================================

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};

use tidescript::interpreter::{self, Namespace, Value};
use tidescript::logging::{self, Severity};
use tidescript::modules::{ImportContext, LocalResolver, RemoteResolver};
use tidescript::parser::validate_module;

#[derive(Parser, Debug)]
#[command(name = "tidescript", about = "TideScript CLI")]
pub struct Args {
    /// Logging severity: NONE, CRITICAL, ERROR, WARNING, INFO, DEBUG.
    #[arg(long = "log-level", default_value = "WARNING", global = true)]
    pub log_level: Severity,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a .tds source file.
    Run(RunArgs),
    /// Resolve and load a module by logical name, then inspect it.
    Import(ImportArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Path to the script to execute.
    pub script: PathBuf,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ImportArgs {
    /// Dotted logical module name, e.g. `data_app` or `pkg.sub.mod`.
    pub module: String,

    /// GitHub coordinates `owner/repository@branch` to resolve against.
    #[arg(long)]
    pub github: Option<String>,

    /// Explicit raw-content base URL to resolve against.
    #[arg(long)]
    pub url: Option<String>,

    /// Extra local search roots, tried before the defaults.
    #[arg(long = "path")]
    pub paths: Vec<PathBuf>,

    /// Function to call on the loaded module.
    #[arg(long)]
    pub call: Option<String>,

    /// Integer arguments for `--call`, comma separated.
    #[arg(long = "args", value_delimiter = ',')]
    pub call_args: Vec<i64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level);

    match args.command {
        Command::Run(run) => run_script(&run),
        Command::Import(import) => import_module(&import),
    }
}

fn run_script(args: &RunArgs) -> Result<()> {
    let source = fs::read_to_string(&args.script)
        .with_context(|| format!("failed reading '{}'", args.script.display()))?;
    let display = args.script.display().to_string();
    let program = validate_module(&source, &display)
        .map_err(|error| anyhow::anyhow!("{display}: {error}"))?;

    let mut namespace = Namespace::new();
    interpreter::install_builtins(&mut namespace);
    interpreter::execute_program(&program, &mut namespace)
        .map_err(|error| anyhow::anyhow!("{display}: {error}"))?;
    Ok(())
}

fn import_module(args: &ImportArgs) -> Result<()> {
    let mut ctx = ImportContext::new();
    ctx.register(LocalResolver::new());

    if let Some(coordinates) = &args.github {
        let (owner, repository, branch) = parse_github(coordinates)?;
        ctx.register(RemoteResolver::from_github(owner, repository, branch));
    } else if let Some(url) = &args.url {
        ctx.register(RemoteResolver::new(url.clone()));
    }

    let handle = ctx.import(&args.module, &args.paths)?;

    if let Some(function) = &args.call {
        let call_args: Vec<Value> = args.call_args.iter().copied().map(Value::Int).collect();
        let mut module = handle.borrow_mut();
        let result = interpreter::call_function(module.namespace_mut(), function, &call_args)?;
        println!("{result}");
    }

    println!("loaded modules: {:?}", ctx.loaded_modules());
    println!("active resolvers: {:?}", ctx.active_resolvers());
    Ok(())
}

fn parse_github(coordinates: &str) -> Result<(&str, &str, &str)> {
    let (path, branch) = match coordinates.rsplit_once('@') {
        Some(parts) => parts,
        None => (coordinates, "main"),
    };
    let Some((owner, repository)) = path.split_once('/') else {
        bail!("expected GitHub coordinates as 'owner/repository@branch', got '{coordinates}'");
    };
    if owner.is_empty() || repository.is_empty() || branch.is_empty() {
        bail!("expected GitHub coordinates as 'owner/repository@branch', got '{coordinates}'");
    }
    Ok((owner, repository, branch))
}

//=====================================================
// End of file
//=====================================================
