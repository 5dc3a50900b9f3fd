use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Parser;

use vm_translator::{translate_unit, Options, Translator};

/// Translates VM code into Hack assembly
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// A .vm file, or a directory whose .vm files form one program
    input: PathBuf,

    /// Output file [default: X.asm beside X.vm, or DIR/DIR.asm]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the SP setup and `call Sys.init 0` prologue
    #[arg(long)]
    no_bootstrap: bool,

    /// Do not echo each VM command as a comment
    #[arg(long)]
    no_comments: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn is_vm_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "vm")
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("cannot read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, files)?;
        } else if is_vm_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Source files to translate, in the order they are emitted.
///
/// Unit names come from file stems, so two files with the same stem anywhere
/// under the directory would share `static` storage and are rejected.
fn collect_units(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        let mut files = vec![];
        walk(input, &mut files)?;
        files.sort();
        if files.is_empty() {
            bail!("no .vm files in {}", input.display());
        }

        let mut seen: HashMap<&str, &Path> = HashMap::new();
        for path in &files {
            let unit = unit_name(path)?;
            if let Some(first) = seen.insert(unit, path) {
                bail!(
                    "{} and {} share unit name `{}`",
                    first.display(),
                    path.display(),
                    unit
                );
            }
        }
        Ok(files)
    } else if !input.exists() {
        bail!("cannot read file or directory: {}", input.display());
    } else if !is_vm_file(input) {
        bail!("file is not a vm file: {}", input.display());
    } else {
        Ok(vec![input.to_path_buf()])
    }
}

fn default_output(input: &Path) -> Result<PathBuf> {
    if input.is_dir() {
        let dir = fs::canonicalize(input)?;
        let name = dir
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("cannot name output for {}", dir.display()))?;
        Ok(dir.join(format!("{}.asm", name)))
    } else {
        Ok(input.with_extension("asm"))
    }
}

fn unit_name(path: &Path) -> Result<&str> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("cannot derive unit name from {}", path.display()))
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let options = Options {
        bootstrap: !args.no_bootstrap,
        annotate: !args.no_comments,
    };

    let units = collect_units(&args.input)?;
    let output = match args.output {
        Some(output) => output,
        None => default_output(&args.input)?,
    };

    let file = File::create(&output).with_context(|| format!("cannot create {}", output.display()))?;
    let mut out = BufWriter::new(file);
    let mut translator = Translator::new(&options);

    translator.write_bootstrap(&mut out)?;

    for path in &units {
        let unit = unit_name(path)?;
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let count = translate_unit(&mut translator, unit, BufReader::new(file), &mut out)
            .with_context(|| format!("in {}", path.display()))?;
        log::info!("translated {} ({} commands)", path.display(), count);
    }

    out.flush()
        .with_context(|| format!("cannot write {}", output.display()))?;
    log::info!("wrote {}", output.display());
    Ok(())
}
