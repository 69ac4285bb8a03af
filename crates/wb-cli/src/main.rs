//! `wb` — inspect and edit a persisted whiteboard document.
//!
//! Loads the document stored under `--key` in a file store directory, runs
//! one command against it through the state manager, waits for the write to
//! land, and prints the resulting state. Set `RUST_LOG=debug` to trace the
//! manager.

use std::path::PathBuf;
use wb_state::{
    Command, Encoding, FileStore, ManagerConfig, NoHooks, Patch, StateManager, Store, Value,
    version_key,
};

const USAGE: &str = "\
usage: wb [--dir DIR] [--key KEY] [--version N] [--msgpack] <command>

commands:
  show                         print the stored document
  commit <after> [<before>]    apply a command (JSON patches); `before` is
                               computed from the current state when omitted
  patch <json>                 same as `commit <json>`
  reset                        reset the document to {}
  version                      print the stored schema version";

#[derive(Debug, PartialEq)]
enum Action {
    Help,
    Show,
    Commit { after: Value, before: Option<Value> },
    Reset,
    Version,
}

#[derive(Debug, PartialEq)]
struct Options {
    dir: PathBuf,
    key: String,
    version: Option<i64>,
    encoding: Encoding,
    action: Action,
}

fn parse_json(arg: &str) -> Result<Value, String> {
    serde_json::from_str(arg).map_err(|e| format!("invalid JSON '{arg}': {e}"))
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut dir = PathBuf::from(".");
    let mut key = "whiteboard".to_string();
    let mut version = None;
    let mut encoding = Encoding::Json;
    let mut rest = Vec::new();
    let mut help = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--dir" => dir = iter.next().ok_or("--dir needs a value")?.into(),
            "--key" => key = iter.next().ok_or("--key needs a value")?.clone(),
            "--version" => {
                let raw = iter.next().ok_or("--version needs a value")?;
                version = Some(raw.parse().map_err(|_| format!("invalid version '{raw}'"))?);
            }
            "--msgpack" => encoding = Encoding::MessagePack,
            "-h" | "--help" => help = true,
            _ => rest.push(arg.as_str()),
        }
    }

    let action = match rest.as_slice() {
        _ if help => Action::Help,
        ["show"] => Action::Show,
        ["reset"] => Action::Reset,
        ["version"] => Action::Version,
        ["patch", after] | ["commit", after] => Action::Commit {
            after: parse_json(after)?,
            before: None,
        },
        ["commit", after, before] => Action::Commit {
            after: parse_json(after)?,
            before: Some(parse_json(before)?),
        },
        [] => return Err(USAGE.to_string()),
        [other, ..] => return Err(format!("unknown command '{other}'\n\n{USAGE}")),
    };

    Ok(Options {
        dir,
        key,
        version,
        encoding,
        action,
    })
}

async fn run(options: Options) -> Result<(), String> {
    if options.action == Action::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let store = FileStore::new(&options.dir, options.encoding);

    if options.action == Action::Version {
        let stored = store
            .get(&version_key(&options.key))
            .await
            .map_err(|e| e.to_string())?;
        match stored {
            Some(version) => println!("{version}"),
            None => println!("unversioned"),
        }
        return Ok(());
    }

    let mut config = ManagerConfig::default().with_key(&options.key);
    if let Some(version) = options.version {
        config = config.with_version(version);
    }
    let mut manager = StateManager::new(Value::Object(Default::default()), config, store, NoHooks);
    let outcome = manager.ready().await;
    log::info!("loaded `{}` from {}: {outcome}", options.key, options.dir.display());

    match options.action {
        Action::Help | Action::Show | Action::Version => {}
        Action::Commit { after, before } => {
            let after = Patch::from_json(after);
            let command = match before {
                Some(before) => Command::new(Patch::from_json(before), after),
                None => {
                    let prev = manager.state().clone();
                    let next = after.apply(&prev);
                    Command::from_states(&prev, &next)
                }
            };
            manager.set_state(command, Some("cli"));
        }
        Action::Reset => {
            manager.reset();
        }
    }
    manager.flush().await;

    let pretty = serde_json::to_string_pretty(manager.state()).map_err(|e| e.to_string())?;
    println!("{pretty}");
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(options).await {
        eprintln!("wb error: {e}");
        std::process::exit(1);
    }
}
