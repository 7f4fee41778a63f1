// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: definitions tree root
fn definitions_arg() -> Arg {
    Arg::new("definitions")
        .long("definitions")
        .value_name("DIR")
        .help("Definitions tree to read from")
}

/// Common arguments: what to resolve
fn request_args() -> [Arg; 4] {
    [
        Arg::new("packages")
            .value_name("PKG@VERSION")
            .num_args(0..)
            .help("Packages as name@version (scoped: @scope/name@version)"),
        Arg::new("tool_version")
            .long("tool-version")
            .value_name("VERSION")
            .required(true)
            .help("Version of the type checker the stubs must support"),
        Arg::new("env")
            .long("env")
            .value_name("NAME")
            .action(ArgAction::Append)
            .help("Environment definitions to include (node, dom, ...)"),
        definitions_arg(),
    ]
}

fn build_cli() -> Command {
    Command::new("stubkit")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Stubkit Contributors")
        .about("Resolve, cache, and install versioned type-definition stubs")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file (default: ./stubkit.toml if present)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("install")
                .about("Resolve, fetch and install stubs for the given packages")
                .args(request_args())
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Replace installed stubs that have local changes"),
                )
                .arg(
                    Arg::new("target")
                        .short('t')
                        .long("target")
                        .value_name("DIR")
                        .help("Install root in the consumer project"),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help("Packages processed concurrently"),
                )
                .arg(
                    Arg::new("registry")
                        .long("registry")
                        .value_name("URL")
                        .help("Fetch stubs from this registry instead of the local tree"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Show which stub each request resolves to, without installing")
                .args(request_args()),
        )
        .subcommand(
            Command::new("validate-defs")
                .about("Index a definitions tree and report problems")
                .arg(definitions_arg()),
        )
        .subcommand(
            Command::new("cache")
                .about("Local cache maintenance")
                .subcommand_required(true)
                .subcommand(
                    Command::new("prune")
                        .about("Remove cached stubs older than a given age")
                        .arg(
                            Arg::new("max_age_days")
                                .long("max-age-days")
                                .help("Maximum age in days"),
                        ),
                )
                .subcommand(Command::new("clean").about("Remove every cached stub")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Man page goes to OUT_DIR/man
    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=OUT_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = out_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("stubkit.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
