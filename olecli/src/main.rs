use std::process::exit;

use clap::{Arg, Command};
use glob::glob;
use log::{debug, error, Level};
use ole::{CompoundFile, EntriesMode, Validation};
use simple_logger::init_with_level;

pub fn main() {
    init_with_level(Level::Debug).unwrap();

    let args_matches = Command::new("olecli")
        .about("Opens every MSI file under a directory and prints its directory tree.")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("dir")
                .long("dir")
                .short('d')
                .help("Directory to glob for *.msi files.")
                .takes_value(true)
                .default_value("."),
        )
        .arg(
            Arg::new("validation")
                .long("validation")
                .help("strict or permissive")
                .takes_value(true)
                .default_value("permissive"),
        )
        .get_matches();

    let dir = args_matches.value_of("dir").unwrap();
    let validation = match args_matches.value_of("validation").unwrap() {
        "strict" => Validation::Strict,
        "permissive" => Validation::Permissive,
        other => {
            error!("unknown validation mode {:?}, expected strict or permissive", other);
            exit(1);
        }
    };

    let pattern = format!("{}/**/*.msi", dir.trim_end_matches('/'));
    let paths = match glob(&pattern) {
        Ok(paths) => paths,
        Err(err) => {
            error!("invalid glob pattern {:?}: {}", pattern, err);
            exit(1);
        }
    };

    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                error!("glob error: {}", err);
                continue;
            }
        };

        debug!("opening {:?}", path);
        let cfb = match CompoundFile::open_file_blocking(&path, validation) {
            Ok(cfb) => cfb,
            Err(err) => {
                error!("failed to open {:?}: {}", path, err);
                continue;
            }
        };

        println!("{:?}:", path);
        match cfb.entries("", EntriesMode::Preorder) {
            Ok(entries) => println!("{:#?}", entries),
            Err(err) => error!("failed to list entries of {:?}: {}", path, err),
        }
    }
}
