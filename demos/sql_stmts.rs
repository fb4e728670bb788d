use std::env;
use std::fs::File;

use sql_multistmt::{split, Options};

/// Split specified files and print all statements.
// RUST_LOG=multistmt=debug
fn main() {
    env_logger::init();
    let options = Options::new();
    for arg in env::args().skip(1) {
        println!("{arg}");
        let f = match File::open(&arg) {
            Ok(f) => f,
            Err(err) => {
                eprintln!("Err: {err} in {arg}");
                continue;
            }
        };
        let result = split(f, &options, |stmt| {
            println!("{}", String::from_utf8_lossy(&stmt));
            true
        });
        if let Err(err) = result {
            eprintln!("Err: {err} in {arg}");
        }
    }
}
