use std::env;
use std::fs;
use std::process;

use emk20::{ihex, teensy, EmulationError, Emulator};
use log::debug;

fn usage(program: &str) -> ! {
    eprintln!("usage: {} <firmware.hex> [--steps N]", program);
    process::exit(1);
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.get(0).map(String::as_str).unwrap_or("myteensy");
    let mut firmware = None;
    let mut steps = None;
    let mut j = 1;
    while j < args.len() {
        match args[j].as_str() {
            "--steps" => {
                j += 1;
                match args.get(j).and_then(|n| n.parse::<usize>().ok()) {
                    Some(n) => steps = Some(n),
                    None => usage(program),
                }
            }
            arg if firmware.is_none() => firmware = Some(arg.to_string()),
            _ => usage(program),
        }
        j += 1;
    }
    let firmware = match firmware {
        Some(path) => path,
        None => usage(program),
    };

    let text = match fs::read_to_string(&firmware) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("{}: {}", firmware, err);
            process::exit(1);
        }
    };
    let image = match ihex::parse(&text) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("{}: {}", firmware, err);
            process::exit(2);
        }
    };
    debug!("loaded {} bytes of firmware from {}", image.len(), firmware);

    let mut config = teensy::teensy_3_2(image);
    if let Some(steps) = steps {
        config.step_limit = steps;
    }
    let mut emulator = Emulator::new(config);
    match emulator.run() {
        Ok(()) => {}
        Err(err @ EmulationError::Io(_)) => {
            eprintln!("{}", err);
            process::exit(1);
        }
        Err(err) => {
            eprintln!("{}", err);
            process::exit(2);
        }
    }
}
