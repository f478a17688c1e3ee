//! `otpchat` binary: parses arguments, opens pads, and either generates
//! a new pad file or hands off to the reactor for an interactive
//! session. Grounded on `examples/original_source/src/main.c`.

mod args;

use std::net::SocketAddr;
use std::process::ExitCode;

use otpchat::entropy::OsEntropy;
use otpchat::pad::{Pad, PadStore};
use otpchat::reactor::Reactor;
use otpchat::Config;

use args::Mode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("otpchat=info")).init();

    let argv: Vec<String> = std::env::args().collect();
    let program = argv.first().cloned().unwrap_or_else(|| "otpchat".to_string());

    let mode = match args::parse(&argv) {
        Ok(mode) => mode,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("{}", args::usage(&program));
            return ExitCode::FAILURE;
        }
    };

    let result = match mode {
        Mode::Generate(generate_args) => run_generate(generate_args),
        Mode::Chat(chat_args) => run_chat(chat_args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run_generate(args: args::GenerateArgs) -> Result<(), String> {
    let mut entropy = OsEntropy;
    Pad::create(&args.path, args.size, &mut entropy)
        .map_err(|e| format!("failed to generate pad \"{}\": {e}", args.path.display()))
}

fn run_chat(args: args::ChatArgs) -> Result<(), String> {
    let local_pad = Pad::open(&args.local_pad_path)
        .map_err(|e| format!("unable to open \"{}\": {e}", args.local_pad_path.display()))?;
    let remote_pad = Pad::open(&args.remote_pad_path)
        .map_err(|e| format!("unable to open \"{}\": {e}", args.remote_pad_path.display()))?;

    let mut pads = PadStore::new(local_pad);
    pads.add_remote(remote_pad).map_err(|e| format!("pad setup error: {e}"))?;

    let config = Config::default();
    let mut reactor = Reactor::new(config, pads).map_err(|e| format!("failed to start: {e}"))?;

    if args.wait_for_remote {
        println!("Listening for connection on port {}", args.listen_port);
        reactor
            .listen_on(SocketAddr::new("0.0.0.0".parse().unwrap(), args.listen_port))
            .map_err(|e| format!("unable to listen on port {}: {e}", args.listen_port))?;
    } else {
        let addr = args.connect_addr.expect("non-listening chat args always carry a connect address");
        println!("Connecting to {addr}");
        reactor.connect_to(addr).map_err(|e| format!("unable to connect to {addr}: {e}"))?;
    }

    reactor.run().map_err(|e| format!("chat session ended with an error: {e}"))
}
