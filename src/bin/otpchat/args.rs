//! Command-line argument parsing.
//!
//! A thin, hand-rolled parser rather than a CLI crate, since argument
//! parsing is explicitly out of scope for the library — this mirrors
//! `examples/original_source/src/args.c`'s `parse_args`/`parse_chat_args`
//! exactly, including the "bare numeric third argument means a listen
//! port, anything else is a host[:port]" heuristic.

use std::net::SocketAddr;
use std::path::PathBuf;

use otpchat::net;

pub enum Mode {
    Chat(ChatArgs),
    Generate(GenerateArgs),
}

pub struct ChatArgs {
    pub local_pad_path: PathBuf,
    pub remote_pad_path: PathBuf,
    pub wait_for_remote: bool,
    pub listen_port: u16,
    pub connect_addr: Option<SocketAddr>,
}

pub struct GenerateArgs {
    pub size: u64,
    pub path: PathBuf,
}

const DEFAULT_PORT: u16 = otpchat::config::DEFAULT_PORT;

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <local-pad> <remote-pad> [<address>[:<port>]]\n       {program} --generate <size> <new-pad-file>"
    )
}

pub fn parse(argv: &[String]) -> Result<Mode, String> {
    if argv.len() >= 2 && argv[1] == "--generate" {
        parse_generate(&argv[2..]).map(Mode::Generate)
    } else {
        parse_chat(&argv[1..]).map(Mode::Chat)
    }
}

fn parse_generate(rest: &[String]) -> Result<GenerateArgs, String> {
    if rest.len() != 2 {
        return Err("--generate takes exactly <size> <path>".to_string());
    }
    let size: u64 = rest[0].parse().map_err(|_| format!("invalid pad size \"{}\"", rest[0]))?;
    Ok(GenerateArgs { size, path: PathBuf::from(&rest[1]) })
}

fn parse_chat(rest: &[String]) -> Result<ChatArgs, String> {
    if rest.len() < 2 || rest.len() > 3 {
        return Err("expected <local-pad> <remote-pad> [<address>[:<port>]]".to_string());
    }
    let local_pad_path = PathBuf::from(&rest[0]);
    let remote_pad_path = PathBuf::from(&rest[1]);

    let (wait_for_remote, listen_port, connect_addr) = if rest.len() == 3 {
        // A bare number in the third slot means "listen on this port";
        // anything else is parsed as an address to connect to.
        match rest[2].parse::<u16>() {
            Ok(port) => (true, port, None),
            Err(_) => {
                let addr = net::parse_address(&rest[2], DEFAULT_PORT)
                    .map_err(|e| format!("invalid address \"{}\": {e}", rest[2]))?;
                (false, DEFAULT_PORT, Some(addr))
            }
        }
    } else {
        (true, DEFAULT_PORT, None)
    };

    Ok(ChatArgs { local_pad_path, remote_pad_path, wait_for_remote, listen_port, connect_addr })
}
