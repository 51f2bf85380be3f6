//! File copy example: upload a file to switch storage and verify it
//!
//! Checks that the destination directory exists and has room, copies the
//! file over SCP, then compares the local MD5 digest against the one the
//! switch reports.
//!
//! # Prerequisites
//!
//! - A Comware switch with NETCONF over SSH and the SCP server enabled
//!   (`netconf ssh server enable`, `scp server enable`)
//! - Valid credentials
//!
//! # Usage
//!
//! ```bash
//! cargo run --example file_copy -- --host 192.168.1.1 --user admin --password secret --src ./startup.cfg
//! ```
//!
//! Into a new directory:
//! ```bash
//! cargo run --example file_copy -- --host 192.168.1.1 --user admin --password secret \
//!     --src ./startup.cfg --dst flash:/backup/startup.cfg --mkdir
//! ```

use std::env;
use std::time::Duration;

use ferrisconf::{FileCopy, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = Args::parse();

    let Some(src) = args.src.clone() else {
        eprintln!("--src is required");
        Args::print_help();
        std::process::exit(2);
    };

    let mut session = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    println!("Connecting to {}:{}...", args.host, args.port);
    session.open().await?;
    println!("Connected!");

    {
        let mut copy = FileCopy::new(&mut session, &src).with_port(args.scp_port);
        if let Some(dst) = &args.dst {
            copy = copy.with_destination(dst);
        }

        println!("\nSource:      {}", copy.src().display());
        println!("Destination: {}", copy.dst());
        println!("{}", "-".repeat(50));

        if !copy.remote_dir_exists().await? {
            if args.mkdir {
                println!("Creating {}...", copy.remote_dir());
                copy.create_remote_dir().await?;
            } else {
                eprintln!("{} does not exist, pass --mkdir to create it", copy.remote_dir());
                drop(copy);
                session.close().await?;
                std::process::exit(1);
            }
        }

        println!("Free space: {} bytes", copy.remote_capacity().await?);
        println!("Local MD5:  {}", copy.local_digest().await?);

        if copy.file_already_exists().await {
            println!("Identical file already present, skipping copy.");
        } else {
            println!("Copying...");
            copy.transfer_file().await?;
            println!("Copy verified.");
        }
        println!("{}", "-".repeat(50));
    }

    println!("\nClosing session...");
    session.close().await?;
    println!("Done!");

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    scp_port: u16,
    user: String,
    password: String,
    timeout: u64,
    src: Option<String>,
    dst: Option<String>,
    mkdir: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 830u16;
        let mut scp_port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = String::new();
        let mut timeout = 30u64;
        let mut src = None;
        let mut dst = None;
        let mut mkdir = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(830);
                    }
                }
                "--scp-port" => {
                    i += 1;
                    if i < args.len() {
                        scp_port = args[i].parse().unwrap_or(22);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = args[i].clone();
                    }
                }
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--src" | "-s" => {
                    i += 1;
                    if i < args.len() {
                        src = Some(args[i].clone());
                    }
                }
                "--dst" | "-d" => {
                    i += 1;
                    if i < args.len() {
                        dst = Some(args[i].clone());
                    }
                }
                "--mkdir" => mkdir = true,
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self {
            host,
            port,
            scp_port,
            user,
            password,
            timeout,
            src,
            dst,
            mkdir,
        }
    }

    fn print_help() {
        println!(
            r#"ferrisconf file_copy example

USAGE:
    cargo run --example file_copy -- --src <FILE> [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target switch [default: localhost]
    -p, --port <PORT>        NETCONF port [default: 830]
    --scp-port <PORT>        SCP port [default: 22]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -t, --timeout <SECS>     Connect and RPC timeout [default: 30]
    -s, --src <FILE>         Local file to copy
    -d, --dst <PATH>         Remote path [default: flash:/<file name>]
    --mkdir                  Create the remote directory when missing
    --help                   Print this help message
"#
        );
    }
}
