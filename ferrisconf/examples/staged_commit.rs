//! Staged commit example: queue configuration changes and apply them in order
//!
//! This example stages a VLAN through both a structured edit-config and CLI
//! commands, prints what will be sent, then commits the queue. Each staged
//! entry is applied under its own lock of the running datastore.
//!
//! # Prerequisites
//!
//! - A Comware switch with NETCONF over SSH enabled (`netconf ssh server enable`)
//! - Valid credentials
//!
//! # Usage
//!
//! Preview only:
//! ```bash
//! cargo run --example staged_commit -- --host 192.168.1.1 --user admin --password secret --vlan 10 --dry-run
//! ```
//!
//! Apply and save:
//! ```bash
//! cargo run --example staged_commit -- --host 192.168.1.1 --user admin --password secret --vlan 10 --save
//! ```

use std::env;
use std::time::Duration;

use ferrisconf::rpc::CONFIG_NAMESPACE;
use ferrisconf::{OperationKind, SessionBuilder, XmlElement};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = Args::parse();

    let mut session = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    // Stage the changes. Nothing touches the device yet.
    let vlan = XmlElement::new("top").with_namespace(CONFIG_NAMESPACE).with_child(
        XmlElement::new("VLAN").with_child(
            XmlElement::new("VLANs").with_child(
                XmlElement::new("VLAN")
                    .with_child(XmlElement::new("ID").with_text(args.vlan.to_string()))
                    .with_child(XmlElement::new("Name").with_text(&args.name)),
            ),
        ),
    );
    session.stage(OperationKind::EditConfig, vlan)?;
    session.stage_config(
        vec![
            format!("interface vlan-interface {}", args.vlan),
            format!("description {}", args.name),
        ],
        "cli_config",
    )?;
    if args.save {
        session.stage_config("", "save")?;
    }

    println!("Staged operations:");
    println!("{}", "-".repeat(50));
    for (kind, rendered) in session
        .staged()
        .iter()
        .map(|entry| entry.kind())
        .zip(session.staged_to_string())
    {
        println!("[{}]\n{}\n", kind, rendered);
    }
    println!("{}", "-".repeat(50));

    if args.dry_run {
        println!("Dry run, nothing sent.");
        return Ok(());
    }

    println!("Connecting to {}:{}...", args.host, args.port);
    session.open().await?;
    println!("Connected!");

    match session.execute_staged().await {
        Ok(replies) => println!("Applied {} staged operations.", replies.len()),
        Err(e) if e.is_retryable() => {
            eprintln!("Datastore busy, try again later: {}", e);
        }
        Err(e) => {
            eprintln!("Commit failed: {}", e);
            eprintln!("{} operations remain staged.", session.staged().len());
        }
    }

    let vlans = session.cli_display([format!("display vlan {}", args.vlan)]).await?;
    println!("{}", vlans);

    println!("\nClosing session...");
    session.close().await?;
    println!("Done!");

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: String,
    timeout: u64,
    vlan: u16,
    name: String,
    save: bool,
    dry_run: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 830u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = String::new();
        let mut timeout = 30u64;
        let mut vlan = 10u16;
        let mut name = None;
        let mut save = false;
        let mut dry_run = false;

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
                "--vlan" => {
                    i += 1;
                    if i < args.len() {
                        vlan = args[i].parse().unwrap_or(10);
                    }
                }
                "--name" => {
                    i += 1;
                    if i < args.len() {
                        name = Some(args[i].clone());
                    }
                }
                "--save" => save = true,
                "--dry-run" => dry_run = true,
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
            user,
            password,
            timeout,
            name: name.unwrap_or_else(|| format!("vlan{vlan}")),
            vlan,
            save,
            dry_run,
        }
    }

    fn print_help() {
        println!(
            r#"ferrisconf staged_commit example

USAGE:
    cargo run --example staged_commit -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target switch [default: localhost]
    -p, --port <PORT>        NETCONF port [default: 830]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -t, --timeout <SECS>     Connect and RPC timeout [default: 30]
    --vlan <ID>              VLAN to create [default: 10]
    --name <NAME>            VLAN name [default: vlan<ID>]
    --save                   Stage a save of the running configuration
    --dry-run                Print the staged operations and exit
    --help                   Print this help message
"#
        );
    }
}
