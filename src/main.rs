//! rconnect - command-line front end
//!
//! Runs one command against a RESP server and prints the outcome:
//!
//! ```text
//! $ REDIS_HOST=127.0.0.1:6379 rconnect LRANGE queue 0 -1
//! OK [LRANGE] code=1 status=0
//! --------------------------------------
//! job-1
//! job-2
//! --------------------------------------
//! 2 item(s)
//! ```
//!
//! `DELS <pattern>` lists the keys matching `pattern`, asks for
//! confirmation and deletes them one by one.

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use rconnect::config::{parse_host_port, DEFAULT_BUFFER_SIZE, HOST_ENV, PASSWORD_ENV};
use rconnect::{Command, Connection, EndpointConfig};
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const RULE: &str = "--------------------------------------";

#[derive(Parser, Debug)]
#[command(name = "rconnect", version, about = "Run one command against a Redis server")]
struct Cli {
    /// Server as `host` or `host:port`
    #[arg(long, env = HOST_ENV, default_value = "127.0.0.1:6379")]
    host: String,

    /// Credential sent with AUTH after connecting
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    password: Option<String>,

    /// Connect and reply timeout in seconds
    #[arg(long, default_value_t = 3)]
    timeout: u64,

    /// Receive buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Command and arguments, e.g. `GET key` or `DELS session:*`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (host, port) = parse_host_port(&cli.host)?;
    let mut config = EndpointConfig::new(host, port)
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_buffer_size(cli.buffer_size);
    if let Some(password) = cli.password.filter(|p| !p.is_empty()) {
        config = config.with_password(password);
    }
    let address = config.address();
    debug!(%address, "Connecting");

    let mut conn = match Connection::connect(config).await {
        Ok(conn) => conn,
        Err(e) if e.kind() == rconnect::ErrorKind::AuthFail => {
            eprintln!("REDIS[{}] authentication failed: {}", address, e);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            eprintln!("REDIS[{}] connect failed: {}", address, e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let ok = match cli.command.as_slice() {
        [name, pattern] if name.eq_ignore_ascii_case("DELS") && !pattern.is_empty() => {
            delete_matching(&mut conn, pattern).await?
        }
        args => run(&mut conn, args).await,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn run(conn: &mut Connection, args: &[String]) -> bool {
    let mut cmd = Command::new(args[0].as_str());
    for arg in &args[1..] {
        cmd.push(arg.as_str());
    }

    match conn.execute(&mut cmd).await {
        Ok(()) => {
            println!(
                "OK [{}] code={} status={}",
                args[0],
                conn.code(),
                conn.status()
            );
            print_data(cmd.data());
            true
        }
        Err(e) => {
            println!("FAILED [{}] code={} ({}) {}", args[0], e.code(), e.kind(), e);
            false
        }
    }
}

fn print_data(data: &[Bytes]) {
    if data.is_empty() {
        return;
    }
    println!("{}", RULE);
    for item in data {
        println!("{}", String::from_utf8_lossy(item));
    }
    println!("{}", RULE);
    println!("{} item(s)\n", data.len());
}

async fn delete_matching(conn: &mut Connection, pattern: &str) -> anyhow::Result<bool> {
    let keys = match conn.keys(pattern).await {
        Ok(keys) if !keys.is_empty() => keys,
        Ok(_) => {
            println!("No keys match [{}]", pattern);
            return Ok(false);
        }
        Err(e) => {
            println!("Listing keys [{}] failed: {}", pattern, e);
            return Ok(false);
        }
    };

    for key in &keys {
        println!("{}", String::from_utf8_lossy(key));
    }
    if !confirm(&format!("Delete {} key(s) matching [{}]? [y/N] ", keys.len(), pattern)).await? {
        println!("Aborted");
        return Ok(false);
    }

    println!("{}", RULE);
    let mut all_deleted = true;
    for key in keys {
        let name = String::from_utf8_lossy(&key).into_owned();
        match conn.del(key).await {
            Ok(n) if n > 0 => println!("Deleted [{}]", name),
            Ok(_) => {
                all_deleted = false;
                println!("Not deleted [{}]", name);
            }
            Err(e) => {
                all_deleted = false;
                println!("Deleting [{}] failed: {}", name, e);
            }
        }
    }
    println!("{}\n", RULE);

    Ok(all_deleted)
}

async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines
        .next_line()
        .await
        .context("failed to read confirmation")?
        .unwrap_or_default();

    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES" | "Yes"))
}
