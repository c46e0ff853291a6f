use std::{
    error::Error,
    io::{self, Write},
    net::SocketAddr,
    process,
    time::Duration,
};

use clap::{Parser, ValueEnum};
use log::{info, warn};

use frontapi::{
    Client, Command, ConnectionConfig, Message, Request, prompt, render,
    cli::PromptError,
    command::CommandError,
    protocol::{CallerId, DbType, ENTRY_POINT_ADDR, MIN_POOL_SIZE},
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Local port replies are received on (0 picks a free one)
    #[arg(short, long, default_value_t = 0)]
    port: u16,
    /// Seconds to wait for a reply (0 waits forever)
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,
    /// Address of the Entry Point
    #[arg(short, long, default_value_t = ENTRY_POINT_ADDR)]
    entry_point: SocketAddr,
    /// Bytes reserved for the values of one message
    #[arg(long, default_value_t = 4096)]
    pool_size: usize,
    /// Caller id stamped on requests
    #[arg(long, default_value_t = CallerId::CLI.0)]
    caller_id: i32,
    /// Target database
    #[arg(long, value_enum, default_value_t = Db::Running)]
    db: Db,
    /// Run this command and exit instead of prompting
    command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Db {
    Running,
    Startup,
    Candidate,
}

impl From<Db> for DbType {
    fn from(db: Db) -> Self {
        match db {
            Db::Running => DbType::Running,
            Db::Startup => DbType::Startup,
            Db::Candidate => DbType::Candidate,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    if cli.pool_size <= MIN_POOL_SIZE {
        return Err(format!("pool size must exceed {MIN_POOL_SIZE} bytes").into());
    }

    let config = ConnectionConfig {
        own_port: cli.port,
        timeout: Duration::from_secs(cli.timeout),
        entry_point: cli.entry_point,
    };
    let mut client =
        Client::connect(&config, CallerId(cli.caller_id))?.with_db_type(cli.db.into());

    ctrlc::set_handler(|| {
        warn!("interrupted; closing connection");
        process::exit(130);
    })?;

    if !cli.command.is_empty() {
        let cmd = Command::try_from(cli.command.join(" ").as_str())?;
        run(&mut client, cmd, cli.pool_size)?;
        client.close();
        return Ok(());
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        let cmd = match prompt(stdin.lock(), stdout.lock()) {
            Ok(c) => c,
            Err(PromptError::Command(CommandError::Empty)) => continue,
            Err(PromptError::Io(e)) => return Err(e.into()),
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        if let Command::Exit = cmd {
            client.close();
            break;
        }

        if let Err(e) = run(&mut client, cmd, cli.pool_size) {
            eprintln!("request error: {e}");
        }
        stdout.flush()?;
    }

    Ok(())
}

/// Sends one command and prints every reply fragment.
fn run(client: &mut Client, cmd: Command, pool_size: usize) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Exit => Ok(()),
        Command::Raw(text) => {
            let mut xml = text;
            let more = client.make_xml_request(&mut xml)?;
            println!("{xml}");
            if more {
                info!("reply has more fragments; use a typed request to collect them");
            }
            Ok(())
        }
        Command::Request(request) => send(client, request, pool_size),
    }
}

fn send(client: &mut Client, request: Request, pool_size: usize) -> Result<(), Box<dyn Error>> {
    let header = client.next_header()?;

    let mut buffer = vec![0_u8; pool_size];
    let mut message = Message::with_pool(&mut buffer)?;
    message.header = header.clone();
    message.body = request.into_body(&mut message.pool)?;

    let mut more = client.make_request(&mut message)?;
    print!("{}", render(&message));

    while more {
        let mut buffer = vec![0_u8; pool_size];
        let mut fragment = Message::with_pool(&mut buffer)?;
        fragment.header = header.clone();
        more = client.next_reply(&mut fragment)?;
        print!("{}", render(&fragment));
    }
    Ok(())
}
