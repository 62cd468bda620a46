//  aseq: command line front end for the ALSA sequencer
//  Copyright (C) 2015 William Light <wrl@illest.net>
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU Lesser General Public License as
//  published by the Free Software Foundation, either version 3 of the
//  License, or (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU Lesser General Public License for more details.
//
//  You should have received a copy of the GNU Lesser General Public
//  License along with this program.  If not, see
//  <http://www.gnu.org/licenses/>.


use std::time::Duration;

use anyhow::{
    bail,
    Context,
    Result
};

use clap::{
    Args,
    Parser,
    Subcommand
};

use tracing::{
    debug,
    info
};
use tracing_subscriber::EnvFilter;

use alsa_seq::*;
use alsa_seq::event::Timestamp;

#[derive(Parser)]
#[command(author, version, about = "Inspect and drive the ALSA sequencer")]
struct Cli {
    /// Name this program registers under.
    #[arg(long, default_value = "aseq")]
    client_name: String,

    /// Sequencer device to open.
    #[arg(long, default_value = "default")]
    sequencer: String,

    #[command(subcommand)]
    command: Command
}

#[derive(Subcommand)]
enum Command {
    /// List ports other programs can connect to.
    List(ListArgs),

    /// List every client, kernel clients included.
    Clients {
        #[arg(long)]
        json: bool
    },

    /// Print events arriving at a new writable port.
    Dump(DumpArgs),

    /// Send a note to a port.
    Send(SendArgs),

    /// Route events from one port to another.
    Connect {
        sender: Address,
        dest: Address
    },

    /// Remove a route made with `connect`.
    Disconnect {
        sender: Address,
        dest: Address
    }
}

#[derive(Args)]
struct ListArgs {
    /// Only ports that can be read from.
    #[arg(long)]
    input: bool,

    /// Only ports that can be written to.
    #[arg(long)]
    output: bool,

    /// Include system and non-connectable ports, and any port type.
    #[arg(long)]
    all: bool,

    #[arg(long)]
    json: bool
}

#[derive(Args)]
struct DumpArgs {
    /// Ports to connect from before listening.
    #[arg(long)]
    from: Vec<Address>,

    /// Stop after this many seconds without an event.
    #[arg(long)]
    timeout: Option<f64>,

    /// Wait on a tokio reactor instead of blocking in poll(2).
    #[arg(long = "async")]
    use_async: bool
}

#[derive(Args)]
struct SendArgs {
    /// Destination port, e.g. 128:0.
    #[arg(long)]
    to: Address,

    #[arg(long, default_value_t = 0)]
    channel: u8,

    #[arg(long, default_value_t = 60)]
    note: u8,

    #[arg(long, default_value_t = 100)]
    velocity: u8,

    /// Milliseconds between note on and note off.
    #[arg(long, default_value_t = 250)]
    duration: u64
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
                         .unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SequencerConfig {
        client_name: cli.client_name.clone(),
        sequencer_name: cli.sequencer.clone(),
        ..SequencerConfig::default()
    };

    match cli.command {
        Command::List(args) => list(&config, &args),
        Command::Clients { json } => clients(&config, json),
        Command::Dump(args) => dump(&config, &args),
        Command::Send(args) => send(&config, &args),
        Command::Connect { sender, dest } => {
            let handle = open(&config)?;
            handle.subscribe_port(sender, dest, &SubscribeOptions::default())
                .with_context(|| format!("couldn't connect {} to {}", sender, dest))?;
            info!(%sender, %dest, "connected");
            Ok(())
        }

        Command::Disconnect { sender, dest } => {
            let handle = open(&config)?;
            handle.unsubscribe_port(sender, dest, &SubscribeOptions::default())
                .with_context(|| format!("couldn't disconnect {} from {}", sender, dest))?;
            info!(%sender, %dest, "disconnected");
            Ok(())
        }
    }
}

fn open(config: &SequencerConfig) -> Result<SequencerHandle> {
    config.open()
        .with_context(|| format!("couldn't open sequencer {:?}", config.sequencer_name))
}

fn list(config: &SequencerConfig, args: &ListArgs) -> Result<()> {
    let handle = open(config)?;

    let mut filter = PortFilter {
        input: args.input,
        output: args.output,
        ..PortFilter::default()
    };

    if args.all {
        filter.include_system = true;
        filter.only_connectable = false;
        filter.port_type = PortType::empty();
    }

    let ports = handle.list_ports(&filter)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    for port in &ports {
        let dir = match (port.can_read(), port.can_write()) {
            (true, true) => "rw",
            (true, false) => "r",
            (false, true) => "w",
            (false, false) => "-"
        };

        println!("{:>7}  {:<2}  {:<32}  {}", port.address().to_string(), dir,
                 port.client_name, port.name);
    }

    Ok(())
}

fn clients(config: &SequencerConfig, json: bool) -> Result<()> {
    let handle = open(config)?;
    let clients = handle.clients().collect::<alsa_seq::Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&clients)?);
        return Ok(());
    }

    for client in &clients {
        let kind = match client.client_type {
            Some(ClientType::Kernel) => "kernel",
            Some(ClientType::User) => "user",
            None => "?"
        };

        let owner = match (client.card_id, client.pid) {
            (Some(card), _) => format!("card {}", card),
            (None, Some(pid)) => format!("pid {}", pid),
            (None, None) => String::new()
        };

        println!("{:>3}  {:<6}  {:<32}  {:>2} ports  {}", client.client_id, kind, client.name,
                 client.num_ports, owner);
    }

    Ok(())
}

fn print_event(ev: &Event) {
    let source = ev.source.map(|s| s.to_string()).unwrap_or_else(|| "-".into());

    match ev.time {
        Some(Timestamp::Tick(tick)) => println!("{:>7}  @{:<10}  {:?}", source, tick, ev.data),
        Some(Timestamp::Real(rt)) =>
            println!("{:>7}  @{}.{:09}  {:?}", source, rt.seconds, rt.nanoseconds, ev.data),
        None => println!("{:>7}  {:?}", source, ev.data)
    }
}

fn dump_timeout(args: &DumpArgs) -> Result<Option<Duration>> {
    match args.timeout {
        None => Ok(None),
        Some(secs) if secs.is_finite() && secs >= 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
        Some(secs) => bail!("invalid timeout {}", secs)
    }
}

fn dump(config: &SequencerConfig, args: &DumpArgs) -> Result<()> {
    let timeout = dump_timeout(args)?;

    if args.use_async {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        return rt.block_on(dump_async(config, args, timeout));
    }

    let client = SequencerClient::new(open(config)?);
    let port = client.create_port("dump", WRITE_PORT, DEFAULT_PORT_TYPE)?;

    for sender in &args.from {
        port.connect_from(*sender)
            .with_context(|| format!("couldn't connect from {}", sender))?;
    }

    info!(port = %port.address(), "listening");

    while let Some(ev) = client.event_input(timeout)? {
        print_event(&ev);
    }

    debug!("no events before the timeout");
    Ok(())
}

async fn dump_async(config: &SequencerConfig, args: &DumpArgs, timeout: Option<Duration>)
    -> Result<()> {
    let client = AsyncSequencerClient::new(open(config)?)?;
    let port = client.create_port("dump", WRITE_PORT, DEFAULT_PORT_TYPE)?;

    for sender in &args.from {
        port.connect_from(*sender)
            .with_context(|| format!("couldn't connect from {}", sender))?;
    }

    info!(port = %port.address(), "listening");

    while let Some(ev) = client.event_input(timeout).await? {
        print_event(&ev);
    }

    debug!("no events before the timeout");
    Ok(())
}

fn send(config: &SequencerConfig, args: &SendArgs) -> Result<()> {
    if args.channel > 15 || args.note > 127 || args.velocity > 127 {
        bail!("channel must be 0-15, note and velocity 0-127");
    }

    let client = SequencerClient::new(open(config)?);
    let port = client.create_port("send", READ_PORT, DEFAULT_PORT_TYPE)?;
    let route = Route::from_port(&port).dest(args.to);
    let timeout = Some(Duration::from_secs(1));

    let on = Event::note_on(args.channel, args.note, args.velocity);
    client.event_output_direct(&on, &route, timeout)?
        .context("timed out sending note on")?;

    std::thread::sleep(Duration::from_millis(args.duration));

    let off = Event::note_off(args.channel, args.note, 0);
    client.event_output_direct(&off, &route, timeout)?
        .context("timed out sending note off")?;

    info!(to = %args.to, note = args.note, "sent");
    Ok(())
}
