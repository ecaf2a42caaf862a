use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use kage_netd::{config, KageServer, ServerOptions};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Kage game server
#[derive(Parser, Debug)]
#[command(name = "kage-netd")]
#[command(about = "Lobby server for Bomberman Online, Outtrigger and Propeller Arena", long_about = None)]
struct Args {
    /// UDP bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Settings file
    #[arg(short, long, default_value = "kage.cfg")]
    config: PathBuf,

    /// Bootstrap port
    #[arg(long, default_value_t = 9090)]
    bootstrap_port: u16,

    /// Bomberman Online lobby port
    #[arg(long, default_value_t = 9091)]
    bomberman_port: u16,

    /// Outtrigger lobby port
    #[arg(long, default_value_t = 9092)]
    outtrigger_port: u16,

    /// Propeller Arena lobby port
    #[arg(long, default_value_t = 9093)]
    propeller_port: u16,

    /// Write per-room netdump capture files
    #[arg(long)]
    dump_net_data: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = config::load(&args.config);

    let server = KageServer::bind(ServerOptions {
        bind_addr: args.bind,
        bootstrap_port: args.bootstrap_port,
        bomberman_port: args.bomberman_port,
        outtrigger_port: args.outtrigger_port,
        propeller_port: args.propeller_port,
        settings,
        dump_net_data: args.dump_net_data,
    })
    .await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = &result {
                error!(error = %e, "server loop failed");
            }
            result?;
        }
        signal = shutdown_signal() => {
            let signal = signal?;
            error!(signal, "caught signal, exiting");
        }
    }
    info!("kage server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            Ok("SIGINT")
        }
        _ = term.recv() => Ok("SIGTERM"),
    }
}
