use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use mc_gateway_mock::{Fault, MemoryFile, MockServer};

/// MC protocol 3E mock PLC for gateway testing.
#[derive(Parser, Debug)]
#[command(name = "mc-gateway-mock", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:5511")]
    bind: String,

    /// TOML file with initial device values.
    #[arg(long)]
    memory: Option<PathBuf>,

    /// none | reject-block-reads | silent | reset | end-code=0xC051
    #[arg(long, default_value = "none")]
    fault: Fault,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let server = MockServer::new();
    if let Some(path) = &args.memory {
        let memory = MemoryFile::from_path(path)?;
        server.load_memory(&memory).await?;
        tracing::info!("loaded device memory from {}", path.display());
    }
    if args.fault != Fault::None {
        tracing::info!("fault mode: {:?}", args.fault);
    }
    server.set_fault(args.fault).await;
    server.run(&args.bind).await
}
