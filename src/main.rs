use chaos_backend::*;
use clap::Parser;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Main listen address (overrides the config file)
    #[arg(short = 'l', long, conflicts_with_all = ["addresses", "ports"])]
    listen: Option<String>,

    /// Failover listen address, serving only the default page
    #[arg(short = 'f', long = "failoverlisten")]
    failover_listen: Option<String>,

    /// Do not start the failover listener
    #[arg(long)]
    no_failover: bool,

    /// Comma-separated addresses to listen on (multi-listener mode) [default: 127.0.0.1]
    #[arg(short = 'a', long)]
    addresses: Option<String>,

    /// Comma-separated ports and start-end ranges (multi-listener mode) [default: 8080]
    #[arg(short = 'p', long)]
    ports: Option<String>,
}

impl Args {
    fn overrides(&self) -> ListenOverrides {
        ListenOverrides {
            listen: self.listen.clone(),
            failover_listen: self.failover_listen.clone(),
            addresses: self.addresses.clone(),
            ports: self.ports.clone(),
            no_failover: self.no_failover,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Starting chaos backend...");
    info!("Loading configuration from: {}", args.config);

    let config = BackendConfig::load_or_default(&args.config);
    let plan = RunPlan::build(&config, &args.overrides());

    info!("Fault routes:     {}", RouteTable::full().paths().collect::<Vec<_>>().join(" "));
    for planned in &plan.listeners {
        match planned.role {
            ListenerRole::Main => info!("Main listener:    http://{}", planned.spec),
            ListenerRole::Failover => info!("Failover:         http://{}", planned.spec),
        }
    }

    if let Err(e) = serve_all(plan.into_targets()).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
