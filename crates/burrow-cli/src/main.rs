//! Burrow CLI - manage tunnels, routes and backend servers

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burrow_backend::BackendRegistry;
use burrow_cloudflared::CloudflaredRunner;
use burrow_db::entities::server::{ContainerManagerKind, VmManagerKind};
use burrow_db::store::{NewApplication, NewServer};
use burrow_db::Store;
use burrow_engine::{CreateTunnel, Reconciler};

/// Burrow - reconcile declarative tunnels onto cloudflared
#[derive(Parser, Debug)]
#[command(name = "burrow")]
#[command(about = "Manage tunnels, routes and compute backends", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database URL (defaults to ~/.burrow/burrow.db)
    #[arg(long, env = "BURROW_DATABASE")]
    database: Option<String>,

    /// Directory for compiled ingress configs (defaults to ~/.burrow/config)
    #[arg(long, env = "BURROW_CONFIG_DIR")]
    config_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Timeout in seconds for backend and daemon calls
    #[arg(long, default_value = "30")]
    call_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage backend servers
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
    /// Manage registrable TLDs
    Tld {
        #[command(subcommand)]
        command: TldCommands,
    },
    /// Manage tunnels
    Tunnel {
        #[command(subcommand)]
        command: TunnelCommands,
    },
    /// Manage routes (application ↔ tunnel associations)
    Route {
        #[command(subcommand)]
        command: RouteCommands,
    },
    /// Manage applications
    App {
        #[command(subcommand)]
        command: AppCommands,
    },
    /// Talk to the cloudflared daemon directly
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },
    /// Read or write app settings
    Setting {
        #[command(subcommand)]
        command: SettingCommands,
    },
    /// Run one backend discovery sweep
    Discover,
    /// Run discovery sweeps on an interval until interrupted
    Sweep {
        /// Seconds between sweeps
        #[arg(long, default_value = "300")]
        interval: u64,
    },
}

#[derive(Subcommand, Debug)]
enum ServerCommands {
    /// Register a server
    Add {
        name: String,
        #[arg(long)]
        hostname: String,
        #[arg(long)]
        ip: String,
        #[arg(long, default_value = "22")]
        ssh_port: i32,
        #[arg(long)]
        username: String,
        #[arg(long, env = "BURROW_SERVER_PASSWORD")]
        password: String,
        #[arg(long)]
        api_token: Option<String>,
        /// Container manager kind (docker, podman, kubernetes, ...)
        #[arg(long)]
        container_manager: String,
        /// VM manager kind (proxmox, esxi, xen, ...)
        #[arg(long)]
        vm_manager: String,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// List registered servers
    List,
    /// Remove a server and its workloads
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
enum TldCommands {
    Add { name: String },
    List,
}

#[derive(Subcommand, Debug)]
enum TunnelCommands {
    /// Create a tunnel (daemon-side create + config write)
    Create {
        name: String,
        #[arg(long)]
        domain: String,
        /// TLD names to attach (repeatable)
        #[arg(long = "tld")]
        tlds: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    /// Show a tunnel, including daemon-side details
    Info { name: String },
    /// Health-check a tunnel on the daemon side
    Status { name: String },
    /// Replace a tunnel's TLD set and rewrite its config
    SetTlds {
        name: String,
        /// TLD names (repeatable)
        #[arg(long = "tld")]
        tlds: Vec<String>,
    },
    /// Delete a tunnel (daemon stop + delete + config removal)
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum SettingCommands {
    Get { name: String },
    Set { name: String, value: String },
    List,
}

#[derive(Subcommand, Debug)]
enum DaemonCommands {
    /// Authenticate cloudflared with an API token
    Login {
        #[arg(long, env = "BURROW_CF_TOKEN")]
        token: String,
    },
    /// Run a tunnel's connector in the foreground
    Run { tunnel: String },
    /// List daemon-side tunnels
    Tunnels,
    /// List daemon-side routes
    Routes,
    /// Create an API token with optional scopes
    TokenCreate {
        name: String,
        #[arg(long = "scope")]
        scopes: Vec<String>,
    },
    /// List API tokens
    TokenList,
    /// Delete an API token
    TokenDelete { name: String },
    /// List teams
    Teams,
}

#[derive(Subcommand, Debug)]
enum RouteCommands {
    /// Route an application through a tunnel
    Add {
        #[arg(long)]
        tunnel: String,
        #[arg(long)]
        app: i32,
    },
    /// Remove an application's route through a tunnel
    Remove {
        #[arg(long)]
        tunnel: String,
        #[arg(long)]
        app: i32,
    },
    /// List applications routed through a tunnel
    List {
        #[arg(long)]
        tunnel: String,
    },
}

#[derive(Subcommand, Debug)]
enum AppCommands {
    /// Declare an application on a server
    Add {
        name: String,
        #[arg(long)]
        server: String,
        #[arg(long)]
        container: Option<i32>,
        #[arg(long)]
        vm: Option<i32>,
        #[arg(long)]
        hostname: String,
        /// Exposed port specs like http:8080 (repeatable)
        #[arg(long = "port")]
        ports: Vec<String>,
        #[arg(long)]
        enabled: bool,
    },
    /// List applications on a server
    List {
        #[arg(long)]
        server: String,
    },
    Enable { id: i32 },
    Disable { id: i32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = dirs::home_dir()
        .context("Failed to get home directory")?
        .join(".burrow");

    let database_url = match &cli.database {
        Some(url) => url.clone(),
        None => {
            std::fs::create_dir_all(&data_dir)
                .context("Failed to create burrow data directory")?;
            format!(
                "sqlite://{}?mode=rwc",
                data_dir.join("burrow.db").display()
            )
        }
    };
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("config").display().to_string());

    let db = burrow_db::connect(&database_url).await?;
    burrow_db::migrate(&db).await?;
    let store = Arc::new(Store::new(db));

    let call_timeout = Duration::from_secs(cli.call_timeout);
    let registry = Arc::new(BackendRegistry::with_defaults(call_timeout)?);
    let runner = Arc::new(CloudflaredRunner::new().with_timeout(call_timeout));

    let reconciler = Reconciler::new(
        store.clone(),
        runner.clone(),
        registry.clone(),
        &config_dir,
    );

    match cli.command {
        Commands::Server { command } => run_server_command(command, &store).await,
        Commands::Tld { command } => run_tld_command(command, &store).await,
        Commands::Tunnel { command } => {
            run_tunnel_command(command, &store, &reconciler, &runner).await
        }
        Commands::Route { command } => run_route_command(command, &store, &reconciler).await,
        Commands::App { command } => run_app_command(command, &store, &reconciler).await,
        Commands::Daemon { command } => run_daemon_command(command, &store, &runner).await,
        Commands::Setting { command } => run_setting_command(command, &store).await,
        Commands::Discover => {
            let report = reconciler.sweep().await;
            println!(
                "Swept {} server(s) ({} failed): {} container(s), {} VM(s)",
                report.servers_swept,
                report.servers_failed,
                report.containers_seen,
                report.vms_seen
            );
            Ok(())
        }
        Commands::Sweep { interval } => {
            info!(interval_seconds = interval, "Starting discovery sweep loop");
            let handle = burrow_engine::spawn_sweep(
                store.clone(),
                registry.clone(),
                Duration::from_secs(interval),
            );
            tokio::signal::ctrl_c().await?;
            handle.abort();
            info!("Sweep loop stopped");
            Ok(())
        }
    }
}

async fn run_server_command(command: ServerCommands, store: &Store) -> Result<()> {
    match command {
        ServerCommands::Add {
            name,
            hostname,
            ip,
            ssh_port,
            username,
            password,
            api_token,
            container_manager,
            vm_manager,
            namespace,
        } => {
            let server = store
                .servers()
                .create(NewServer {
                    name,
                    hostname,
                    ip_address: ip,
                    ssh_port,
                    username,
                    password,
                    api_token,
                    container_manager: parse_container_kind(&container_manager)?,
                    vm_manager: parse_vm_kind(&vm_manager)?,
                    namespace,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&server)?);
        }
        ServerCommands::List => {
            let servers = store.servers().list().await?;
            println!("{}", serde_json::to_string_pretty(&servers)?);
        }
        ServerCommands::Remove { name } => {
            let server = store.servers().get_by_name(&name).await?;
            store.servers().delete(server.id).await?;
            println!("Removed server '{}'", name);
        }
    }
    Ok(())
}

async fn run_tld_command(command: TldCommands, store: &Store) -> Result<()> {
    match command {
        TldCommands::Add { name } => {
            let tld = store.tlds().create(&name).await?;
            println!("{}", serde_json::to_string_pretty(&tld)?);
        }
        TldCommands::List => {
            let tlds = store.tlds().list().await?;
            println!("{}", serde_json::to_string_pretty(&tlds)?);
        }
    }
    Ok(())
}

async fn run_tunnel_command(
    command: TunnelCommands,
    store: &Store,
    reconciler: &Reconciler,
    runner: &CloudflaredRunner,
) -> Result<()> {
    match command {
        TunnelCommands::Create {
            name,
            domain,
            tlds,
            description,
        } => {
            let tunnel = reconciler
                .create_tunnel(CreateTunnel {
                    name,
                    domain,
                    description,
                    tld_names: tlds,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&tunnel)?);
        }
        TunnelCommands::List => {
            let tunnels = store.tunnels().list().await?;
            println!("{}", serde_json::to_string_pretty(&tunnels)?);
        }
        TunnelCommands::Info { name } => {
            let tunnel = store.tunnels().get_by_name(&name).await?;
            println!("{}", serde_json::to_string_pretty(&tunnel)?);

            // Daemon-side details are advisory: print what we can get
            if let Some(uuid) = tunnel.uuid {
                match runner.tunnel_info(&uuid.to_string()).await {
                    Ok(info) => print_output(info)?,
                    Err(daemon_err) => println!("daemon details unavailable: {}", daemon_err),
                }
            } else {
                println!("daemon details unavailable: tunnel has no confirmed uuid");
            }
        }
        TunnelCommands::Status { name } => {
            let tunnel = store.tunnels().get_by_name(&name).await?;
            let uuid = tunnel
                .uuid
                .context("tunnel has no confirmed uuid; create it first")?;
            print_output(runner.tunnel_status(&uuid.to_string()).await?)?;
        }
        TunnelCommands::SetTlds { name, tlds } => {
            let tunnel = store.tunnels().get_by_name(&name).await?;
            let mut tld_ids = Vec::with_capacity(tlds.len());
            for tld in &tlds {
                tld_ids.push(store.tlds().get_by_name(tld).await?.id);
            }
            store.tunnels().replace_tlds(tunnel.id, tld_ids).await?;
            // Provisional tunnels have no config to rewrite yet
            if tunnel.uuid.is_some() {
                reconciler.refresh_config(tunnel.id).await?;
            }
            println!("Updated TLDs for tunnel '{}'", name);
        }
        TunnelCommands::Delete { name } => {
            let tunnel = store.tunnels().get_by_name(&name).await?;
            reconciler.delete_tunnel(tunnel.id).await?;
            println!("Deleted tunnel '{}'", name);
        }
    }
    Ok(())
}

async fn run_daemon_command(
    command: DaemonCommands,
    store: &Store,
    runner: &CloudflaredRunner,
) -> Result<()> {
    match command {
        DaemonCommands::Login { token } => {
            print_output(runner.login(&token).await?)?;
        }
        DaemonCommands::Run { tunnel } => {
            let tunnel = store.tunnels().get_by_name(&tunnel).await?;
            let uuid = tunnel
                .uuid
                .context("tunnel has no confirmed uuid; create it first")?;
            print_output(runner.tunnel_run(&uuid.to_string()).await?)?;
        }
        DaemonCommands::Tunnels => {
            print_output(runner.tunnel_list().await?)?;
        }
        DaemonCommands::Routes => {
            print_output(runner.route_list().await?)?;
        }
        DaemonCommands::TokenCreate { name, scopes } => {
            let scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
            print_output(runner.token_create(&name, &scopes).await?)?;
        }
        DaemonCommands::TokenList => {
            print_output(runner.token_list().await?)?;
        }
        DaemonCommands::TokenDelete { name } => {
            print_output(runner.token_delete(&name).await?)?;
        }
        DaemonCommands::Teams => {
            print_output(runner.teams_list().await?)?;
        }
    }
    Ok(())
}

fn print_output(output: burrow_cloudflared::CommandOutput) -> Result<()> {
    match output {
        burrow_cloudflared::CommandOutput::Json(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?)
        }
        burrow_cloudflared::CommandOutput::Text(text) => print!("{}", text),
    }
    Ok(())
}

async fn run_setting_command(command: SettingCommands, store: &Store) -> Result<()> {
    match command {
        SettingCommands::Get { name } => match store.settings().get(&name).await? {
            Some(value) => println!("{}", value),
            None => println!("(unset)"),
        },
        SettingCommands::Set { name, value } => {
            store.settings().set(&name, &value).await?;
            println!("Set '{}'", name);
        }
        SettingCommands::List => {
            let settings = store.settings().all().await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }
    Ok(())
}

async fn run_route_command(
    command: RouteCommands,
    store: &Store,
    reconciler: &Reconciler,
) -> Result<()> {
    match command {
        RouteCommands::Add { tunnel, app } => {
            let tunnel = store.tunnels().get_by_name(&tunnel).await?;
            reconciler.add_route(tunnel.id, app).await?;
            println!("Routed application {} through '{}'", app, tunnel.name);
        }
        RouteCommands::Remove { tunnel, app } => {
            let tunnel = store.tunnels().get_by_name(&tunnel).await?;
            reconciler.remove_route(tunnel.id, app).await?;
            println!("Removed route for application {} from '{}'", app, tunnel.name);
        }
        RouteCommands::List { tunnel } => {
            let tunnel = store.tunnels().get_by_name(&tunnel).await?;
            let applications = store.tunnels().routed_applications(tunnel.id).await?;
            println!("{}", serde_json::to_string_pretty(&applications)?);
        }
    }
    Ok(())
}

async fn run_app_command(
    command: AppCommands,
    store: &Store,
    reconciler: &Reconciler,
) -> Result<()> {
    match command {
        AppCommands::Add {
            name,
            server,
            container,
            vm,
            hostname,
            ports,
            enabled,
        } => {
            let server = store.servers().get_by_name(&server).await?;
            let application = store
                .applications()
                .create(NewApplication {
                    name,
                    server_id: server.id,
                    container_id: container,
                    vm_id: vm,
                    hostname,
                    exposed_ports: parse_ports(&ports)?,
                    enabled,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&application)?);
        }
        AppCommands::List { server } => {
            let server = store.servers().get_by_name(&server).await?;
            let applications = store.applications().list_for_server(server.id).await?;
            println!("{}", serde_json::to_string_pretty(&applications)?);
        }
        AppCommands::Enable { id } => {
            store.applications().set_enabled(id, true).await?;
            refresh_routed_tunnels(store, reconciler, id).await?;
            println!("Enabled application {}", id);
        }
        AppCommands::Disable { id } => {
            store.applications().set_enabled(id, false).await?;
            refresh_routed_tunnels(store, reconciler, id).await?;
            println!("Disabled application {}", id);
        }
    }
    Ok(())
}

/// Rewrite the configs of every tunnel this application routes through
async fn refresh_routed_tunnels(
    store: &Store,
    reconciler: &Reconciler,
    application_id: i32,
) -> Result<()> {
    for tunnel in store.tunnels().list().await? {
        if store
            .tunnels()
            .route_exists(tunnel.id, application_id)
            .await?
        {
            reconciler.refresh_config(tunnel.id).await?;
        }
    }
    Ok(())
}

fn parse_container_kind(value: &str) -> Result<ContainerManagerKind> {
    let kind = match value.to_lowercase().as_str() {
        "docker" => ContainerManagerKind::Docker,
        "podman" => ContainerManagerKind::Podman,
        "kubernetes" => ContainerManagerKind::Kubernetes,
        "truenas" => ContainerManagerKind::Truenas,
        "unraid" => ContainerManagerKind::Unraid,
        other => bail!("unknown container manager kind '{}'", other),
    };
    Ok(kind)
}

fn parse_vm_kind(value: &str) -> Result<VmManagerKind> {
    let kind = match value.to_lowercase().as_str() {
        "esxi" => VmManagerKind::Esxi,
        "nutanix" => VmManagerKind::Nutanix,
        "openstack" => VmManagerKind::Openstack,
        "proxmox" => VmManagerKind::Proxmox,
        "truenas" => VmManagerKind::Truenas,
        "unraid" => VmManagerKind::Unraid,
        "xcp" => VmManagerKind::Xcp,
        "xen" => VmManagerKind::Xen,
        other => bail!("unknown vm manager kind '{}'", other),
    };
    Ok(kind)
}

/// Parses `protocol:port` specs (e.g. `http:8080`) into the exposed-ports
/// map
fn parse_ports(specs: &[String]) -> Result<burrow_db::entities::application::ExposedPorts> {
    let mut map = std::collections::BTreeMap::<String, Vec<u16>>::new();
    for spec in specs {
        let (protocol, port) = spec
            .split_once(':')
            .with_context(|| format!("invalid port spec '{}' (expected protocol:port)", spec))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid port in spec '{}'", spec))?;
        map.entry(protocol.to_string()).or_default().push(port);
    }
    Ok(burrow_db::entities::application::ExposedPorts(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ports_groups_by_protocol() {
        let ports = parse_ports(&[
            "http:8080".to_string(),
            "http:8081".to_string(),
            "tcp:5432".to_string(),
        ])
        .unwrap();
        assert_eq!(ports.0.get("http"), Some(&vec![8080, 8081]));
        assert_eq!(ports.0.get("tcp"), Some(&vec![5432]));
    }

    #[test]
    fn parse_ports_rejects_bad_specs() {
        assert!(parse_ports(&["8080".to_string()]).is_err());
        assert!(parse_ports(&["http:notaport".to_string()]).is_err());
    }

    #[test]
    fn manager_kinds_parse_case_insensitively() {
        assert_eq!(
            parse_container_kind("Docker").unwrap(),
            ContainerManagerKind::Docker
        );
        assert_eq!(parse_vm_kind("PROXMOX").unwrap(), VmManagerKind::Proxmox);
        assert!(parse_container_kind("lxd").is_err());
    }
}
