//! datagate — provision multi-tenant data-store access through a
//! Kong-compatible API-gateway control plane.
//!
//! # Usage
//!
//! ```bash
//! # Register an upstream FHIR server as a data store
//! datagate register-data-store https api.example.org 443 fhir /base
//!
//! # Link a project to it (route + key-auth + acl plugins)
//! datagate connect-project-to-datastore <DATA_STORE_ID> proj-42 fhir http,https GET,POST
//!
//! # Issue credentials for one analysis run
//! datagate register-analysis-for-project proj-42 an-7
//! ```
//!
//! Exit codes: 0 on full success, 1 on failure, 2 when a multi-step
//! operation partially succeeded (details on stderr).

// CLI tools are expected to print to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use gateway_client::{DataStoreKind, GatewayClient, GatewayConfig, Protocol};
use provision::{
    AnalysisProvisioner, Classification, ConnectRequest, DataStoreRegistry, FailurePolicy,
    Idempotency, NewDataStore, OperationOutcome, ProjectConnector,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Provision multi-tenant data-store access through an API-gateway control
/// plane: register upstream backends, link projects to them, and issue
/// per-analysis credentials.
#[derive(Parser, Debug)]
#[command(name = "datagate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base URL of the gateway admin API
    #[arg(long, global = true, default_value = gateway_client::DEFAULT_ADMIN_URL)]
    admin_url: String,

    /// Timeout applied to every admin API request
    #[arg(long, global = true, default_value = "30s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Delete already-created objects again when a later provisioning step
    /// fails, instead of leaving a partially provisioned link behind
    #[arg(long, global = true)]
    rollback: bool,

    /// Reuse an existing matching object instead of creating a duplicate
    #[arg(long, global = true)]
    reuse_existing: bool,

    /// Log verbosity (-v info, -vv debug, -vvv trace); logs go to stderr
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all data stores registered with the gateway
    ListDataStores,

    /// Register a data store with the gateway
    RegisterDataStore {
        /// Protocol to use for the upstream server (http or https)
        #[arg(value_name = "PROTOCOL")]
        protocol: Protocol,
        /// Host of the upstream server
        #[arg(value_name = "HOST")]
        host: String,
        /// Upstream server port
        #[arg(value_name = "PORT")]
        port: u16,
        /// Type of the data store (fhir or s3)
        #[arg(value_name = "TYPE")]
        kind: DataStoreKind,
        /// Path used in requests to the upstream server, with a leading slash
        #[arg(value_name = "PATH")]
        path: Option<String>,
    },

    /// Connect a project to a data store
    ConnectProjectToDatastore {
        /// Id of the data store to connect to
        #[arg(value_name = "DATA_STORE_ID")]
        data_store_id: Uuid,
        /// Id of the project to connect
        #[arg(value_name = "PROJECT_ID")]
        project_id: String,
        /// Type of the data store (fhir or s3)
        #[arg(value_name = "TYPE")]
        kind: DataStoreKind,
        /// Comma-separated route protocols, e.g. http,https
        #[arg(value_name = "PROTOCOLS")]
        protocols: String,
        /// Comma-separated HTTP methods matching the route, e.g. GET,POST
        #[arg(value_name = "METHODS")]
        methods: String,
    },

    /// List all data stores connected to a project
    ListProjectDataStores {
        /// Id of the project to list data stores for
        #[arg(value_name = "PROJECT_ID")]
        project_id: String,
    },

    /// Disconnect a project from all connected data stores
    DisconnectProject {
        /// Id of the project to disconnect
        #[arg(value_name = "PROJECT_ID")]
        project_id: String,
    },

    /// Register an analysis for a project and issue its API key
    RegisterAnalysisForProject {
        /// Id of the project to register the analysis for
        #[arg(value_name = "PROJECT_ID")]
        project_id: String,
        /// Id of the analysis to register
        #[arg(value_name = "ANALYSIS_ID")]
        analysis_id: String,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = GatewayConfig::new(&cli.admin_url)?.with_request_timeout(cli.timeout);
    let gateway = GatewayClient::new(config)?;

    let policy = if cli.rollback {
        FailurePolicy::RollbackOnError
    } else {
        FailurePolicy::ContinueOnError
    };
    let idempotency = if cli.reuse_existing {
        Idempotency::ReuseExisting
    } else {
        Idempotency::AllowDuplicates
    };

    match cli.command {
        Commands::ListDataStores => list_data_stores(&gateway).await,
        Commands::RegisterDataStore {
            protocol,
            host,
            port,
            kind,
            path,
        } => {
            let new = NewDataStore {
                protocol,
                host,
                port,
                path,
                kind,
            };
            register_data_store(&gateway, &new, idempotency).await
        }
        Commands::ConnectProjectToDatastore {
            data_store_id,
            project_id,
            kind,
            protocols,
            methods,
        } => {
            let request = ConnectRequest {
                data_store: data_store_id,
                project: project_id,
                kind,
                protocols: parse_protocols(&protocols)?,
                methods: parse_methods(&methods)?,
            };
            connect_project(&gateway, &request, policy, idempotency).await
        }
        Commands::ListProjectDataStores { project_id } => {
            list_project_data_stores(&gateway, &project_id).await
        }
        Commands::DisconnectProject { project_id } => {
            disconnect_project(&gateway, &project_id).await
        }
        Commands::RegisterAnalysisForProject {
            project_id,
            analysis_id,
        } => register_analysis(&gateway, &project_id, &analysis_id).await,
    }
}

/// Parse a comma-separated protocol list.
fn parse_protocols(raw: &str) -> anyhow::Result<Vec<Protocol>> {
    let protocols = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Protocol>, _>>()?;
    anyhow::ensure!(!protocols.is_empty(), "at least one protocol is required");
    Ok(protocols)
}

/// Parse a comma-separated method list, passed through to the control plane
/// in the given order.
fn parse_methods(raw: &str) -> anyhow::Result<Vec<String>> {
    let methods: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect();
    anyhow::ensure!(!methods.is_empty(), "at least one method is required");
    Ok(methods)
}

async fn list_data_stores(gateway: &GatewayClient) -> anyhow::Result<ExitCode> {
    let registry = DataStoreRegistry::new(gateway.clone());
    let services = registry.list().await?;
    if services.is_empty() {
        println!("No data stores registered with the gateway.");
        return Ok(ExitCode::SUCCESS);
    }
    for service in services {
        println!(
            "Data store id: {}, host: {}, port: {}, path: {}",
            service.id,
            service.host,
            service.port,
            service.path.as_deref().unwrap_or("-"),
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn register_data_store(
    gateway: &GatewayClient,
    new: &NewDataStore,
    idempotency: Idempotency,
) -> anyhow::Result<ExitCode> {
    let registry = DataStoreRegistry::new(gateway.clone());
    let registered = registry.register(new, idempotency).await?;
    if registered.reused {
        println!("Data store already registered, id: {}", registered.service.id);
    } else {
        println!("Data store registered, id: {}", registered.service.id);
    }
    Ok(ExitCode::SUCCESS)
}

async fn connect_project(
    gateway: &GatewayClient,
    request: &ConnectRequest,
    policy: FailurePolicy,
    idempotency: Idempotency,
) -> anyhow::Result<ExitCode> {
    let connector = ProjectConnector::new(gateway.clone());
    let report = connector.connect(request, policy, idempotency).await;

    if let Some(route) = &report.route {
        if report.reused {
            println!("Project already connected to data store, route id: {}", route.id);
        } else {
            println!("Project connected to data store, route id: {}", route.id);
        }
    }
    if let Some(plugin) = &report.key_auth {
        println!("Key authentication plugin attached, id: {}", plugin.id);
    }
    if let Some(plugin) = &report.acl {
        println!("ACL plugin attached, id: {}", plugin.id);
    }

    Ok(finish(&report.outcome))
}

async fn list_project_data_stores(
    gateway: &GatewayClient,
    project_id: &str,
) -> anyhow::Result<ExitCode> {
    let connector = ProjectConnector::new(gateway.clone());
    let routes = connector.list(project_id).await?;
    if routes.is_empty() {
        println!("No data stores connected to project.");
        return Ok(ExitCode::SUCCESS);
    }
    for route in routes {
        println!("Project connected to data store id: {}", route.service.id);
    }
    Ok(ExitCode::SUCCESS)
}

async fn disconnect_project(
    gateway: &GatewayClient,
    project_id: &str,
) -> anyhow::Result<ExitCode> {
    let connector = ProjectConnector::new(gateway.clone());
    let report = connector.disconnect(project_id).await;

    if report.removed.is_empty() && report.outcome.classification() == Classification::Success {
        println!("No data stores connected to project.");
    }
    for route in &report.removed {
        println!("Project disconnected from data store, id: {}", route.service.id);
    }

    Ok(finish(&report.outcome))
}

async fn register_analysis(
    gateway: &GatewayClient,
    project_id: &str,
    analysis_id: &str,
) -> anyhow::Result<ExitCode> {
    let provisioner = AnalysisProvisioner::new(gateway.clone());
    let report = provisioner.register(project_id, analysis_id).await;

    if let Some(consumer) = &report.consumer {
        println!("Consumer created, id: {}", consumer.id);
    }
    if let Some(membership) = &report.membership {
        println!("Group membership granted, group: {}", membership.group);
    }
    if let Some(key) = report.api_key() {
        println!("API key issued: {key}");
    }

    Ok(finish(&report.outcome))
}

/// Print failed steps to stderr and map the outcome to an exit code.
fn finish(outcome: &OperationOutcome) -> ExitCode {
    for step in outcome.failed_steps() {
        eprintln!("  {} {} — {}", "!".yellow().bold(), step.step, step.status);
    }
    let classification = outcome.classification();
    if classification != Classification::Success {
        eprintln!("{}", format!("operation finished with {classification}").red());
    }
    ExitCode::from(classification.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_the_full_command_surface() {
        let cli = Cli::try_parse_from([
            "datagate",
            "register-data-store",
            "https",
            "api.example.org",
            "443",
            "fhir",
            "/base",
        ])
        .unwrap();
        assert_eq!(cli.admin_url, gateway_client::DEFAULT_ADMIN_URL);
        match cli.command {
            Commands::RegisterDataStore {
                protocol,
                host,
                port,
                kind,
                path,
            } => {
                assert_eq!(protocol, Protocol::Https);
                assert_eq!(host, "api.example.org");
                assert_eq!(port, 443);
                assert_eq!(kind, DataStoreKind::Fhir);
                assert_eq!(path.as_deref(), Some("/base"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "datagate",
            "--admin-url",
            "http://gateway.internal:8001",
            "--timeout",
            "5s",
            "connect-project-to-datastore",
            "9d7f01cf-7c5a-4e25-9d52-c73f5e16d10f",
            "proj-42",
            "fhir",
            "http,https",
            "GET,POST",
        ])
        .unwrap();
        assert_eq!(cli.admin_url, "http://gateway.internal:8001");
        assert_eq!(cli.timeout, Duration::from_secs(5));
        assert!(matches!(
            cli.command,
            Commands::ConnectProjectToDatastore { .. }
        ));
    }

    #[test]
    fn rejects_invalid_choices() {
        assert!(
            Cli::try_parse_from([
                "datagate",
                "register-data-store",
                "gopher",
                "host",
                "80",
                "fhir"
            ])
            .is_err()
        );
        assert!(
            Cli::try_parse_from([
                "datagate",
                "register-data-store",
                "http",
                "host",
                "80",
                "postgres"
            ])
            .is_err()
        );
    }

    #[test]
    fn protocol_list_parsing() {
        assert_eq!(
            parse_protocols("http,https").unwrap(),
            vec![Protocol::Http, Protocol::Https]
        );
        assert_eq!(parse_protocols(" https ").unwrap(), vec![Protocol::Https]);
        assert!(parse_protocols("http,grpc").is_err());
        assert!(parse_protocols("").is_err());
    }

    #[test]
    fn method_list_preserves_order() {
        assert_eq!(
            parse_methods("GET,POST, PUT").unwrap(),
            vec!["GET".to_owned(), "POST".to_owned(), "PUT".to_owned()]
        );
        assert!(parse_methods(",").is_err());
    }
}
