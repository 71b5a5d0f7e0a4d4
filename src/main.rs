mod client;
mod config;
mod entity;
mod identifier;
mod lookup;
mod render;
mod resolve;

use crate::client::ApiClient;
use crate::config::{ProjectConfig, Scope, save};
use crate::entity::EntityType;
use crate::identifier::{IdentifierValue, Origin};
use crate::lookup::ApiLookup;
use crate::render::{FULL_IDS, OutputFormat, render_response};
use crate::resolve::{ResolvedEntity, Resolver};
use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::Path;

#[derive(Parser)]
#[command(
    name = "impctl",
    version,
    about = "CLI for the impCentral device management API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Access token override for this invocation (otherwise read from config)"
    )]
    token: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "API endpoint (defaults to https://api.electricimp.com/v5)"
    )]
    endpoint: Option<String>,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Pretty,
        global = true,
        help = "Output format (propagates to subcommands)"
    )]
    output: OutputFormat,

    #[arg(long, global = true, help = "Do not truncate long IDs in table output")]
    full_ids: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist an access token to the chosen scope
    Configure {
        #[arg(long)]
        token: String,
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (local project dir or user config dir)"
        )]
        scope: ScopeArg,
        #[arg(
            long,
            value_name = "URL",
            help = "Optional endpoint to store alongside the token"
        )]
        endpoint: Option<String>,
    },
    /// Link the current directory to a product / device group
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Product operations
    #[command(subcommand)]
    Products(ProductsCommand),
    /// Device group operations
    #[command(subcommand, name = "device-groups")]
    DeviceGroups(DeviceGroupsCommand),
    /// Device operations
    #[command(subcommand)]
    Devices(DevicesCommand),
    /// Deployment (build) operations
    #[command(subcommand)]
    Builds(BuildsCommand),
    /// Webhook operations
    #[command(subcommand)]
    Webhooks(WebhooksCommand),
    /// Login key operations
    #[command(subcommand)]
    Loginkeys(LoginkeysCommand),
    /// Account operations
    #[command(subcommand)]
    Account(AccountCommand),
    /// Validate stored credentials against the API
    Validate,
    /// Show current configuration (token masked)
    ConfigShow,
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Write product / device group defaults to the local project file
    Link {
        #[arg(long, value_name = "PRODUCT")]
        product: Option<String>,
        #[arg(long, value_name = "DEVICE_GROUP")]
        device_group: Option<String>,
    },
    /// Show the project defaults in effect for this directory
    Show,
}

#[derive(Subcommand)]
enum ProductsCommand {
    /// List products
    List,
    /// Fetch a product; falls back to the linked project's product
    Get {
        #[arg(value_name = "PRODUCT")]
        identifier: Option<String>,
    },
    /// Create a product
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Update a product's name or description
    Update {
        #[arg(value_name = "PRODUCT")]
        identifier: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a product
    Delete {
        #[arg(value_name = "PRODUCT")]
        identifier: Option<String>,
    },
}

#[derive(Subcommand)]
enum DeviceGroupsCommand {
    /// List device groups (optionally restricted to a product)
    List {
        #[arg(long, value_name = "PRODUCT")]
        product: Option<String>,
    },
    /// Fetch a device group; falls back to the linked project's group
    Get {
        #[arg(value_name = "DEVICE_GROUP")]
        identifier: Option<String>,
    },
    /// Create a device group inside a product
    Create {
        #[arg(long, value_name = "PRODUCT")]
        product: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "type", value_name = "TYPE", default_value = "development")]
        group_type: String,
    },
    /// Delete a device group
    Delete {
        #[arg(value_name = "DEVICE_GROUP")]
        identifier: Option<String>,
    },
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List devices (optionally restricted to a device group)
    List {
        #[arg(long, value_name = "DEVICE_GROUP")]
        device_group: Option<String>,
    },
    /// Fetch a device by id, name, MAC address, or agent id
    Get {
        #[arg(value_name = "DEVICE")]
        identifier: String,
    },
    /// Assign a device to a device group
    Assign {
        #[arg(value_name = "DEVICE")]
        identifier: String,
        #[arg(long, value_name = "DEVICE_GROUP")]
        device_group: Option<String>,
    },
    /// Remove a device from a device group
    Unassign {
        #[arg(value_name = "DEVICE")]
        identifier: String,
        #[arg(long, value_name = "DEVICE_GROUP")]
        device_group: Option<String>,
    },
    /// Restart a device
    Restart {
        #[arg(value_name = "DEVICE")]
        identifier: String,
    },
}

#[derive(Subcommand)]
enum BuildsCommand {
    /// List deployments (optionally restricted to a device group)
    List {
        #[arg(long, value_name = "DEVICE_GROUP")]
        device_group: Option<String>,
    },
    /// Fetch a deployment by id, sha, or tag
    Get {
        #[arg(value_name = "BUILD")]
        identifier: String,
    },
}

#[derive(Subcommand)]
enum WebhooksCommand {
    /// List webhooks (optionally restricted to a device group)
    List {
        #[arg(long, value_name = "DEVICE_GROUP")]
        device_group: Option<String>,
    },
    /// Fetch a webhook by id or url
    Get {
        #[arg(value_name = "WEBHOOK")]
        identifier: String,
    },
    /// Delete a webhook
    Delete {
        #[arg(value_name = "WEBHOOK")]
        identifier: String,
    },
}

#[derive(Subcommand)]
enum LoginkeysCommand {
    /// List login keys
    List,
    /// Fetch a login key by id or description
    Get {
        #[arg(value_name = "LOGIN_KEY")]
        identifier: String,
    },
    /// Delete a login key
    Delete {
        #[arg(value_name = "LOGIN_KEY")]
        identifier: String,
    },
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Show an account (defaults to the authenticated account)
    Show {
        #[arg(value_name = "ACCOUNT")]
        identifier: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("reading current directory")?;
    FULL_IDS.get_or_init(|| cli.full_ids);

    match &cli.command {
        Commands::Configure {
            token,
            scope,
            endpoint,
        } => {
            let mut existing = config::load_scope((*scope).into(), &cwd)?;
            existing.access_token = Some(token.clone());
            if let Some(url) = endpoint.clone() {
                existing.endpoint = Some(url);
            }

            let path = save((*scope).into(), &existing, &cwd)?;
            println!("Saved access token to {}", path.display());
            return Ok(());
        }
        Commands::ConfigShow => {
            let merged = config::load(&cwd)?;
            let mut masked = merged.clone();
            if masked.access_token.is_some() {
                masked.access_token = Some("*****".into());
            }
            println!("{}", serde_json::to_string_pretty(&masked)?);
            return Ok(());
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Zsh => {
                    generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let effective = config::resolve(&cwd, cli.token.clone(), cli.endpoint.clone())?;
    let client = ApiClient::new(&effective.endpoint, &effective.access_token)?;
    let lookup = ApiLookup::new(&client);
    let resolver = Resolver::new(&lookup);
    let project = config::project_defaults(&cwd)?;
    let output = cli.output;

    match cli.command {
        Commands::Project(command) => handle_project(command, &resolver, &project, &cwd)?,
        Commands::Products(command) => {
            handle_products(command, &client, &resolver, &project, output)?
        }
        Commands::DeviceGroups(command) => {
            handle_device_groups(command, &client, &resolver, &project, output)?
        }
        Commands::Devices(command) => {
            handle_devices(command, &client, &resolver, &project, output)?
        }
        Commands::Builds(command) => handle_builds(command, &client, &resolver, output)?,
        Commands::Webhooks(command) => {
            handle_webhooks(command, &client, &resolver, output)?
        }
        Commands::Loginkeys(command) => handle_loginkeys(command, &client, &resolver, output)?,
        Commands::Account(command) => handle_account(command, &client, &resolver, output)?,
        Commands::Validate => {
            println!("Validating impCentral credentials...");
            match client.get("accounts/me", &[]) {
                Ok(_) => println!("impCentral API: ok"),
                Err(e) => println!("impCentral API: FAILED ({})", e),
            }
        }
        Commands::Configure { .. } | Commands::ConfigShow | Commands::Completion { .. } => {
            unreachable!("handled earlier")
        }
    }

    Ok(())
}

/// Build an identifier from an optional CLI argument, falling back to a
/// project-file id. The origin tag records which path was taken.
fn identifier_from(arg: Option<String>, project_default: Option<&str>) -> IdentifierValue {
    match arg {
        Some(value) => IdentifierValue::from_raw(value, Origin::CliArgument),
        None => match project_default {
            Some(id) => IdentifierValue::from_id(id, Origin::ProjectConfig),
            None => IdentifierValue::empty(),
        },
    }
}

fn scoped_list_query(group: Option<ResolvedEntity>, target: EntityType) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(parent) = group
        && let Some(param) = target.scope_filter(parent.entity_type)
    {
        query.push((param, parent.id));
    }
    query
}

fn handle_project(
    command: ProjectCommand,
    resolver: &Resolver,
    project: &ProjectConfig,
    cwd: &Path,
) -> Result<()> {
    match command {
        ProjectCommand::Link {
            product,
            device_group,
        } => {
            if product.is_none() && device_group.is_none() {
                return Err(anyhow!("Provide --product and/or --device-group to link"));
            }
            // Store resolved ids, not the raw forms, so later fallbacks
            // short-circuit without a round-trip.
            let mut linked = config::load_scope(Scope::Local, cwd)?;
            let mut defaults = linked.project.unwrap_or_default();
            if let Some(value) = product {
                let ident = IdentifierValue::from_raw(value, Origin::CliArgument);
                let resolved = resolver.resolve(&ident, EntityType::Product)?;
                defaults.product = Some(resolved.id);
            }
            if let Some(value) = device_group {
                let ident = IdentifierValue::from_raw(value, Origin::CliArgument);
                let resolved = resolver.resolve(&ident, EntityType::DeviceGroup)?;
                defaults.device_group = Some(resolved.id);
            }
            linked.project = Some(defaults);
            let path = save(Scope::Local, &linked, cwd)?;
            println!("Saved project defaults to {}", path.display());
        }
        ProjectCommand::Show => {
            if project.product.is_none() && project.device_group.is_none() {
                println!("No project defaults are set for this directory.");
            } else {
                println!("{}", serde_json::to_string_pretty(project)?);
            }
        }
    }
    Ok(())
}

fn handle_products(
    command: ProductsCommand,
    client: &ApiClient,
    resolver: &Resolver,
    project: &ProjectConfig,
    output: OutputFormat,
) -> Result<()> {
    const COLUMNS: &[&str] = &["name", "description", "id"];
    match command {
        ProductsCommand::List => {
            let response = client.get("products", &[])?;
            render_response(response, output, Some(COLUMNS))
        }
        ProductsCommand::Get { identifier } => {
            let ident = identifier_from(identifier, project.product.as_deref());
            let resolved = resolver.resolve(&ident, EntityType::Product)?;
            let response = client.get(&format!("products/{}", resolved.id), &[])?;
            render_response(response, output, Some(COLUMNS))
        }
        ProductsCommand::Create { name, description } => {
            let mut attributes = serde_json::Map::new();
            attributes.insert("name".into(), json!(name));
            if let Some(description) = description {
                attributes.insert("description".into(), json!(description));
            }
            let body = json!({"data": {"type": "product", "attributes": attributes}});
            let response = client.post_json("products", &body)?;
            render_response(response, output, Some(COLUMNS))
        }
        ProductsCommand::Update {
            identifier,
            name,
            description,
        } => {
            if name.is_none() && description.is_none() {
                return Err(anyhow!("Provide at least one field to update"));
            }
            let ident = identifier_from(identifier, project.product.as_deref());
            let resolved = resolver.resolve(&ident, EntityType::Product)?;
            let mut attributes = serde_json::Map::new();
            if let Some(name) = name {
                attributes.insert("name".into(), json!(name));
            }
            if let Some(description) = description {
                attributes.insert("description".into(), json!(description));
            }
            let body = json!({"data": {
                "type": "product",
                "id": resolved.id,
                "attributes": attributes,
            }});
            let response = client.patch_json(&format!("products/{}", resolved.id), &body)?;
            render_response(response, output, Some(COLUMNS))
        }
        ProductsCommand::Delete { identifier } => {
            let ident = identifier_from(identifier, project.product.as_deref());
            let resolved = resolver.resolve(&ident, EntityType::Product)?;
            client.delete(&format!("products/{}", resolved.id))?;
            println!("{}", deleted_line(&ident.with_resolved(resolved.id.as_str()), EntityType::Product));
            Ok(())
        }
    }
}

fn handle_device_groups(
    command: DeviceGroupsCommand,
    client: &ApiClient,
    resolver: &Resolver,
    project: &ProjectConfig,
    output: OutputFormat,
) -> Result<()> {
    const COLUMNS: &[&str] = &["name", "type", "description", "id"];
    match command {
        DeviceGroupsCommand::List { product } => {
            let parent = match product {
                Some(value) => Some(resolver.resolve(
                    &IdentifierValue::from_raw(value, Origin::CliArgument),
                    EntityType::Product,
                )?),
                None => None,
            };
            let query = scoped_list_query(parent, EntityType::DeviceGroup);
            let response = client.get("devicegroups", &query)?;
            render_response(response, output, Some(COLUMNS))
        }
        DeviceGroupsCommand::Get { identifier } => {
            let ident = identifier_from(identifier, project.device_group.as_deref());
            let resolved = resolver.resolve(&ident, EntityType::DeviceGroup)?;
            let response = client.get(&format!("devicegroups/{}", resolved.id), &[])?;
            render_response(response, output, Some(COLUMNS))
        }
        DeviceGroupsCommand::Create {
            product,
            name,
            description,
            group_type,
        } => {
            let ident = identifier_from(product, project.product.as_deref());
            let parent = resolver.resolve(&ident, EntityType::Product)?;
            let mut attributes = serde_json::Map::new();
            attributes.insert("name".into(), json!(name));
            attributes.insert("type".into(), json!(group_type));
            if let Some(description) = description {
                attributes.insert("description".into(), json!(description));
            }
            let body = json!({"data": {
                "type": "devicegroup",
                "attributes": attributes,
                "relationships": {"product": {"type": "product", "id": parent.id}},
            }});
            let response = client.post_json("devicegroups", &body)?;
            render_response(response, output, Some(COLUMNS))
        }
        DeviceGroupsCommand::Delete { identifier } => {
            let ident = identifier_from(identifier, project.device_group.as_deref());
            let resolved = resolver.resolve(&ident, EntityType::DeviceGroup)?;
            client.delete(&format!("devicegroups/{}", resolved.id))?;
            println!(
                "{}",
                deleted_line(&ident.with_resolved(resolved.id.as_str()), EntityType::DeviceGroup)
            );
            Ok(())
        }
    }
}

fn handle_devices(
    command: DevicesCommand,
    client: &ApiClient,
    resolver: &Resolver,
    project: &ProjectConfig,
    output: OutputFormat,
) -> Result<()> {
    const COLUMNS: &[&str] = &["name", "mac_address", "agent_id", "device_online", "id"];
    match command {
        DevicesCommand::List { device_group } => {
            let parent = resolve_group_filter(resolver, device_group)?;
            let query = scoped_list_query(parent, EntityType::Device);
            let response = client.get("devices", &query)?;
            render_response(response, output, Some(COLUMNS))
        }
        DevicesCommand::Get { identifier } => {
            let ident = IdentifierValue::from_raw(identifier, Origin::CliArgument);
            let resolved = resolver.resolve(&ident, EntityType::Device)?;
            let response = client.get(&format!("devices/{}", resolved.id), &[])?;
            render_response(response, output, Some(COLUMNS))
        }
        DevicesCommand::Assign {
            identifier,
            device_group,
        } => {
            let device = resolver.resolve(
                &IdentifierValue::from_raw(identifier, Origin::CliArgument),
                EntityType::Device,
            )?;
            let group_ident = identifier_from(device_group, project.device_group.as_deref());
            let group = resolver.resolve(&group_ident, EntityType::DeviceGroup)?;
            let body = json!([{"type": "device", "id": device.id}]);
            client.post_json(
                &format!("devicegroups/{}/relationships/devices", group.id),
                &body,
            )?;
            println!("Device {} assigned to Device Group {}", device.id, group.id);
            Ok(())
        }
        DevicesCommand::Unassign {
            identifier,
            device_group,
        } => {
            let device = resolver.resolve(
                &IdentifierValue::from_raw(identifier, Origin::CliArgument),
                EntityType::Device,
            )?;
            let group_ident = identifier_from(device_group, project.device_group.as_deref());
            let group = resolver.resolve(&group_ident, EntityType::DeviceGroup)?;
            let body = json!([{"type": "device", "id": device.id}]);
            client.delete_json(
                &format!("devicegroups/{}/relationships/devices", group.id),
                &body,
            )?;
            println!(
                "Device {} removed from Device Group {}",
                device.id, group.id
            );
            Ok(())
        }
        DevicesCommand::Restart { identifier } => {
            let device = resolver.resolve(
                &IdentifierValue::from_raw(identifier, Origin::CliArgument),
                EntityType::Device,
            )?;
            client.post_json(&format!("devices/{}/restart", device.id), &json!({}))?;
            println!("Device {} restarted", device.id);
            Ok(())
        }
    }
}

fn handle_builds(
    command: BuildsCommand,
    client: &ApiClient,
    resolver: &Resolver,
    output: OutputFormat,
) -> Result<()> {
    const COLUMNS: &[&str] = &["sha", "tags", "flagged", "created_at", "id"];
    match command {
        BuildsCommand::List { device_group } => {
            let parent = resolve_group_filter(resolver, device_group)?;
            let query = scoped_list_query(parent, EntityType::Deployment);
            let response = client.get("deployments", &query)?;
            render_response(response, output, Some(COLUMNS))
        }
        BuildsCommand::Get { identifier } => {
            let ident = IdentifierValue::from_raw(identifier, Origin::CliArgument);
            let resolved = resolver.resolve(&ident, EntityType::Deployment)?;
            let response = client.get(&format!("deployments/{}", resolved.id), &[])?;
            render_response(response, output, Some(COLUMNS))
        }
    }
}

fn handle_webhooks(
    command: WebhooksCommand,
    client: &ApiClient,
    resolver: &Resolver,
    output: OutputFormat,
) -> Result<()> {
    const COLUMNS: &[&str] = &["url", "event", "content_type", "id"];
    match command {
        WebhooksCommand::List { device_group } => {
            let parent = resolve_group_filter(resolver, device_group)?;
            let query = scoped_list_query(parent, EntityType::Webhook);
            let response = client.get("webhooks", &query)?;
            render_response(response, output, Some(COLUMNS))
        }
        WebhooksCommand::Get { identifier } => {
            let ident = IdentifierValue::from_raw(identifier, Origin::CliArgument);
            let resolved = resolver.resolve(&ident, EntityType::Webhook)?;
            let response = client.get(&format!("webhooks/{}", resolved.id), &[])?;
            render_response(response, output, Some(COLUMNS))
        }
        WebhooksCommand::Delete { identifier } => {
            let ident = IdentifierValue::from_raw(identifier, Origin::CliArgument);
            let resolved = resolver.resolve(&ident, EntityType::Webhook)?;
            client.delete(&format!("webhooks/{}", resolved.id))?;
            println!(
                "{}",
                deleted_line(&ident.with_resolved(resolved.id.as_str()), EntityType::Webhook)
            );
            Ok(())
        }
    }
}

fn handle_loginkeys(
    command: LoginkeysCommand,
    client: &ApiClient,
    resolver: &Resolver,
    output: OutputFormat,
) -> Result<()> {
    const COLUMNS: &[&str] = &["description", "usages", "id"];
    match command {
        LoginkeysCommand::List => {
            let response = client.get("accounts/me/login_keys", &[])?;
            render_response(response, output, Some(COLUMNS))
        }
        LoginkeysCommand::Get { identifier } => {
            let ident = IdentifierValue::from_raw(identifier, Origin::CliArgument);
            let resolved = resolver.resolve(&ident, EntityType::LoginKey)?;
            let response = client.get(&format!("accounts/me/login_keys/{}", resolved.id), &[])?;
            render_response(response, output, Some(COLUMNS))
        }
        LoginkeysCommand::Delete { identifier } => {
            let ident = IdentifierValue::from_raw(identifier, Origin::CliArgument);
            let resolved = resolver.resolve(&ident, EntityType::LoginKey)?;
            client.delete(&format!("accounts/me/login_keys/{}", resolved.id))?;
            println!(
                "{}",
                deleted_line(&ident.with_resolved(resolved.id.as_str()), EntityType::LoginKey)
            );
            Ok(())
        }
    }
}

fn handle_account(
    command: AccountCommand,
    client: &ApiClient,
    resolver: &Resolver,
    output: OutputFormat,
) -> Result<()> {
    const COLUMNS: &[&str] = &["username", "email", "id"];
    match command {
        AccountCommand::Show { identifier } => {
            let ident = match identifier {
                Some(value) => IdentifierValue::from_raw(value, Origin::CliArgument),
                None => IdentifierValue::from_id("me", Origin::CliArgument),
            };
            let resolved = resolver.resolve(&ident, EntityType::Account)?;
            let response = client.get(&format!("accounts/{}", resolved.id), &[])?;
            render_response(response, output, Some(COLUMNS))
        }
    }
}

/// Optional `--device-group` list filter; `None` means an unfiltered
/// listing (the project file only backs required arguments, not filters).
fn resolve_group_filter(
    resolver: &Resolver,
    device_group: Option<String>,
) -> Result<Option<ResolvedEntity>> {
    match device_group {
        Some(value) => resolver
            .resolve(
                &IdentifierValue::from_raw(value, Origin::CliArgument),
                EntityType::DeviceGroup,
            )
            .map(Some),
        None => Ok(None),
    }
}

/// Confirmation line showing both the typed form and the resolved id.
fn deleted_line(ident: &IdentifierValue, entity: EntityType) -> String {
    match (ident.raw(), ident.resolved_id()) {
        (Some(raw), Some(id)) if raw != id => format!("{entity} \"{raw}\" ({id}) deleted"),
        (_, Some(id)) => format!("{entity} {id} deleted"),
        _ => format!("{entity} deleted"),
    }
}
