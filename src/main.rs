mod render;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use render::{Format, describe_error, render, render_items, render_restaurant};
use serde_json::json;
use session::Session;
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;
use wolt_config::{Config, CredentialStore};
use wolt_gateway::CallContext;
use wolt_types::Coordinates;

#[derive(Parser, Debug)]
#[command(name = "wolt", version, about = "wolt: command-line client for the Wolt consumer API")]
struct Cli {
    /// Path to the YAML configuration file (default: ~/.wolt/config.yaml).
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = Format::Table)]
    format: Format,
    /// Debug logging, plus request URL and body preview on errors.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Emit one trace line per upstream request (stderr, or `tracing` with `trace_output: log`).
    #[arg(long, global = true)]
    trace: bool,
    /// Latitude override for location-aware commands.
    #[arg(long, global = true, allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Longitude override for location-aware commands.
    #[arg(long, global = true, allow_hyphen_values = true)]
    lon: Option<f64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List venues on the discovery feed.
    Discover,
    /// Search venues and items.
    Search { query: String },
    /// Show a venue by slug.
    Venue {
        slug: String,
        /// Show live availability and delivery data instead.
        #[arg(long)]
        live: bool,
    },
    /// Show a venue's menu.
    Menu { slug: String },
    /// Show a discovery feed entry by venue slug or link target.
    Item { slug: String },
    /// Look up specific menu items of a venue.
    Items {
        venue: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show the current baskets.
    Cart,
    /// List past orders.
    Orders {
        /// Maximum number of orders (default: 20).
        #[arg(long, default_value_t = 0, hide_default_value = true)]
        limit: u32,
        /// Only orders with this status; repeatable.
        #[arg(long = "status", value_name = "STATUS")]
        statuses: Vec<String>,
    },
    /// Show one order.
    Order { purchase_id: String },
    /// Show the signed-in user.
    Me,
    /// List saved delivery addresses.
    Addresses,
    /// List favourite venues.
    Favorites,
    /// Manage stored credentials.
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Show which credentials are stored.
    Status,
    /// Exchange the stored refresh token for a new access token.
    Refresh,
    /// Store credentials copied from a browser session.
    Set {
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        refresh_token: Option<String>,
        /// Raw `name=value` cookie; repeatable, replaces stored cookies.
        #[arg(long)]
        cookie: Vec<String>,
    },
    /// Remove stored credentials.
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let verbose = cli.verbose;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", describe_error(&e, verbose));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config =
        Config::load(cli.config.as_deref()).map_err(|e| anyhow::anyhow!("config error: {e}"))?;
    if cli.trace {
        config.trace = true;
    }
    let store = CredentialStore::new(config.credentials_path());
    let format = cli.format;

    if let Commands::Auth { action } = &cli.command
        && !matches!(action, AuthCommand::Refresh)
    {
        return cmd_auth_local(action, &store, format);
    }

    let ctx = CallContext::background();
    let on_interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut session = Session::open(config.gateway()?, store)?;
    let at = || -> Result<Coordinates> { Ok(config.coordinates(cli.lat, cli.lon)?) };
    let ctx = &ctx;

    let out = match cli.command {
        Commands::Discover => {
            let at = at()?;
            let items = session
                .call(ctx, async |gw, auth| gw.feed_items(ctx, auth, at).await)
                .await?;
            render_items(format, &items)?
        }
        Commands::Search { query } => {
            let at = at()?;
            let results = session
                .call(ctx, async |gw, auth| gw.search(ctx, auth, at, &query).await)
                .await?;
            render(format, &results)?
        }
        Commands::Venue { slug, live: true } => {
            let at = at()?;
            let venue = session
                .call(ctx, async |gw, auth| gw.venue_dynamic(ctx, auth, &slug, at).await)
                .await?;
            render(format, &venue)?
        }
        Commands::Venue { slug, live: false } => {
            let restaurant = session
                .call(ctx, async |gw, auth| gw.restaurant_by_slug(ctx, auth, &slug).await)
                .await?;
            render_restaurant(format, &restaurant, &config.locale)?
        }
        Commands::Menu { slug } => {
            let menu = session
                .call(ctx, async |gw, auth| gw.venue_assortment(ctx, auth, &slug).await)
                .await?;
            render(format, &menu)?
        }
        Commands::Item { slug } => {
            let at = at()?;
            let item = session
                .call(ctx, async |gw, auth| gw.item_by_slug(ctx, auth, at, &slug).await)
                .await?;
            render_items(format, std::slice::from_ref(&item))?
        }
        Commands::Items { venue, ids } => {
            let items = session
                .call(ctx, async |gw, auth| gw.assortment_items(ctx, auth, &venue, &ids).await)
                .await?;
            render(format, &items)?
        }
        Commands::Cart => {
            let baskets = session
                .call(ctx, async |gw, auth| gw.baskets(ctx, auth).await)
                .await?;
            render(format, &baskets)?
        }
        Commands::Orders { limit, statuses } => {
            let orders = session
                .call(ctx, async |gw, auth| {
                    gw.order_history(ctx, auth, limit, &statuses).await
                })
                .await?;
            render(format, &orders)?
        }
        Commands::Order { purchase_id } => {
            let order = session
                .call(ctx, async |gw, auth| gw.order_details(ctx, auth, &purchase_id).await)
                .await?;
            render(format, &order)?
        }
        Commands::Me => {
            let me = session
                .call(ctx, async |gw, auth| gw.user_me(ctx, auth).await)
                .await?;
            render(format, &me)?
        }
        Commands::Addresses => {
            let addresses = session
                .call(ctx, async |gw, auth| gw.delivery_addresses(ctx, auth).await)
                .await?;
            render(format, &addresses)?
        }
        Commands::Favorites => {
            let at = at()?;
            let favorites = session
                .call(ctx, async |gw, auth| gw.favorite_venues(ctx, auth, at).await)
                .await?;
            render(format, &favorites)?
        }
        Commands::Auth { .. } => {
            let rotated = session.refresh(ctx).await?;
            eprintln!(
                "access token refreshed, saved to {}",
                session.store().path().display()
            );
            render(
                format,
                &json!({ "refreshed": true, "expires_in": rotated.expires_in }),
            )?
        }
    };
    println!("{out}");
    Ok(())
}

fn cmd_auth_local(action: &AuthCommand, store: &CredentialStore, format: Format) -> Result<()> {
    match action {
        AuthCommand::Status => {
            let auth = store.load()?;
            let status = json!({
                "path": store.path().display().to_string(),
                "access_token": auth.access_token().is_some(),
                "refresh_token": auth.refresh_token().is_some(),
                "cookies": auth.cookies.len(),
            });
            println!("{}", render(format, &status)?);
        }
        AuthCommand::Set {
            token,
            refresh_token,
            cookie,
        } => {
            if token.is_none() && refresh_token.is_none() && cookie.is_empty() {
                anyhow::bail!("nothing to store: pass --token, --refresh-token or --cookie");
            }
            let mut auth = store.load()?;
            if let Some(t) = token {
                auth.access_token = Some(t.clone());
            }
            if let Some(r) = refresh_token {
                auth.refresh_token = Some(r.clone());
            }
            if !cookie.is_empty() {
                auth.cookies.clone_from(cookie);
            }
            store.save(&auth)?;
            eprintln!("credentials saved to {}", store.path().display());
        }
        AuthCommand::Clear => {
            store.clear()?;
            eprintln!("credentials removed");
        }
        AuthCommand::Refresh => anyhow::bail!("`auth refresh` needs a gateway session"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_orders_flags() {
        let cli = Cli::parse_from(["wolt", "orders", "--limit", "5", "--status", "delivered", "--status", "rejected"]);
        let Commands::Orders { limit, statuses } = cli.command else {
            panic!("expected orders");
        };
        assert_eq!(limit, 5);
        assert_eq!(statuses, vec!["delivered", "rejected"]);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["wolt", "discover", "--lat", "-33.9", "--lon", "18.4", "--format", "json"]);
        assert_eq!(cli.lat, Some(-33.9));
        assert_eq!(cli.lon, Some(18.4));
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn test_auth_set_stores_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        let action = AuthCommand::Set {
            token: Some("tok".into()),
            refresh_token: None,
            cookie: vec!["a=1".into()],
        };
        cmd_auth_local(&action, &store, Format::Json).unwrap();
        let auth = store.load().unwrap();
        assert_eq!(auth.access_token(), Some("tok"));
        assert_eq!(auth.cookies, vec!["a=1".to_string()]);
    }

    #[test]
    fn test_auth_set_requires_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        let action = AuthCommand::Set {
            token: None,
            refresh_token: None,
            cookie: Vec::new(),
        };
        assert!(cmd_auth_local(&action, &store, Format::Json).is_err());
    }

    #[test]
    fn test_auth_refresh_is_not_a_local_command() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        let err = cmd_auth_local(&AuthCommand::Refresh, &store, Format::Json).unwrap_err();
        assert!(err.to_string().contains("auth refresh"));
    }
}
