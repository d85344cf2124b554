//! One-shot discovery query.

use std::net::SocketAddr;

use serde::Serialize;
use tabled::Tabled;

use fidlink_api::{Announcement, Seeker};

use crate::cli::{DiscoverArgs, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const FALLBACK_SERVICE: &str = "PetalControl";

#[derive(Debug, Serialize)]
struct Discovered {
    name: String,
    uid: String,
    host: String,
    port: u16,
    service: String,
    source: SocketAddr,
}

impl From<Announcement> for Discovered {
    fn from(a: Announcement) -> Self {
        Self {
            name: a.name,
            uid: a.advertisement.uid,
            host: a.advertisement.host,
            port: a.advertisement.port,
            service: a.advertisement.service,
            source: a.source,
        }
    }
}

#[derive(Tabled)]
struct DiscoveredRow {
    #[tabled(rename = "Device")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "UID")]
    uid: String,
}

fn to_row(d: &Discovered) -> DiscoveredRow {
    DiscoveredRow {
        name: d.name.clone(),
        address: format!("{}:{}", d.host, d.port),
        service: d.service.clone(),
        uid: d.uid.clone(),
    }
}

pub async fn handle(args: DiscoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // A missing or unreadable config still allows a bare query.
    let cfg = config::load(global).unwrap_or_default();
    let profile_service = config::active_profile(global, &cfg)
        .ok()
        .map(|(_, profile)| profile.service.clone());

    let service = args
        .service
        .or(profile_service)
        .unwrap_or_else(|| FALLBACK_SERVICE.to_owned());
    let target = args
        .target
        .unwrap_or_else(|| cfg.defaults.discovery_settings().target);

    tracing::info!(%service, %target, wait = ?args.wait, "sending discovery query");
    let seeker = Seeker::new(service)
        .with_target(target)
        .with_listen_window(args.wait);
    let found: Vec<Discovered> = seeker
        .seek()
        .await?
        .into_iter()
        .map(Discovered::from)
        .collect();

    if found.is_empty() && global.output == OutputFormat::Table {
        eprintln!("No devices answered within {}", humantime::format_duration(args.wait));
        return Ok(());
    }

    let out = output::render_list(global.output, &found, to_row);
    output::print_output(&out);
    Ok(())
}
