//! Command line interface

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::ServerConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "iptv-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the proxy server
    Serve(ServeArgs),
    /// Print the channel list as an M3U playlist and exit
    Show(ShowArgs),
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Links file written by the discovery job (overrides the config file)
    #[arg(short, long)]
    pub links: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Listen address (overrides the config file)
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Proxy base URL, e.g. http://192.168.1.2:8080. Without it the
    /// upstream stream URLs are printed.
    #[arg(long)]
    pub base_url: Option<String>,
}

impl CommonArgs {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(links) = &self.links {
            config.channels.links_file = Some(links.clone());
        }
    }
}

impl ServeArgs {
    pub fn apply(&self, config: &mut ServerConfig) {
        self.common.apply(config);
        if let Some(bind) = self.bind {
            config.host = bind.ip().to_string();
            config.port = bind.port();
        }
    }
}
