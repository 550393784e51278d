//! Relay process configuration.
//!
//! Precedence: command-line flags > environment (including `.env`) > defaults.

use clap::{Parser, ValueEnum};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "duocall-relay", version, about = "Signaling relay for two-party calls")]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "DUOCALL_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Controls log format and default verbosity.
    #[arg(long, env = "DUOCALL_MODE", value_enum, default_value_t = Mode::Development)]
    pub mode: Mode,

    /// Seconds between keepalive pings on each connection.
    #[arg(long, env = "DUOCALL_PING_SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub ping_secs: u64,
}

impl Config {
    /// Parse from the process arguments after loading `.env`, if present.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["duocall-relay"]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.mode, Mode::Development);
        assert_eq!(config.addr().to_string(), "0.0.0.0:3000");
        assert_eq!(config.ping_interval(), Duration::from_secs(30));
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "duocall-relay",
            "--port",
            "8080",
            "--mode",
            "production",
            "--host",
            "127.0.0.1",
        ])
        .unwrap();
        assert_eq!(config.addr().to_string(), "127.0.0.1:8080");
        assert!(config.mode.is_production());
    }

    #[test]
    fn rejects_zero_ping_interval() {
        assert!(Config::try_parse_from(["duocall-relay", "--ping-secs", "0"]).is_err());
    }
}
