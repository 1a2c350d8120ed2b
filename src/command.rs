//! Chat command grammar.
//!
//! Commands are whitespace-separated tokens after a fixed prefix:
//!
//! ```text
//! /meraki                       -> ssids of the default network
//! /meraki networks
//! /meraki ssids [network id]
//! /meraki location [startscan|get]
//! ```

use crate::meraki::{Network, Ssid};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Networks,
    /// `None` means the configured default network
    Ssids { network_id: Option<String> },
    Location(LocationAction),
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationAction {
    StartScan,
    Get,
    Unsupported(String),
}

/// What the dispatcher does with a message's text.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Command(Command),
    Echo(String),
}

impl Intent {
    pub fn from_text(text: &str, prefix: &str) -> Self {
        let mut tokens = text.split_whitespace();
        if tokens.next() != Some(prefix) {
            return Intent::Echo(text.to_string());
        }

        let command = match tokens.next().unwrap_or("ssids") {
            "networks" => Command::Networks,
            "ssids" => Command::Ssids {
                network_id: tokens.next().map(str::to_string),
            },
            "location" => Command::Location(match tokens.next().unwrap_or("startscan") {
                "startscan" => LocationAction::StartScan,
                "get" => LocationAction::Get,
                other => LocationAction::Unsupported(other.to_string()),
            }),
            other => Command::Unrecognized(other.to_string()),
        };
        Intent::Command(command)
    }
}

pub fn echo_reply(text: &str) -> String {
    format!("Bot received message \"{}\"", text)
}

pub fn networks_reply(org_id: &str, networks: &[Network]) -> String {
    let mut reply = format!("Networks for organization {}", org_id);
    for network in networks {
        reply.push_str(&format!("\n{} {}", network.name, network.id));
    }
    reply
}

pub fn ssids_reply(network_id: &str, ssids: &[Ssid]) -> String {
    let mut reply = format!("SSIDs for network {}", network_id);
    for ssid in ssids {
        reply.push_str(&format!(
            "\n{} {} Enabled: {}",
            ssid.number, ssid.name, ssid.enabled
        ));
    }
    reply
}

pub fn unrecognized_reply(prefix: &str, token: &str) -> String {
    format!(
        "Unrecognized command \"{token}\". Try:\n\
         {prefix} networks\n\
         {prefix} ssids [network id]\n\
         {prefix} location [startscan|get]"
    )
}

pub fn unsupported_location_reply(prefix: &str, token: &str) -> String {
    format!(
        "Unsupported location action \"{token}\". Use {prefix} location startscan or {prefix} location get"
    )
}
