//! Command-line interface

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};

use crate::config::target_config::DisconnectPolicy;
use crate::core::address::DeviceAddress;

const USAGE: &str = "\
Usage: gatt-battery-query [-a|--address aa:bb:cc:dd:ee:ff]
If no address is given, the battery service client scans and queries the
first advertiser that is not blacklisted.";

#[derive(Debug, Parser)]
#[command(
    name = "gatt-battery-query",
    version,
    about = "Query the battery level of a nearby BLE peripheral"
)]
pub struct Cli {
    /// Connect to this address instead of scanning
    #[arg(short = 'a', long = "address", value_name = "aa:bb:cc:dd:ee:ff")]
    pub address: Option<DeviceAddress>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// What to do when the fixed target disconnects (overrides the config file)
    #[arg(long, value_enum)]
    pub on_disconnect: Option<DisconnectPolicy>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parses the process arguments. Invalid arguments print the usage text
    /// to stderr and exit with status 1.
    pub fn parse_or_exit() -> Self {
        match Self::try_parse() {
            Ok(cli) => cli,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => {
                eprintln!("{}", e.render());
                eprintln!("{}", USAGE);
                std::process::exit(1);
            }
        }
    }
}
