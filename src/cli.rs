use argparse::{ArgumentParser, Store, StoreOption, StoreTrue};
use std::path::PathBuf;

pub struct CliArgs {
    pub udp_port: Option<u16>,
    pub cluster_host: Option<String>,
    pub cluster_port: Option<u16>,
    pub login: Option<String>,
    pub prompt: Option<String>,
    pub store: PathBuf,
    pub roster: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub no_spots: bool,
    pub paused: bool,
    pub clear_all: bool,
    pub yes: bool,
    pub log_level: String,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            udp_port: None,
            cluster_host: None,
            cluster_port: None,
            login: None,
            prompt: None,
            store: PathBuf::from("WWA.csv"),
            roster: None,
            config: None,
            no_spots: false,
            paused: false,
            clear_all: false,
            yes: false,
            log_level: "essential".into(),
        }
    }
}

pub fn parse_cli() -> CliArgs {
    let mut args = CliArgs::default();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("WSJT-X + spot cluster band/mode tracker");
        ap.refer(&mut args.udp_port)
            .add_option(&["--udp-port"], StoreOption, "WSJT-X UDP port on 127.0.0.1 (default 2237)");
        ap.refer(&mut args.cluster_host)
            .add_option(&["--cluster-host"], StoreOption, "Spot cluster host");
        ap.refer(&mut args.cluster_port)
            .add_option(&["--cluster-port"], StoreOption, "Spot cluster port");
        ap.refer(&mut args.login)
            .add_option(&["--login"], StoreOption, "Callsign sent at the cluster login prompt");
        ap.refer(&mut args.prompt)
            .add_option(&["--prompt"], StoreOption, "Login prompt text to wait for");
        ap.refer(&mut args.store)
            .add_option(&["--store"], Store, "Station table CSV path");
        ap.refer(&mut args.roster)
            .add_option(&["--roster"], StoreOption, "Roster file (one callsign per line) used to seed an empty store");
        ap.refer(&mut args.config)
            .add_option(&["--config"], StoreOption, "JSON config file (bands, weights, feed settings)");
        ap.refer(&mut args.no_spots)
            .add_option(&["--no-spots"], StoreTrue, "Do not connect to the spot cluster");
        ap.refer(&mut args.paused)
            .add_option(&["--paused"], StoreTrue, "Start with the spot feed paused (SIGUSR1 toggles)");
        ap.refer(&mut args.clear_all)
            .add_option(&["--clear-all"], StoreTrue, "Reset every band value before starting (needs --yes)");
        ap.refer(&mut args.yes)
            .add_option(&["--yes"], StoreTrue, "Confirm --clear-all");
        ap.refer(&mut args.log_level)
            .add_option(&["--log"], Store, "Log level (essential|debug|trace|warn|error)");
        ap.parse_args_or_exit();
    }
    args
}
