//! This is the entrypoint for `flat-ipam` when invoked by a CNI runtime.

use std::io::{Read, Write};

use clap::Parser;
use flat_ipam::{
    bridge::NetlinkLookup,
    config::{MetadataSettings, NetworkConfig},
    error::{AllocationError, ConfigError},
    logging::{enable_logger, LogSettings},
    plugin::{allocate, connect_metadata, release},
    result::{
        AllocationResult, PluginError, VersionInfo, CODE_GENERIC, CODE_INVALID_ENVIRONMENT,
    },
};

/// The CNI invocation contract. Everything arrives through the environment.
#[derive(Debug, Parser)]
#[clap(
    author,
    version,
    about = "Flat network IPAM plugin backed by Rancher metadata",
    long_about = None
)]
struct Args {
    /// Operation requested by the runtime (ADD, DEL or VERSION)
    #[clap(long, env = "CNI_COMMAND")]
    command: Option<String>,

    /// Container ID
    #[clap(long, env = "CNI_CONTAINERID", default_value = "")]
    container_id: String,

    /// Path to the container's network namespace
    #[clap(long, env = "CNI_NETNS", default_value = "")]
    netns: String,

    /// Name of the interface inside the container
    #[clap(long, env = "CNI_IFNAME", default_value = "")]
    ifname: String,

    /// Extra `KEY=VALUE` arguments separated by `;`
    #[clap(long, env = "CNI_ARGS", default_value = "")]
    cni_args: String,

    /// Plugin search path
    #[clap(long, env = "CNI_PATH", default_value = "")]
    cni_path: String,
}

/// Read the network configuration the runtime pipes in
fn read_config<R: Read>(mut input: R) -> Result<Vec<u8>, PluginError> {
    let mut data = Vec::new();
    input.read_to_end(&mut data).map_err(|err| {
        PluginError::new(CODE_GENERIC, format!("error reading from stdin: {err}"))
    })?;
    Ok(data)
}

/// Make sure the variables an ADD needs are present
fn require_container_id(args: &Args) -> Result<(), PluginError> {
    if args.container_id.is_empty() {
        return Err(PluginError::new(
            CODE_INVALID_ENVIRONMENT,
            "required env variables missing: CNI_CONTAINERID",
        ));
    }
    Ok(())
}

async fn cmd_add(args: &Args, config: &[u8]) -> Result<AllocationResult, AllocationError> {
    let config = NetworkConfig::load(config, &args.cni_args)?;

    // Logging is configured by the IPAM section, so it can only start once that is loaded
    if let Err(err) = enable_logger(&LogSettings::from_ipam(&config.ipam)) {
        eprintln!("Failed to set up logging: {err}");
    }
    log::debug!("cmdAdd: invoked");
    log::debug!(
        "container={} netns={} ifname={} path={} args={}",
        args.container_id,
        args.netns,
        args.ifname,
        args.cni_path,
        args.cni_args
    );
    log::debug!("ipamConf: {:?}", config.ipam);

    let settings = MetadataSettings::from_env();
    let finder = connect_metadata(&settings).await?;
    let lookup = NetlinkLookup::new().map_err(|source| ConfigError::BridgeLookupFailed {
        name: config.bridge_name.clone(),
        source,
    })?;

    allocate(&config, &args.container_id, &finder, &lookup, &settings).await
}

/// Dispatch on `CNI_COMMAND` and write the command's output to `out`
async fn run<R: Read, W: Write>(args: &Args, input: R, out: &mut W) -> Result<(), PluginError> {
    match args.command.as_deref() {
        Some("ADD") => {
            require_container_id(args)?;
            let config = read_config(input)?;
            let result = cmd_add(args, &config).await.map_err(|err| {
                log::error!("{}", err);
                PluginError::new(CODE_GENERIC, err)
            })?;
            result
                .print(out)
                .map_err(|err| PluginError::new(CODE_GENERIC, err))
        }
        // Release keeps no state, so it succeeds whatever identity it is given
        Some("DEL") => {
            release(&args.container_id).map_err(|err| PluginError::new(CODE_GENERIC, err))
        }
        Some("VERSION") => serde_json::to_writer(out, &VersionInfo::default())
            .map_err(|err| PluginError::new(CODE_GENERIC, err)),
        Some(command) => Err(PluginError::new(
            CODE_INVALID_ENVIRONMENT,
            format!("unknown CNI_COMMAND: {command}"),
        )),
        None => Err(PluginError::new(
            CODE_INVALID_ENVIRONMENT,
            "required env variables missing: CNI_COMMAND",
        )),
    }
}

/// Write the error document. Errors go to stdout so the runtime can relay them
fn report<W: Write>(err: &PluginError, out: &mut W) {
    if err.print(out).is_err() {
        eprintln!("{}", err.msg);
    }
}

#[tokio::main]
pub async fn main() {
    // Parse CLI args
    let args = Args::parse();

    let mut stdout = std::io::stdout();
    if let Err(err) = run(&args, std::io::stdin(), &mut stdout).await {
        report(&err, &mut stdout);
        std::process::exit(1);
    }
}
