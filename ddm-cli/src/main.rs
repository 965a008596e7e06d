extern crate clap;
extern crate ddm_core;
extern crate failure;
#[macro_use]
extern crate failure_derive;
extern crate fern;
#[macro_use]
extern crate log;

mod errors;

use clap::{App, Arg};
use errors::CliError;
use log::LevelFilter;
use std::path::PathBuf;
use std::process::exit;

use ddm_core::boundary::BoundaryApi;
use ddm_core::ddm_types::{Geometry, PartitionId};
use ddm_core::notify::Event;
use ddm_core::wire::WirePartition;

/// Sets up the stderr logger for the CLI; the manager itself only ever
/// reaches `log` macros, there is no front-end callback to chain to here.
fn init_logging(verbose: bool) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .level(if verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}: {}", record.level(), record.target(), message))
        })
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn parse_create_spec(spec: &str) -> Result<(u64, u64, String), CliError> {
    let parts: Vec<&str> = spec.splitn(3, ':').collect();
    if parts.len() != 3 {
        return Err(CliError::InvalidCreateSpec { spec: spec.into() });
    }
    let offset = parts[0].parse::<u64>().map_err(|_| CliError::ArgNaN { arg: parts[0].into() })?;
    let size = parts[1].parse::<u64>().map_err(|_| CliError::ArgNaN { arg: parts[1].into() })?;
    Ok((offset, size, parts[2].to_owned()))
}

fn print_tree(partition: &WirePartition, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{}#{} offset={} size={} status={:?} type={}",
        indent,
        partition.id.0,
        partition.offset,
        partition.size,
        partition.status,
        partition.type_.as_deref().unwrap_or("-"),
    );
    for child in &partition.children {
        print_tree(child, depth + 1);
    }
}

fn run() -> Result<(), CliError> {
    let matches = App::new("ddm")
        .about("introspection CLI for the disk device manager boundary API")
        .arg(Arg::with_name("verbose").short("v").long("verbose").help("enable debug logging"))
        .arg(
            Arg::with_name("size")
                .long("size")
                .help("total size in bytes of the device to model")
                .takes_value(true)
                .default_value("1000000000"),
        )
        .arg(
            Arg::with_name("block-size")
                .long("block-size")
                .help("block size in bytes")
                .takes_value(true)
                .default_value("512"),
        )
        .arg(
            Arg::with_name("team")
                .long("team")
                .help("team id to stage modifications under")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::with_name("create")
                .long("create")
                .help("stage a new child partition as offset:size:type; may be repeated")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .get_matches();

    init_logging(matches.is_present("verbose")).map_err(|why| {
        eprintln!("failed to initialize logging: {}", why);
        CliError::ArgNaN { arg: "logging".into() }
    })?;

    let size = matches.value_of("size").unwrap();
    let size: u64 = size.parse().map_err(|_| CliError::ArgNaN { arg: size.into() })?;
    let block_size = matches.value_of("block-size").unwrap();
    let block_size: u32 = block_size.parse().map_err(|_| CliError::ArgNaN { arg: block_size.into() })?;
    let team = matches.value_of("team").unwrap();
    let team: u32 = team.parse().map_err(|_| CliError::ArgNaN { arg: team.into() })?;

    let api = BoundaryApi::new();
    api.subscribe(|event: &Event| debug!("event: {:?}", event));

    let geometry = Geometry::from_media(size / u64::from(block_size), block_size)
        .map_err(ddm_core::DdmError::from)?;
    let device: PartitionId = api.create_device(PathBuf::from("/dev/disk/ddm-cli/0/raw"), geometry);
    info!("created device #{}", device.0);

    let creates: Vec<&str> = matches.values_of("create").map(|v| v.collect()).unwrap_or_default();
    if !creates.is_empty() {
        let shadow_root = api.prepare_modifications(device, team)?;
        for spec in &creates {
            let (offset, part_size, type_) = parse_create_spec(spec)?;
            let child = api.shadow_create_child(shadow_root, offset, part_size, type_)?;
            info!("staged child #{}", child.0);
        }
        let jobs = api.commit_modifications(device, team)?;
        info!("committed {} job(s)", jobs.len());
    }

    let tree = api.wire_snapshot(device)?;
    print_tree(&tree, 0);
    Ok(())
}

fn main() {
    if let Err(why) = run() {
        eprintln!("ddm: {}", why);
        exit(1);
    }
}
