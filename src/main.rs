mod cli;
mod correlator;
mod discovery;
mod error;
mod netconfig;
mod network;
mod packet;
mod sequencer;
mod session;

use cli::{Args, CliCommand, PersistMode, SetMode};
use error::GvcpError;
use packet::{Assignment, WriteRegResult, STATUS_SUCCESS};
use session::{Session, SessionConfig};
use std::net::Ipv4Addr;
use std::process;
use std::time::Duration;
use tracing::{error, info};

fn main() {
    // Parse CLI arguments
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    // Initialize logger
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config = SessionConfig {
        ack_timeout: Duration::from_millis(args.timeout),
        ..SessionConfig::default()
    };

    if let Err(e) = run(args.command, config) {
        error!("{}", e);
        process::exit(e.exit_code());
    }
}

fn run(command: CliCommand, config: SessionConfig) -> Result<(), GvcpError> {
    match command {
        CliCommand::Discover {
            allow_broadcast_ack,
        } => discover_command(config, allow_broadcast_ack),
        CliCommand::Forceip {
            ack_required,
            mac,
            ip,
            subnet_mask,
            gateway,
        } => forceip_command(
            config,
            *mac.as_bytes(),
            ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
            subnet_mask.map_or(Ipv4Addr::UNSPECIFIED, |mask| mask.addr()),
            gateway.unwrap_or(Ipv4Addr::UNSPECIFIED),
            ack_required,
        ),
        CliCommand::Readreg { device, addresses } => readreg_command(config, &device, &addresses),
        CliCommand::Writereg {
            device,
            assignments,
        } => writereg_command(config, &device, &assignments),
        CliCommand::Persist { mode } => persist_command(config, mode),
        CliCommand::Set { mode } => set_command(config, mode),
    }
}

fn discover_command(config: SessionConfig, allow_broadcast_ack: bool) -> Result<(), GvcpError> {
    let mut session = Session::new(config);
    let mut found = 0;
    for entry in session.discover(allow_broadcast_ack)? {
        println!("{}", entry?);
        found += 1;
    }
    info!("{} device(s) answered", found);
    Ok(())
}

fn forceip_command(
    config: SessionConfig,
    mac: [u8; 6],
    ip: Ipv4Addr,
    subnet_mask: Ipv4Addr,
    gateway: Ipv4Addr,
    ack_required: bool,
) -> Result<(), GvcpError> {
    println!("mac={}", packet::ack::format_mac(&mac));
    println!("ip={}", ip);
    println!("subnet_mask={}", subnet_mask);
    println!("gw={}", gateway);

    let mut session = Session::new(config);
    let status = session.force_ip(mac, ip, subnet_mask, gateway, ack_required)?;
    if ack_required {
        println!("status: 0x{:x}", status);
    }
    check_status(status)
}

fn readreg_command(
    config: SessionConfig,
    device: &str,
    addresses: &[u32],
) -> Result<(), GvcpError> {
    let target = cli::resolve_device(device, config.port)?;
    let mut session = Session::new(config);

    let result = session.read_registers(target, addresses)?;
    println!("status: 0x{:x}", result.status);
    for value in result.values {
        println!("{:08x}", value);
    }
    Ok(())
}

fn writereg_command(
    config: SessionConfig,
    device: &str,
    assignments: &[Assignment],
) -> Result<(), GvcpError> {
    let target = cli::resolve_device(device, config.port)?;
    let mut session = Session::new(config);

    let result = session.write_registers(target, assignments)?;
    println!("status: 0x{:x}", result.status);
    println!("index: {}", result.index);
    Ok(())
}

fn persist_command(config: SessionConfig, mode: PersistMode) -> Result<(), GvcpError> {
    let result = match mode {
        PersistMode::Dhcp { device } => {
            let target = cli::resolve_device(&device, config.port)?;
            let mut session = Session::new(config);
            netconfig::persist_dhcp(&mut session, target)?
        }
        PersistMode::Static {
            device,
            config: static_args,
        } => {
            let target = cli::resolve_device(&device, config.port)?;
            let mut session = Session::new(config);
            netconfig::persist_static(&mut session, target, &static_args.to_config())?
        }
    };
    evaluate_writereg(&result)
}

fn set_command(config: SessionConfig, mode: SetMode) -> Result<(), GvcpError> {
    let SetMode::Static {
        serial,
        config: static_args,
    } = mode;

    let mut session = Session::new(config);
    let result = netconfig::set_static(&mut session, &serial, &static_args.to_config())?;
    evaluate_writereg(&result)
}

fn evaluate_writereg(result: &WriteRegResult) -> Result<(), GvcpError> {
    if result.status == STATUS_SUCCESS {
        println!("Operation with id {} finished. [OK]", result.index);
    } else {
        println!("Operation with id: {} finished. [FAILED]", result.index);
    }
    check_status(result.status)
}

fn check_status(status: u16) -> Result<(), GvcpError> {
    if status == STATUS_SUCCESS {
        Ok(())
    } else {
        Err(GvcpError::DeviceStatus(status))
    }
}
